use tracing::info;

use crate::cmd::{Context, ScanArgs};
use crate::exit::{address_error, CliResult, SUCCESS};
use crate::output::{print_scan, OutputFormat};

pub fn run(args: ScanArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    // Controller addresses may carry a trailing comma, so only aliases are
    // resolved here; find_devices validates the literal form.
    let controller = ctx
        .directory
        .lookup(&args.controller)
        .unwrap_or(&args.controller);
    let found = gpibprims_session::find_devices(&ctx.manager, controller)
        .map_err(|err| address_error("invalid controller address", err))?;

    info!(controller = %controller, devices = found.len(), "scan complete");
    print_scan(controller, &found, format);
    Ok(SUCCESS)
}
