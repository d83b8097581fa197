use crate::cmd::{Context, DeviceArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(args: DeviceArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    let address = ctx.resolve(&args.device)?;
    let status_byte = gpibprims_session::device_status(&ctx.manager, &address)
        .map_err(|err| session_error("status failed", err))?;

    print_status(&args.device, &address, status_byte, format);
    Ok(SUCCESS)
}
