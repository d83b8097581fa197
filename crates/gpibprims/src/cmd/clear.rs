use gpibprims_session::Instrument;

use crate::cmd::{Context, DeviceArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: DeviceArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    let address = ctx.resolve(&args.device)?;
    let instrument =
        Instrument::open(&ctx.manager, &address).map_err(|err| session_error("open failed", err))?;

    let ack = instrument
        .clear()
        .map_err(|err| session_error("clear failed", err))?;
    instrument
        .close()
        .map_err(|err| session_error("close failed", err))?;

    print_ack(&args.device, &address, &ack, format);
    Ok(SUCCESS)
}
