use gpibprims_session::Instrument;

use crate::cmd::{Context, ReadArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat, Reply};

pub fn run(args: ReadArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    let address = ctx.resolve(&args.device)?;
    let instrument =
        Instrument::open(&ctx.manager, &address).map_err(|err| session_error("open failed", err))?;

    let response = ctx
        .manager
        .receive(instrument.handle(), args.term)
        .map_err(|err| session_error("receive failed", err))?;
    instrument
        .close()
        .map_err(|err| session_error("close failed", err))?;

    print_reply(
        &Reply {
            device: &args.device,
            address: &address,
            command: None,
            response: &response,
        },
        format,
    );
    Ok(SUCCESS)
}
