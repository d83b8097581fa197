use gpibprims_session::Instrument;

use crate::cmd::{Context, SendArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_ack, print_reply, OutputFormat, Reply};

pub fn run(args: SendArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    let address = ctx.resolve(&args.device)?;
    let instrument =
        Instrument::open(&ctx.manager, &address).map_err(|err| session_error("open failed", err))?;

    let sent = instrument
        .write(&args.command)
        .map_err(|err| session_error("send failed", err))?;

    if args.read {
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
                command: Some(&args.command),
                response: &response,
            },
            format,
        );
    } else {
        instrument
            .close()
            .map_err(|err| session_error("close failed", err))?;
        print_ack(&args.device, &address, &sent, format);
    }

    Ok(SUCCESS)
}
