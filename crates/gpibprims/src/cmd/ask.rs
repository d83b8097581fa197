use crate::cmd::{AskArgs, Context};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat, Reply};

pub fn run(args: AskArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    let address = ctx.resolve(&args.device)?;
    let response = gpibprims_session::ask(&ctx.manager, &address, &args.command)
        .map_err(|err| session_error("ask failed", err))?;

    print_reply(
        &Reply {
            device: &args.device,
            address: &address,
            command: Some(&args.command),
            response: &response,
        },
        format,
    );
    Ok(SUCCESS)
}
