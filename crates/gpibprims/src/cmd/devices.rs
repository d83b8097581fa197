use crate::cmd::Context;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_directory, OutputFormat};

pub fn run(ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    if ctx.directory.is_empty() {
        return Err(CliError::new(
            USAGE,
            "no device directory loaded (use --devices or GPIBPRIMS_DEVICES)",
        ));
    }
    print_directory(&ctx.directory, format);
    Ok(SUCCESS)
}
