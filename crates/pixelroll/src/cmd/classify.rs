use pixelroll_session::ResultTier;

use crate::cmd::ClassifyArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_tier, OutputFormat};

pub fn run(args: ClassifyArgs, format: OutputFormat) -> CliResult<i32> {
    print_tier(args.total, ResultTier::classify(args.total), format);
    Ok(SUCCESS)
}
