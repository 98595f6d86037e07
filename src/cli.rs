//! CLI domain: parse, route, and output only.
//! Commands drive demonstration sequences through the public library API.

mod output;
mod parse;
mod route;

pub use output::{format_report, map_error, DrainOutcome, DrainReport};
pub use parse::{Cli, Commands};
pub use route::RunContext;
