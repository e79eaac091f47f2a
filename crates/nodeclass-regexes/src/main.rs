//! Binary entrypoint for the regexes handler.

use std::process::ExitCode;

use nodeclass_regexes::RegexesHandler;

fn main() -> ExitCode {
    nodeclass_plugin::launch(&RegexesHandler)
}
