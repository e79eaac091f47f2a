//! Binary entrypoint for the regex mappings handler.

use std::process::ExitCode;

use nodeclass_regex_maps::RegexMapsHandler;

fn main() -> ExitCode {
    nodeclass_plugin::launch(&RegexMapsHandler)
}
