//! Binary entrypoint for the node classification handler.

use std::process::ExitCode;

use nodeclass_encs::EncsHandler;

fn main() -> ExitCode {
    nodeclass_plugin::launch(&EncsHandler)
}
