//! CLI command handlers, one file per command.

mod checksum;
mod patch;
mod snapshot;
mod verify;

pub use checksum::run_checksum;
pub use patch::run_patch;
pub use snapshot::run_snapshot;
pub use verify::{run_verify, VerifyArgs};
