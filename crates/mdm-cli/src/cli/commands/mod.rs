//! CLI command handlers, one file per command.

mod batch;
mod checksum;
mod follow;
mod get;
mod list;
mod path;
mod remove;

pub use batch::run_batch;
pub use checksum::run_checksum;
pub use get::{run_get, GetArgs};
pub use list::run_list;
pub use path::run_path;
pub use remove::run_remove;
