pub mod catalog;
pub mod checksum;
pub mod config;
pub mod engine;
pub mod logging;
pub mod manager;
pub mod naming;
pub mod progress;

pub use catalog::DownloadId;
