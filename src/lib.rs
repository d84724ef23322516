//! vcspool - a throttled process queue for version-control commands
//!
//! Commands are queued on a [`Scheduler`], which admits them into execution
//! while respecting a capacity limit (one slot per logical processor by
//! default). Captured output is handed to completion handlers, and status
//! listings can be turned into [`FileStatus`] records with [`parse_files`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod dialect;
pub mod error;
pub mod ports;
pub mod scheduler;
pub mod status;
pub mod vcs;

// Re-exports for ergonomics
pub use dialect::Dialect;
pub use error::*;
pub use scheduler::{ProcessHandle, ProcessState, Scheduler, SchedulerConfig, TickReport};
pub use status::{FileState, FileStatus, StatusParser, parse_files};
pub use vcs::VersionControl;
