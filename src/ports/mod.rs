pub mod launcher;
pub mod time;

// Re-exports
pub use launcher::*;
pub use time::*;
