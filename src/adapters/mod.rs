pub mod process;

pub use process::SystemLauncher;
