use thiserror::Error;

/// Failure to start an external process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Executable not found: {program}")]
    NotFound { program: String },

    #[error("Permission denied running {program}")]
    PermissionDenied { program: String },

    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Malformed arguments for {program}: {reason}")]
    InvalidArguments { program: String, reason: String },
}

impl LaunchError {
    pub fn from_io(program: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LaunchError::NotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied {
                program: program.to_string(),
            },
            _ => LaunchError::Spawn {
                program: program.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Errors surfaced by the version-control front end
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VcsError {
    #[error("{program} exited with {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unknown version control dialect: {name}")]
    UnknownDialect { name: String },
}
