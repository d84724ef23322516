use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::VcsError;
use crate::ports::{CommandRequest, CompletionHandler, ProcessOutput};
use crate::scheduler::{ProcessHandle, Scheduler};
use crate::status::{FileStatus, parse_files};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Runs a version-control binary inside one repository through a [`Scheduler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionControl {
    dialect: Dialect,
    binary: String,
    repo_dir: PathBuf,
}

impl VersionControl {
    pub fn new(dialect: Dialect, binary: impl Into<String>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            dialect,
            binary: binary.into(),
            repo_dir: repo_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let dialect = config.vcs.dialect;
        Self::new(dialect, config.vcs.binary_for(dialect), config.resolved_repo_dir())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Queue the binary with a raw argument string
    pub fn run(
        &self,
        scheduler: &mut Scheduler,
        args: &str,
        on_complete: Option<CompletionHandler>,
    ) -> ProcessHandle {
        info!(binary = %self.binary, args, repo = %self.repo_dir.display(), "submitting vcs command");
        let mut request = CommandRequest::new(&self.binary, args).current_dir(&self.repo_dir);
        request.on_complete = on_complete;
        scheduler.submit_request(request)
    }

    /// Queue a status listing; `on_files` receives the parsed records
    pub fn find_files<F>(&self, scheduler: &mut Scheduler, on_files: F) -> ProcessHandle
    where
        F: FnOnce(Result<Vec<FileStatus>, VcsError>) + Send + 'static,
    {
        let dialect = self.dialect;
        let binary = self.binary.clone();
        let handler: CompletionHandler = Box::new(move |output: ProcessOutput| {
            let result = check_output(&binary, output)
                .map(|output| parse_files(dialect, &output.stdout_text()));
            on_files(result);
        });
        self.run(scheduler, dialect.status_args(), Some(handler))
    }

    /// Queue a lookup of the repository root directory
    pub fn repository_location<F>(&self, scheduler: &mut Scheduler, on_root: F) -> ProcessHandle
    where
        F: FnOnce(Result<PathBuf, VcsError>) + Send + 'static,
    {
        let binary = self.binary.clone();
        let handler: CompletionHandler = Box::new(move |output: ProcessOutput| {
            let result = check_output(&binary, output)
                .map(|output| PathBuf::from(output.stdout_text().trim()));
            on_root(result);
        });
        self.run(scheduler, self.dialect.root_args(), Some(handler))
    }

    /// Queue creation of a new repository in the working directory
    pub fn initialize<F>(&self, scheduler: &mut Scheduler, on_done: F) -> ProcessHandle
    where
        F: FnOnce(Result<(), VcsError>) + Send + 'static,
    {
        let binary = self.binary.clone();
        let handler: CompletionHandler = Box::new(move |output: ProcessOutput| {
            on_done(check_output(&binary, output).map(|_| ()));
        });
        self.run(scheduler, self.dialect.init_args(), Some(handler))
    }
}

/// Turn a non-zero exit into [`VcsError::CommandFailed`] carrying stderr
pub fn check_output(program: &str, output: ProcessOutput) -> Result<ProcessOutput, VcsError> {
    if output.success() {
        return Ok(output);
    }
    let stderr = output.stderr_text().trim().to_string();
    warn!(program, code = ?output.code, stderr = %stderr, "vcs command failed");
    Err(VcsError::CommandFailed {
        program: program.to_string(),
        code: output.code,
        stderr,
    })
}
