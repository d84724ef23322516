use crate::error::LaunchError;
use crossbeam_channel::Sender;
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// Scheduler-assigned identifier for a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handler invoked once, off the scheduling thread, when a captured process exits.
pub type CompletionHandler = Box<dyn FnOnce(ProcessOutput) + Send + 'static>;

/// A request to run one external command.
///
/// Output is captured (stdin/stdout/stderr piped) only when a completion
/// handler is attached; otherwise the child inherits the parent's streams.
pub struct CommandRequest {
    pub program: String,
    pub args: String,
    pub current_dir: Option<PathBuf>,
    pub on_complete: Option<CompletionHandler>,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: args.into(),
            current_dir: None,
            on_complete: None,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn on_complete(mut self, handler: CompletionHandler) -> Self {
        self.on_complete = Some(handler);
        self
    }

    pub fn captures_output(&self) -> bool {
        self.on_complete.is_some()
    }

    /// The argument string split into an argv vector
    pub fn argv(&self) -> Result<Vec<String>, LaunchError> {
        split_args(&self.args).map_err(|e| LaunchError::InvalidArguments {
            program: self.program.clone(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRequest")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("current_dir", &self.current_dir)
            .field("captures_output", &self.captures_output())
            .finish()
    }
}

/// Everything a captured process left behind. Moved into the completion
/// handler, so it can be read exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub id: ProcessId,
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Posted by a launcher once a started process has exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitNotice {
    pub id: ProcessId,
    pub code: Option<i32>,
}

/// A started process as seen by the scheduler
pub trait RunningProcess: Send {
    /// OS process id, when there is one
    fn pid(&self) -> Option<u32>;

    /// Forcibly terminate the process. Its exit is still reported normally.
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Port for starting external processes.
///
/// A launcher owns exit delivery for everything it starts: when the process
/// exits it must call the request's completion handler (if any) at most once
/// and then send exactly one [`ExitNotice`] on `exits`.
pub trait Launcher: Send + Sync {
    fn launch(
        &self,
        id: ProcessId,
        request: CommandRequest,
        exits: Sender<ExitNotice>,
    ) -> Result<Box<dyn RunningProcess>, LaunchError>;
}

/// Split an argument string into argv using POSIX shell quoting rules.
pub fn split_args(args: &str) -> Result<Vec<String>, shell_words::ParseError> {
    shell_words::split(args)
}

/// Inverse of [`split_args`] for building an argument string from argv.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    shell_words::join(args)
}
