use crate::error::LaunchError;
use crate::ports::{
    CommandRequest, ExitNotice, Launcher, ProcessId, ProcessOutput, RunningProcess,
};
use crossbeam_channel::Sender;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_WAIT_POLL: Duration = Duration::from_millis(5);

/// Launcher that spawns real OS processes with `std::process::Command`.
///
/// Each started process gets a watcher thread that waits for exit, hands the
/// captured output to the completion handler and then posts the exit notice.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    wait_poll: Duration,
}

impl SystemLauncher {
    pub fn new() -> Self {
        Self {
            wait_poll: DEFAULT_WAIT_POLL,
        }
    }

    /// How often the watcher checks a child for exit
    pub fn with_wait_poll(mut self, wait_poll: Duration) -> Self {
        self.wait_poll = wait_poll;
        self
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for SystemLauncher {
    fn launch(
        &self,
        id: ProcessId,
        request: CommandRequest,
        exits: Sender<ExitNotice>,
    ) -> Result<Box<dyn RunningProcess>, LaunchError> {
        let argv = request.argv()?;
        let CommandRequest {
            program,
            current_dir,
            on_complete,
            ..
        } = request;

        let mut command = Command::new(&program);
        command.args(&argv);
        if let Some(dir) = &current_dir {
            command.current_dir(dir);
        }
        if on_complete.is_some() {
            command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        // Own process group, so a kill also reaches helpers that inherited the pipes
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| LaunchError::from_io(&program, &e))?;
        let pid = child.id();
        debug!(%id, pid, program = %program, "spawned child process");

        // Nothing is ever written to a captured stdin; close it so the child sees EOF.
        drop(child.stdin.take());
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let child = Arc::new(Mutex::new(child));
        let watched = Arc::clone(&child);
        let wait_poll = self.wait_poll;

        let watcher = thread::Builder::new()
            .name(format!("vcspool-wait-{}", id.0))
            .spawn(move || {
                let code = wait_for_exit(&watched, wait_poll);
                if let Some(handler) = on_complete {
                    let output = ProcessOutput {
                        id,
                        code,
                        stdout: join_reader(stdout_reader),
                        stderr: join_reader(stderr_reader),
                    };
                    handler(output);
                }
                // The scheduler may already be gone; nobody is left to free a slot for.
                let _ = exits.send(ExitNotice { id, code });
            });

        if let Err(e) = watcher {
            let _ = lock_child(&child).kill();
            return Err(LaunchError::Spawn {
                program,
                reason: format!("could not start watcher thread: {e}"),
            });
        }

        Ok(Box::new(SystemProcess { pid, child }))
    }
}

struct SystemProcess {
    pid: u32,
    child: Arc<Mutex<Child>>,
}

impl RunningProcess for SystemProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        let mut child = lock_child(&self.child);
        #[cfg(unix)]
        {
            if let Err(e) = kill_group(self.pid) {
                warn!(pid = self.pid, "Failed to kill process group: {}", e);
            }
        }
        child.kill()
    }
}

/// SIGKILL every process in the group led by `pid`.
///
/// The group outlives a reaped leader while any member is alive, so this is
/// still the right target after the direct child has exited.
#[cfg(unix)]
fn kill_group(pid: u32) -> std::io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return Ok(());
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses a process group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // Group already gone
        Ok(())
    } else {
        Err(err)
    }
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|e| e.into_inner())
}

fn wait_for_exit(child: &Mutex<Child>, poll: Duration) -> Option<i32> {
    loop {
        match lock_child(child).try_wait() {
            Ok(Some(status)) => return status.code(),
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll child process: {}", e);
                return None;
            }
        }
        thread::sleep(poll);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = stream.read_to_end(&mut buf) {
            warn!("Failed to read child output: {}", e);
        }
        buf
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default()
}
