//! Bounded FIFO queue of external processes.
//!
//! Callers [`submit`](Scheduler::submit) commands from the host loop and call
//! [`tick`](Scheduler::tick) periodically. Each tick admits at most one pending
//! command (when a slot is free), reclaims the slots of processes whose exit
//! notices arrived, and enforces the optional timeout. Completion handlers run
//! on the launcher's watcher threads, never inside `tick`.

use crate::adapters::SystemLauncher;
use crate::error::LaunchError;
use crate::ports::{
    Clock, CommandRequest, CompletionHandler, ExitNotice, Launcher, ProcessId, RunningProcess,
    SystemClock,
};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Number of logical processors, the default process capacity
pub fn default_capacity() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulerConfig {
    /// Maximum concurrently running processes; `None` means one per logical processor
    pub capacity: Option<usize>,
    /// Kill processes that run longer than this; `None` lets them run forever
    pub timeout: Option<Duration>,
}

impl SchedulerConfig {
    pub fn effective_capacity(&self) -> usize {
        self.capacity
            .filter(|capacity| *capacity > 0)
            .unwrap_or_else(default_capacity)
    }
}

/// Lifecycle of a submitted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Queued,
    Running { pid: Option<u32> },
    Exited { code: Option<i32> },
    FailedToStart { reason: String },
    Cancelled,
    TimedOut,
}

impl ProcessState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, ProcessState::Queued | ProcessState::Running { .. })
    }
}

/// Caller's view of a submitted command. Cheap to clone and safe to share
/// with completion handlers; the state is updated by [`Scheduler::tick`].
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: ProcessId,
    state: Arc<Mutex<ProcessState>>,
}

impl ProcessHandle {
    fn new(id: ProcessId) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(ProcessState::Queued)),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    fn set_state(&self, state: ProcessState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// What a single [`Scheduler::tick`] did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub started: Vec<ProcessId>,
    pub finished: Vec<ProcessId>,
    pub failed: Vec<(ProcessId, LaunchError)>,
    pub timed_out: Vec<ProcessId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.finished.is_empty()
            && self.failed.is_empty()
            && self.timed_out.is_empty()
    }

    fn merge(&mut self, other: TickReport) {
        self.started.extend(other.started);
        self.finished.extend(other.finished);
        self.failed.extend(other.failed);
        self.timed_out.extend(other.timed_out);
    }
}

struct PendingCommand {
    request: CommandRequest,
    handle: ProcessHandle,
}

struct RunningCommand {
    handle: ProcessHandle,
    process: Box<dyn RunningProcess>,
    started_at: Instant,
    /// Final state to report instead of `Exited` when we killed it ourselves
    terminated_as: Option<ProcessState>,
}

pub struct Scheduler {
    capacity: usize,
    timeout: Option<Duration>,
    launcher: Arc<dyn Launcher>,
    clock: Arc<dyn Clock>,
    pending: VecDeque<PendingCommand>,
    running: BTreeMap<ProcessId, RunningCommand>,
    exits_tx: Sender<ExitNotice>,
    exits_rx: Receiver<ExitNotice>,
    next_id: u64,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig, launcher: Arc<dyn Launcher>, clock: Arc<dyn Clock>) -> Self {
        let (exits_tx, exits_rx) = crossbeam_channel::unbounded();
        let capacity = config.effective_capacity();
        debug!(capacity, timeout = ?config.timeout, "scheduler created");

        Self {
            capacity,
            timeout: config.timeout,
            launcher,
            clock,
            pending: VecDeque::new(),
            running: BTreeMap::new(),
            exits_tx,
            exits_rx,
            next_id: 1,
        }
    }

    /// Scheduler backed by real OS processes and the system clock
    pub fn with_system_defaults(config: &SchedulerConfig) -> Self {
        Self::new(config, Arc::new(SystemLauncher::new()), Arc::new(SystemClock))
    }

    /// Queue `program` with the given argument string. Never blocks.
    ///
    /// With a completion handler the process's streams are captured and the
    /// handler receives them once the process exits. Without one the process
    /// inherits this process's streams and nothing is called back.
    pub fn submit(
        &mut self,
        program: &str,
        args: &str,
        on_complete: Option<CompletionHandler>,
    ) -> ProcessHandle {
        let mut request = CommandRequest::new(program, args);
        request.on_complete = on_complete;
        self.submit_request(request)
    }

    pub fn submit_request(&mut self, request: CommandRequest) -> ProcessHandle {
        let id = ProcessId(self.next_id);
        self.next_id += 1;

        debug!(%id, program = %request.program, args = %request.args, "queued command");
        let handle = ProcessHandle::new(id);
        self.pending.push_back(PendingCommand {
            request,
            handle: handle.clone(),
        });
        handle
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.running.len() < self.capacity {
            if let Some(next) = self.pending.pop_front() {
                self.start(next, &mut report);
            }
        }

        while let Ok(notice) = self.exits_rx.try_recv() {
            self.retire(notice, &mut report);
        }

        self.enforce_timeout(&mut report);
        report
    }

    /// Tick until nothing is pending or running, sleeping `poll` between ticks.
    /// Returns everything that happened along the way.
    pub fn run_until_idle(&mut self, poll: Duration) -> TickReport {
        let mut total = TickReport::default();
        loop {
            total.merge(self.tick());
            if self.is_idle() {
                return total;
            }
            thread::sleep(poll);
        }
    }

    /// Drop a queued command, or kill a running one (its completion handler
    /// still fires). Returns false if `id` is unknown or already finished.
    pub fn cancel(&mut self, id: ProcessId) -> bool {
        if let Some(index) = self.pending.iter().position(|p| p.handle.id() == id) {
            if let Some(cancelled) = self.pending.remove(index) {
                info!(%id, "cancelled queued command");
                cancelled.handle.set_state(ProcessState::Cancelled);
            }
            return true;
        }

        match self.running.get_mut(&id) {
            Some(running) => match running.process.kill() {
                Ok(()) => {
                    info!(%id, "killed running command");
                    running.terminated_as = Some(ProcessState::Cancelled);
                    true
                }
                Err(e) => {
                    warn!(%id, "Failed to kill running command: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }

    fn start(&mut self, next: PendingCommand, report: &mut TickReport) {
        let PendingCommand { request, handle } = next;
        let id = handle.id();
        let program = request.program.clone();

        match self.launcher.launch(id, request, self.exits_tx.clone()) {
            Ok(process) => {
                let pid = process.pid();
                info!(%id, ?pid, program = %program, "started command");
                handle.set_state(ProcessState::Running { pid });
                self.running.insert(
                    id,
                    RunningCommand {
                        handle,
                        process,
                        started_at: self.clock.now(),
                        terminated_as: None,
                    },
                );
                report.started.push(id);
            }
            Err(e) => {
                error!(%id, "Failed to start command: {}", e);
                handle.set_state(ProcessState::FailedToStart {
                    reason: e.to_string(),
                });
                report.failed.push((id, e));
            }
        }
    }

    fn retire(&mut self, notice: ExitNotice, report: &mut TickReport) {
        let Some(running) = self.running.remove(&notice.id) else {
            debug!(id = %notice.id, "exit notice for unknown command");
            return;
        };

        let state = running
            .terminated_as
            .unwrap_or(ProcessState::Exited { code: notice.code });
        debug!(id = %notice.id, ?state, "command finished");
        running.handle.set_state(state);
        report.finished.push(notice.id);
    }

    fn enforce_timeout(&mut self, report: &mut TickReport) {
        let Some(timeout) = self.timeout else {
            return;
        };
        let now = self.clock.now();

        for (id, running) in self.running.iter_mut() {
            if running.terminated_as.is_some() {
                continue;
            }
            if now.saturating_duration_since(running.started_at) < timeout {
                continue;
            }
            match running.process.kill() {
                Ok(()) => {
                    warn!(%id, ?timeout, "killed command after timeout");
                    running.terminated_as = Some(ProcessState::TimedOut);
                    report.timed_out.push(*id);
                }
                Err(e) => error!(%id, "Failed to kill timed out command: {}", e),
            }
        }
    }
}
