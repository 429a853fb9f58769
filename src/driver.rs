//! Single-worker execution driver and the crate's public entry point.
//!
//! One dedicated thread drains a task queue in submission order, so at most
//! one dispatch task is ever in flight and nothing inside a task runs
//! concurrently with itself. Scheduling never implicitly cancels a pending
//! task; only `flush_execution` cancels, and it abandons the old worker
//! rather than waiting for it.

use crate::control::{cancel_pair, CancelHandle, ControlChannel, WaitQueue};
use crate::delegate::{
    CommandDelegate, CommandJsonListener, CommandListener, CommandRawJsonListener,
};
use crate::dispatch::{Dispatcher, Outcome};
use crate::transport::{HttpResponse, Transport};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::process;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{debug, error};

enum Task {
    InitSession { client_sdk: String },
    ReadHeaders(HttpResponse),
}

/// Handles to the current worker generation. Replaced wholesale on flush;
/// the previous generation keeps only its own orphaned channel slot.
struct Worker {
    tasks: Sender<Task>,
    cancel: CancelHandle,
    active_channel: Arc<Mutex<Option<ControlChannel>>>,
}

/// Remote-controlled test-execution agent.
///
/// Construct with a [`Transport`] and one delegate shape, then call
/// [`init_test_session`](TestRig::init_test_session) to start the scenario.
/// The server drives everything from there; the embedding application only
/// feeds later responses in via [`read_headers`](TestRig::read_headers) and
/// may reset the rig at any point with
/// [`flush_execution`](TestRig::flush_execution).
pub struct TestRig {
    transport: Arc<dyn Transport>,
    delegate: CommandDelegate,
    worker: Mutex<Worker>,
}

impl TestRig {
    pub fn new(transport: Arc<dyn Transport>, delegate: CommandDelegate) -> Self {
        let worker = spawn_worker(transport.clone(), delegate.clone());
        Self {
            transport,
            delegate,
            worker: Mutex::new(worker),
        }
    }

    pub fn with_listener(transport: Arc<dyn Transport>, listener: Arc<dyn CommandListener>) -> Self {
        Self::new(transport, CommandDelegate::Structured(listener))
    }

    pub fn with_json_listener(
        transport: Arc<dyn Transport>,
        listener: Arc<dyn CommandJsonListener>,
    ) -> Self {
        Self::new(transport, CommandDelegate::JsonParams(listener))
    }

    pub fn with_raw_json_listener(
        transport: Arc<dyn Transport>,
        listener: Arc<dyn CommandRawJsonListener>,
    ) -> Self {
        Self::new(transport, CommandDelegate::RawJson(listener))
    }

    /// Schedule the initial handshake with the orchestration server.
    pub fn init_test_session(&self, client_sdk: &str) {
        self.submit(Task::InitSession {
            client_sdk: client_sdk.to_string(),
        });
    }

    /// Schedule header processing for an already-received response.
    pub fn read_headers(&self, response: HttpResponse) {
        self.submit(Task::ReadHeaders(response));
    }

    /// Cancel the in-flight task (if any) and restart with fresh state.
    ///
    /// Cancellation is advisory: the old worker unwinds at its next
    /// checkpoint and is abandoned, never joined. Pending tasks scheduled
    /// before the flush are discarded with it. Safe to call from any thread,
    /// concurrently with a running task.
    pub fn flush_execution(&self) {
        debug!("flush_execution");
        let mut worker = lock(&self.worker);
        worker.cancel.trigger();
        *worker = spawn_worker(self.transport.clone(), self.delegate.clone());
    }

    /// The control channel of the currently active test script, if any.
    ///
    /// Reads may race with script installation on the worker and are allowed
    /// to be momentarily stale.
    pub fn control_channel(&self) -> Option<ControlChannel> {
        let worker = lock(&self.worker);
        let channel = lock(&worker.active_channel).clone();
        channel
    }

    fn submit(&self, task: Task) {
        let worker = lock(&self.worker);
        if worker.tasks.send(task).is_err() {
            error!("worker task queue closed; dropping scheduled task");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_worker(transport: Arc<dyn Transport>, delegate: CommandDelegate) -> Worker {
    let (task_tx, task_rx) = unbounded();
    let (cancel_handle, cancel_token) = cancel_pair();
    let active_channel = Arc::new(Mutex::new(None));

    let dispatcher = Dispatcher::new(
        transport,
        delegate,
        WaitQueue::new(),
        cancel_token,
        active_channel.clone(),
    );
    thread::spawn(move || worker_loop(task_rx, dispatcher));

    Worker {
        tasks: task_tx,
        cancel: cancel_handle,
        active_channel,
    }
}

fn worker_loop(tasks: Receiver<Task>, mut dispatcher: Dispatcher) {
    for task in tasks.iter() {
        if dispatcher.cancelled() {
            debug!("worker cancelled, discarding remaining tasks");
            return;
        }
        let result = match task {
            Task::InitSession { client_sdk } => dispatcher.init_test_session(&client_sdk),
            Task::ReadHeaders(response) => dispatcher.process_response(&response),
        };
        match result {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Cancelled) => {
                debug!("dispatch task cancelled, worker stopping");
                return;
            }
            Ok(Outcome::Exit) => {
                debug!("exit command received, terminating process");
                process::exit(0);
            }
            Err(err) => error!("dispatch task failed: {err:#}"),
        }
    }
}
