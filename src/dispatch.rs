//! Header inspection and sequential batch execution.
//!
//! Every inbound response, whether from the initial handshake or from an
//! `end_test` round-trip, passes through [`Dispatcher::process_response`]:
//! session-end tears the session down, a base-path header is stored, and a
//! test-script header installs a fresh control channel and runs the decoded
//! command batch in order. `end_test` feeds its own response back through
//! the same inspection, as a plain synchronous recursion on the worker.

use crate::command::{
    CommandParams, TestCommand, BASE_PATH_HEADER, TEST_LIBRARY_CLASSNAME, TEST_SCRIPT_HEADER,
    TEST_SESSION_END_HEADER, WAIT_FOR_CONTROL, WAIT_FOR_SLEEP,
};
use crate::control::{CancelToken, ControlChannel, WaitCancelled, WaitQueue};
use crate::delegate::CommandDelegate;
use crate::session::SessionState;
use crate::transport::{HttpResponse, Transport};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How one dispatch task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Keep waiting for the next scheduled task.
    Continue,
    /// Cancellation observed; the rest of the batch was abandoned.
    Cancelled,
    /// An `exit` command ran; the host process must terminate.
    Exit,
}

/// Runs dispatch tasks on the worker thread. Owns all session state; nothing
/// here is shared with other threads except the wait queue, the cancel
/// token, and the published control-channel slot.
pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    delegate: CommandDelegate,
    session: SessionState,
    wait_queue: WaitQueue,
    cancel: CancelToken,
    active_channel: Arc<Mutex<Option<ControlChannel>>>,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        delegate: CommandDelegate,
        wait_queue: WaitQueue,
        cancel: CancelToken,
        active_channel: Arc<Mutex<Option<ControlChannel>>>,
    ) -> Self {
        Self {
            transport,
            delegate,
            session: SessionState::default(),
            wait_queue,
            cancel,
            active_channel,
        }
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Initial handshake: announce the client and process the response.
    pub(crate) fn init_test_session(&mut self, client_sdk: &str) -> Result<Outcome> {
        debug!(client_sdk, "init test session");
        let response = match self.transport.post("/init_session", Some(client_sdk)) {
            Ok(response) => response,
            Err(err) => {
                debug!("init_session request failed: {err:#}");
                return Ok(Outcome::Continue);
            }
        };
        self.process_response(&response)
    }

    /// Apply a response's control headers, then run any delivered script.
    pub(crate) fn process_response(&mut self, response: &HttpResponse) -> Result<Outcome> {
        if response.has_header(TEST_SESSION_END_HEADER) {
            self.session.teardown_control_channel();
            self.session.current_test = None;
            self.publish_channel(None);
            info!("test session end received");
            return Ok(Outcome::Continue);
        }

        if let Some(base_path) = response.first_header(BASE_PATH_HEADER) {
            self.session.base_path = Some(base_path.to_string());
        }

        if let Some(test_name) = response.first_header(TEST_SCRIPT_HEADER) {
            self.session.current_test = Some(test_name.to_string());
            self.session.teardown_control_channel();
            let channel = ControlChannel::new(self.wait_queue.sender());
            self.session.control_channel = Some(channel.clone());
            self.publish_channel(Some(channel));

            let commands: Vec<TestCommand> =
                serde_json::from_str(&response.body).context("malformed test script body")?;
            return self.exec_test_commands(&commands);
        }

        Ok(Outcome::Continue)
    }

    fn exec_test_commands(&mut self, commands: &[TestCommand]) -> Result<Outcome> {
        debug!(count = commands.len(), "executing test commands");

        for command in commands {
            if self.cancel.is_cancelled() {
                debug!("cancellation requested, abandoning batch");
                return Ok(Outcome::Cancelled);
            }
            debug!(
                class = %command.class_name,
                function = %command.function_name,
                "command"
            );
            for (key, values) in &command.params {
                debug!("  {key}: {values:?}");
            }

            let started = Instant::now();
            let outcome = if command.class_name == TEST_LIBRARY_CLASSNAME {
                self.exec_built_in(command)?
            } else {
                self.delegate.forward(command)?;
                Outcome::Continue
            };
            debug!(
                class = %command.class_name,
                function = %command.function_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "command handled"
            );

            if outcome != Outcome::Continue {
                return Ok(outcome);
            }
        }
        Ok(Outcome::Continue)
    }

    fn exec_built_in(&mut self, command: &TestCommand) -> Result<Outcome> {
        match command.function_name.as_str() {
            "end_test" => self.end_test(),
            "wait" => self.wait(&command.params),
            "exit" => Ok(Outcome::Exit),
            other => {
                warn!(function = other, "unknown built-in command ignored");
                Ok(Outcome::Continue)
            }
        }
    }

    /// Report the current test as finished and process whatever the server
    /// answers with: the next script, or session end. Ends in `exit` unless
    /// the nested processing observed cancellation or the request failed.
    fn end_test(&mut self) -> Result<Outcome> {
        let path = self.session.end_test_path();
        let response = self.transport.post(&path, None);
        self.session.current_test = None;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                debug!("end_test request failed: {err:#}");
                return Ok(Outcome::Continue);
            }
        };
        match self.process_response(&response)? {
            Outcome::Cancelled => Ok(Outcome::Cancelled),
            _ => Ok(Outcome::Exit),
        }
    }

    /// The two wait conditions are independent and may both apply to one
    /// command; with neither present this is a no-op.
    fn wait(&mut self, params: &CommandParams) -> Result<Outcome> {
        if let Some(values) = params.get(WAIT_FOR_CONTROL) {
            let expected = values.first().map(String::as_str).unwrap_or("");
            debug!(expected, "waiting for control");
            match self.wait_queue.take(&self.cancel) {
                Ok(reason) => debug!(%reason, "wait ended"),
                Err(WaitCancelled) => {
                    debug!("wait cancelled");
                    return Ok(Outcome::Cancelled);
                }
            }
        }
        if let Some(values) = params.get(WAIT_FOR_SLEEP) {
            let raw = values.first().map(String::as_str).unwrap_or_default();
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("bad {WAIT_FOR_SLEEP} value {raw:?}"))?;
            debug!(millis, "sleeping");
            thread::sleep(Duration::from_millis(millis));
            debug!("sleep ended");
        }
        Ok(Outcome::Continue)
    }

    fn publish_channel(&self, channel: Option<ControlChannel>) {
        let mut slot = self
            .active_channel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = channel;
    }
}
