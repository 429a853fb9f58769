//! Per-session state, owned and mutated only by the worker thread.

use crate::control::ControlChannel;

/// State for the current test session.
///
/// `current_test` and `control_channel` reset on every new test-script
/// header and on session end; the whole struct is discarded and rebuilt
/// when execution is flushed.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) current_test: Option<String>,
    pub(crate) base_path: Option<String>,
    pub(crate) control_channel: Option<ControlChannel>,
}

impl SessionState {
    /// Tear down and drop the active control channel, if any.
    pub(crate) fn teardown_control_channel(&mut self) {
        if let Some(channel) = self.control_channel.take() {
            channel.teardown();
        }
    }

    /// Path for the end-of-test round-trip, prefixed by the current base path.
    pub(crate) fn end_test_path(&self) -> String {
        match &self.base_path {
            Some(base) => format!("{base}/end_test"),
            None => "/end_test".to_string(),
        }
    }
}
