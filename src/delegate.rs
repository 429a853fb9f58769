//! Delegate seams for commands outside the reserved namespace.
//!
//! The embedding application registers exactly one of three delegate shapes
//! at construction time: a structured call with the typed params map, a call
//! with the params pre-serialized to JSON text, or a single call receiving
//! the whole command as JSON text. The shape never changes after
//! construction, and built-in commands are never forwarded here.

use crate::command::{CommandParams, TestCommand};
use anyhow::Result;
use std::sync::Arc;

/// Structured delegate: receives the typed params map as-is.
pub trait CommandListener: Send + Sync {
    fn execute_command(
        &self,
        class_name: &str,
        function_name: &str,
        params: &CommandParams,
    ) -> Result<()>;
}

/// JSON-params delegate: receives the params serialized to JSON text.
pub trait CommandJsonListener: Send + Sync {
    fn execute_command(&self, class_name: &str, function_name: &str, params_json: &str)
        -> Result<()>;
}

/// Raw-JSON delegate: receives the entire command serialized to JSON text.
pub trait CommandRawJsonListener: Send + Sync {
    fn execute_command(&self, command_json: &str) -> Result<()>;
}

/// The delegate shape this rig instance forwards to.
///
/// Chosen once at construction, matched once per dispatched command.
/// Delegate failures are not caught by the dispatcher; they propagate to the
/// worker's task boundary where the task is logged as failed.
#[derive(Clone)]
pub enum CommandDelegate {
    Structured(Arc<dyn CommandListener>),
    JsonParams(Arc<dyn CommandJsonListener>),
    RawJson(Arc<dyn CommandRawJsonListener>),
}

impl CommandDelegate {
    /// Forward one command in the configured shape.
    pub(crate) fn forward(&self, command: &TestCommand) -> Result<()> {
        match self {
            CommandDelegate::Structured(listener) => listener.execute_command(
                &command.class_name,
                &command.function_name,
                &command.params,
            ),
            CommandDelegate::JsonParams(listener) => {
                let params_json = serde_json::to_string(&command.params)?;
                listener.execute_command(&command.class_name, &command.function_name, &params_json)
            }
            CommandDelegate::RawJson(listener) => {
                let command_json = serde_json::to_string(command)?;
                listener.execute_command(&command_json)
            }
        }
    }
}
