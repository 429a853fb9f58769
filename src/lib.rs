//! Remote-controlled test-execution agent.
//!
//! A `TestRig` lives inside a client process and is driven by a remote test
//! orchestration server: the server answers the initial handshake (and every
//! `end_test` round-trip) with a batch of commands, and the rig executes the
//! batch sequentially on a single dedicated worker thread. Commands in the
//! reserved `TestLibrary` namespace are handled by the rig itself (`wait`,
//! `end_test`, `exit`); everything else is forwarded to a delegate supplied
//! by the embedding application.
//!
//! Architecture:
//! - Worker thread: drains a task queue, one dispatch task at a time
//! - Control channel: out-of-band `signal` path that unblocks `wait` commands
//! - `flush_execution`: cancels the in-flight task and restarts with fresh state
//!
//! The HTTP transport and the command delegates are collaborator seams; the
//! embedding application implements them.

pub mod command;
mod control;
pub mod delegate;
mod dispatch;
mod driver;
mod session;
pub mod transport;

pub use command::{CommandParams, TestCommand};
pub use control::ControlChannel;
pub use delegate::{
    CommandDelegate, CommandJsonListener, CommandListener, CommandRawJsonListener,
};
pub use driver::TestRig;
pub use transport::{HttpResponse, Transport};
