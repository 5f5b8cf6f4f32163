//! Structured logging for store operations
//!
//! Public entry points of the store (database open/close, session commit,
//! migration moves, autogenerate) emit a `start` event, then either `end`
//! with `duration_ms` or `end_error` with the error code. Field names come
//! from `petstore_core_types::schema`.
//!
//! - [`init`]: install the process subscriber (CLI only)
//! - `log_op_start!`, `log_op_end!`, `log_op_error!`: the three lifecycle events
//! - [`init_test_capture`]: record events in memory for assertions

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
