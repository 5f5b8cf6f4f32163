//! Lifecycle event macros
//!
//! Each macro stamps `component` with the caller's module path and `op`
//! with the given operation name. Extra `key = value` fields pass through
//! to `tracing` unchanged.

/// `start` event of an operation
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::petstore_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::petstore_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// `end` event of an operation; `duration_ms` is required
///
/// ```
/// # use petstore_core::log_op_end;
/// let started = std::time::Instant::now();
/// log_op_end!(
///     "migrations_upgrade",
///     duration_ms = started.elapsed().as_millis() as u64,
///     row_count = 1
/// );
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::petstore_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::petstore_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// `end_error` event, logged at error level with `err_kind` and `err_code`
///
/// The error is converted with `Into<ExError>`, so a `PetStoreError` or an
/// `ExError` clone both work.
///
/// ```
/// # use petstore_core::{log_op_error, PetStoreError};
/// let err = PetStoreError::PetNotFound { pet_id: 9 };
/// log_op_error!("session_commit", err, duration_ms = 3, pet_id = 9);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::petstore_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::petstore_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            $($field)*
        );
    }};
}
