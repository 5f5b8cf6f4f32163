//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_PET_ID: &str = "pet_id";
pub const FIELD_MIGRATION_ID: &str = "migration_id";

// Unit-of-work counters
pub const FIELD_INSERTED: &str = "inserted";
pub const FIELD_UPDATED: &str = "updated";
pub const FIELD_DELETED: &str = "deleted";
pub const FIELD_ROW_COUNT: &str = "row_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Change-tracking event names (emitted only when modification tracking is on)
pub const EVENT_RECORD_INSERTED: &str = "record_inserted";
pub const EVENT_RECORD_UPDATED: &str = "record_updated";
pub const EVENT_RECORD_DELETED: &str = "record_deleted";
