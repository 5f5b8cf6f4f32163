//! Core types shared across petstore facilities
//!
//! This crate provides the canonical vocabulary used by both the error
//! and the logging facilities:
//!
//! - **Schema constants**: Canonical field keys and event names

pub mod schema;
