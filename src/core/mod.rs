//! Core functionality for the gateway
//!
//! This module contains the orchestration logic: provider translation,
//! retry/fallback sequencing, and field-schema parsing.

pub mod gateway;
pub mod providers;
pub mod retry;
pub mod schema;
