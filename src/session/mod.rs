//! Capture screen session
//!
//! This module contains:
//! - Screen state (image slot, displayed text, notices)
//! - Message types for capture screen interactions
//! - Typed request identifiers for results that come back asynchronously
//! - The update function that turns messages into effects

pub mod messages;
pub mod requests;
pub mod state;
pub mod update;
