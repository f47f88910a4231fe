//! Core application module
//!
//! This module contains:
//! - Application entry point and Cosmic Application implementation
//! - D-Bus camera portal proxies and response types

pub mod app;
pub mod portal;
