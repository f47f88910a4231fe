//! Page views
//!
//! - Launcher page (launcher.rs)
//! - Capture screen (scanner.rs)

pub mod launcher;
pub mod scanner;
