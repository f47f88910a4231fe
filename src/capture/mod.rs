//! Image capture and recognition module
//!
//! This module consolidates:
//! - Camera permission and still capture (camera.rs)
//! - OCR text recognition (ocr.rs)
//! - Captured image type (image.rs)

pub mod camera;
pub mod image;
pub mod ocr;
