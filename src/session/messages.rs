//! Message types for the capture screen
//!
//! User actions and the results of requests that left the update loop.
//! Every result carries the `RequestId` it answers.

use crate::capture::camera::{CameraOutcome, PermissionOutcome, PermissionStatus};
use crate::capture::ocr::RecognizedText;

use super::requests::{RequestId, ScreenId};

/// Outcome of one recognition run
#[derive(Debug, Clone)]
pub enum RecognitionOutcome {
    Recognized(RecognizedText),
    /// The recognizer gave up; the string is only logged
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum Msg {
    /// Snap button
    CaptureRequested,
    /// Detect button
    DetectRequested,
    /// Copy the displayed text to the clipboard
    CopyText,
    PermissionChecked(RequestId, PermissionStatus),
    PermissionResolved(RequestId, PermissionOutcome),
    CameraReturned(RequestId, CameraOutcome),
    RecognitionFinished(RequestId, RecognitionOutcome),
    /// A notice's display time ran out on the given screen instance
    NoticeExpired(ScreenId, u64),
}

impl Msg {
    /// The request this message answers, if any
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Msg::PermissionChecked(id, _)
            | Msg::PermissionResolved(id, _)
            | Msg::CameraReturned(id, _)
            | Msg::RecognitionFinished(id, _) => Some(*id),
            Msg::CaptureRequested | Msg::DetectRequested | Msg::CopyText | Msg::NoticeExpired(..) => {
                None
            }
        }
    }
}
