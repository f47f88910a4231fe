use crate::capture::image::CapturedImage;
use crate::config::TextOutput;

use super::requests::{PendingRequests, RequestKind};

/// The capture screen's image, made explicit so recognition can refuse
/// to run before anything was captured
#[derive(Clone, Debug, Default)]
pub enum ImageSlot {
    #[default]
    Empty,
    Captured(CapturedImage),
}

impl ImageSlot {
    pub fn image(&self) -> Option<&CapturedImage> {
        match self {
            ImageSlot::Empty => None,
            ImageSlot::Captured(image) => Some(image),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    PermissionGranted,
    PermissionDenied,
    RecognitionFailed,
    NoImage,
    NoTextFound,
    CameraUnavailable,
    TextCopied,
}

impl NoticeKind {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            NoticeKind::PermissionDenied
                | NoticeKind::RecognitionFailed
                | NoticeKind::NoImage
                | NoticeKind::CameraUnavailable
        )
    }
}

/// Short-lived message shown over the capture screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
}

/// What the screen is currently waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingPermission,
    Capturing,
    Recognizing,
}

#[derive(Debug)]
pub struct ScannerState {
    pub image: ImageSlot,
    /// Text currently on screen
    pub result_text: Option<String>,
    pub notice: Option<Notice>,
    pub text_output: TextOutput,
    pub requests: PendingRequests,
    next_notice: u64,
}

impl ScannerState {
    pub fn new(text_output: TextOutput) -> Self {
        Self {
            image: ImageSlot::Empty,
            result_text: None,
            notice: None,
            text_output,
            requests: PendingRequests::new(),
            next_notice: 0,
        }
    }

    /// Replace the current notice with a new one of `kind`
    pub fn push_notice(&mut self, kind: NoticeKind) -> Notice {
        let notice = Notice {
            id: self.next_notice,
            kind,
        };
        self.next_notice += 1;
        self.notice = Some(notice);
        notice
    }

    pub fn phase(&self) -> Phase {
        if self.requests.is_pending(RequestKind::Recognition) {
            Phase::Recognizing
        } else if self.requests.is_pending(RequestKind::Camera) {
            Phase::Capturing
        } else if self.requests.any_pending(&[
            RequestKind::PermissionCheck,
            RequestKind::PermissionRequest,
        ]) {
            Phase::AwaitingPermission
        } else {
            Phase::Idle
        }
    }
}
