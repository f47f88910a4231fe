//! Capture screen transitions
//!
//! `update` applies one message to the screen state and returns the effects
//! the application shell has to run. Nothing here touches the camera, the
//! portal or the recognizer directly.

use image::RgbaImage;

use crate::capture::camera::{CameraOutcome, PermissionOutcome, PermissionStatus};
use crate::capture::ocr::Rotation;

use super::messages::{Msg, RecognitionOutcome};
use super::requests::{RequestId, RequestKind};
use super::state::{ImageSlot, Notice, NoticeKind, ScannerState};

#[derive(Debug, Clone)]
pub enum Effect {
    /// Read the ambient camera permission
    CheckPermission(RequestId),
    /// Ask the user for camera permission
    RequestPermission(RequestId),
    OpenCamera(RequestId),
    Recognize {
        id: RequestId,
        image: RgbaImage,
        rotation: Rotation,
    },
    /// Abort the task running `RequestId`
    Cancel(RequestId),
    ShowNotice(Notice),
    CopyToClipboard(String),
}

pub fn update(state: &mut ScannerState, msg: Msg) -> Vec<Effect> {
    match msg {
        Msg::CaptureRequested => ensure_camera_permission(state),
        Msg::DetectRequested => detect_text(state),
        Msg::CopyText => match state.result_text.clone() {
            Some(text) => {
                let notice = state.push_notice(NoticeKind::TextCopied);
                vec![Effect::CopyToClipboard(text), Effect::ShowNotice(notice)]
            }
            None => Vec::new(),
        },
        Msg::PermissionChecked(id, status) => {
            if !accept(state, id) {
                return Vec::new();
            }
            match status {
                PermissionStatus::Granted => open_camera(state),
                PermissionStatus::NotGranted => {
                    log::info!("Camera permission not granted yet, requesting it");
                    let (id, _) = state.requests.issue(RequestKind::PermissionRequest);
                    vec![Effect::RequestPermission(id)]
                }
            }
        }
        Msg::PermissionResolved(id, outcome) => {
            if !accept(state, id) {
                return Vec::new();
            }
            match outcome {
                PermissionOutcome::Granted => {
                    let notice = state.push_notice(NoticeKind::PermissionGranted);
                    let mut effects = vec![Effect::ShowNotice(notice)];
                    effects.extend(open_camera(state));
                    effects
                }
                PermissionOutcome::Denied => {
                    log::info!("Camera permission denied");
                    let notice = state.push_notice(NoticeKind::PermissionDenied);
                    vec![Effect::ShowNotice(notice)]
                }
            }
        }
        Msg::CameraReturned(id, outcome) => {
            if !accept(state, id) {
                return Vec::new();
            }
            match outcome {
                CameraOutcome::Captured(image) => {
                    log::info!("Captured {}x{} image", image.width(), image.height());
                    state.image = ImageSlot::Captured(image);
                    Vec::new()
                }
                CameraOutcome::Cancelled => {
                    log::debug!("Camera returned without an image");
                    Vec::new()
                }
                CameraOutcome::Failed(reason) => {
                    log::warn!("Camera failed: {}", reason);
                    let notice = state.push_notice(NoticeKind::CameraUnavailable);
                    vec![Effect::ShowNotice(notice)]
                }
            }
        }
        Msg::RecognitionFinished(id, outcome) => {
            if !accept(state, id) {
                return Vec::new();
            }
            match outcome {
                RecognitionOutcome::Recognized(text) => {
                    match text.display_text(state.text_output) {
                        Some(shown) => {
                            state.result_text = Some(shown);
                            Vec::new()
                        }
                        None => {
                            let notice = state.push_notice(NoticeKind::NoTextFound);
                            vec![Effect::ShowNotice(notice)]
                        }
                    }
                }
                RecognitionOutcome::Failed(reason) => {
                    log::error!("Text recognition failed: {}", reason);
                    let notice = state.push_notice(NoticeKind::RecognitionFailed);
                    vec![Effect::ShowNotice(notice)]
                }
            }
        }
        Msg::NoticeExpired(screen, notice_id) => {
            if screen != state.requests.screen() {
                log::debug!("Ignoring notice timer from another screen");
            } else if state.notice.is_some_and(|notice| notice.id == notice_id) {
                state.notice = None;
            }
            Vec::new()
        }
    }
}

/// Resolve `id` against the pending requests, logging why a result is dropped
fn accept(state: &mut ScannerState, id: RequestId) -> bool {
    if state.requests.resolve(id) {
        return true;
    }
    if id.screen() != state.requests.screen() {
        log::debug!("Ignoring {:?} result from another screen", id.kind());
    } else {
        log::debug!("Ignoring stale {:?} result {:?}", id.kind(), id);
    }
    false
}

fn ensure_camera_permission(state: &mut ScannerState) -> Vec<Effect> {
    if state.requests.any_pending(&[
        RequestKind::PermissionCheck,
        RequestKind::PermissionRequest,
        RequestKind::Camera,
    ]) {
        log::debug!("Capture already in progress");
        return Vec::new();
    }
    let (id, _) = state.requests.issue(RequestKind::PermissionCheck);
    vec![Effect::CheckPermission(id)]
}

fn open_camera(state: &mut ScannerState) -> Vec<Effect> {
    let (id, _) = state.requests.issue(RequestKind::Camera);
    vec![Effect::OpenCamera(id)]
}

fn detect_text(state: &mut ScannerState) -> Vec<Effect> {
    let image = match &state.image {
        ImageSlot::Captured(image) => image.rgba.clone(),
        ImageSlot::Empty => {
            log::info!("Detect requested before any capture");
            let notice = state.push_notice(NoticeKind::NoImage);
            return vec![Effect::ShowNotice(notice)];
        }
    };

    let (id, superseded) = state.requests.issue(RequestKind::Recognition);
    let mut effects = Vec::new();
    if let Some(old) = superseded {
        log::debug!("Superseding recognition {:?}", old);
        effects.push(Effect::Cancel(old));
    }
    effects.push(Effect::Recognize {
        id,
        image,
        rotation: Rotation::None,
    });
    effects
}
