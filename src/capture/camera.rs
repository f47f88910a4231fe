//! Still capture from a camera through GStreamer
//!
//! The camera is reached either through the XDG camera portal (a PipeWire
//! remote read with `pipewiresrc`) or directly through a V4L2 device node.

use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use gstreamer as gst;
use gstreamer::MessageView;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbaImage;

use super::image::CapturedImage;
use crate::core::portal::{self, PortalResponse};

/// How the camera is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraAccess {
    /// XDG desktop portal, works inside a sandbox
    Portal,
    /// A V4L2 device node opened directly
    Device(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub thumbnail_max_dimension: u32,
    pub warmup_frames: u32,
    pub timeout: Duration,
}

/// Ambient camera permission, read without prompting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    NotGranted,
}

/// Answer to an explicit permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

impl From<PortalResponse> for PermissionOutcome {
    fn from(response: PortalResponse) -> Self {
        match response {
            PortalResponse::Success => PermissionOutcome::Granted,
            PortalResponse::Cancelled | PortalResponse::Other => PermissionOutcome::Denied,
        }
    }
}

/// Result of one trip to the camera
#[derive(Debug, Clone)]
pub enum CameraOutcome {
    Captured(CapturedImage),
    /// The camera produced nothing, e.g. the stream ended or timed out
    Cancelled,
    Failed(String),
}

impl CameraAccess {
    pub async fn status(&self) -> PermissionStatus {
        match self {
            CameraAccess::Portal => {
                match portal::camera_permission_granted(&[crate::core::app::APP_ID, ""]).await {
                    Ok(true) => PermissionStatus::Granted,
                    Ok(false) => PermissionStatus::NotGranted,
                    Err(err) => {
                        log::debug!("Treating camera permission as not granted: {:#}", err);
                        PermissionStatus::NotGranted
                    }
                }
            }
            CameraAccess::Device(path) => device_status(path),
        }
    }

    pub async fn request(&self) -> PermissionOutcome {
        match self {
            CameraAccess::Portal => match portal::access_camera().await {
                Ok(response) => response.into(),
                Err(err) => {
                    log::warn!("Camera access request failed: {:#}", err);
                    PermissionOutcome::Denied
                }
            },
            CameraAccess::Device(path) => match device_status(path) {
                PermissionStatus::Granted => PermissionOutcome::Granted,
                PermissionStatus::NotGranted => PermissionOutcome::Denied,
            },
        }
    }
}

/// A device node counts as granted when this user can open it
pub fn device_status(path: &Path) -> PermissionStatus {
    match std::fs::File::open(path) {
        Ok(_) => PermissionStatus::Granted,
        Err(err) => {
            log::debug!("Cannot open camera device {}: {}", path.display(), err);
            PermissionStatus::NotGranted
        }
    }
}

/// Longest single wait on the appsink before the cancel flag is checked again
const PULL_SLICE: Duration = Duration::from_millis(100);

/// Raises its flag when dropped, so an aborted capture stops the blocking grab
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

enum FrameSource {
    PipeWire(OwnedFd),
    Device(PathBuf),
}

/// Take one still and hand it back as a thumbnail
pub async fn capture_still(access: CameraAccess, options: CaptureOptions) -> CameraOutcome {
    let source = match access {
        CameraAccess::Portal => match portal::open_pipewire_remote().await {
            Ok(fd) => FrameSource::PipeWire(fd),
            Err(err) => {
                log::warn!("Could not open camera through the portal: {:#}", err);
                return CameraOutcome::Failed(format!("{:#}", err));
            }
        },
        CameraAccess::Device(path) => FrameSource::Device(path),
    };

    let max_dimension = options.thumbnail_max_dimension;
    let cancelled = Arc::new(AtomicBool::new(false));
    let _cancel = CancelOnDrop(Arc::clone(&cancelled));
    match tokio::task::spawn_blocking(move || grab_frame(&source, &options, &cancelled)).await {
        Ok(Ok(Some(frame))) => {
            log::info!("Camera frame captured: {}x{}", frame.width(), frame.height());
            CameraOutcome::Captured(CapturedImage::thumbnail(frame, max_dimension))
        }
        Ok(Ok(None)) => CameraOutcome::Cancelled,
        Ok(Err(err)) => {
            log::error!("Camera capture failed: {:#}", err);
            CameraOutcome::Failed(format!("{:#}", err))
        }
        Err(_) => CameraOutcome::Failed("Camera task panicked".to_string()),
    }
}

fn grab_frame(
    source: &FrameSource,
    options: &CaptureOptions,
    cancelled: &AtomicBool,
) -> Result<Option<RgbaImage>> {
    gst::init().context("Failed to initialize GStreamer")?;

    let pipeline = gst::Pipeline::new();

    let src = match source {
        FrameSource::PipeWire(fd) => gst::ElementFactory::make("pipewiresrc")
            .property("fd", fd.as_raw_fd())
            .build()
            .context("Failed to create pipewiresrc element")?,
        FrameSource::Device(path) => gst::ElementFactory::make("v4l2src")
            .property("device", path.to_string_lossy().to_string())
            .build()
            .context("Failed to create v4l2src element")?,
    };

    let videoconvert = gst::ElementFactory::make("videoconvert")
        .build()
        .context("Failed to create videoconvert element")?;

    let caps = gst::Caps::builder("video/x-raw")
        .field("format", "RGBA")
        .build();
    let appsink = gst_app::AppSink::builder()
        .caps(&caps)
        .drop(true)
        .max_buffers(1)
        .sync(false)
        .build();

    pipeline.add_many([&src, &videoconvert, appsink.upcast_ref::<gst::Element>()])?;
    gst::Element::link_many([&src, &videoconvert, appsink.upcast_ref::<gst::Element>()])?;

    let result = (|| -> Result<Option<RgbaImage>> {
        pipeline
            .set_state(gst::State::Playing)
            .context("Failed to start camera pipeline")?;
        let bus = pipeline.bus().context("Camera pipeline has no bus")?;

        let deadline = Instant::now() + options.timeout;
        let mut skipped = 0;
        loop {
            if cancelled.load(Ordering::Relaxed) {
                log::debug!("Camera capture aborted");
                return Ok(None);
            }
            let Some(wait) = pull_wait(deadline, Instant::now()) else {
                log::warn!("No camera frame within {:?}", options.timeout);
                return Ok(None);
            };
            let Some(sample) = appsink.try_pull_sample(gst::ClockTime::from_nseconds(
                wait.as_nanos() as u64,
            )) else {
                drain_bus_errors(&bus)?;
                if appsink.is_eos() {
                    log::info!("Camera stream ended before a frame arrived");
                    return Ok(None);
                }
                continue;
            };

            if skipped < options.warmup_frames {
                skipped += 1;
                continue;
            }
            return frame_from_sample(&sample).map(Some);
        }
    })();

    pipeline
        .set_state(gst::State::Null)
        .context("Failed to stop camera pipeline")?;
    result
}

/// Next appsink wait: at most one slice, None once the deadline has passed
fn pull_wait(deadline: Instant, now: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(now);
    if remaining.is_zero() {
        None
    } else {
        Some(remaining.min(PULL_SLICE))
    }
}

fn drain_bus_errors(bus: &gst::Bus) -> Result<()> {
    while let Some(msg) =
        bus.timed_pop_filtered(gst::ClockTime::from_mseconds(0), &[gst::MessageType::Error])
    {
        if let MessageView::Error(err) = msg.view() {
            return Err(anyhow!(
                "Camera pipeline error: {} ({})",
                err.error(),
                err.debug().unwrap_or_default()
            ));
        }
    }
    Ok(())
}

fn frame_from_sample(sample: &gst::Sample) -> Result<RgbaImage> {
    let buffer = sample.buffer().context("Camera sample has no buffer")?;
    let caps = sample.caps().context("Camera sample has no caps")?;
    let info = gst_video::VideoInfo::from_caps(caps).context("Camera caps are not raw video")?;
    let map = buffer
        .map_readable()
        .map_err(|_| anyhow!("Camera buffer is not readable"))?;
    pack_rows(
        map.as_slice(),
        info.width(),
        info.height(),
        info.stride()[0] as usize,
    )
}

/// Copy tightly packed RGBA rows out of a buffer whose rows are `stride` bytes apart
pub fn pack_rows(data: &[u8], width: u32, height: u32, stride: usize) -> Result<RgbaImage> {
    let row_len = width as usize * 4;
    if stride < row_len {
        return Err(anyhow!("Row stride {} is shorter than a {}px row", stride, width));
    }
    let needed = stride * (height as usize).saturating_sub(1) + row_len;
    if height > 0 && data.len() < needed {
        return Err(anyhow!(
            "Incomplete frame: have {} bytes, expected {}",
            data.len(),
            needed
        ));
    }

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    RgbaImage::from_raw(width, height, pixels).context("Frame size does not match its pixels")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_rows_strips_padding() {
        // 2x2 frame with 4 bytes of padding per row
        let data = [
            1, 1, 1, 1, 2, 2, 2, 2, 0, 0, 0, 0, //
            3, 3, 3, 3, 4, 4, 4, 4, 0, 0, 0, 0,
        ];
        let img = pack_rows(&data, 2, 2, 12).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(1, 0).0, [2, 2, 2, 2]);
        assert_eq!(img.get_pixel(0, 1).0, [3, 3, 3, 3]);
    }

    #[test]
    fn test_pack_rows_rejects_short_buffers() {
        assert!(pack_rows(&[0; 7], 1, 2, 4).is_err());
        assert!(pack_rows(&[0; 16], 2, 2, 4).is_err());
        // The last row does not need trailing padding
        assert!(pack_rows(&[0; 20], 2, 2, 12).is_ok());
    }

    #[test]
    fn test_device_status_follows_file_access() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(device_status(file.path()), PermissionStatus::Granted);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("video9");
        assert_eq!(device_status(&missing), PermissionStatus::NotGranted);
    }

    #[test]
    fn test_pull_wait_is_sliced_until_deadline() {
        let now = Instant::now();
        assert_eq!(pull_wait(now + Duration::from_secs(10), now), Some(PULL_SLICE));
        assert_eq!(
            pull_wait(now + Duration::from_millis(30), now),
            Some(Duration::from_millis(30))
        );
        assert_eq!(pull_wait(now, now), None);
        assert_eq!(pull_wait(now, now + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_dropping_capture_raises_cancel_flag() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop(Arc::clone(&cancelled));
        assert!(!cancelled.load(Ordering::Relaxed));
        drop(guard);
        assert!(cancelled.load(Ordering::Relaxed));
    }

    #[test]
    fn test_only_portal_success_grants() {
        assert_eq!(
            PermissionOutcome::from(PortalResponse::Success),
            PermissionOutcome::Granted
        );
        assert_eq!(
            PermissionOutcome::from(PortalResponse::Cancelled),
            PermissionOutcome::Denied
        );
        assert_eq!(
            PermissionOutcome::from(PortalResponse::Other),
            PermissionOutcome::Denied
        );
    }

    #[test]
    fn test_device_access_requests_recheck_the_node() {
        let dir = tempfile::tempdir().unwrap();
        let access = CameraAccess::Device(dir.path().join("missing"));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert_eq!(
            runtime.block_on(access.status()),
            PermissionStatus::NotGranted
        );
        assert_eq!(runtime.block_on(access.request()), PermissionOutcome::Denied);
    }
}
