//! XDG Desktop Portal camera access
//!
//! This module contains the D-Bus proxies and response types used to ask the
//! portal for camera permission and a PipeWire remote to read frames from.

use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use zbus::zvariant;

/// Portal response status codes
pub const PORTAL_RESPONSE_SUCCESS: u32 = 0;
pub const PORTAL_RESPONSE_CANCELLED: u32 = 1;

/// D-Bus object path of the frontend portal
pub const DBUS_PATH: &str = "/org/freedesktop/portal/desktop";

/// Decoded `org.freedesktop.portal.Request::Response` status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalResponse {
    Success,
    Cancelled,
    Other,
}

impl From<u32> for PortalResponse {
    fn from(code: u32) -> Self {
        match code {
            PORTAL_RESPONSE_SUCCESS => Self::Success,
            PORTAL_RESPONSE_CANCELLED => Self::Cancelled,
            _ => Self::Other,
        }
    }
}

#[zbus::proxy(
    interface = "org.freedesktop.portal.Camera",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop"
)]
trait Camera {
    fn access_camera(
        &self,
        options: HashMap<&str, zvariant::Value<'_>>,
    ) -> zbus::Result<zvariant::OwnedObjectPath>;

    #[zbus(name = "OpenPipeWireRemote")]
    fn open_pipe_wire_remote(
        &self,
        options: HashMap<&str, zvariant::Value<'_>>,
    ) -> zbus::Result<zvariant::OwnedFd>;

    #[zbus(property)]
    fn is_camera_present(&self) -> zbus::Result<bool>;
}

#[zbus::proxy(
    interface = "org.freedesktop.portal.Request",
    default_service = "org.freedesktop.portal.Desktop"
)]
trait Request {
    #[zbus(signal)]
    fn response(
        &self,
        response: u32,
        results: HashMap<String, zvariant::OwnedValue>,
    ) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.impl.portal.PermissionStore",
    default_service = "org.freedesktop.impl.portal.PermissionStore",
    default_path = "/org/freedesktop/impl/portal/PermissionStore"
)]
trait PermissionStore {
    fn lookup(
        &self,
        table: &str,
        id: &str,
    ) -> zbus::Result<(HashMap<String, Vec<String>>, zvariant::OwnedValue)>;
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

fn next_handle_token() -> String {
    format!(
        "snaptext_{}_{}",
        std::process::id(),
        NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
    )
}

/// Object path the portal will use for a request made with `token`
pub fn request_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{DBUS_PATH}/request/{sender}/{token}")
}

/// Whether the permission store lists the camera as allowed for any of `app_ids`
pub fn permission_granted(permissions: &HashMap<String, Vec<String>>, app_ids: &[&str]) -> bool {
    app_ids.iter().any(|app_id| {
        permissions
            .get(*app_id)
            .and_then(|values| values.first())
            .is_some_and(|value| value == "yes")
    })
}

/// Look up the stored camera permission without prompting
pub async fn camera_permission_granted(app_ids: &[&str]) -> Result<bool> {
    let connection = zbus::Connection::session()
        .await
        .context("Failed to connect to the session bus")?;
    let store = PermissionStoreProxy::new(&connection)
        .await
        .context("Failed to create permission store proxy")?;
    let (permissions, _) = store
        .lookup("devices", "camera")
        .await
        .context("Camera permission lookup failed")?;
    log::debug!("Stored camera permissions: {:?}", permissions);
    Ok(permission_granted(&permissions, app_ids))
}

/// Ask the portal for camera access, waiting for the user's answer
pub async fn access_camera() -> Result<PortalResponse> {
    let connection = zbus::Connection::session()
        .await
        .context("Failed to connect to the session bus")?;
    let unique_name = connection
        .unique_name()
        .ok_or_else(|| anyhow!("Session bus connection has no unique name"))?
        .to_string();

    let token = next_handle_token();
    let expected_path = request_path(&unique_name, &token);

    // Subscribe before the call so a fast response is not missed
    let request = RequestProxy::builder(&connection)
        .path(expected_path.as_str())?
        .build()
        .await
        .context("Failed to create portal request proxy")?;
    let mut responses = request.receive_response().await?;

    let camera = CameraProxy::new(&connection)
        .await
        .context("Failed to create camera portal proxy")?;
    let mut options = HashMap::new();
    options.insert("handle_token", zvariant::Value::from(token.as_str()));
    let handle = camera
        .access_camera(options)
        .await
        .context("AccessCamera call failed")?;

    let response = if handle.as_str() == expected_path {
        responses.next().await
    } else {
        // Older portals ignore handle_token
        log::debug!(
            "Portal returned request handle {} instead of {}",
            handle.as_str(),
            expected_path
        );
        let request = RequestProxy::builder(&connection)
            .path(handle.as_str())?
            .build()
            .await
            .context("Failed to create portal request proxy")?;
        request.receive_response().await?.next().await
    };

    let response = response.ok_or_else(|| anyhow!("Portal closed the request without a response"))?;
    let args = response.args().context("Malformed portal response")?;
    let code = *args.response();
    log::info!("AccessCamera responded with {}", code);
    Ok(PortalResponse::from(code))
}

/// Open the PipeWire remote that exposes the camera nodes
pub async fn open_pipewire_remote() -> Result<OwnedFd> {
    let connection = zbus::Connection::session()
        .await
        .context("Failed to connect to the session bus")?;
    let camera = CameraProxy::new(&connection)
        .await
        .context("Failed to create camera portal proxy")?;

    match camera.is_camera_present().await {
        Ok(false) => return Err(anyhow!("The portal reports no camera")),
        Ok(true) => {}
        Err(err) => log::warn!("Could not query IsCameraPresent: {}", err),
    }

    let fd = camera
        .open_pipe_wire_remote(HashMap::new())
        .await
        .context("OpenPipeWireRemote call failed")?;
    Ok(fd.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes() {
        assert_eq!(PortalResponse::from(0), PortalResponse::Success);
        assert_eq!(PortalResponse::from(1), PortalResponse::Cancelled);
        assert_eq!(PortalResponse::from(2), PortalResponse::Other);
        assert_eq!(PortalResponse::from(77), PortalResponse::Other);
    }

    #[test]
    fn test_request_path_escapes_sender() {
        assert_eq!(
            request_path(":1.42", "snaptext_7_0"),
            "/org/freedesktop/portal/desktop/request/1_42/snaptext_7_0"
        );
    }

    #[test]
    fn test_handle_tokens_are_unique() {
        let a = next_handle_token();
        let b = next_handle_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_permission_store_entries() {
        let mut permissions = HashMap::new();
        permissions.insert(String::new(), vec!["yes".to_string()]);
        permissions.insert("org.example.Other".to_string(), vec!["no".to_string()]);

        assert!(permission_granted(&permissions, &[""]));
        assert!(!permission_granted(&permissions, &["org.example.Other"]));
        assert!(!permission_granted(&permissions, &["missing"]));
        assert!(permission_granted(&permissions, &["missing", ""]));
        assert!(!permission_granted(&HashMap::new(), &[""]));
    }
}
