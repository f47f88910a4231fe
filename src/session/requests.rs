//! Typed identifiers for requests that leave the update loop
//!
//! Every permission check, permission request, camera trip and recognition
//! gets a `RequestId`. A result is only applied when its id is still the
//! pending one for its kind on the same screen instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCREEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one capture screen instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenId(u64);

impl ScreenId {
    pub fn unique() -> Self {
        Self(NEXT_SCREEN.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    PermissionCheck,
    PermissionRequest,
    Camera,
    Recognition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    screen: ScreenId,
    seq: u64,
    kind: RequestKind,
}

impl RequestId {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn screen(&self) -> ScreenId {
        self.screen
    }
}

/// Outstanding requests of one screen, at most one per kind
#[derive(Debug)]
pub struct PendingRequests {
    screen: ScreenId,
    next_seq: u64,
    pending: HashMap<RequestKind, RequestId>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            screen: ScreenId::unique(),
            next_seq: 0,
            pending: HashMap::new(),
        }
    }

    pub fn screen(&self) -> ScreenId {
        self.screen
    }

    /// Register a new request of `kind`.
    ///
    /// Returns the new id and the id it superseded, if one was pending.
    pub fn issue(&mut self, kind: RequestKind) -> (RequestId, Option<RequestId>) {
        let id = RequestId {
            screen: self.screen,
            seq: self.next_seq,
            kind,
        };
        self.next_seq += 1;
        (id, self.pending.insert(kind, id))
    }

    /// Remove `id` if it is the pending request of its kind
    pub fn resolve(&mut self, id: RequestId) -> bool {
        if self.pending.get(&id.kind) == Some(&id) {
            self.pending.remove(&id.kind);
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn any_pending(&self, kinds: &[RequestKind]) -> bool {
        kinds.iter().any(|kind| self.is_pending(*kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_only_matches_pending_id() {
        let mut requests = PendingRequests::new();
        let (camera, superseded) = requests.issue(RequestKind::Camera);
        assert!(superseded.is_none());
        assert!(requests.is_pending(RequestKind::Camera));

        let (recognition, _) = requests.issue(RequestKind::Recognition);
        assert_ne!(camera, recognition);

        assert!(requests.resolve(camera));
        assert!(!requests.resolve(camera), "an id resolves once");
        assert!(!requests.is_pending(RequestKind::Camera));
        assert!(requests.is_pending(RequestKind::Recognition));
    }

    #[test]
    fn test_issue_supersedes_same_kind() {
        let mut requests = PendingRequests::new();
        let (first, _) = requests.issue(RequestKind::Recognition);
        let (second, superseded) = requests.issue(RequestKind::Recognition);

        assert_eq!(superseded, Some(first));
        assert!(!requests.resolve(first));
        assert!(requests.resolve(second));
    }

    #[test]
    fn test_ids_from_other_screens_never_resolve() {
        let mut old_screen = PendingRequests::new();
        let mut new_screen = PendingRequests::new();
        assert_ne!(old_screen.screen(), new_screen.screen());

        let (stale, _) = old_screen.issue(RequestKind::Camera);
        let (current, _) = new_screen.issue(RequestKind::Camera);
        assert_eq!(stale.screen(), old_screen.screen());

        assert!(!new_screen.resolve(stale));
        assert!(new_screen.resolve(current));
    }

    #[test]
    fn test_any_pending() {
        let mut requests = PendingRequests::new();
        assert!(!requests.any_pending(&[RequestKind::Camera, RequestKind::PermissionCheck]));
        let (id, _) = requests.issue(RequestKind::PermissionCheck);
        assert_eq!(id.kind(), RequestKind::PermissionCheck);
        assert!(requests.any_pending(&[RequestKind::Camera, RequestKind::PermissionCheck]));
    }
}
