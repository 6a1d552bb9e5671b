//! Transient resource handles
//!
//! A [`ResourceHandle`] is an opaque `blob:<uuid>` token that maps to either a
//! file on disk (playback source) or an encoded image held in memory
//! (thumbnail). Mappings live until released. Nothing is released
//! automatically except through a [`HandleGuard`] that was never kept.
//!
//! Handles can be adopted by an owner (a descriptor id) so everything backing
//! one descriptor is released in a single [`ResourceRegistry::release_owner`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::media::MediaFile;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    fn generate() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Binary data a handle resolves to
#[derive(Debug, Clone)]
pub enum Resource {
    File { path: PathBuf, content_type: String },
    Bytes { data: Arc<[u8]>, content_type: String },
}

impl Resource {
    pub fn content_type(&self) -> &str {
        match self {
            Resource::File { content_type, .. } | Resource::Bytes { content_type, .. } => content_type,
        }
    }
}

#[derive(Default)]
struct Inner {
    live: HashMap<ResourceHandle, Resource>,
    owners: HashMap<String, Vec<ResourceHandle>>,
    owned_by: HashMap<ResourceHandle, String>,
}

impl Inner {
    /// Remove a live mapping and detach it from its owner, dropping the
    /// owner entry once it holds nothing.
    fn remove(&mut self, handle: &ResourceHandle) -> bool {
        let removed = self.live.remove(handle).is_some();
        if let Some(owner) = self.owned_by.remove(handle) {
            if let Some(handles) = self.owners.get_mut(&owner) {
                handles.retain(|h| h != handle);
                if handles.is_empty() {
                    self.owners.remove(&owner);
                }
            }
        }
        removed
    }
}

#[derive(Default)]
pub struct ResourceRegistry {
    inner: Mutex<Inner>,
}

impl ResourceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Map a file on disk to a fresh handle.
    pub fn acquire_file(&self, file: &MediaFile) -> ResourceHandle {
        self.insert(Resource::File {
            path: file.path.clone(),
            content_type: file.content_type.clone(),
        })
    }

    /// Map in-memory bytes to a fresh handle.
    pub fn acquire_bytes(&self, data: Vec<u8>, content_type: impl Into<String>) -> ResourceHandle {
        self.insert(Resource::Bytes {
            data: data.into(),
            content_type: content_type.into(),
        })
    }

    fn insert(&self, resource: Resource) -> ResourceHandle {
        let handle = ResourceHandle::generate();
        debug!("Acquired {} ({})", handle, resource.content_type());
        self.inner.lock().live.insert(handle.clone(), resource);
        handle
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> Option<Resource> {
        self.inner.lock().live.get(handle).cloned()
    }

    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.inner.lock().live.contains_key(handle)
    }

    /// Invalidate a handle. Unknown or already-released handles are a no-op.
    ///
    /// Returns whether a live mapping was removed.
    pub fn release(&self, handle: &ResourceHandle) -> bool {
        let removed = self.inner.lock().remove(handle);
        if removed {
            debug!("Released {}", handle);
        }
        removed
    }

    /// Record `owner` as the holder of `handles` for bulk release.
    ///
    /// Handles that are no longer live are ignored.
    pub fn adopt(&self, owner: &str, handles: impl IntoIterator<Item = ResourceHandle>) {
        let mut inner = self.inner.lock();
        let live: Vec<ResourceHandle> = handles
            .into_iter()
            .filter(|h| inner.live.contains_key(h))
            .collect();
        if live.is_empty() {
            return;
        }
        for handle in &live {
            inner.owned_by.insert(handle.clone(), owner.to_string());
        }
        inner.owners.entry(owner.to_string()).or_default().extend(live);
    }

    /// Release every handle adopted by `owner`. Returns how many were live.
    pub fn release_owner(&self, owner: &str) -> usize {
        let mut inner = self.inner.lock();
        let Some(handles) = inner.owners.remove(owner) else {
            return 0;
        };
        let released = handles
            .iter()
            .filter(|h| {
                inner.owned_by.remove(*h);
                inner.live.remove(*h).is_some()
            })
            .count();
        debug!("Released {} handle(s) owned by {}", released, owner);
        released
    }

    /// Number of outstanding mappings
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Number of owners still holding at least one live handle
    pub fn owner_count(&self) -> usize {
        self.inner.lock().owners.len()
    }

    /// Wrap a handle so it is released on drop unless [`HandleGuard::keep`] is called.
    pub fn guard(self: &Arc<Self>, handle: ResourceHandle) -> HandleGuard {
        HandleGuard {
            registry: Arc::clone(self),
            handle,
            armed: true,
        }
    }
}

/// Scoped acquisition: releases its handle when dropped on a failure path.
pub struct HandleGuard {
    registry: Arc<ResourceRegistry>,
    handle: ResourceHandle,
    armed: bool,
}

impl HandleGuard {
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Disarm the guard and hand ownership of the handle to the caller.
    pub fn keep(mut self) -> ResourceHandle {
        self.armed = false;
        std::mem::replace(&mut self.handle, ResourceHandle(String::new()))
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if self.armed {
            self.registry.release(&self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> MediaFile {
        MediaFile::new("/media/clip.mp4", "clip.mp4", 1024, "video/mp4")
    }

    #[test]
    fn test_acquire_and_resolve() {
        let registry = ResourceRegistry::new();
        let handle = registry.acquire_file(&clip());

        assert!(handle.as_str().starts_with("blob:"));
        match registry.resolve(&handle) {
            Some(Resource::File { path, content_type }) => {
                assert_eq!(path, PathBuf::from("/media/clip.mp4"));
                assert_eq!(content_type, "video/mp4");
            }
            other => panic!("unexpected resource: {:?}", other),
        }
    }

    #[test]
    fn test_handles_are_unique() {
        let registry = ResourceRegistry::new();
        let a = registry.acquire_file(&clip());
        let b = registry.acquire_file(&clip());
        assert_ne!(a, b);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_release_twice_and_unknown_is_noop() {
        let registry = ResourceRegistry::new();
        let handle = registry.acquire_bytes(vec![1, 2, 3], "image/jpeg");

        assert!(registry.release(&handle));
        assert!(!registry.release(&handle));
        assert!(!registry.release(&ResourceHandle::from("blob:not-ours")));
        assert!(registry.resolve(&handle).is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_release_owner_releases_all_adopted() {
        let registry = ResourceRegistry::new();
        let src = registry.acquire_file(&clip());
        let thumb = registry.acquire_bytes(vec![0xff, 0xd8], "image/jpeg");
        let other = registry.acquire_file(&clip());

        registry.adopt("video-1", [src.clone(), thumb.clone()]);
        registry.release(&thumb);

        assert_eq!(registry.release_owner("video-1"), 1);
        assert_eq!(registry.release_owner("video-1"), 0);
        assert!(!registry.is_live(&src));
        assert!(registry.is_live(&other));
        assert_eq!(registry.owner_count(), 0);
    }

    #[test]
    fn test_individual_release_forgets_owner() {
        let registry = ResourceRegistry::new();
        for i in 0..1000 {
            let src = registry.acquire_file(&clip());
            let thumb = registry.acquire_bytes(vec![0xff, 0xd8], "image/jpeg");
            registry.adopt(&format!("video-{}", i), [src.clone(), thumb.clone()]);

            assert!(registry.release(&src));
            assert_eq!(registry.owner_count(), 1);
            assert!(registry.release(&thumb));
        }

        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.owner_count(), 0);
    }

    #[test]
    fn test_adopt_ignores_released_handles() {
        let registry = ResourceRegistry::new();
        let handle = registry.acquire_file(&clip());
        registry.release(&handle);

        registry.adopt("video-1", [handle]);
        assert_eq!(registry.owner_count(), 0);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = ResourceRegistry::new();
        let handle = registry.acquire_file(&clip());
        {
            let guard = registry.guard(handle.clone());
            assert_eq!(guard.handle(), &handle);
        }
        assert!(!registry.is_live(&handle));
    }

    #[test]
    fn test_guard_keep_retains_mapping() {
        let registry = ResourceRegistry::new();
        let guard = registry.guard(registry.acquire_file(&clip()));
        let handle = guard.keep();
        assert!(registry.is_live(&handle));
    }
}
