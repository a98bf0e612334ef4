use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory previews of staged photos, addressable by id while their handle
/// is alive.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    previews: Arc<DashMap<Uuid, Bytes>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, bytes: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.previews.insert(id, bytes);
        tracing::trace!("Allocated preview {}", id);
        PreviewHandle {
            id,
            previews: Arc::clone(&self.previews),
        }
    }

    pub fn resolve(&self, id: Uuid) -> Option<Bytes> {
        self.previews.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.previews.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.previews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previews.is_empty()
    }
}

/// Owning reference to one preview. Dropping it releases the preview.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    previews: Arc<DashMap<Uuid, Bytes>>,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Reference a view can embed, e.g. as an image source.
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if self.previews.remove(&self.id).is_some() {
            tracing::trace!("Released preview {}", self.id);
        }
    }
}
