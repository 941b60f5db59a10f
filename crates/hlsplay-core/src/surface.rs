//! Render surface handle

use crate::engine::MediaPlayer;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Handle a host UI attaches to in order to display decoded frames
///
/// Clones share the same surface. Detaching stops video rendering while the
/// player keeps running, which is how background audio works.
#[derive(Clone)]
pub struct RenderSurface {
    inner: Arc<SurfaceInner>,
}

struct SurfaceInner {
    id: Uuid,
    player: Mutex<Option<Arc<dyn MediaPlayer>>>,
}

impl RenderSurface {
    /// Create a surface bound to `player`
    pub(crate) fn bind(player: Arc<dyn MediaPlayer>) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                id: Uuid::new_v4(),
                player: Mutex::new(Some(player)),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// True while a player is feeding this surface
    pub fn is_attached(&self) -> bool {
        self.inner.player.lock().is_some()
    }

    /// Player currently feeding this surface
    pub fn player(&self) -> Option<Arc<dyn MediaPlayer>> {
        self.inner.player.lock().clone()
    }

    pub(crate) fn attach(&self, player: Arc<dyn MediaPlayer>) {
        *self.inner.player.lock() = Some(player);
    }

    pub(crate) fn detach(&self) {
        self.inner.player.lock().take();
    }

    /// True if both handles refer to the same surface
    pub fn same_surface(&self, other: &RenderSurface) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurface")
            .field("id", &self.inner.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
