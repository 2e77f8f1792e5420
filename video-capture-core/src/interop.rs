//! Cross-API GPU texture sharing.
//!
//! A hardware-accelerated session keeps its frames GPU-resident: the
//! capture backend decodes into its own graphics context, copies into a
//! [`SharedTexture`], and the consumer reads the same resource from its
//! render context without a host-memory round trip. The [`InteropBridge`]
//! trait is the platform glue that registers one resource with both APIs
//! and bounds cross-API access with an explicit lock/unlock protocol.
//!
//! There is one [`InteropContext`] per process, reference-counted across
//! capture sessions: the first hardware session creates it, the last
//! session's drop tears it down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::error::CaptureError;

/// Native handles for one interop-registered GPU surface.
///
/// `producer` is the capture API's resource, `consumer` the render API's
/// texture name, and `share` the registration handle binding the two.
/// The values are opaque to the core; only the bridge interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteropSurface {
    pub producer: u64,
    pub consumer: u64,
    pub share: u64,
}

/// Bridge between the capture backend's graphics context and the
/// consumer's render context.
///
/// Implemented by the hosting renderer (a DX/GL-style interop extension
/// on Windows); [`SoftwareBridge`] in this crate stands in for tests and
/// headless use.
pub trait InteropBridge: Send + Sync {
    /// Whether a graphics context is current on the calling thread.
    /// Native teardown must be skipped when this is false; unregistering
    /// without a current context is undefined on the real platforms.
    fn is_context_current(&self) -> bool;

    /// Allocate a GPU resource and register it with both APIs.
    fn create_surface(&self, width: u32, height: u32) -> Result<InteropSurface, CaptureError>;

    /// Unregister and free. Only called with a current context.
    fn destroy_surface(&self, surface: &InteropSurface);

    /// Acquire the cross-API view for reading.
    fn lock(&self, surface: &InteropSurface) -> bool;

    /// Release the cross-API view.
    fn unlock(&self, surface: &InteropSurface) -> bool;
}

static CURRENT: Mutex<Weak<InteropContext>> = Mutex::new(Weak::new());

/// Process-wide interop state shared by all hardware capture sessions.
pub struct InteropContext {
    bridge: Arc<dyn InteropBridge>,
}

impl InteropContext {
    /// Acquire the shared context, creating it with `bridge` when no
    /// session currently holds one. While any session holds the returned
    /// `Arc`, later callers share the same context (their `bridge`
    /// closure is not invoked).
    pub fn acquire(bridge: impl FnOnce() -> Arc<dyn InteropBridge>) -> Arc<InteropContext> {
        let mut current = CURRENT.lock();
        if let Some(context) = current.upgrade() {
            return context;
        }
        let context = Arc::new(InteropContext { bridge: bridge() });
        *current = Arc::downgrade(&context);
        context
    }

    /// The live context, if any session currently holds one.
    pub fn current() -> Option<Arc<InteropContext>> {
        CURRENT.lock().upgrade()
    }

    pub fn bridge(&self) -> &Arc<dyn InteropBridge> {
        &self.bridge
    }

    /// Allocate one shared texture. `None` when allocation or interop
    /// registration fails.
    pub fn create_shared_texture(
        self: &Arc<Self>,
        width: u32,
        height: u32,
    ) -> Option<SharedTexture> {
        match self.bridge.create_surface(width, height) {
            Ok(surface) => Some(SharedTexture {
                context: Arc::clone(self),
                surface,
                width,
                height,
                locked: AtomicBool::new(false),
            }),
            Err(e) => {
                log::error!("shared texture allocation failed: {e}");
                None
            }
        }
    }
}

/// One GPU frame resource visible to both graphics APIs.
///
/// `lock` must precede any read of the consumer-side view, and a second
/// `lock` without an intervening `unlock` is rejected. Dropping the
/// texture skips native teardown when no graphics context is current
/// (process shutdown), since unregistering would be undefined then.
pub struct SharedTexture {
    context: Arc<InteropContext>,
    surface: InteropSurface,
    width: u32,
    height: u32,
    locked: AtomicBool,
}

impl SharedTexture {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn surface(&self) -> &InteropSurface {
        &self.surface
    }

    /// The render-API texture handle; only meaningful between `lock` and
    /// `unlock`.
    pub fn consumer_handle(&self) -> u64 {
        self.surface.consumer
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Acquire the cross-API view for reading.
    pub fn lock(&self) -> Result<(), CaptureError> {
        if self.locked.swap(true, Ordering::AcqRel) {
            return Err(CaptureError::AlreadyLocked);
        }
        if !self.context.bridge.lock(&self.surface) {
            self.locked.store(false, Ordering::Release);
            return Err(CaptureError::Unknown("interop lock failed".into()));
        }
        Ok(())
    }

    /// Release the cross-API view.
    pub fn unlock(&self) -> Result<(), CaptureError> {
        if !self.locked.swap(false, Ordering::AcqRel) {
            return Err(CaptureError::NotLocked);
        }
        self.context.bridge.unlock(&self.surface);
        Ok(())
    }
}

impl Drop for SharedTexture {
    fn drop(&mut self) {
        if !self.context.bridge.is_context_current() {
            // Likely mid-shutdown; native unregistration without a current
            // context is undefined, so leave it to the context teardown.
            log::warn!("dropping shared texture without a current graphics context; skipping unregister");
            return;
        }
        if self.is_locked() {
            self.context.bridge.unlock(&self.surface);
        }
        self.context.bridge.destroy_surface(&self.surface);
    }
}

/// Software stand-in for a platform interop bridge.
///
/// "Shares" surfaces by handing out sequential handles and tracking
/// lock/registration state. Backs the virtual platform's hardware path
/// and the interop tests; a real renderer supplies its own bridge.
#[derive(Debug, Default)]
pub struct SoftwareBridge {
    context_lost: AtomicBool,
    fail_create: AtomicBool,
    next_handle: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
    locks: AtomicU64,
    unlocks: AtomicU64,
}

impl SoftwareBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the host context going away (shutdown ordering tests).
    pub fn set_context_lost(&self, lost: bool) {
        self.context_lost.store(lost, Ordering::SeqCst);
    }

    /// Make the next `create_surface` calls fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Surfaces currently registered (created minus destroyed).
    pub fn live_surfaces(&self) -> u64 {
        self.created.load(Ordering::SeqCst) - self.destroyed.load(Ordering::SeqCst)
    }

    pub fn lock_count(&self) -> u64 {
        self.locks.load(Ordering::SeqCst)
    }

    pub fn unlock_count(&self) -> u64 {
        self.unlocks.load(Ordering::SeqCst)
    }
}

impl InteropBridge for SoftwareBridge {
    fn is_context_current(&self) -> bool {
        !self.context_lost.load(Ordering::SeqCst)
    }

    fn create_surface(&self, _width: u32, _height: u32) -> Result<InteropSurface, CaptureError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CaptureError::TextureAllocationFailed(
                "software bridge scripted failure".into(),
            ));
        }
        let base = self.next_handle.fetch_add(3, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(InteropSurface {
            producer: base,
            consumer: base + 1,
            share: base + 2,
        })
    }

    fn destroy_surface(&self, _surface: &InteropSurface) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self, _surface: &InteropSurface) -> bool {
        self.locks.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn unlock(&self, _surface: &InteropSurface) -> bool {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Serializes tests that touch the process-wide interop context.
#[cfg(test)]
pub(crate) fn context_test_guard() -> parking_lot::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock()
}
