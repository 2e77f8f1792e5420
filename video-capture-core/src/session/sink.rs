//! Hand-off points given to a capture backend: frames in, events out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::interop::SharedTexture;
use crate::models::frame::{ChannelOrder, PixelBuffer, SessionDiagnostics};
use crate::processing::double_buffer::{FrameWriter, WriteOutcome};
use crate::traits::capture_backend::BackendEvent;

/// Shared counters behind `CaptureSession::diagnostics`; the frame sink
/// increments them from the backend thread.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticsCounters {
    pub frames_produced: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub events_dispatched: AtomicU64,
}

impl DiagnosticsCounters {
    pub(crate) fn snapshot(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            frames_produced: self.frames_produced.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable handle a backend uses to raise lifecycle events from its
/// callback thread.
///
/// Events queue in the order they are raised and are dispatched by
/// `CaptureSession::pump_events` on the consumer's thread; raising never
/// blocks on the consumer.
#[derive(Clone)]
pub struct EventSink {
    queue: Arc<Mutex<VecDeque<BackendEvent>>>,
}

impl EventSink {
    pub(crate) fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue one event for the consumer's next pump.
    pub fn raise(&self, event: BackendEvent) {
        self.queue.lock().push_back(event);
    }

    pub(crate) fn drain(&self) -> Vec<BackendEvent> {
        self.queue.lock().drain(..).collect()
    }
}

enum SinkKind {
    Surface(FrameWriter<PixelBuffer>),
    Texture(FrameWriter<SharedTexture>),
}

/// Destination for decoded frames.
///
/// The backend's callback thread is the sole writer. Publishing never
/// blocks on the consumer; a frame that cannot be published (the consumer
/// holds a lease pinning the write slot) is dropped and counted.
pub struct FrameSink {
    kind: SinkKind,
    diagnostics: Arc<DiagnosticsCounters>,
}

impl FrameSink {
    pub(crate) fn for_surfaces(
        writer: FrameWriter<PixelBuffer>,
        diagnostics: Arc<DiagnosticsCounters>,
    ) -> Self {
        Self {
            kind: SinkKind::Surface(writer),
            diagnostics,
        }
    }

    pub(crate) fn for_textures(
        writer: FrameWriter<SharedTexture>,
        diagnostics: Arc<DiagnosticsCounters>,
    ) -> Self {
        Self {
            kind: SinkKind::Texture(writer),
            diagnostics,
        }
    }

    /// Whether this sink expects GPU frames.
    pub fn is_hardware(&self) -> bool {
        matches!(self.kind, SinkKind::Texture(_))
    }

    /// Copy a finished CPU frame into the write slot and publish it.
    ///
    /// Returns `false` when the frame was dropped (the session is
    /// hardware-accelerated, or a consumer lease pinned the write slot).
    pub fn submit_pixels(
        &mut self,
        width: u32,
        height: u32,
        row_bytes: usize,
        order: ChannelOrder,
        bytes: &[u8],
    ) -> bool {
        let outcome = match &mut self.kind {
            SinkKind::Surface(writer) => writer.publish_with(|slot| {
                slot.copy_from(width, height, row_bytes, order, bytes);
                true
            }),
            SinkKind::Texture(_) => {
                log::warn!("CPU frame submitted to a hardware-accelerated session; dropped");
                self.diagnostics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        self.note(outcome)
    }

    /// Publish a GPU frame. `copy` receives the write texture and returns
    /// whether the device-side copy into it succeeded; a failed copy is
    /// abandoned without publishing.
    pub fn submit_texture(&mut self, copy: impl FnOnce(&SharedTexture) -> bool) -> bool {
        let outcome = match &mut self.kind {
            SinkKind::Texture(writer) => writer.publish_with(|slot| copy(slot)),
            SinkKind::Surface(_) => {
                log::warn!("GPU frame submitted to a software session; dropped");
                self.diagnostics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        self.note(outcome)
    }

    fn note(&self, outcome: WriteOutcome) -> bool {
        match outcome {
            WriteOutcome::Published => {
                self.diagnostics.frames_produced.fetch_add(1, Ordering::Relaxed);
                true
            }
            WriteOutcome::SkippedLeased | WriteOutcome::Abandoned => {
                self.diagnostics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}
