//! Capture session orchestration.
//!
//! A [`CaptureSession`] binds one device's backend to one frame double
//! buffer (and, for hardware-accelerated sessions, one pair of shared
//! textures), owns that device's controls, and translates backend events
//! into ordered notifications on the consumer's thread.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controls::{Control, ControlId};
use crate::interop::{InteropContext, SharedTexture};
use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::CaptureError;
use crate::models::format::CaptureFormat;
use crate::models::frame::{PixelBuffer, SessionDiagnostics};
use crate::models::state::SessionState;
use crate::processing::double_buffer::{double_buffer, FrameReader, SlotLease};
use crate::session::sink::{DiagnosticsCounters, EventSink, FrameSink};
use crate::signal::Signal;
use crate::traits::capture_backend::{BackendEvent, CaptureBackend};
use crate::traits::capture_platform::CapturePlatform;

/// One live capture pipeline: device + backend + frame buffer + controls.
///
/// Two threads touch a session. The backend's callback thread writes
/// frames through its `FrameSink` and queues events; the consumer thread
/// polls [`pump_events`](Self::pump_events), takes frame leases, and
/// issues `start`/`stop`/control writes. Nothing here blocks the backend
/// on the consumer.
///
/// Backend events are dispatched strictly in the order the backend raised
/// them, and only ever from `pump_events`, so a notification handler may
/// drop the session without racing the backend thread that raised the
/// event.
pub struct CaptureSession {
    format: CaptureFormat,
    device: DeviceDescriptor,
    state: Mutex<SessionState>,
    initialized: AtomicBool,
    started: AtomicBool,
    backend: Mutex<Box<dyn CaptureBackend>>,
    events: EventSink,
    surface_reader: Option<FrameReader<PixelBuffer>>,
    texture_reader: Option<FrameReader<SharedTexture>>,
    // Holds the process-wide interop refcount for the session's lifetime.
    _interop: Option<Arc<InteropContext>>,
    controls: Vec<Control>,
    diagnostics: Arc<DiagnosticsCounters>,

    /// Backend pipeline finished setup; the session is `Ready`.
    pub on_initialize: Signal<()>,
    /// Frame production began.
    pub on_start: Signal<()>,
    /// Frame production halted.
    pub on_stop: Signal<()>,
    /// The device was unplugged or revoked. The session stays callable
    /// but answers with stale/no-op results; discard and recreate it.
    pub on_device_lost: Signal<()>,
    /// Transient backend error (platform status code); the session
    /// remains usable.
    pub on_error: Signal<i32>,
    /// A control changed outside this session; its cached value has been
    /// reloaded.
    pub on_control_changed: Signal<ControlId>,
}

impl CaptureSession {
    /// Create a session for `format` on `platform`.
    ///
    /// Resolves the target device (the first enumerated device when the
    /// format names none) and sets up the backend. Returns `None` when
    /// the device does not exist, the backend refuses to initialize, or a
    /// hardware session cannot allocate its shared textures.
    pub fn create(
        format: CaptureFormat,
        platform: &Arc<dyn CapturePlatform>,
    ) -> Option<CaptureSession> {
        match Self::try_create(format, platform) {
            Ok(session) => Some(session),
            Err(e) => {
                log::error!("capture session creation failed: {e}");
                None
            }
        }
    }

    fn try_create(
        format: CaptureFormat,
        platform: &Arc<dyn CapturePlatform>,
    ) -> Result<CaptureSession, CaptureError> {
        let devices = platform.enumerate_devices()?;
        // Resolution matches by id: the id is the stable half of the
        // descriptor identity.
        let device = match format.target_device() {
            Some(wanted) => devices
                .iter()
                .find(|d| d.id == wanted.id)
                .cloned()
                .ok_or(CaptureError::DeviceNotAvailable)?,
            None => devices
                .first()
                .cloned()
                .ok_or(CaptureError::DeviceNotAvailable)?,
        };
        let format = format.device(device.clone());

        let mut backend = platform.create_backend(&device)?;
        let controls = backend.probe_controls();
        let diagnostics = Arc::new(DiagnosticsCounters::default());
        let events = EventSink::new();

        let (frames, surface_reader, texture_reader, interop) =
            if format.is_hardware_accelerated() {
                let bridge = platform
                    .interop_bridge()
                    .ok_or(CaptureError::InteropUnavailable)?;
                let context = InteropContext::acquire(|| bridge);
                let (width, height) = format.dimensions();
                let front = context
                    .create_shared_texture(width, height)
                    .ok_or_else(|| {
                        CaptureError::TextureAllocationFailed("front slot".into())
                    })?;
                let back = context
                    .create_shared_texture(width, height)
                    .ok_or_else(|| CaptureError::TextureAllocationFailed("back slot".into()))?;
                let (writer, reader) = double_buffer([front, back]);
                (
                    FrameSink::for_textures(writer, Arc::clone(&diagnostics)),
                    None,
                    Some(reader),
                    Some(context),
                )
            } else {
                let (writer, reader) =
                    double_buffer([PixelBuffer::default(), PixelBuffer::default()]);
                (
                    FrameSink::for_surfaces(writer, Arc::clone(&diagnostics)),
                    Some(reader),
                    None,
                    None,
                )
            };

        backend.initialize(&device, &format, frames, events.clone())?;

        Ok(CaptureSession {
            format,
            device,
            state: Mutex::new(SessionState::Initializing),
            initialized: AtomicBool::new(false),
            started: AtomicBool::new(false),
            backend: Mutex::new(backend),
            events,
            surface_reader,
            texture_reader,
            _interop: interop,
            controls,
            diagnostics,
            on_initialize: Signal::new(),
            on_start: Signal::new(),
            on_stop: Signal::new(),
            on_device_lost: Signal::new(),
            on_error: Signal::new(),
            on_control_changed: Signal::new(),
        })
    }

    /// Dispatch queued backend events in order.
    ///
    /// Call from the thread that owns the session, typically once per
    /// render-loop iteration. Notification handlers run here, never on
    /// the backend's callback thread.
    pub fn pump_events(&self) {
        for event in self.events.drain() {
            self.diagnostics
                .events_dispatched
                .fetch_add(1, Ordering::Relaxed);
            match event {
                BackendEvent::Initialized => {
                    self.initialized.store(true, Ordering::SeqCst);
                    *self.state.lock() = SessionState::Ready;
                    self.on_initialize.emit(&());
                    if self.format.is_auto_start() {
                        self.start();
                    }
                }
                BackendEvent::Started => {
                    *self.state.lock() = SessionState::Started;
                    self.on_start.emit(&());
                }
                BackendEvent::Stopped => {
                    *self.state.lock() = SessionState::Stopped;
                    self.on_stop.emit(&());
                }
                BackendEvent::Error(code) => {
                    self.on_error.emit(&code);
                }
                BackendEvent::DeviceInvalidated => {
                    // Flip the flags directly instead of running the stop
                    // path: stopping would make the backend raise further
                    // events into a session the owner is about to discard.
                    self.initialized.store(false, Ordering::SeqCst);
                    self.started.store(false, Ordering::SeqCst);
                    *self.state.lock() = SessionState::Lost;
                    self.on_device_lost.emit(&());
                }
                BackendEvent::ControlChanged(id) => {
                    if let Some(control) = self.controls.iter().find(|c| c.id() == id) {
                        if let Err(e) = control.reload() {
                            log::warn!("control reload after external change failed: {e}");
                        }
                    }
                    self.on_control_changed.emit(&id);
                }
            }
        }
    }

    /// Begin frame production. No-op before the backend reports
    /// `Initialized`, after the device is lost, and when already started.
    pub fn start(&self) {
        if !self.initialized.load(Ordering::SeqCst) {
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.backend.lock().start() {
            log::warn!("backend start failed: {e}");
            self.started.store(false, Ordering::SeqCst);
        }
    }

    /// Halt frame production. No-op when already stopped.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.backend.lock().stop() {
            log::warn!("backend stop failed: {e}");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Defined as the negation of [`is_started`](Self::is_started).
    pub fn is_stopped(&self) -> bool {
        !self.is_started()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether a frame has been published since the last surface/texture
    /// take. Does not clear the flag.
    pub fn check_new_frame(&self) -> bool {
        match (&self.surface_reader, &self.texture_reader) {
            (Some(reader), _) => reader.has_new_frame(),
            (_, Some(reader)) => reader.has_new_frame(),
            _ => false,
        }
    }

    /// Lease the most recent CPU frame and clear the new-frame flag.
    /// `None` on hardware-accelerated sessions or before the first frame.
    pub fn surface(&self) -> Option<SurfaceLease<'_>> {
        let lease = self.surface_reader.as_ref()?.latest()?;
        Some(SurfaceLease { lease })
    }

    /// Lease the most recent GPU frame and clear the new-frame flag. The
    /// lease holds the cross-API lock until it is dropped. `None` on
    /// software sessions or before the first frame.
    pub fn texture(&self) -> Option<TextureLease<'_>> {
        let lease = self.texture_reader.as_ref()?.latest()?;
        TextureLease::acquire(lease)
    }

    /// The device's adjustable controls; unsupported ones were filtered
    /// out at probe time.
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control(&self, id: ControlId) -> Option<&Control> {
        self.controls.iter().find(|c| c.id() == id)
    }

    pub fn format(&self) -> &CaptureFormat {
        &self.format
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.format.dimensions()
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.format.is_hardware_accelerated()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.diagnostics.snapshot()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.started.load(Ordering::SeqCst) {
            if let Err(e) = self.backend.lock().stop() {
                log::warn!("backend stop during session drop failed: {e}");
            }
        }
        // Field drops release the frame buffer, then the shared textures,
        // then this session's interop refcount.
    }
}

/// Scoped read access to the most recent CPU frame.
pub struct SurfaceLease<'a> {
    lease: SlotLease<'a, PixelBuffer>,
}

impl Deref for SurfaceLease<'_> {
    type Target = PixelBuffer;

    fn deref(&self) -> &PixelBuffer {
        &self.lease
    }
}

/// Scoped read access to the most recent GPU frame.
///
/// Acquiring the lease locks the cross-API view; dropping it unlocks on
/// every exit path, early returns and unwinds included.
pub struct TextureLease<'a> {
    lease: SlotLease<'a, SharedTexture>,
}

impl<'a> TextureLease<'a> {
    fn acquire(lease: SlotLease<'a, SharedTexture>) -> Option<Self> {
        if let Err(e) = lease.lock() {
            log::warn!("texture lock failed: {e}");
            return None;
        }
        Some(Self { lease })
    }

    pub fn texture(&self) -> &SharedTexture {
        &self.lease
    }

    /// The render-API texture handle, valid while this lease is held.
    pub fn consumer_handle(&self) -> u64 {
        self.lease.consumer_handle()
    }
}

impl Drop for TextureLease<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lease.unlock() {
            log::warn!("texture unlock failed: {e}");
        }
    }
}
