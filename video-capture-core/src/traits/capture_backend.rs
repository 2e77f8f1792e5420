use crate::controls::{Control, ControlId};
use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::CaptureError;
use crate::models::format::CaptureFormat;
use crate::session::sink::{EventSink, FrameSink};

/// Lifecycle notifications a backend raises from its callback thread.
///
/// Events are queued in the order the backend raises them and dispatched
/// by `CaptureSession::pump_events` on the consumer's thread; handlers
/// never run on the backend thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// The device pipeline is set up; the session becomes `Ready`.
    Initialized,
    /// Frame production began.
    Started,
    /// Frame production halted.
    Stopped,
    /// Non-fatal backend error with a platform status code; the session
    /// stays usable.
    Error(i32),
    /// The device was unplugged or revoked; the session is lost.
    DeviceInvalidated,
    /// A control value changed outside the session (another app, the
    /// driver); the session reloads its cached value.
    ControlChanged(ControlId),
}

/// Contract between a capture session and a platform capture backend.
///
/// Implemented by `VirtualBackend` (synthetic, in this crate) and by the
/// platform crates (e.g. the Media Foundation source reader on Windows).
/// The backend owns its callback thread; `FrameSink` and `EventSink` are
/// the only channels back into the session, and neither ever blocks on
/// the consumer.
pub trait CaptureBackend: Send {
    /// Set up the device pipeline for `device` with `format`. Setup
    /// completion is reported asynchronously via
    /// [`BackendEvent::Initialized`]; an immediate `Err` means the session
    /// is invalid and must not be used.
    fn initialize(
        &mut self,
        device: &DeviceDescriptor,
        format: &CaptureFormat,
        frames: FrameSink,
        events: EventSink,
    ) -> Result<(), CaptureError>;

    /// Begin producing frames.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Halt frame production. Frames already published stay readable.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Probe the device's adjustable controls. Controls the device
    /// rejects are omitted, not returned as disabled.
    fn probe_controls(&mut self) -> Vec<Control>;
}
