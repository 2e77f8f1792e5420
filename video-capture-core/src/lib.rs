//! # video-capture-core
//!
//! Platform-agnostic video capture core library.
//!
//! Provides device enumeration with hot-plug notifications, a lock-free
//! double-buffered frame hand-off, cross-API GPU texture interop, camera
//! controls, and session orchestration. Platform-specific backends
//! (Windows Media Foundation, synthetic virtual devices) implement the
//! `CaptureBackend`/`CapturePlatform` traits and plug into the generic
//! `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! video-capture-core (this crate)
//! ├── traits/       ← CaptureBackend, CapturePlatform, BackendEvent
//! ├── models/       ← DeviceDescriptor, CaptureFormat, PixelBuffer, CaptureError, SessionState
//! ├── processing/   ← lock-free frame DoubleBuffer (writer/reader split)
//! ├── devices/      ← DeviceRegistry (enumeration cache + hot-plug diff)
//! ├── controls      ← Control, ControlPort (brightness, focus, zoom, ...)
//! ├── interop       ← SharedTexture, InteropBridge, ref-counted InteropContext
//! ├── session/      ← CaptureSession (orchestrator), FrameSink, EventSink
//! ├── signal        ← ordered weak-subscriber signals
//! └── backend/      ← VirtualPlatform (synthetic devices for tests/headless)
//! ```
//!
//! ## Threading model
//!
//! Two independently-clocked contexts per session: the backend's capture
//! callback thread (sole frame writer, sole event originator) and the
//! consumer's poll/render thread. The frame hand-off is a single
//! atomically-published slot index: the producer never blocks on the
//! consumer, and the consumer never observes a partially-written frame.
//! Lifecycle notifications queue in backend order and are dispatched by
//! `CaptureSession::pump_events` on the consumer's thread.

pub mod backend;
pub mod controls;
pub mod devices;
pub mod interop;
pub mod models;
pub mod processing;
pub mod session;
pub mod signal;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backend::virtual_device::{VirtualBackend, VirtualDeviceController, VirtualPlatform};
pub use controls::{Control, ControlId, ControlPort, ControlRange};
pub use devices::registry::DeviceRegistry;
pub use interop::{InteropBridge, InteropContext, InteropSurface, SharedTexture, SoftwareBridge};
pub use models::descriptor::{DeviceDescriptor, DeviceProfile};
pub use models::error::CaptureError;
pub use models::format::{CaptureFormat, Rotation};
pub use models::frame::{ChannelOrder, PixelBuffer, SessionDiagnostics};
pub use models::state::SessionState;
pub use processing::double_buffer::{
    double_buffer, FrameReader, FrameWriter, SlotLease, WriteOutcome,
};
pub use session::capture::{CaptureSession, SurfaceLease, TextureLease};
pub use session::sink::{EventSink, FrameSink};
pub use signal::{slot, Signal, SignalFn, SignalToken};
pub use traits::capture_backend::{BackendEvent, CaptureBackend};
pub use traits::capture_platform::CapturePlatform;
