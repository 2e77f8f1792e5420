use thiserror::Error;

/// Errors that can occur during video capture operations.
///
/// Failure classes and how they surface:
/// - enumeration failure → `EnumerationFailed`; the registry keeps its
///   cached device list and emits no hot-plug events
/// - initialization failure → `InitializationFailed`,
///   `TextureAllocationFailed`, `InteropUnavailable`, `DeviceNotAvailable`;
///   reported through `CaptureSession::create` returning `None`
/// - device lost mid-session → not an error value at all; surfaced via the
///   session's `on_device_lost` signal
/// - transient backend error → `on_error(code)` signal, session stays usable
/// - unsupported control → filtered at probe time, never an error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("shared texture allocation failed: {0}")]
    TextureAllocationFailed(String),

    #[error("no interop bridge is available for hardware frames")]
    InteropUnavailable,

    #[error("texture is already locked")]
    AlreadyLocked,

    #[error("texture is not locked")]
    NotLocked,

    #[error("control read failed: {0}")]
    ControlReadFailed(String),

    #[error("control write failed: {0}")]
    ControlWriteFailed(String),

    #[error("backend error status {0}")]
    BackendError(i32),

    #[error("unknown error: {0}")]
    Unknown(String),
}
