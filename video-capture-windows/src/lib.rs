//! # video-capture-windows
//!
//! Windows Media Foundation backend for video-capture-kit.
//!
//! Provides:
//! - `MediaFoundationPlatform` — `CapturePlatform` over MF device sources
//! - `MediaFoundationBackend` — frame production via a source reader on a
//!   dedicated thread
//! - `DeviceEnumerator` — device and profile enumeration via
//!   `MFEnumDeviceSources`
//! - `KsControlPort` — camera controls via kernel-streaming properties
//! - `HotplugWatcher` — device arrival/removal notifications driving the
//!   core `DeviceRegistry` diff
//!
//! ## Platform Requirements
//! - Windows 10+ (Media Foundation capture stack)
//! - A graphics interop bridge from the hosting renderer for
//!   hardware-accelerated sessions; this crate produces CPU frames
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use video_capture_core::{CaptureFormat, CaptureSession, CapturePlatform};
//! use video_capture_windows::MediaFoundationPlatform;
//!
//! let platform: Arc<dyn CapturePlatform> = Arc::new(MediaFoundationPlatform::new());
//! let session = CaptureSession::create(
//!     CaptureFormat::new().size(1280, 720).hardware_accelerated(false),
//!     &platform,
//! );
//! ```

#[cfg(target_os = "windows")]
pub mod controls;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod hotplug;
#[cfg(target_os = "windows")]
pub mod platform;
#[cfg(target_os = "windows")]
pub mod source_reader;

#[cfg(target_os = "windows")]
pub use controls::KsControlPort;
#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use hotplug::HotplugWatcher;
#[cfg(target_os = "windows")]
pub use platform::MediaFoundationPlatform;
#[cfg(target_os = "windows")]
pub use source_reader::MediaFoundationBackend;
