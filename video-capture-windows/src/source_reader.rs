//! Media Foundation capture backend.
//!
//! Reads decoded RGB32 samples from an `IMFSourceReader` on a dedicated
//! thread and pushes them through the core `FrameSink`. Lifecycle events
//! queue on the `EventSink` and are dispatched by the session's pump on
//! the consumer thread.
//!
//! The full capture-engine property/initialization sequence is
//! deliberately not reproduced here; the source-reader path carries the
//! same frame and event contract with far less ceremony.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use windows::core::Interface;
use windows::Win32::Media::KernelStreaming::IKsControl;
use windows::Win32::Media::MediaFoundation::*;
use windows::Win32::System::Com::*;

use video_capture_core::controls::Control;
use video_capture_core::models::descriptor::DeviceDescriptor;
use video_capture_core::models::error::CaptureError;
use video_capture_core::models::format::CaptureFormat;
use video_capture_core::models::frame::ChannelOrder;
use video_capture_core::session::sink::{EventSink, FrameSink};
use video_capture_core::traits::capture_backend::{BackendEvent, CaptureBackend};

use crate::controls::KsControlPort;
use crate::device_enumerator::DeviceEnumerator;

/// Media Foundation is started once for the first backend and shut down
/// with the last one.
static MF_INSTANCES: AtomicUsize = AtomicUsize::new(0);

const MF_VERSION: u32 = (MF_SDK_VERSION << 16) | MF_API_VERSION;

fn mf_addref() -> Result<(), CaptureError> {
    if MF_INSTANCES.fetch_add(1, Ordering::SeqCst) == 0 {
        unsafe {
            MFStartup(MF_VERSION, MFSTARTUP_FULL).map_err(|e| {
                CaptureError::InitializationFailed(format!("MFStartup failed: {e}"))
            })?;
        }
    }
    Ok(())
}

fn mf_release() {
    if MF_INSTANCES.fetch_sub(1, Ordering::SeqCst) == 1 {
        unsafe {
            let _ = MFShutdown();
        }
    }
}

/// `CaptureBackend` over an MF source reader.
///
/// The reader thread is the capture callback context: sole frame writer,
/// sole event originator. `start`/`stop` toggle production without
/// tearing the reader down.
pub struct MediaFoundationBackend {
    device: DeviceDescriptor,
    source: Option<IMFMediaSource>,
    running: Arc<AtomicBool>,
    producing: Arc<AtomicBool>,
    events: Option<EventSink>,
    reader_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

// SAFETY: the media source is only touched from the reader thread after
// initialization hands it off; the remaining fields are atomics,
// Mutex-protected, or plain data.
unsafe impl Send for MediaFoundationBackend {}

impl MediaFoundationBackend {
    pub fn new(device: DeviceDescriptor) -> Result<Self, CaptureError> {
        mf_addref()?;
        Ok(Self {
            device,
            source: None,
            running: Arc::new(AtomicBool::new(false)),
            producing: Arc::new(AtomicBool::new(false)),
            events: None,
            reader_handle: Mutex::new(None),
        })
    }
}

impl CaptureBackend for MediaFoundationBackend {
    fn initialize(
        &mut self,
        device: &DeviceDescriptor,
        format: &CaptureFormat,
        frames: FrameSink,
        events: EventSink,
    ) -> Result<(), CaptureError> {
        let source = DeviceEnumerator::find_source(device)?;
        self.source = Some(source.clone());
        self.events = Some(events.clone());

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let producing = Arc::clone(&self.producing);
        let format = format.clone();

        let handle = thread::Builder::new()
            .name("mf-source-reader".into())
            .spawn(move || {
                if let Err(e) = reader_loop(source, format, frames, events.clone(), running, producing)
                {
                    log::error!("source reader error: {e}");
                    events.raise(BackendEvent::Error(hresult_code(&e)));
                }
            })
            .map_err(|e| {
                CaptureError::InitializationFailed(format!("failed to spawn reader thread: {e}"))
            })?;
        *self.reader_handle.lock() = Some(handle);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.producing.store(true, Ordering::SeqCst);
        if let Some(events) = &self.events {
            events.raise(BackendEvent::Started);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.producing.store(false, Ordering::SeqCst);
        if let Some(events) = &self.events {
            events.raise(BackendEvent::Stopped);
        }
        Ok(())
    }

    fn probe_controls(&mut self) -> Vec<Control> {
        let Ok(source) = DeviceEnumerator::find_source(&self.device) else {
            return Vec::new();
        };
        match source.cast::<IKsControl>() {
            Ok(control) => Control::probe_all(Arc::new(KsControlPort::new(control))),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for MediaFoundationBackend {
    fn drop(&mut self) {
        self.producing.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_handle.lock().take() {
            let _ = handle.join();
        }
        if let Some(source) = self.source.take() {
            unsafe {
                let _ = source.Shutdown();
            }
        }
        mf_release();
    }
}

/// Reader loop on the dedicated capture thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Create a source reader over the activated media source
/// 3. Request RGB32 at the format's size and rate
/// 4. Report `Initialized`
/// 5. Pull samples while running; deliver while producing
fn reader_loop(
    source: IMFMediaSource,
    format: CaptureFormat,
    mut frames: FrameSink,
    events: EventSink,
    running: Arc<AtomicBool>,
    producing: Arc<AtomicBool>,
) -> windows::core::Result<()> {
    unsafe {
        // No-op if COM is already initialized on this thread.
        let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
        let _com_guard = CoUninitializeGuard;

        let reader = MFCreateSourceReaderFromMediaSource(&source, None)?;

        let mut media_type = None;
        MFCreateMediaType(&mut media_type)?;
        let media_type = media_type.unwrap();
        media_type.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)?;
        media_type.SetGUID(&MF_MT_SUBTYPE, &MFVideoFormat_RGB32)?;
        let (width, height) = format.dimensions();
        media_type.SetUINT64(&MF_MT_FRAME_SIZE, ((width as u64) << 32) | height as u64)?;
        media_type.SetUINT64(
            &MF_MT_FRAME_RATE,
            ((format.fps_num() as u64) << 32) | format.fps_den() as u64,
        )?;
        reader.SetCurrentMediaType(
            MF_SOURCE_READER_FIRST_VIDEO_STREAM.0 as u32,
            None,
            &media_type,
        )?;

        events.raise(BackendEvent::Initialized);

        let row_bytes = width as usize * ChannelOrder::Bgra.bytes_per_pixel();
        while running.load(Ordering::SeqCst) {
            if !producing.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(5));
                continue;
            }

            let mut stream_index = 0u32;
            let mut stream_flags = 0u32;
            let mut timestamp = 0i64;
            let mut sample = None;
            let read = reader.ReadSample(
                MF_SOURCE_READER_FIRST_VIDEO_STREAM.0 as u32,
                0,
                Some(&mut stream_index),
                Some(&mut stream_flags),
                Some(&mut timestamp),
                Some(&mut sample),
            );
            if let Err(e) = read {
                if e.code() == MF_E_VIDEO_RECORDING_DEVICE_INVALIDATED {
                    events.raise(BackendEvent::DeviceInvalidated);
                    return Ok(());
                }
                events.raise(BackendEvent::Error(e.code().0));
                continue;
            }
            if stream_flags & MF_SOURCE_READERF_ENDOFSTREAM.0 as u32 != 0 {
                events.raise(BackendEvent::DeviceInvalidated);
                return Ok(());
            }
            let Some(sample) = sample else {
                continue;
            };

            let buffer = sample.ConvertToContiguousBuffer()?;
            let mut data: *mut u8 = std::ptr::null_mut();
            let mut length = 0u32;
            buffer.Lock(&mut data, None, Some(&mut length))?;
            if !data.is_null() && length > 0 {
                let bytes = std::slice::from_raw_parts(data, length as usize);
                frames.submit_pixels(width, height, row_bytes, ChannelOrder::Bgra, bytes);
            }
            buffer.Unlock()?;
        }
    }
    Ok(())
}

fn hresult_code(error: &windows::core::Error) -> i32 {
    error.code().0
}

/// RAII guard to call CoUninitialize when dropped.
struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
