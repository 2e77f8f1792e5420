use serde::{Deserialize, Serialize};

/// Byte order of a CPU pixel buffer. Capture backends on the supported
/// platforms decode into 32-bit-per-pixel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    #[default]
    Bgra,
    Rgba,
}

impl ChannelOrder {
    pub fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// CPU-side frame storage for the software render path.
///
/// One `PixelBuffer` lives in each slot of the frame double buffer. The
/// capture callback copies a full decoded frame into the write slot with
/// [`PixelBuffer::copy_from`]; the allocation is reused across frames and
/// only grows when an incoming frame needs more bytes.
#[derive(Debug, Clone, Default)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    row_bytes: usize,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, order: ChannelOrder) -> Self {
        let row_bytes = width as usize * order.bytes_per_pixel();
        Self {
            width,
            height,
            row_bytes,
            order,
            data: vec![0; row_bytes * height as usize],
        }
    }

    /// True until the first frame has been copied in.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One row of pixels, `row_bytes` long.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.row_bytes;
        &self.data[start..start + self.row_bytes]
    }

    /// Replace the buffer contents with a complete decoded frame.
    ///
    /// Grows the allocation only when `bytes` will not fit in the current
    /// one; a larger existing allocation is kept and reused.
    pub fn copy_from(
        &mut self,
        width: u32,
        height: u32,
        row_bytes: usize,
        order: ChannelOrder,
        bytes: &[u8],
    ) {
        let needed = row_bytes * height as usize;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
        let n = needed.min(bytes.len());
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.width = width;
        self.height = height;
        self.row_bytes = row_bytes;
        self.order = order;
    }
}

/// Counters exported for debugging a capture session.
///
/// Snapshot of the session's internal atomics; serializable for JSON
/// export alongside bug reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    /// Frames the backend published into the double buffer.
    pub frames_produced: u64,
    /// Frames dropped because the consumer held a lease on the write slot
    /// or the backend abandoned the copy.
    pub frames_dropped: u64,
    /// Lifecycle events dispatched by `pump_events`.
    pub events_dispatched: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed() {
        let buf = PixelBuffer::new(4, 2, ChannelOrder::Bgra);
        assert_eq!(buf.data().len(), 4 * 2 * 4);
        assert!(buf.data().iter().all(|&b| b == 0));
        assert!(!buf.is_empty());
    }

    #[test]
    fn default_buffer_is_empty() {
        assert!(PixelBuffer::default().is_empty());
    }

    #[test]
    fn copy_from_adopts_geometry() {
        let mut buf = PixelBuffer::default();
        let bytes = vec![7u8; 8 * 4 * 2];
        buf.copy_from(8, 2, 32, ChannelOrder::Rgba, &bytes);

        assert_eq!(buf.width(), 8);
        assert_eq!(buf.height(), 2);
        assert_eq!(buf.row_bytes(), 32);
        assert_eq!(buf.channel_order(), ChannelOrder::Rgba);
        assert!(buf.data()[..64].iter().all(|&b| b == 7));
    }

    #[test]
    fn copy_from_keeps_larger_allocation() {
        let mut buf = PixelBuffer::new(8, 8, ChannelOrder::Bgra);
        let large = buf.data().len();

        buf.copy_from(2, 2, 8, ChannelOrder::Bgra, &[1u8; 16]);
        // Allocation stays at the high-water mark.
        assert_eq!(buf.data().len(), large);
        assert_eq!(buf.width(), 2);
        assert!(buf.row(1).iter().all(|&b| b == 1));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let diag = SessionDiagnostics {
            frames_produced: 10,
            frames_dropped: 1,
            events_dispatched: 3,
        };
        let json = serde_json::to_string(&diag).unwrap();
        let back: SessionDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(diag, back);
    }
}
