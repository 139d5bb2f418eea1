use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Capture metadata attached to a frame by its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInfo {
    pub timestamp: Option<DateTime<Utc>>,
    pub capture_length: usize, // bytes actually captured
    pub wire_length: usize,    // bytes seen on the wire
    pub interface_index: u32,
    pub truncated: bool,
}

/// One raw captured unit of data plus its capture metadata.
///
/// The payload is a `Bytes` handle, so decoded layers slice it instead of
/// copying. Frames are immutable once a source has produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
    info: CaptureInfo,
}

impl Frame {
    /// Create a fully captured frame (wire length equals captured length)
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len();
        Self {
            data,
            info: CaptureInfo {
                timestamp: None,
                capture_length: len,
                wire_length: len,
                interface_index: 0,
                truncated: false,
            },
        }
    }

    /// Create a frame whose wire length may exceed what was captured.
    ///
    /// The frame is marked truncated when `wire_length` is larger than the
    /// captured data.
    pub fn with_wire_length(data: impl Into<Bytes>, wire_length: usize) -> Self {
        let mut frame = Self::new(data);
        frame.info.wire_length = wire_length.max(frame.info.capture_length);
        frame.info.truncated = wire_length > frame.info.capture_length;
        frame
    }

    /// Force the truncation flag, for sources that learn it out of band
    pub fn mark_truncated(mut self, truncated: bool) -> Self {
        self.info.truncated = truncated;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.info.timestamp = Some(timestamp);
        self
    }

    pub fn with_interface(mut self, interface_index: u32) -> Self {
        self.info.interface_index = interface_index;
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn info(&self) -> &CaptureInfo {
        &self.info
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.info.truncated
    }
}
