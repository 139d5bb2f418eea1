use crate::frame::Frame;
use crate::packet::DecodedPacket;

/// Per-packet outcome. Truncation and decode errors are independent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub truncated: bool,
    pub error: Option<String>,
}

/// True iff the source marked the frame as truncated
pub fn is_truncated(frame: &Frame) -> bool {
    frame.is_truncated()
}

/// Diagnostic text of the error layer, if decoding ended on one
pub fn decode_error(packet: &DecodedPacket) -> Option<String> {
    packet.error_layer().map(|e| e.message())
}

pub fn classify(frame: &Frame, packet: &DecodedPacket) -> Classification {
    Classification {
        truncated: is_truncated(frame),
        error: decode_error(packet),
    }
}
