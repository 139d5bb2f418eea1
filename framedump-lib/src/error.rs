use std::io;
use thiserror::Error;

use crate::layer::LayerType;

/// The primary error type for the `framedump-lib` library.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Unknown decoder '{name}'. Known decoders: {known}")]
    UnknownDecoder { name: String, known: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Capture file error: {0}")]
    Capture(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single layer could not be decoded.
///
/// These never abort a run; they end up inside the error layer of a
/// [`DecodedPacket`](crate::packet::DecodedPacket).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    #[error("{layer} header too short: need {need} bytes, got {got}")]
    TooShort { layer: LayerType, need: usize, got: usize },

    #[error("{layer} has invalid header length {len}")]
    InvalidHeaderLength { layer: LayerType, len: usize },

    #[error("{layer} has invalid version {version}")]
    InvalidVersion { layer: LayerType, version: u8 },

    #[error("{layer} declares length {declared} smaller than its header ({header})")]
    InvalidLength { layer: LayerType, declared: usize, header: usize },

    #[error("Unable to decode EtherType {0:#06x}")]
    UnsupportedEtherType(u16),

    #[error("Unable to decode IP protocol {0}")]
    UnsupportedIpProtocol(u8),
}
