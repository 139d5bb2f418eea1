use bytes::Bytes;

use crate::error::LayerError;
use crate::frame::CaptureInfo;
use crate::layer::{Layer, LayerType};

/// A decoded layer together with the frame bytes it was decoded from
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLayer {
    pub layer: Layer,
    pub contents: Bytes,
}

/// Terminal pseudo-layer recording where and why decoding stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorLayer {
    pub error: LayerError,
    /// The bytes the failing decoder was given
    pub contents: Bytes,
}

impl ErrorLayer {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// The structured result of running a pipeline over one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    data: Bytes,
    info: CaptureInfo,
    layers: Vec<DecodedLayer>,
    error: Option<ErrorLayer>,
}

impl DecodedPacket {
    pub fn new(data: Bytes, info: CaptureInfo, layers: Vec<DecodedLayer>, error: Option<ErrorLayer>) -> Self {
        Self {
            data,
            info,
            layers,
            error,
        }
    }

    /// Full frame bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn info(&self) -> &CaptureInfo {
        &self.info
    }

    pub fn layers(&self) -> &[DecodedLayer] {
        &self.layers
    }

    pub fn error_layer(&self) -> Option<&ErrorLayer> {
        self.error.as_ref()
    }

    /// First layer of the given type, if the packet has one
    pub fn layer(&self, layer_type: LayerType) -> Option<&DecodedLayer> {
        self.layers.iter().find(|l| l.layer.layer_type() == layer_type)
    }

    pub fn layer_types(&self) -> Vec<LayerType> {
        self.layers.iter().map(|l| l.layer.layer_type()).collect()
    }

    /// Application payload carried by the packet, if any
    pub fn payload(&self) -> Option<&Bytes> {
        self.layers.iter().find_map(|l| match &l.layer {
            Layer::Payload(data) => Some(data),
            _ => None,
        })
    }
}
