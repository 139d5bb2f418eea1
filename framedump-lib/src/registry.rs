//! Static mapping from decoder names to pipelines, resolved once at startup.

use tracing::debug;

use crate::decode::{Decoder, Pipeline};
use crate::error::DumpError;

/// Name used when no decoder is configured
pub const DEFAULT_DECODER: &str = "Ethernet";

/// Resolve a decoder name to its pipeline.
///
/// Names are matched exactly (`"IPv4"`, not `"ipv4"`), mirroring the layer
/// names printed in packet dumps.
pub fn resolve(name: &str) -> Result<Pipeline, DumpError> {
    match Decoder::from_name(name) {
        Some(decoder) => {
            debug!(decoder = %decoder, "Resolved decoder");
            Ok(Pipeline::new(decoder))
        }
        None => Err(DumpError::UnknownDecoder {
            name: name.to_string(),
            known: names().join(", "),
        }),
    }
}

/// All registered decoder names, in registration order
pub fn names() -> Vec<String> {
    Decoder::ALL.iter().map(|d| d.to_string()).collect()
}
