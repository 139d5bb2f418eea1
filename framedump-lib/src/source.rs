use bytes::Bytes;
use chrono::{DateTime, Utc};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, PcapBlockOwned, PcapError, build_ts, build_ts_resolution, create_reader};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::error::DumpError;
use crate::frame::Frame;

/// An ordered, lazily pulled sequence of frames.
///
/// `Ok(None)` signals exhaustion. Pulling may block (e.g. waiting for live
/// traffic); it is the only blocking point of a run.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, DumpError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, DumpError> {
        (**self).next_frame()
    }
}

/// In-memory frame queue that remembers how many frames were pulled
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
    pulled: usize,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            pulled: 0,
        }
    }

    pub fn pulled(&self) -> usize {
        self.pulled
    }

    /// Frames not yet pulled
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, DumpError> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.pulled += 1;
        }
        Ok(frame)
    }
}

/// Per-interface state learned from pcapng interface description blocks
#[derive(Debug, Clone, Copy)]
struct Interface {
    linktype: i32,
    ts_resolution: u64,
    ts_offset: i64,
}

/// Replays a legacy pcap or pcapng capture from any reader.
///
/// The captured bytes are copied once out of the parser's buffer into a
/// `Bytes`; everything downstream slices that buffer.
pub struct PcapSource {
    reader: Box<dyn PcapReaderIterator + Send>,
    buffer_size: usize,
    interfaces: HashMap<u32, Interface>,
    next_if_id: u32,
    frames_read: u64,
}

const READER_BUFFER_SIZE: usize = 65536;
/// Largest parser buffer a single block may force
const MAX_READER_BUFFER_SIZE: usize = 64 * 1024 * 1024;
const MICROS_PER_SEC: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

impl PcapSource {
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self, DumpError> {
        let reader = create_reader(READER_BUFFER_SIZE, reader)
            .map_err(|e| DumpError::Capture(format!("Unrecognized capture format: {:?}", e)))?;
        Ok(Self {
            reader,
            buffer_size: READER_BUFFER_SIZE,
            interfaces: HashMap::new(),
            next_if_id: 0,
            frames_read: 0,
        })
    }

    /// Open a capture file, or standard input when `path` is `-`
    pub fn open(path: &Path) -> Result<Self, DumpError> {
        if path.as_os_str() == "-" {
            debug!("Reading capture from stdin");
            return Self::from_reader(io::stdin());
        }
        let file = File::open(path)?;
        debug!(path = %path.display(), "Reading capture file");
        Self::from_reader(file)
    }

    /// Link-layer type of an interface, once its description has been read
    pub fn linktype(&self, if_id: u32) -> Option<i32> {
        self.interfaces.get(&if_id).map(|i| i.linktype)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn add_interface(&mut self, interface: Interface) {
        let if_id = self.next_if_id;
        self.next_if_id += 1;
        debug!(
            if_id,
            linktype = interface.linktype,
            ts_resolution = interface.ts_resolution,
            ts_offset = interface.ts_offset,
            "Capture interface"
        );
        self.interfaces.insert(if_id, interface);
    }

    fn interface(&self, if_id: u32) -> Interface {
        self.interfaces.get(&if_id).copied().unwrap_or(Interface {
            linktype: 0,
            ts_resolution: MICROS_PER_SEC,
            ts_offset: 0,
        })
    }

    /// Double the parser buffer so a block larger than it can be read
    fn grow_buffer(&mut self) -> Result<(), DumpError> {
        let new_size = self.buffer_size * 2;
        if new_size > MAX_READER_BUFFER_SIZE || !self.reader.grow(new_size) {
            warn!(size = self.buffer_size, "Capture block exceeds the largest reader buffer");
            return Err(DumpError::Capture(format!(
                "Capture block larger than {} bytes",
                self.buffer_size
            )));
        }
        debug!(size = new_size, "Grew capture reader buffer");
        self.buffer_size = new_size;
        Ok(())
    }
}

/// Split seconds and sub-second units into a UTC instant
fn timestamp(secs: i64, frac: u64, units_per_sec: u64) -> Option<DateTime<Utc>> {
    let nanos = (frac as u128 * NANOS_PER_SEC as u128 / units_per_sec.max(1) as u128) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn captured(data: &[u8], caplen: u32) -> Bytes {
    let len = (caplen as usize).min(data.len());
    Bytes::copy_from_slice(&data[..len])
}

/// Owned digest of one pcap block, so the parser buffer can be released
/// before the source updates its own state.
enum BlockItem {
    LegacyHeader { linktype: i32, nanos: bool },
    SectionHeader,
    Interface { linktype: i32, tsresol: u8, ts_offset: i64 },
    LegacyPacket { data: Bytes, wire_length: u32, ts_sec: u32, ts_frac: u32 },
    Packet { data: Bytes, wire_length: u32, if_id: u32, ts: Option<(u32, u32)> },
    Other,
}

fn digest(block: PcapBlockOwned<'_>) -> BlockItem {
    match block {
        PcapBlockOwned::LegacyHeader(header) => BlockItem::LegacyHeader {
            linktype: header.network.0,
            nanos: header.is_nanosecond_precision(),
        },
        PcapBlockOwned::Legacy(b) => BlockItem::LegacyPacket {
            data: captured(b.data, b.caplen),
            wire_length: b.origlen,
            ts_sec: b.ts_sec,
            ts_frac: b.ts_usec,
        },
        PcapBlockOwned::NG(Block::SectionHeader(_)) => BlockItem::SectionHeader,
        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => BlockItem::Interface {
            linktype: idb.linktype.0,
            tsresol: idb.if_tsresol,
            ts_offset: idb.ts_offset(),
        },
        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => BlockItem::Packet {
            data: captured(epb.data, epb.caplen),
            wire_length: epb.origlen,
            if_id: epb.if_id,
            ts: Some((epb.ts_high, epb.ts_low)),
        },
        PcapBlockOwned::NG(Block::SimplePacket(spb)) => BlockItem::Packet {
            data: captured(spb.data, spb.origlen),
            wire_length: spb.origlen,
            if_id: 0,
            ts: None,
        },
        PcapBlockOwned::NG(_) => BlockItem::Other,
    }
}

impl PcapSource {
    fn apply(&mut self, item: BlockItem) -> Option<Frame> {
        match item {
            BlockItem::LegacyHeader { linktype, nanos } => {
                let ts_resolution = if nanos { NANOS_PER_SEC } else { MICROS_PER_SEC };
                self.add_interface(Interface {
                    linktype,
                    ts_resolution,
                    ts_offset: 0,
                });
                None
            }
            BlockItem::SectionHeader => {
                // Interface ids restart with every section
                self.interfaces.clear();
                self.next_if_id = 0;
                None
            }
            BlockItem::Interface {
                linktype,
                tsresol,
                ts_offset,
            } => {
                let ts_resolution = build_ts_resolution(tsresol).unwrap_or_else(|| {
                    warn!(tsresol, "Invalid interface timestamp resolution, assuming microseconds");
                    MICROS_PER_SEC
                });
                self.add_interface(Interface {
                    linktype,
                    ts_resolution,
                    ts_offset,
                });
                None
            }
            BlockItem::LegacyPacket {
                data,
                wire_length,
                ts_sec,
                ts_frac,
            } => {
                let frame = Frame::with_wire_length(data, wire_length as usize);
                let units = self.interface(0).ts_resolution;
                Some(match timestamp(ts_sec as i64, ts_frac as u64, units) {
                    Some(ts) => frame.with_timestamp(ts),
                    None => frame,
                })
            }
            BlockItem::Packet {
                data,
                wire_length,
                if_id,
                ts,
            } => {
                let frame = Frame::with_wire_length(data, wire_length as usize).with_interface(if_id);
                let interface = self.interface(if_id);
                let ts = ts.and_then(|(high, low)| {
                    // Offset applied separately, it may be negative
                    let (secs, frac) = build_ts(high, low, 0, interface.ts_resolution);
                    timestamp(secs as i64 + interface.ts_offset, frac as u64, interface.ts_resolution)
                });
                Some(match ts {
                    Some(ts) => frame.with_timestamp(ts),
                    None => frame,
                })
            }
            BlockItem::Other => None,
        }
    }
}

impl FrameSource for PcapSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, DumpError> {
        loop {
            let item = match self.reader.next() {
                Ok((offset, block)) => {
                    let item = digest(block);
                    self.reader.consume(offset);
                    item
                }
                Err(PcapError::Eof) => {
                    debug!(frames = self.frames_read, "End of capture");
                    return Ok(None);
                }
                Err(PcapError::Incomplete(_)) => {
                    self.reader
                        .refill()
                        .map_err(|e| DumpError::Capture(format!("Failed to refill capture buffer: {:?}", e)))?;
                    continue;
                }
                Err(PcapError::BufferTooSmall) => {
                    self.grow_buffer()?;
                    self.reader
                        .refill()
                        .map_err(|e| DumpError::Capture(format!("Failed to refill capture buffer: {:?}", e)))?;
                    continue;
                }
                Err(PcapError::UnexpectedEof) => {
                    warn!(frames = self.frames_read, "Capture ends in the middle of a block");
                    return Err(DumpError::Capture("Capture truncated mid-block".to_string()));
                }
                Err(e) => {
                    warn!(frames = self.frames_read, "Capture parse error");
                    return Err(DumpError::Capture(format!("{:?}", e)));
                }
            };

            if let Some(frame) = self.apply(item) {
                self.frames_read += 1;
                trace!(len = frame.len(), truncated = frame.is_truncated(), "Read frame");
                return Ok(Some(frame));
            }
        }
    }
}
