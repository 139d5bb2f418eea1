use bytes::Bytes;
use strum_macros::Display;
use tracing::trace;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::constants::*;
use crate::error::LayerError;
use crate::frame::Frame;
use crate::layer::*;
use crate::packet::{DecodedLayer, DecodedPacket, ErrorLayer};

/// The closed set of layer decoders a pipeline can start from or dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Decoder {
    Ethernet,
    #[strum(to_string = "LinuxSLL")]
    LinuxSll,
    Dot1Q,
    #[strum(to_string = "ARP")]
    Arp,
    #[strum(to_string = "IPv4")]
    Ipv4,
    #[strum(to_string = "IPv6")]
    Ipv6,
    #[strum(to_string = "TCP")]
    Tcp,
    #[strum(to_string = "UDP")]
    Udp,
    #[strum(to_string = "ICMPv4")]
    Icmpv4,
    #[strum(to_string = "ICMPv6")]
    Icmpv6,
    Payload,
}

/// Outcome of decoding one layer: the layer, the bytes it covers, and what
/// to decode next (if anything).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStep {
    pub layer: Layer,
    pub contents: Bytes,
    pub next: Option<(NextDecoder, Bytes)>,
}

/// Next decoder to run. IPv6 extension headers are walked as their own step
/// so they show up as separate layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextDecoder {
    Layer(Decoder),
    Ipv6Extension(IpProtocol),
    /// Body of an IPv4 or IPv6 fragment; never reassembled
    Fragment,
}

impl Decoder {
    pub const ALL: [Decoder; 11] = [
        Decoder::Ethernet,
        Decoder::LinuxSll,
        Decoder::Dot1Q,
        Decoder::Arp,
        Decoder::Ipv4,
        Decoder::Ipv6,
        Decoder::Tcp,
        Decoder::Udp,
        Decoder::Icmpv4,
        Decoder::Icmpv6,
        Decoder::Payload,
    ];

    /// Look a decoder up by its layer name (exact match, e.g. `"IPv4"`)
    pub fn from_name(name: &str) -> Option<Decoder> {
        Self::ALL.iter().copied().find(|d| d.to_string() == name)
    }

    pub fn layer_type(&self) -> LayerType {
        match self {
            Decoder::Ethernet => LayerType::Ethernet,
            Decoder::LinuxSll => LayerType::LinuxSll,
            Decoder::Dot1Q => LayerType::Dot1Q,
            Decoder::Arp => LayerType::Arp,
            Decoder::Ipv4 => LayerType::Ipv4,
            Decoder::Ipv6 => LayerType::Ipv6,
            Decoder::Tcp => LayerType::Tcp,
            Decoder::Udp => LayerType::Udp,
            Decoder::Icmpv4 => LayerType::Icmpv4,
            Decoder::Icmpv6 => LayerType::Icmpv6,
            Decoder::Payload => LayerType::Payload,
        }
    }

    /// Decode the layer at the start of `data`.
    pub fn decode_layer(&self, data: &Bytes) -> Result<LayerStep, LayerError> {
        match self {
            Decoder::Ethernet => decode_ethernet(data),
            Decoder::LinuxSll => decode_linux_sll(data),
            Decoder::Dot1Q => decode_dot1q(data),
            Decoder::Arp => decode_arp(data),
            Decoder::Ipv4 => decode_ipv4(data),
            Decoder::Ipv6 => decode_ipv6(data),
            Decoder::Tcp => decode_tcp(data),
            Decoder::Udp => decode_udp(data),
            Decoder::Icmpv4 => decode_icmpv4(data),
            Decoder::Icmpv6 => decode_icmpv6(data),
            Decoder::Payload => Ok(LayerStep {
                layer: Layer::Payload(data.clone()),
                contents: data.clone(),
                next: None,
            }),
        }
    }
}

impl NextDecoder {
    fn decode(&self, data: &Bytes) -> Result<LayerStep, LayerError> {
        match self {
            NextDecoder::Layer(decoder) => decoder.decode_layer(data),
            NextDecoder::Ipv6Extension(header_type) => decode_ipv6_extension(*header_type, data),
            NextDecoder::Fragment => Ok(LayerStep {
                layer: Layer::Fragment(data.clone()),
                contents: data.clone(),
                next: None,
            }),
        }
    }
}

/// A named decoding pipeline: the decoder for the outermost layer.
///
/// Decoding is eager and zero-copy: every layer is decoded as soon as the
/// frame arrives and each layer's contents are slices of the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    first: Decoder,
}

impl Pipeline {
    pub fn new(first: Decoder) -> Self {
        Self { first }
    }

    pub fn first(&self) -> Decoder {
        self.first
    }

    pub fn name(&self) -> String {
        self.first.to_string()
    }

    /// Decode raw bytes. Never fails: a layer that cannot be decoded becomes
    /// the packet's error layer and decoding stops there.
    pub fn decode(&self, data: Bytes) -> DecodedPacket {
        let frame = Frame::new(data);
        self.decode_frame(&frame)
    }

    /// Decode a frame, carrying its capture metadata into the packet.
    pub fn decode_frame(&self, frame: &Frame) -> DecodedPacket {
        let mut layers = Vec::new();
        let mut error = None;
        let mut next = Some((NextDecoder::Layer(self.first), frame.data().clone()));

        while let Some((decoder, bytes)) = next.take() {
            match decoder.decode(&bytes) {
                Ok(step) => {
                    trace!(layer = %step.layer.layer_type(), len = step.contents.len(), "Decoded layer");
                    layers.push(DecodedLayer {
                        layer: step.layer,
                        contents: step.contents,
                    });
                    next = step.next;
                }
                Err(err) => {
                    trace!(error = %err, remaining = bytes.len(), "Layer decode failed");
                    error = Some(ErrorLayer {
                        error: err,
                        contents: bytes,
                    });
                }
            }
        }

        DecodedPacket::new(frame.data().clone(), frame.info().clone(), layers, error)
    }
}

fn read_header<'a, T>(layer: LayerType, data: &'a [u8]) -> Result<&'a T, LayerError>
where
    T: FromBytes + KnownLayout + Immutable,
{
    T::ref_from_prefix(data).map(|(header, _)| header).map_err(|_| LayerError::TooShort {
        layer,
        need: std::mem::size_of::<T>(),
        got: data.len(),
    })
}

fn require(layer: LayerType, need: usize, data: &Bytes) -> Result<(), LayerError> {
    if data.len() < need {
        return Err(LayerError::TooShort {
            layer,
            need,
            got: data.len(),
        });
    }
    Ok(())
}

fn for_ether_type(ether_type: EtherType) -> Result<Decoder, LayerError> {
    match ether_type {
        EtherType::Ipv4 => Ok(Decoder::Ipv4),
        EtherType::Ipv6 => Ok(Decoder::Ipv6),
        EtherType::Arp => Ok(Decoder::Arp),
        EtherType::Dot1Q => Ok(Decoder::Dot1Q),
        EtherType::Unknown(value) => Err(LayerError::UnsupportedEtherType(value)),
    }
}

/// Dispatch on an IP protocol number; `Ok(None)` means "no next header".
fn for_ip_protocol(protocol: IpProtocol) -> Result<Option<NextDecoder>, LayerError> {
    match protocol {
        IpProtocol::Tcp => Ok(Some(NextDecoder::Layer(Decoder::Tcp))),
        IpProtocol::Udp => Ok(Some(NextDecoder::Layer(Decoder::Udp))),
        IpProtocol::Icmpv4 => Ok(Some(NextDecoder::Layer(Decoder::Icmpv4))),
        IpProtocol::Icmpv6 => Ok(Some(NextDecoder::Layer(Decoder::Icmpv6))),
        IpProtocol::NoNextHeader => Ok(None),
        p if p.is_ipv6_extension() || p == IpProtocol::Fragment => Ok(Some(NextDecoder::Ipv6Extension(p))),
        p => Err(LayerError::UnsupportedIpProtocol(p.into())),
    }
}

/// Application data following a transport header, if there is any
fn payload_step(rest: Bytes) -> Option<(NextDecoder, Bytes)> {
    if rest.is_empty() {
        None
    } else {
        Some((NextDecoder::Layer(Decoder::Payload), rest))
    }
}

fn decode_ethernet(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<EthernetRaw>(LayerType::Ethernet, data)?;
    let header = EthernetHeader::from(*raw);
    let next = for_ether_type(header.ether_type)?;
    Ok(LayerStep {
        layer: Layer::Ethernet(header),
        contents: data.slice(..ETHERNET_HEADER_SIZE),
        next: Some((NextDecoder::Layer(next), data.slice(ETHERNET_HEADER_SIZE..))),
    })
}

fn decode_linux_sll(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<LinuxSllRaw>(LayerType::LinuxSll, data)?;
    let header = LinuxSllHeader::from(*raw);
    let next = for_ether_type(header.ether_type)?;
    Ok(LayerStep {
        layer: Layer::LinuxSll(header),
        contents: data.slice(..LINUX_SLL_HEADER_SIZE),
        next: Some((NextDecoder::Layer(next), data.slice(LINUX_SLL_HEADER_SIZE..))),
    })
}

fn decode_dot1q(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<Dot1QRaw>(LayerType::Dot1Q, data)?;
    let header = Dot1QHeader::from(*raw);
    let next = for_ether_type(header.ether_type)?;
    Ok(LayerStep {
        layer: Layer::Dot1Q(header),
        contents: data.slice(..DOT1Q_HEADER_SIZE),
        next: Some((NextDecoder::Layer(next), data.slice(DOT1Q_HEADER_SIZE..))),
    })
}

fn decode_arp(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<ArpRaw>(LayerType::Arp, data)?;
    let hw_len = raw.hardware_len as usize;
    let proto_len = raw.protocol_len as usize;
    let total = ARP_FIXED_SIZE + 2 * (hw_len + proto_len);
    require(LayerType::Arp, total, data)?;

    let mut offset = ARP_FIXED_SIZE;
    let mut take = |len: usize| {
        let field = data.slice(offset..offset + len);
        offset += len;
        field
    };
    let sender_hardware = take(hw_len);
    let sender_protocol = take(proto_len);
    let target_hardware = take(hw_len);
    let target_protocol = take(proto_len);

    let header = ArpHeader {
        hardware_type: raw.hardware_type.get(),
        protocol_type: EtherType::from(raw.protocol_type.get()),
        operation: raw.operation.get(),
        sender_hardware,
        sender_protocol,
        target_hardware,
        target_protocol,
    };

    // Anything past the addresses is Ethernet padding, not a layer
    Ok(LayerStep {
        layer: Layer::Arp(header),
        contents: data.slice(..total),
        next: None,
    })
}

fn decode_ipv4(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<Ipv4Raw>(LayerType::Ipv4, data)?;
    let version_ihl = VersionIhl::from_bytes([raw.version_ihl]);
    if version_ihl.version() != 4 {
        return Err(LayerError::InvalidVersion {
            layer: LayerType::Ipv4,
            version: version_ihl.version(),
        });
    }

    let header_len = version_ihl.ihl() as usize * 4;
    if header_len < IPV4_MIN_HEADER_SIZE {
        return Err(LayerError::InvalidHeaderLength {
            layer: LayerType::Ipv4,
            len: header_len,
        });
    }
    require(LayerType::Ipv4, header_len, data)?;

    let total_length = raw.total_length.get() as usize;
    if total_length < header_len {
        return Err(LayerError::InvalidLength {
            layer: LayerType::Ipv4,
            declared: total_length,
            header: header_len,
        });
    }

    let header = Ipv4Header::from_raw(raw, data.slice(IPV4_MIN_HEADER_SIZE..header_len));
    // Trailing link-layer padding is excluded; a short capture keeps what it has
    let end = total_length.min(data.len());
    let body = data.slice(header_len..end);

    let next = if header.is_fragment() {
        Some((NextDecoder::Fragment, body))
    } else {
        for_ip_protocol(header.protocol)?.map(|decoder| (decoder, body))
    };

    Ok(LayerStep {
        layer: Layer::Ipv4(header),
        contents: data.slice(..header_len),
        next,
    })
}

fn decode_ipv6(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<Ipv6Raw>(LayerType::Ipv6, data)?;
    let header = Ipv6Header::from(*raw);
    if header.version != 6 {
        return Err(LayerError::InvalidVersion {
            layer: LayerType::Ipv6,
            version: header.version,
        });
    }

    // Jumbograms (payload length 0) are not supported; take what was captured
    let end = match header.payload_length as usize {
        0 => data.len(),
        len => (IPV6_HEADER_SIZE + len).min(data.len()),
    };
    let body = data.slice(IPV6_HEADER_SIZE..end);
    let next = for_ip_protocol(header.next_header)?.map(|decoder| (decoder, body));

    Ok(LayerStep {
        layer: Layer::Ipv6(header),
        contents: data.slice(..IPV6_HEADER_SIZE),
        next,
    })
}

fn decode_ipv6_extension(header_type: IpProtocol, data: &Bytes) -> Result<LayerStep, LayerError> {
    if header_type == IpProtocol::Fragment {
        return decode_ipv6_fragment(data);
    }
    require(LayerType::Ipv6Extension, IPV6_EXT_MIN_SIZE, data)?;
    let next_header = IpProtocol::from(data[0]);
    let length = (data[1] as usize + 1) * 8;
    require(LayerType::Ipv6Extension, length, data)?;

    let next = for_ip_protocol(next_header)?.map(|decoder| (decoder, data.slice(length..)));
    Ok(LayerStep {
        layer: Layer::Ipv6Extension(Ipv6Extension {
            header_type,
            next_header,
            length,
        }),
        contents: data.slice(..length),
        next,
    })
}

/// Fixed 8-byte fragment header. Only an atomic fragment (offset 0, no
/// more fragments) carries a decodable upper layer.
fn decode_ipv6_fragment(data: &Bytes) -> Result<LayerStep, LayerError> {
    require(LayerType::Ipv6Extension, IPV6_FRAGMENT_HEADER_SIZE, data)?;
    let next_header = IpProtocol::from(data[0]);
    let offset_flags = u16::from_be_bytes([data[2], data[3]]);
    let body = data.slice(IPV6_FRAGMENT_HEADER_SIZE..);

    let atomic = offset_flags & (IPV6_FRAGMENT_OFFSET_MASK | IPV6_FLAG_MORE_FRAGMENTS) == 0;
    let next = if atomic {
        for_ip_protocol(next_header)?.map(|decoder| (decoder, body))
    } else if body.is_empty() {
        None
    } else {
        Some((NextDecoder::Fragment, body))
    };
    Ok(LayerStep {
        layer: Layer::Ipv6Extension(Ipv6Extension {
            header_type: IpProtocol::Fragment,
            next_header,
            length: IPV6_FRAGMENT_HEADER_SIZE,
        }),
        contents: data.slice(..IPV6_FRAGMENT_HEADER_SIZE),
        next,
    })
}

fn decode_tcp(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<TcpRaw>(LayerType::Tcp, data)?;
    let header_len = (raw.data_offset >> 4) as usize * 4;
    if header_len < TCP_MIN_HEADER_SIZE {
        return Err(LayerError::InvalidHeaderLength {
            layer: LayerType::Tcp,
            len: header_len,
        });
    }
    require(LayerType::Tcp, header_len, data)?;

    let header = TcpHeader::from_raw(raw, data.slice(TCP_MIN_HEADER_SIZE..header_len));
    Ok(LayerStep {
        layer: Layer::Tcp(header),
        contents: data.slice(..header_len),
        next: payload_step(data.slice(header_len..)),
    })
}

fn decode_udp(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<UdpRaw>(LayerType::Udp, data)?;
    let header = UdpHeader::from(*raw);
    let length = header.length as usize;
    if length < UDP_HEADER_SIZE {
        return Err(LayerError::InvalidLength {
            layer: LayerType::Udp,
            declared: length,
            header: UDP_HEADER_SIZE,
        });
    }

    let end = length.min(data.len());
    Ok(LayerStep {
        layer: Layer::Udp(header),
        contents: data.slice(..UDP_HEADER_SIZE),
        next: payload_step(data.slice(UDP_HEADER_SIZE..end)),
    })
}

fn decode_icmpv4(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<Icmpv4Raw>(LayerType::Icmpv4, data)?;
    Ok(LayerStep {
        layer: Layer::Icmpv4(Icmpv4Header::from(*raw)),
        contents: data.slice(..ICMPV4_HEADER_SIZE),
        next: payload_step(data.slice(ICMPV4_HEADER_SIZE..)),
    })
}

fn decode_icmpv6(data: &Bytes) -> Result<LayerStep, LayerError> {
    let raw = read_header::<Icmpv6Raw>(LayerType::Icmpv6, data)?;
    Ok(LayerStep {
        layer: Layer::Icmpv6(Icmpv6Header::from(*raw)),
        contents: data.slice(..ICMPV6_HEADER_SIZE),
        next: payload_step(data.slice(ICMPV6_HEADER_SIZE..)),
    })
}
