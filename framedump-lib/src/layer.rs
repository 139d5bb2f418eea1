use bytes::Bytes;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use strum_macros::Display;
use zerocopy::byteorder::network_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::constants::*;

/// Names of every layer kind a pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LayerType {
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
    #[strum(to_string = "IPv6Extension")]
    Ipv6Extension,
    #[strum(to_string = "TCP")]
    Tcp,
    #[strum(to_string = "UDP")]
    Udp,
    #[strum(to_string = "ICMPv4")]
    Icmpv4,
    #[strum(to_string = "ICMPv6")]
    Icmpv6,
    Payload,
    Fragment,
    DecodeFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    Dot1Q = 0x8100,
    Ipv6 = 0x86DD,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Arp => write!(f, "ARP"),
            EtherType::Dot1Q => write!(f, "Dot1Q"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::Unknown(value) => write!(f, "Unknown({:#06x})", value),
        }
    }
}

/// IP protocol numbers (IPv4 protocol field / IPv6 next header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum IpProtocol {
    HopByHop = 0,
    Icmpv4 = 1,
    Tcp = 6,
    Udp = 17,
    Routing = 43,
    Fragment = 44,
    Icmpv6 = 58,
    NoNextHeader = 59,
    DestinationOptions = 60,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl IpProtocol {
    /// Extension headers that share the generic next-header/length layout
    pub fn is_ipv6_extension(&self) -> bool {
        matches!(
            self,
            IpProtocol::HopByHop | IpProtocol::Routing | IpProtocol::DestinationOptions
        )
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProtocol::HopByHop => write!(f, "HopByHop"),
            IpProtocol::Icmpv4 => write!(f, "ICMPv4"),
            IpProtocol::Tcp => write!(f, "TCP"),
            IpProtocol::Udp => write!(f, "UDP"),
            IpProtocol::Routing => write!(f, "Routing"),
            IpProtocol::Fragment => write!(f, "Fragment"),
            IpProtocol::Icmpv6 => write!(f, "ICMPv6"),
            IpProtocol::NoNextHeader => write!(f, "NoNextHeader"),
            IpProtocol::DestinationOptions => write!(f, "DestinationOptions"),
            IpProtocol::Unknown(value) => write!(f, "Unknown({})", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

// --- Wire layouts -----------------------------------------------------------

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EthernetRaw {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub ether_type: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LinuxSllRaw {
    pub packet_type: U16,
    pub address_type: U16,
    pub address_len: U16,
    pub address: [u8; 8],
    pub protocol: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Dot1QRaw {
    pub tci: U16,
    pub ether_type: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ArpRaw {
    pub hardware_type: U16,
    pub protocol_type: U16,
    pub hardware_len: u8,
    pub protocol_len: u8,
    pub operation: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Ipv4Raw {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_length: U16,
    pub id: U16,
    pub flags_fragment: U16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: U16,
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Ipv6Raw {
    pub version_class_flow: U32,
    pub payload_length: U16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TcpRaw {
    pub src_port: U16,
    pub dst_port: U16,
    pub seq: U32,
    pub ack: U32,
    pub data_offset: u8, // high nibble, in 32-bit words
    pub flags: u8,
    pub window: U16,
    pub checksum: U16,
    pub urgent: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct UdpRaw {
    pub src_port: U16,
    pub dst_port: U16,
    pub length: U16,
    pub checksum: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Icmpv4Raw {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: U16,
    pub rest: U32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Icmpv6Raw {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: U16,
}

/// First byte of an IPv4 header
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionIhl {
    pub ihl: B4,
    pub version: B4,
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TcpFlags {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
    pub urg: bool,
    pub ece: bool,
    pub cwr: bool,
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.fin(), "FIN"),
            (self.syn(), "SYN"),
            (self.rst(), "RST"),
            (self.psh(), "PSH"),
            (self.ack(), "ACK"),
            (self.urg(), "URG"),
            (self.ece(), "ECE"),
            (self.cwr(), "CWR"),
        ];
        let set: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|(_, name)| *name).collect();
        write!(f, "{}", set.join(","))
    }
}

// --- Decoded headers --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EthernetHeader {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ether_type: EtherType,
}

impl From<EthernetRaw> for EthernetHeader {
    fn from(raw: EthernetRaw) -> Self {
        Self {
            src: MacAddr(raw.src),
            dst: MacAddr(raw.dst),
            ether_type: EtherType::from_primitive(raw.ether_type.get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinuxSllHeader {
    pub packet_type: u16,
    pub address_type: u16,
    pub address: Vec<u8>,
    pub ether_type: EtherType,
}

impl From<LinuxSllRaw> for LinuxSllHeader {
    fn from(raw: LinuxSllRaw) -> Self {
        let len = (raw.address_len.get() as usize).min(raw.address.len());
        Self {
            packet_type: raw.packet_type.get(),
            address_type: raw.address_type.get(),
            address: raw.address[..len].to_vec(),
            ether_type: EtherType::from_primitive(raw.protocol.get()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dot1QHeader {
    pub priority: u8,
    pub drop_eligible: bool,
    pub vlan_id: u16,
    pub ether_type: EtherType,
}

impl From<Dot1QRaw> for Dot1QHeader {
    fn from(raw: Dot1QRaw) -> Self {
        let tci = raw.tci.get();
        Self {
            priority: (tci >> 13) as u8,
            drop_eligible: tci & 0x1000 != 0,
            vlan_id: tci & 0x0fff,
            ether_type: EtherType::from_primitive(raw.ether_type.get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArpHeader {
    pub hardware_type: u16,
    pub protocol_type: EtherType,
    pub operation: u16,
    pub sender_hardware: Bytes,
    pub sender_protocol: Bytes,
    pub target_hardware: Bytes,
    pub target_protocol: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub id: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub options: Bytes,
}

impl Ipv4Header {
    pub fn from_raw(raw: &Ipv4Raw, options: Bytes) -> Self {
        let version_ihl = VersionIhl::from_bytes([raw.version_ihl]);
        let flags_fragment = raw.flags_fragment.get();
        Self {
            version: version_ihl.version(),
            ihl: version_ihl.ihl(),
            tos: raw.tos,
            total_length: raw.total_length.get(),
            id: raw.id.get(),
            flags: (flags_fragment >> 13) as u8,
            fragment_offset: flags_fragment & IPV4_FRAGMENT_OFFSET_MASK,
            ttl: raw.ttl,
            protocol: IpProtocol::from_primitive(raw.protocol),
            checksum: raw.checksum.get(),
            src: Ipv4Addr::from(raw.src),
            dst: Ipv4Addr::from(raw.dst),
            options,
        }
    }

    pub fn more_fragments(&self) -> bool {
        self.flags & IPV4_FLAG_MORE_FRAGMENTS != 0
    }

    pub fn is_fragment(&self) -> bool {
        self.more_fragments() || self.fragment_offset != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: IpProtocol,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
}

impl From<Ipv6Raw> for Ipv6Header {
    fn from(raw: Ipv6Raw) -> Self {
        let word = raw.version_class_flow.get();
        Self {
            version: (word >> 28) as u8,
            traffic_class: ((word >> 20) & 0xff) as u8,
            flow_label: word & 0x000f_ffff,
            payload_length: raw.payload_length.get(),
            next_header: IpProtocol::from_primitive(raw.next_header),
            hop_limit: raw.hop_limit,
            src: Ipv6Addr::from(raw.src),
            dst: Ipv6Addr::from(raw.dst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ipv6Extension {
    pub header_type: IpProtocol,
    pub next_header: IpProtocol,
    pub length: usize, // total bytes including the first 8
}

#[derive(Debug, Clone, PartialEq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent: u16,
    pub options: Bytes,
}

impl TcpHeader {
    pub fn from_raw(raw: &TcpRaw, options: Bytes) -> Self {
        Self {
            src_port: raw.src_port.get(),
            dst_port: raw.dst_port.get(),
            seq: raw.seq.get(),
            ack: raw.ack.get(),
            data_offset: raw.data_offset >> 4,
            flags: TcpFlags::from_bytes([raw.flags]),
            window: raw.window.get(),
            checksum: raw.checksum.get(),
            urgent: raw.urgent.get(),
            options,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl From<UdpRaw> for UdpHeader {
    fn from(raw: UdpRaw) -> Self {
        Self {
            src_port: raw.src_port.get(),
            dst_port: raw.dst_port.get(),
            length: raw.length.get(),
            checksum: raw.checksum.get(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Icmpv4Header {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub id: u16,
    pub seq: u16,
}

impl From<Icmpv4Raw> for Icmpv4Header {
    fn from(raw: Icmpv4Raw) -> Self {
        let rest = raw.rest.get();
        Self {
            icmp_type: raw.icmp_type,
            code: raw.code,
            checksum: raw.checksum.get(),
            id: (rest >> 16) as u16,
            seq: (rest & 0xffff) as u16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Icmpv6Header {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

impl From<Icmpv6Raw> for Icmpv6Header {
    fn from(raw: Icmpv6Raw) -> Self {
        Self {
            icmp_type: raw.icmp_type,
            code: raw.code,
            checksum: raw.checksum.get(),
        }
    }
}

/// One successfully decoded protocol layer
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Ethernet(EthernetHeader),
    LinuxSll(LinuxSllHeader),
    Dot1Q(Dot1QHeader),
    Arp(ArpHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Ipv6Extension(Ipv6Extension),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmpv4(Icmpv4Header),
    Icmpv6(Icmpv6Header),
    /// Application bytes that no decoder claims
    Payload(Bytes),
    /// Data of a non-reassembled IPv4 fragment
    Fragment(Bytes),
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Ethernet(_) => LayerType::Ethernet,
            Layer::LinuxSll(_) => LayerType::LinuxSll,
            Layer::Dot1Q(_) => LayerType::Dot1Q,
            Layer::Arp(_) => LayerType::Arp,
            Layer::Ipv4(_) => LayerType::Ipv4,
            Layer::Ipv6(_) => LayerType::Ipv6,
            Layer::Ipv6Extension(_) => LayerType::Ipv6Extension,
            Layer::Tcp(_) => LayerType::Tcp,
            Layer::Udp(_) => LayerType::Udp,
            Layer::Icmpv4(_) => LayerType::Icmpv4,
            Layer::Icmpv6(_) => LayerType::Icmpv6,
            Layer::Payload(_) => LayerType::Payload,
            Layer::Fragment(_) => LayerType::Fragment,
        }
    }
}

fn preview(data: &Bytes) -> String {
    let shown = data.len().min(PAYLOAD_PREVIEW_LEN);
    let suffix = if data.len() > shown { "..." } else { "" };
    format!("{}{}", hex::encode(&data[..shown]), suffix)
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.layer_type();
        match self {
            Layer::Ethernet(h) => write!(f, "{} {{SrcMAC={} DstMAC={} EthernetType={}}}", name, h.src, h.dst, h.ether_type),
            Layer::LinuxSll(h) => write!(
                f,
                "{} {{PacketType={} AddrType={} Addr={} EthernetType={}}}",
                name,
                h.packet_type,
                h.address_type,
                hex::encode(&h.address),
                h.ether_type
            ),
            Layer::Dot1Q(h) => write!(
                f,
                "{} {{Priority={} DropEligible={} VLANIdentifier={} Type={}}}",
                name, h.priority, h.drop_eligible, h.vlan_id, h.ether_type
            ),
            Layer::Arp(h) => write!(
                f,
                "{} {{AddrType={} Protocol={} Operation={} SourceHwAddress={} SourceProtAddress={} DstHwAddress={} DstProtAddress={}}}",
                name,
                h.hardware_type,
                h.protocol_type,
                h.operation,
                hex::encode(&h.sender_hardware),
                hex::encode(&h.sender_protocol),
                hex::encode(&h.target_hardware),
                hex::encode(&h.target_protocol)
            ),
            Layer::Ipv4(h) => write!(
                f,
                "{} {{Version={} IHL={} TOS={} Length={} Id={} Flags={:#x} FragOffset={} TTL={} Protocol={} Checksum={} SrcIP={} DstIP={}}}",
                name,
                h.version,
                h.ihl,
                h.tos,
                h.total_length,
                h.id,
                h.flags,
                h.fragment_offset,
                h.ttl,
                h.protocol,
                h.checksum,
                h.src,
                h.dst
            ),
            Layer::Ipv6(h) => write!(
                f,
                "{} {{Version={} TrafficClass={} FlowLabel={} Length={} NextHeader={} HopLimit={} SrcIP={} DstIP={}}}",
                name, h.version, h.traffic_class, h.flow_label, h.payload_length, h.next_header, h.hop_limit, h.src, h.dst
            ),
            Layer::Ipv6Extension(h) => write!(
                f,
                "{} {{Type={} NextHeader={} Length={}}}",
                name, h.header_type, h.next_header, h.length
            ),
            Layer::Tcp(h) => write!(
                f,
                "{} {{SrcPort={} DstPort={} Seq={} Ack={} DataOffset={} Flags=[{}] Window={} Checksum={} Urgent={}}}",
                name, h.src_port, h.dst_port, h.seq, h.ack, h.data_offset, h.flags, h.window, h.checksum, h.urgent
            ),
            Layer::Udp(h) => write!(
                f,
                "{} {{SrcPort={} DstPort={} Length={} Checksum={}}}",
                name, h.src_port, h.dst_port, h.length, h.checksum
            ),
            Layer::Icmpv4(h) => write!(
                f,
                "{} {{Type={} Code={} Checksum={} Id={} Seq={}}}",
                name, h.icmp_type, h.code, h.checksum, h.id, h.seq
            ),
            Layer::Icmpv6(h) => write!(
                f,
                "{} {{Type={} Code={} Checksum={}}}",
                name, h.icmp_type, h.code, h.checksum
            ),
            Layer::Payload(data) | Layer::Fragment(data) => {
                write!(f, "{} {{{} bytes: {}}}", name, data.len(), preview(data))
            }
        }
    }
}
