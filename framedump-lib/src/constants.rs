// Header sizes and protocol numbers used by the layer decoders

/// Ethernet II header: destination, source, EtherType
pub const ETHERNET_HEADER_SIZE: usize = 14;

/// Linux "cooked" capture (SLL) header
pub const LINUX_SLL_HEADER_SIZE: usize = 16;

/// 802.1Q tag: TCI + encapsulated EtherType
pub const DOT1Q_HEADER_SIZE: usize = 4;

/// Fixed part of an ARP header, before the variable-length addresses
pub const ARP_FIXED_SIZE: usize = 8;

/// IPv4 header without options
pub const IPV4_MIN_HEADER_SIZE: usize = 20;

/// IPv6 fixed header
pub const IPV6_HEADER_SIZE: usize = 40;

/// Minimum size of an IPv6 extension header (next header + length + 6 bytes)
pub const IPV6_EXT_MIN_SIZE: usize = 8;

/// IPv6 fragment header: next header, reserved, offset and flags, identification
pub const IPV6_FRAGMENT_HEADER_SIZE: usize = 8;

/// 13-bit fragment offset in the upper bits of the IPv6 offset/flags word
pub const IPV6_FRAGMENT_OFFSET_MASK: u16 = 0xfff8;

/// IPv6 "more fragments" bit
pub const IPV6_FLAG_MORE_FRAGMENTS: u16 = 0x0001;

/// TCP header without options
pub const TCP_MIN_HEADER_SIZE: usize = 20;

pub const UDP_HEADER_SIZE: usize = 8;

/// ICMPv4 type, code, checksum and the 4-byte rest-of-header
pub const ICMPV4_HEADER_SIZE: usize = 8;

/// ICMPv6 type, code, checksum
pub const ICMPV6_HEADER_SIZE: usize = 4;

/// IPv4 "more fragments" bit of the 3-bit flags field
pub const IPV4_FLAG_MORE_FRAGMENTS: u8 = 0b001;

/// Mask for the 13-bit IPv4 fragment offset
pub const IPV4_FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

/// Bytes shown per line by the raw hex dump
pub const HEX_DUMP_WIDTH: usize = 16;

/// Application bytes previewed in a payload summary
pub const PAYLOAD_PREVIEW_LEN: usize = 16;
