//! Text rendering of decoded packets and raw bytes. Pure formatting only.

use std::fmt::Write;

use crate::constants::HEX_DUMP_WIDTH;
use crate::layer::LayerType;
use crate::packet::DecodedPacket;

fn header_line(packet: &DecodedPacket) -> String {
    let info = packet.info();
    let mut line = format!("PACKET: {} bytes", packet.data().len());
    if info.truncated {
        line.push_str(", truncated");
    }
    if info.wire_length != info.capture_length {
        let _ = write!(line, ", wire length {} cap length {}", info.wire_length, info.capture_length);
    }
    if let Some(ts) = info.timestamp {
        let _ = write!(line, " @ {}", ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true));
    }
    line
}

/// One line per layer, with the error layer (if any) last.
pub fn render_packet(packet: &DecodedPacket) -> String {
    let mut out = header_line(packet);
    out.push('\n');
    for (i, layer) in packet.layers().iter().enumerate() {
        let _ = writeln!(out, "- Layer {} ({} bytes) = {}", i + 1, layer.contents.len(), layer.layer);
    }
    if let Some(err) = packet.error_layer() {
        let _ = writeln!(
            out,
            "- Layer {} ({} bytes) = {} {{{}}}",
            packet.layers().len() + 1,
            err.contents.len(),
            LayerType::DecodeFailure,
            err.message()
        );
    }
    out
}

/// Full packet hex dump followed by every layer and the bytes it covers.
pub fn render_dump(packet: &DecodedPacket) -> String {
    let mut out = header_line(packet);
    out.push('\n');
    let _ = writeln!(out, "-- FULL PACKET DATA ({} bytes) ------------------------------------", packet.data().len());
    out.push_str(&render_raw(packet.data()));
    for (i, layer) in packet.layers().iter().enumerate() {
        let _ = writeln!(out, "--- Layer {} ---", i + 1);
        let _ = writeln!(out, "{}", layer.layer);
        out.push_str(&render_raw(&layer.contents));
    }
    if let Some(err) = packet.error_layer() {
        let _ = writeln!(out, "--- Layer {} ---", packet.layers().len() + 1);
        let _ = writeln!(out, "{} {{{}}}", LayerType::DecodeFailure, err.message());
        out.push_str(&render_raw(&err.contents));
    }
    out
}

/// Canonical hex dump: offset, 16 bytes in two groups of 8, ASCII column.
///
/// ```text
/// 00000000  47 45 54 20 2f 20 48 54  54 50 2f 31 2e 31 0d 0a  |GET / HTTP/1.1..|
/// ```
pub fn render_raw(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);
    for (line, chunk) in data.chunks(HEX_DUMP_WIDTH).enumerate() {
        let _ = write!(out, "{:08x}  ", line * HEX_DUMP_WIDTH);
        for i in 0..HEX_DUMP_WIDTH {
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
            if i == HEX_DUMP_WIDTH / 2 - 1 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' }));
        out.push_str("|\n");
    }
    out
}
