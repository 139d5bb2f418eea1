//! Common test utilities and shared imports

// Shared across several test files; not every item is used in each
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use framedump_lib::driver::{Driver, EndReason, RunSummary};
#[allow(unused_imports)]
pub use framedump_lib::error::DumpError;
#[allow(unused_imports)]
pub use framedump_lib::frame::Frame;
#[allow(unused_imports)]
pub use framedump_lib::source::{FrameSource, MemorySource};
#[allow(unused_imports)]
pub use framedump_lib::{RunConfig, report::ReportFormat};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

#[allow(dead_code)]
pub const ETH_HEADER_IPV4: &str = "00112233445566778899aabb0800";

/// Ethernet/IPv4/UDP frame carrying `payload`, 42 + payload bytes long
#[allow(dead_code)]
pub fn udp_frame(payload: &[u8]) -> Vec<u8> {
    let ip_len = (20 + 8 + payload.len()) as u16;
    let udp_len = (8 + payload.len()) as u16;

    let mut frame = hex::decode(ETH_HEADER_IPV4).expect("Failed to decode hex");
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&ip_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00]);
    frame.extend_from_slice(&[192, 168, 0, 1, 192, 168, 0, 2]);
    frame.extend_from_slice(&[0x00, 0x35, 0x13, 0x88]);
    frame.extend_from_slice(&udp_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

/// Ethernet frame with an EtherType the registry cannot decode (LLDP)
#[allow(dead_code)]
pub fn lldp_frame() -> Vec<u8> {
    hex::decode("0180c200000e66778899aabb88cc0207046677889900").expect("Failed to decode hex")
}

/// Configuration with rendering off, reporting every `report_every` frames
#[allow(dead_code)]
pub fn quiet_config(report_every: u64) -> RunConfig {
    RunConfig {
        render_packets: false,
        report_every,
        ..RunConfig::default()
    }
}

/// Run `config` over `frames`, returning the summary and both output channels
#[allow(dead_code)]
pub fn run_frames(config: RunConfig, frames: Vec<Frame>) -> (RunSummary, String, String, MemorySource) {
    let driver = Driver::new(config).expect("valid configuration");
    let mut source = MemorySource::new(frames);
    let mut data = Vec::new();
    let mut diagnostics = Vec::new();
    let summary = driver
        .run(&mut source, &mut data, &mut diagnostics)
        .expect("run should succeed");
    (
        summary,
        String::from_utf8(data).expect("utf8 data"),
        String::from_utf8(diagnostics).expect("utf8 diagnostics"),
        source,
    )
}

/// Lines of the diagnostics channel that are progress reports
#[allow(dead_code)]
pub fn report_lines(diagnostics: &str) -> Vec<&str> {
    diagnostics.lines().filter(|l| l.starts_with("Processed ")).collect()
}
