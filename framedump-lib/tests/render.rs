//! Text output: packet rendering, hex dumps and progress reports

mod common;

use common::*;
use framedump_lib::classify;
use framedump_lib::registry;
use framedump_lib::render::{render_packet, render_raw};
use framedump_lib::report::{Reporter, report_line, should_report};
use framedump_lib::stats::{RunState, StatsSnapshot};
use std::time::{Duration, Instant};

#[test]
fn test_render_udp_packet() {
    let packet = registry::resolve("Ethernet")
        .expect("Ethernet decoder")
        .decode(Bytes::from(udp_frame(b"hello")));

    let expected = "PACKET: 47 bytes\n\
        - Layer 1 (14 bytes) = Ethernet {SrcMAC=66:77:88:99:aa:bb DstMAC=00:11:22:33:44:55 EthernetType=IPv4}\n\
        - Layer 2 (20 bytes) = IPv4 {Version=4 IHL=5 TOS=0 Length=33 Id=1 Flags=0x0 FragOffset=0 TTL=64 Protocol=UDP Checksum=0 SrcIP=192.168.0.1 DstIP=192.168.0.2}\n\
        - Layer 3 (8 bytes) = UDP {SrcPort=53 DstPort=5000 Length=13 Checksum=0}\n\
        - Layer 4 (5 bytes) = Payload {5 bytes: 68656c6c6f}\n";
    assert_eq!(render_packet(&packet), expected);
}

#[test]
fn test_render_truncated_header() {
    let frame = Frame::with_wire_length(udp_frame(b"hello"), 60);
    let packet = registry::resolve("Ethernet")
        .expect("Ethernet decoder")
        .decode_frame(&frame);

    let rendered = render_packet(&packet);
    assert!(rendered.starts_with("PACKET: 47 bytes, truncated, wire length 60 cap length 47\n"));
}

#[test]
fn test_truncation_flag_from_source() {
    // Wire length unknown, but the source knows the capture was cut short
    let frame = Frame::new(udp_frame(b"hello")).mark_truncated(true);
    let packet = registry::resolve("Ethernet")
        .expect("Ethernet decoder")
        .decode_frame(&frame);

    let classification = classify::classify(&frame, &packet);
    assert!(classification.truncated);
    assert!(classification.error.is_none());
    assert!(render_packet(&packet).starts_with("PACKET: 47 bytes, truncated\n"));
}

#[test]
fn test_render_raw() {
    assert_eq!(render_raw(&[]), "");
    assert_eq!(
        render_raw(b"GET / HTTP/1.1\r\nHost: x\r\n"),
        "00000000  47 45 54 20 2f 20 48 54  54 50 2f 31 2e 31 0d 0a  |GET / HTTP/1.1..|\n\
         00000010  48 6f 73 74 3a 20 78 0d  0a                       |Host: x..|\n"
    );
}

#[test]
fn test_render_raw_exact_line() {
    let data: Vec<u8> = (0x30..0x40).collect();
    assert_eq!(
        render_raw(&data),
        "00000000  30 31 32 33 34 35 36 37  38 39 3a 3b 3c 3d 3e 3f  |0123456789:;<=>?|\n"
    );
}

#[test]
fn test_report_line() {
    let snapshot = StatsSnapshot {
        processed: 1000,
        total_bytes: 64_000,
        elapsed: Duration::from_millis(1500),
        errors: 3,
        truncated: 7,
    };
    assert_eq!(
        report_line(&snapshot),
        "Processed 1000 packets (64000 bytes) in 1.5s, 3 errors and 7 truncated packets"
    );
}

#[test]
fn test_should_report() {
    assert!(should_report(1000, 1000, false));
    assert!(!should_report(999, 1000, false));
    assert!(should_report(999, 1000, true));
    assert!(should_report(1, 1, false));
    assert!(!should_report(5, 0, false));
}

#[test]
fn test_reporter_counts_emitted_reports() {
    let mut reporter = Reporter::new(ReportFormat::Text);
    let mut out = Vec::new();
    let snapshot = RunState::new().snapshot();

    reporter.emit(&mut out, &snapshot).expect("write to Vec");
    reporter.emit(&mut out, &snapshot).expect("write to Vec");

    assert_eq!(reporter.emitted(), 2);
    let text = String::from_utf8(out).expect("utf8 report");
    assert_eq!(text.lines().count(), 2);
    assert!(text.starts_with("Processed 0 packets (0 bytes) in "));
}

#[test]
fn test_json_snapshot() {
    let snapshot = StatsSnapshot {
        processed: 2,
        total_bytes: 128,
        elapsed: Duration::from_millis(250),
        errors: 0,
        truncated: 1,
    };
    let line = Reporter::new(ReportFormat::Json).format(&snapshot).expect("serializable");
    assert_eq!(
        line,
        r#"{"processed":2,"total_bytes":128,"elapsed_secs":0.25,"errors":0,"truncated":1}"#
    );
}

#[test]
fn test_run_state_counters() {
    let start = Instant::now();
    let mut state = RunState::started_at(start);
    state.record_frame(60);
    state.record_frame(1514);
    state.record_error();
    state.record_truncated();

    let snapshot = state.snapshot_at(start + Duration::from_secs(2));
    assert_eq!(snapshot.processed, 2);
    assert_eq!(snapshot.total_bytes, 1574);
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.truncated, 1);
    assert_eq!(snapshot.elapsed, Duration::from_secs(2));

    // A clock reading before the start never goes negative
    assert_eq!(state.snapshot_at(start).elapsed, Duration::ZERO);
}
