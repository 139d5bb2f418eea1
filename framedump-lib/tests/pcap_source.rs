//! Capture file replay through `PcapSource`

mod common;

use chrono::DateTime;
use common::*;
use framedump_lib::PcapSource;
use std::io::Cursor;

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_NANOS: u32 = 0xa1b2_3c4d;

/// Legacy little-endian pcap, microsecond timestamps, Ethernet link type
fn legacy_pcap(records: &[(u32, u32, &[u8], u32)]) -> Vec<u8> {
    legacy_pcap_with_magic(MAGIC_MICROS, records)
}

/// Legacy little-endian pcap; `magic` picks micro or nanosecond timestamps
fn legacy_pcap_with_magic(magic: u32, records: &[(u32, u32, &[u8], u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    for (ts_sec, ts_usec, data, origlen) in records {
        out.extend_from_slice(&ts_sec.to_le_bytes());
        out.extend_from_slice(&ts_usec.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&origlen.to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

fn ng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let padded = body.len().div_ceil(4) * 4;
    let total = (12 + padded) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(&block_type.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(body);
    out.resize(8 + padded, 0);
    out.extend_from_slice(&total.to_le_bytes());
    out
}

/// pcapng section with one Ethernet interface and one enhanced packet per
/// record; timestamps are in the default microsecond resolution
fn pcapng(records: &[(u64, &[u8], u32)]) -> Vec<u8> {
    pcapng_with_options(&[], records)
}

/// One pcapng option, value padded to 32 bits
fn ng_option(code: u16, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&code.to_le_bytes());
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
    out.resize(4 + value.len().div_ceil(4) * 4, 0);
    out
}

/// Like `pcapng`, with the given options on the interface description
fn pcapng_with_options(idb_options: &[Vec<u8>], records: &[(u64, &[u8], u32)]) -> Vec<u8> {
    let mut shb = Vec::new();
    shb.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
    shb.extend_from_slice(&1u16.to_le_bytes());
    shb.extend_from_slice(&0u16.to_le_bytes());
    shb.extend_from_slice(&(-1i64).to_le_bytes());
    let mut out = ng_block(0x0a0d_0d0a, &shb);

    let mut idb = Vec::new();
    idb.extend_from_slice(&1u16.to_le_bytes());
    idb.extend_from_slice(&0u16.to_le_bytes());
    idb.extend_from_slice(&0u32.to_le_bytes());
    if !idb_options.is_empty() {
        for option in idb_options {
            idb.extend_from_slice(option);
        }
        idb.extend(ng_option(0, &[]));
    }
    out.extend(ng_block(1, &idb));

    for (ts, data, origlen) in records {
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&((ts >> 32) as u32).to_le_bytes());
        epb.extend_from_slice(&(*ts as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(&origlen.to_le_bytes());
        epb.extend_from_slice(data);
        epb.resize(20 + data.len().div_ceil(4) * 4, 0);
        out.extend(ng_block(6, &epb));
    }
    out
}

fn read_all(source: &mut PcapSource) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame().expect("capture should parse") {
        frames.push(frame);
    }
    frames
}

#[test]
fn test_legacy_pcap_frames() {
    let full = udp_frame(b"hello");
    let cut = &full[..30];
    let capture = legacy_pcap(&[
        (1_700_000_000, 250_000, full.as_slice(), full.len() as u32),
        (1_700_000_001, 0, cut, full.len() as u32),
    ]);

    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcap");
    let frames = read_all(&mut source);

    assert_eq!(frames.len(), 2);
    assert_eq!(source.frames_read(), 2);
    assert_eq!(source.linktype(0), Some(1));

    assert_eq!(frames[0].data().as_ref(), full.as_slice());
    assert!(!frames[0].is_truncated());
    assert_eq!(
        frames[0].info().timestamp,
        DateTime::from_timestamp(1_700_000_000, 250_000_000)
    );

    assert!(frames[1].is_truncated());
    assert_eq!(frames[1].info().capture_length, 30);
    assert_eq!(frames[1].info().wire_length, 47);
}

#[test]
fn test_pcapng_frames() {
    let full = udp_frame(b"hello");
    let capture = pcapng(&[
        (1_700_000_000_123_456, full.as_slice(), full.len() as u32),
        (1_700_000_001_000_000, &full[..20], 60),
    ]);

    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcapng");
    let frames = read_all(&mut source);

    assert_eq!(frames.len(), 2);
    assert_eq!(source.linktype(0), Some(1));
    assert_eq!(frames[0].len(), 47);
    assert_eq!(frames[0].info().interface_index, 0);
    assert_eq!(
        frames[0].info().timestamp,
        DateTime::from_timestamp(1_700_000_000, 123_456_000)
    );
    assert!(frames[1].is_truncated());
    assert_eq!(frames[1].info().wire_length, 60);
}

#[test]
fn test_garbage_is_rejected() {
    let result = PcapSource::from_reader(Cursor::new(vec![0x42u8; 64]));
    assert!(matches!(result, Err(DumpError::Capture(_))));
}

#[test]
fn test_empty_capture_is_exhausted() {
    let mut source = PcapSource::from_reader(Cursor::new(legacy_pcap(&[]))).expect("valid pcap");
    assert!(source.next_frame().expect("no parse error").is_none());
    assert_eq!(source.frames_read(), 0);
}

#[test]
fn test_driver_over_capture() {
    let full = udp_frame(b"hello");
    let lldp = lldp_frame();
    let capture = legacy_pcap(&[
        (1, 0, full.as_slice(), 47),
        (2, 0, lldp.as_slice(), 22),
        (3, 0, &full[..40], 47),
    ]);

    let driver = Driver::new(quiet_config(1000)).expect("valid configuration");
    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcap");
    let mut data = Vec::new();
    let mut diagnostics = Vec::new();
    let summary = driver
        .run(&mut source, &mut data, &mut diagnostics)
        .expect("run should succeed");

    assert_eq!(summary.end, EndReason::Exhausted);
    assert_eq!(summary.stats.processed, 3);
    assert_eq!(summary.stats.total_bytes, 47 + 22 + 40);
    assert_eq!(summary.stats.truncated, 1);
    // LLDP is undecodable; the cut frame loses its UDP header
    assert_eq!(summary.stats.errors, 2);
}

#[test]
fn test_rendered_timestamp() {
    let full = udp_frame(b"hello");
    let capture = legacy_pcap(&[(1_700_000_000, 42, full.as_slice(), 1514)]);

    let config = RunConfig {
        report_every: 1000,
        ..RunConfig::default()
    };
    let driver = Driver::new(config).expect("valid configuration");
    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcap");
    let mut data = Vec::new();
    driver
        .run(&mut source, &mut data, &mut std::io::sink())
        .expect("run should succeed");

    let text = String::from_utf8(data).expect("utf8 data");
    assert!(text.starts_with(
        "PACKET: 47 bytes, truncated, wire length 1514 cap length 47 @ 2023-11-14T22:13:20.000042Z\n"
    ));
}

#[test]
fn test_pcapng_timestamp_resolution_and_offset() {
    let full = udp_frame(b"hello");
    // if_tsresol 9 (nanoseconds), if_tsoffset 1000 seconds
    let options = [ng_option(9, &[9]), ng_option(14, &1000i64.to_le_bytes())];
    let capture = pcapng_with_options(
        &options,
        &[(1_700_000_000_000_000_005, full.as_slice(), full.len() as u32)],
    );

    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcapng");
    let frames = read_all(&mut source);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].info().timestamp, DateTime::from_timestamp(1_700_001_000, 5));
}

#[test]
fn test_legacy_nanosecond_magic() {
    let full = udp_frame(b"hello");
    let capture = legacy_pcap_with_magic(
        MAGIC_NANOS,
        &[(1_700_000_000, 123_456_789, full.as_slice(), full.len() as u32)],
    );

    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcap");
    let frames = read_all(&mut source);

    assert_eq!(frames.len(), 1);
    assert_eq!(
        frames[0].info().timestamp,
        DateTime::from_timestamp(1_700_000_000, 123_456_789)
    );
}

#[test]
fn test_record_larger_than_reader_buffer() {
    let mut jumbo = udp_frame(b"hello");
    jumbo.resize(70_000, 0xab);
    let small = udp_frame(b"after");
    let capture = legacy_pcap(&[
        (1, 0, jumbo.as_slice(), jumbo.len() as u32),
        (2, 0, small.as_slice(), small.len() as u32),
    ]);

    let driver = Driver::new(quiet_config(1000)).expect("valid configuration");
    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcap");
    let summary = driver
        .run(&mut source, &mut Vec::<u8>::new(), &mut Vec::<u8>::new())
        .expect("run should succeed");

    assert_eq!(summary.end, EndReason::Exhausted);
    assert_eq!(summary.stats.processed, 2);
    assert_eq!(summary.stats.total_bytes, 70_000 + 47);
    assert_eq!(source.frames_read(), 2);
}

#[test]
fn test_capture_cut_mid_record_fails_source() {
    let full = udp_frame(b"hello");
    let mut capture = legacy_pcap(&[(1, 0, full.as_slice(), 47)]);
    // Record header promising 47 bytes, followed by only 20
    capture.extend_from_slice(&2u32.to_le_bytes());
    capture.extend_from_slice(&0u32.to_le_bytes());
    capture.extend_from_slice(&47u32.to_le_bytes());
    capture.extend_from_slice(&47u32.to_le_bytes());
    capture.extend_from_slice(&full[..20]);

    let driver = Driver::new(quiet_config(1)).expect("valid configuration");
    let mut source = PcapSource::from_reader(Cursor::new(capture)).expect("valid pcap");
    let mut diagnostics = Vec::new();
    let summary = driver
        .run(&mut source, &mut Vec::<u8>::new(), &mut diagnostics)
        .expect("run should succeed");

    assert_eq!(summary.stats.processed, 1);
    assert_eq!(summary.stats.total_bytes, 47);
    assert_eq!(summary.reports, 1);
    match summary.end {
        EndReason::SourceFailed(msg) => assert!(msg.contains("truncated mid-block")),
        other => panic!("Expected SourceFailed, got {:?}", other),
    }
}
