//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use perfstream::encoding::{RecordLayout, FRAME_HEADER_SIZE};
use perfstream::{Scalar, ScalarKind};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// `Instant` at `seconds` past the epoch
pub fn at(seconds: i64) -> Scalar {
    Scalar::unix(seconds).expect("timestamp in range")
}

/// Split a fetch response into its frame payloads
pub fn split_frames(mut bytes: &[u8]) -> Vec<&[u8]> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        assert!(bytes.len() >= FRAME_HEADER_SIZE, "truncated frame header");
        let (header, rest) = bytes.split_at(FRAME_HEADER_SIZE);
        let length = u32::from_le_bytes(header.try_into().unwrap()) as usize;
        assert!(rest.len() >= length, "truncated frame payload");
        let (payload, rest) = rest.split_at(length);
        frames.push(payload);
        bytes = rest;
    }
    frames
}

/// Decode one frame payload written with the given kinds
pub fn decode(payload: &[u8], y_kind: ScalarKind) -> Vec<(Scalar, Scalar)> {
    RecordLayout::new(ScalarKind::Instant, y_kind)
        .unwrap()
        .decode_all(payload)
        .unwrap()
}

/// Y values of a decoded frame as `f64`
pub fn y_values(records: &[(Scalar, Scalar)]) -> Vec<f64> {
    records.iter().map(|(_, y)| y.as_f64()).collect()
}
