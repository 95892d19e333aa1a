//! # Shape encoding/decoding
//!
//! Edge geometry too bulky for explicit shape points is stored as a
//! polyline5 string: each point is a (lat, lon) delta against the previous
//! point, each delta a signed varint in 5-bit groups, LSB first, with a
//! continuation bit and a `+63` ASCII shift per byte, at a scale of 1e-5
//! degrees per unit.

use geo::{Coord, coord};
use thiserror::Error;

const DECODE_PRECISION: f64 = 1e-5;

/// The ASCII shift applied to every encoded byte.
const ASCII_SHIFT: u8 = 63;

/// Continuation bit within a decoded 5-bit group.
const CONTINUATION_BIT: u32 = 0x20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeCodecError {
    #[error("The encoded polyline ends in the middle of a delta.")]
    Truncated,
    #[error("The encoded polyline contains a byte below the ASCII shift.")]
    InvalidByte,
    #[error("A delta in the encoded polyline overflows 32 bits.")]
    Overflow,
}

/// Decodes a polyline5 string into coordinates in degrees.
///
/// # Errors
///
/// Decoding fails on truncated or out-of-alphabet input; see
/// [`ShapeCodecError`].
pub fn decode_polyline5(encoded: &str) -> Result<Vec<Coord>, ShapeCodecError> {
    let bytes = encoded.as_bytes();
    // Most deltas are short, so a point roughly every four bytes.
    let mut coords = Vec::with_capacity(bytes.len() / 4 + 1);
    let mut index = 0;
    let mut lat: i32 = 0;
    let mut lon: i32 = 0;
    while index < bytes.len() {
        lat = lat.wrapping_add(next_delta(bytes, &mut index)?);
        lon = lon.wrapping_add(next_delta(bytes, &mut index)?);
        coords.push(coord! {
            x: f64::from(lon) * DECODE_PRECISION,
            y: f64::from(lat) * DECODE_PRECISION,
        });
    }
    Ok(coords)
}

#[allow(clippy::cast_possible_wrap)]
fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i32, ShapeCodecError> {
    let mut result: u32 = 0;
    let mut shift = 0;
    loop {
        let Some(&raw) = bytes.get(*index) else {
            return Err(ShapeCodecError::Truncated);
        };
        *index += 1;
        let group = u32::from(raw.checked_sub(ASCII_SHIFT).ok_or(ShapeCodecError::InvalidByte)?);
        if shift >= 32 {
            return Err(ShapeCodecError::Overflow);
        }
        result |= (group & 0x1f) << shift;
        shift += 5;
        if group < CONTINUATION_BIT {
            break;
        }
    }
    let value = if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Ok(value as i32)
}

/// Encodes coordinates (degrees) as a polyline5 string.
///
/// Inputs are rounded to the 1e-5 degree grid; grid-aligned points survive
/// an encode/decode round trip exactly.
pub fn encode_polyline5(coords: &[Coord]) -> String {
    let mut out = String::with_capacity(coords.len() * 4);
    let mut prev_lat: i32 = 0;
    let mut prev_lon: i32 = 0;
    for coord in coords {
        #[allow(clippy::cast_possible_truncation)]
        let lat = (coord.y / DECODE_PRECISION).round() as i32;
        #[allow(clippy::cast_possible_truncation)]
        let lon = (coord.x / DECODE_PRECISION).round() as i32;
        write_delta(&mut out, lat.wrapping_sub(prev_lat));
        write_delta(&mut out, lon.wrapping_sub(prev_lon));
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn write_delta(out: &mut String, delta: i32) {
    #[allow(clippy::cast_sign_loss)]
    let mut value = (delta.wrapping_shl(1) ^ (delta >> 31)) as u32;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut group = (value & 0x1f) as u8;
        value >>= 5;
        if value != 0 {
            group |= 0x20;
        }
        out.push(char::from(group + ASCII_SHIFT));
        if value == 0 {
            break;
        }
    }
}
