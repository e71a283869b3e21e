//! Marker bytes and integer codecs for both AMF generations.
//!
//! Everything in here is a pure function or a constant; the stateful parts
//! of the codec live in [`crate::de`] and [`crate::ser`].

/// Largest integer that travels with the AMF3 integer marker.
pub const MAX_INTEGER: i64 = (1 << 28) - 1;
/// Smallest integer that travels with the AMF3 integer marker.
pub const MIN_INTEGER: i64 = -(1 << 28);

/// Largest unsigned value a U29 can carry.
pub const MAX_U29: u32 = (1 << 29) - 1;

/// AMF0 type markers.
pub mod amf0 {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const MOVIE_CLIP: u8 = 0x04; // reserved, never valid on the wire
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const REFERENCE: u8 = 0x07;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
    pub const UNSUPPORTED: u8 = 0x0D;
    pub const RECORD_SET: u8 = 0x0E; // reserved, never valid on the wire
    pub const XML_DOCUMENT: u8 = 0x0F;
    pub const TYPED_OBJECT: u8 = 0x10;
    /// Switches the rest of the value to AMF3.
    pub const AVMPLUS: u8 = 0x11;
}

/// AMF3 type markers.
pub mod amf3 {
    pub const UNDEFINED: u8 = 0x00;
    pub const NULL: u8 = 0x01;
    pub const FALSE: u8 = 0x02;
    pub const TRUE: u8 = 0x03;
    pub const INTEGER: u8 = 0x04;
    pub const DOUBLE: u8 = 0x05;
    pub const STRING: u8 = 0x06;
    pub const XML_DOC: u8 = 0x07;
    pub const DATE: u8 = 0x08;
    pub const ARRAY: u8 = 0x09;
    pub const OBJECT: u8 = 0x0A;
    pub const XML: u8 = 0x0B;
    pub const BYTE_ARRAY: u8 = 0x0C;

    /// U29 header of the empty string; also closes dynamic members and
    /// the associative part of an array.
    pub const EMPTY_STRING: u8 = 0x01;
}

/// Returns true if `value` fits the AMF3 integer range.
pub fn fits_integer(value: i64) -> bool {
    (MIN_INTEGER..=MAX_INTEGER).contains(&value)
}

/// Reinterprets a raw U29 as a 29-bit two's-complement integer.
pub fn u29_to_i29(raw: u32) -> i32 {
    let raw = raw & MAX_U29;
    if raw as i64 > MAX_INTEGER {
        raw as i32 - (1 << 29)
    } else {
        raw as i32
    }
}

/// Converts an in-range integer to its raw U29 form.
pub fn i29_to_u29(value: i32) -> u32 {
    (value as u32) & MAX_U29
}

/// Encodes a U29 into `out`, returning the number of bytes used (1-4).
///
/// Values above [`MAX_U29`] are truncated to 29 bits.
pub fn encode_u29(value: u32, out: &mut [u8; 4]) -> usize {
    let value = value & MAX_U29;
    if value < 0x80 {
        out[0] = value as u8;
        1
    } else if value < 0x4000 {
        out[0] = ((value >> 7) as u8) | 0x80;
        out[1] = (value & 0x7F) as u8;
        2
    } else if value < 0x20_0000 {
        out[0] = ((value >> 14) as u8) | 0x80;
        out[1] = (((value >> 7) & 0x7F) as u8) | 0x80;
        out[2] = (value & 0x7F) as u8;
        3
    } else {
        // the fourth byte carries a full 8 bits
        out[0] = ((value >> 22) as u8) | 0x80;
        out[1] = (((value >> 15) & 0x7F) as u8) | 0x80;
        out[2] = (((value >> 8) & 0x7F) as u8) | 0x80;
        out[3] = (value & 0xFF) as u8;
        4
    }
}

/// Decodes a U29 from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// slice ends before the integer does.
pub fn decode_u29(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for (i, &byte) in bytes.iter().take(4).enumerate() {
        if i == 3 {
            return Some(((value << 8) | byte as u32, 4));
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u32) -> Vec<u8> {
        let mut buf = [0u8; 4];
        let n = encode_u29(value, &mut buf);
        buf[..n].to_vec()
    }

    #[test]
    fn test_u29_byte_boundaries() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(0x7F), vec![0x7F]);
        assert_eq!(encoded(0x80), vec![0x81, 0x00]);
        assert_eq!(encoded(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encoded(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encoded(0x1F_FFFF), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(encoded(0x20_0000), vec![0x80, 0xC0, 0x80, 0x00]);
        assert_eq!(encoded(MAX_U29), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_u29_decode_matches_encode() {
        for value in [0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000, MAX_U29] {
            let bytes = encoded(value);
            assert_eq!(decode_u29(&bytes), Some((value, bytes.len())));
        }
    }

    #[test]
    fn test_u29_truncated() {
        assert_eq!(decode_u29(&[]), None);
        assert_eq!(decode_u29(&[0x81]), None);
        assert_eq!(decode_u29(&[0xFF, 0xFF, 0xFF]), None);
    }

    #[test]
    fn test_signed_range() {
        assert_eq!(u29_to_i29(i29_to_u29(MAX_INTEGER as i32)), MAX_INTEGER as i32);
        assert_eq!(u29_to_i29(i29_to_u29(MIN_INTEGER as i32)), MIN_INTEGER as i32);
        assert_eq!(u29_to_i29(i29_to_u29(-1)), -1);
        assert_eq!(encoded(i29_to_u29(MAX_INTEGER as i32)), vec![0xBF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encoded(i29_to_u29(MIN_INTEGER as i32)), vec![0xC0, 0x80, 0x80, 0x00]);
    }

    #[test]
    fn test_fits_integer() {
        assert!(fits_integer(MAX_INTEGER));
        assert!(fits_integer(MIN_INTEGER));
        assert!(!fits_integer(MAX_INTEGER + 1));
        assert!(!fits_integer(MIN_INTEGER - 1));
    }
}
