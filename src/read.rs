//! Byte sources for the decoder.
//!
//! [`IoSource`] pulls from any [`std::io::Read`]; [`SliceSource`] walks an
//! in-memory buffer without copying until a value needs to own its bytes.
//! Both report the number of bytes consumed so far, which ends up in
//! every [`crate::DecodeError`].

use std::io::{self, Read};

use crate::error::DecodeErrorKind;
use crate::wire::decode_u29;

type Step<T> = Result<T, DecodeErrorKind>;

fn io_error(e: io::Error) -> DecodeErrorKind {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DecodeErrorKind::TruncatedInput
    } else {
        DecodeErrorKind::Io(e)
    }
}

/// Input consumed by the decoder. Multi-byte fields are big-endian.
pub trait Source {
    /// Bytes consumed so far.
    fn offset(&self) -> usize;

    fn read_u8(&mut self) -> Step<u8>;

    /// Reads exactly `len` bytes.
    fn read_vec(&mut self, len: usize) -> Step<Vec<u8>>;

    /// True once no byte is left. May block on a streaming source.
    fn at_end(&mut self) -> Step<bool>;

    fn read_array<const N: usize>(&mut self) -> Step<[u8; N]> {
        let mut buf = [0u8; N];
        for byte in buf.iter_mut() {
            *byte = self.read_u8()?;
        }
        Ok(buf)
    }

    fn read_string(&mut self, len: usize) -> Step<String> {
        String::from_utf8(self.read_vec(len)?).map_err(|_| DecodeErrorKind::InvalidUtf8)
    }

    fn read_u16(&mut self) -> Step<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    fn read_i16(&mut self) -> Step<i16> {
        self.read_array().map(i16::from_be_bytes)
    }

    fn read_u32(&mut self) -> Step<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    fn read_f64(&mut self) -> Step<f64> {
        self.read_array().map(f64::from_be_bytes)
    }

    fn read_u29(&mut self) -> Step<u32> {
        let mut buf = [0u8; 4];
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.read_u8()?;
            if i < 3 && *slot & 0x80 == 0 {
                break;
            }
        }
        decode_u29(&buf)
            .map(|(value, _)| value)
            .ok_or(DecodeErrorKind::TruncatedInput)
    }
}

/// Streaming source over any reader.
pub struct IoSource<R> {
    reader: R,
    offset: usize,
    peeked: Option<u8>,
}

impl<R: Read> IoSource<R> {
    pub fn new(reader: R) -> Self {
        IoSource {
            reader,
            offset: 0,
            peeked: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Source for IoSource<R> {
    fn offset(&self) -> usize {
        self.offset
    }

    fn read_u8(&mut self) -> Step<u8> {
        let byte = match self.peeked.take() {
            Some(byte) => byte,
            None => {
                let mut buf = [0u8; 1];
                self.reader.read_exact(&mut buf).map_err(io_error)?;
                buf[0]
            }
        };
        self.offset += 1;
        Ok(byte)
    }

    fn read_vec(&mut self, len: usize) -> Step<Vec<u8>> {
        let mut out = Vec::new();
        if len == 0 {
            return Ok(out);
        }
        let mut remaining = len;
        if let Some(byte) = self.peeked.take() {
            out.push(byte);
            remaining -= 1;
        }
        // grow as bytes arrive instead of trusting the length up front
        (&mut self.reader)
            .take(remaining as u64)
            .read_to_end(&mut out)
            .map_err(io_error)?;
        if out.len() < len {
            self.offset += out.len();
            return Err(DecodeErrorKind::TruncatedInput);
        }
        self.offset += len;
        Ok(out)
    }

    fn at_end(&mut self) -> Step<bool> {
        if self.peeked.is_some() {
            return Ok(false);
        }
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.peeked = Some(buf[0]);
                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            }
        }
    }
}

/// Cursor over a byte slice.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Step<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeErrorKind::TruncatedInput)?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

impl Source for SliceSource<'_> {
    fn offset(&self) -> usize {
        self.pos
    }

    fn read_u8(&mut self) -> Step<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeErrorKind::TruncatedInput)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_vec(&mut self, len: usize) -> Step<Vec<u8>> {
        self.take(len).map(<[u8]>::to_vec)
    }

    fn at_end(&mut self) -> Step<bool> {
        Ok(self.pos >= self.data.len())
    }

    fn read_array<const N: usize>(&mut self) -> Step<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_string(&mut self, len: usize) -> Step<String> {
        std::str::from_utf8(self.take(len)?)
            .map(str::to_owned)
            .map_err(|_| DecodeErrorKind::InvalidUtf8)
    }

    fn read_u29(&mut self) -> Step<u32> {
        let (value, used) =
            decode_u29(&self.data[self.pos..]).ok_or(DecodeErrorKind::TruncatedInput)?;
        self.pos += used;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both(bytes: &[u8]) -> (IoSource<&[u8]>, SliceSource<'_>) {
        (IoSource::new(bytes), SliceSource::new(bytes))
    }

    #[test]
    fn test_fixed_width_big_endian() {
        let bytes = [0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF];
        let (mut io, mut slice) = both(&bytes);
        assert_eq!(io.read_u16().unwrap(), 0x1234);
        assert_eq!(io.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(slice.read_u16().unwrap(), 0x1234);
        assert_eq!(slice.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(io.offset(), 6);
        assert_eq!(slice.offset(), 6);
        assert!(io.at_end().unwrap());
        assert!(slice.at_end().unwrap());
    }

    #[test]
    fn test_u29_from_both_sources() {
        let bytes = [0xBF, 0xFF, 0xFF, 0xFF, 0x7F];
        let (mut io, mut slice) = both(&bytes);
        assert_eq!(io.read_u29().unwrap(), 0x0FFF_FFFF);
        assert_eq!(io.read_u29().unwrap(), 0x7F);
        assert_eq!(slice.read_u29().unwrap(), 0x0FFF_FFFF);
        assert_eq!(slice.read_u29().unwrap(), 0x7F);
        assert_eq!(io.offset(), 5);
        assert_eq!(slice.offset(), 5);
    }

    #[test]
    fn test_truncation() {
        let (mut io, mut slice) = both(&[0x00, 0x05, b'a']);
        assert_eq!(io.read_u16().unwrap(), 5);
        assert!(matches!(io.read_vec(5), Err(DecodeErrorKind::TruncatedInput)));
        assert_eq!(slice.read_u16().unwrap(), 5);
        assert!(matches!(slice.read_vec(5), Err(DecodeErrorKind::TruncatedInput)));

        let (mut io, mut slice) = both(&[0x81]);
        assert!(matches!(io.read_u29(), Err(DecodeErrorKind::TruncatedInput)));
        assert!(matches!(slice.read_u29(), Err(DecodeErrorKind::TruncatedInput)));
    }

    #[test]
    fn test_invalid_utf8() {
        let (mut io, mut slice) = both(&[0xC3, 0x28]);
        assert!(matches!(io.read_string(2), Err(DecodeErrorKind::InvalidUtf8)));
        assert!(matches!(slice.read_string(2), Err(DecodeErrorKind::InvalidUtf8)));
    }

    #[test]
    fn test_at_end_keeps_the_peeked_byte() {
        let mut io = IoSource::new(&[0x2A, 0x01][..]);
        assert!(!io.at_end().unwrap());
        assert_eq!(io.offset(), 0);
        assert_eq!(io.read_vec(2).unwrap(), vec![0x2A, 0x01]);
        assert!(io.at_end().unwrap());
    }
}
