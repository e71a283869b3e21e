//! Value graphs to bytes.
//!
//! The encoder walks the graph depth-first, pre-order, and assigns ids in
//! exactly the order the decoder will, so a second encounter of any
//! reference-eligible value can be written as an index.

mod amf0;
mod amf3;

use std::io::Write;

use crate::class_mapper::{ClassMapper, TypeDescriptor};
use crate::codec::{CodecConfig, ObjectEncoding};
use crate::error::EncodeError;
use crate::reference::EncodeTables;
use crate::value::{NativeRef, Value};
use crate::wire::{self, encode_u29};

type Step = Result<(), EncodeError>;

pub struct Encoder<'m, W: Write> {
    writer: W,
    mapper: &'m ClassMapper,
    config: CodecConfig,
    depth: usize,
}

impl<W: Write> Encoder<'static, W> {
    /// Encoder with no class mappings and default settings.
    pub fn new(writer: W) -> Self {
        Encoder::with_mapper(writer, ClassMapper::empty(), CodecConfig::default())
    }
}

impl<'m, W: Write> Encoder<'m, W> {
    pub fn with_mapper(writer: W, mapper: &'m ClassMapper, config: CodecConfig) -> Self {
        Encoder {
            writer,
            mapper,
            config,
            depth: 0,
        }
    }

    /// Writes `value` as one AMF0 value. With [`ObjectEncoding::Amf3`] the
    /// whole value goes through the AvmPlus switch.
    pub fn encode(&mut self, value: &Value) -> Step {
        let mut tables = EncodeTables::new();
        match self.config.object_encoding {
            ObjectEncoding::Amf0 => self.amf0_value(value, &mut tables),
            ObjectEncoding::Amf3 => {
                self.write_u8(wire::amf0::AVMPLUS)?;
                self.amf3_value(value, &mut tables)
            }
        }
    }

    /// Writes `value` as a raw AMF3 stream.
    pub fn encode_amf3(&mut self, value: &Value) -> Step {
        let mut tables = EncodeTables::new();
        self.amf3_value(value, &mut tables)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Step) -> Step {
        if self.depth >= self.config.max_depth {
            return Err(EncodeError::too_deep());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Adapter for a host value, or `UnencodableType` when none is registered.
    fn adapter(&self, native: &NativeRef) -> Result<&'m TypeDescriptor, EncodeError> {
        let mapper: &'m ClassMapper = self.mapper;
        mapper
            .adapter_for(native.type_id())
            .ok_or_else(|| EncodeError::unencodable(native.type_name()))
    }

    fn write_all(&mut self, bytes: &[u8]) -> Step {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn write_u8(&mut self, byte: u8) -> Step {
        self.write_all(&[byte])
    }

    fn write_u16(&mut self, value: u16) -> Step {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u32(&mut self, value: u32) -> Step {
        self.write_all(&value.to_be_bytes())
    }

    fn write_f64(&mut self, value: f64) -> Step {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u29(&mut self, value: u32) -> Step {
        let mut buf = [0u8; 4];
        let n = encode_u29(value, &mut buf);
        self.write_all(&buf[..n])
    }
}
