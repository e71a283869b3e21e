//! Codec selection.
//!
//! A [`CodecConfig`] is turned into a [`Codec`] once, at start-up. The two
//! implementations produce identical results; they only differ in how the
//! input is consumed.

use std::io::Read;
use std::sync::Arc;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::class_mapper::ClassMapper;
use crate::de::Decoder;
use crate::error::{DecodeError, EncodeError};
use crate::read::{IoSource, SliceSource, Source};
use crate::ser::Encoder;
use crate::value::Value;

/// Which input layer the decoder runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Byte-at-a-time over `std::io::Read`; works with any reader.
    #[default]
    Portable,
    /// Zero-copy cursor over an in-memory buffer.
    Accelerated,
}

/// How [`Codec::encode`] writes objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectEncoding {
    /// Plain AMF0; byte arrays still switch to AMF3.
    Amf0,
    /// An AMF0 envelope that switches to AMF3 for the whole value.
    #[default]
    Amf3,
}

/// Codec settings. Every field has a default, so partial documents load.
///
/// ```
/// use amf_codec::{Backend, CodecConfig};
///
/// let config: CodecConfig = serde_json::from_str(r#"{"backend": "accelerated"}"#).unwrap();
/// assert_eq!(config.backend, Backend::Accelerated);
/// assert_eq!(config.max_depth, 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub backend: Backend,
    pub object_encoding: ObjectEncoding,
    /// Deepest nesting accepted in either direction.
    pub max_depth: usize,
    /// Most reference table entries a single decode may create.
    pub max_references: usize,
    /// Most bytes of strings, XML and byte arrays a single decode may
    /// copy out of its reference tables.
    pub max_reference_bytes: usize,
    /// Reject input with bytes left after the value.
    pub require_exact_length: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            backend: Backend::Portable,
            object_encoding: ObjectEncoding::Amf3,
            max_depth: 256,
            max_references: 1 << 20,
            max_reference_bytes: 64 << 20,
            require_exact_length: false,
        }
    }
}

impl CodecConfig {
    /// Builds the codec selected by `backend`.
    pub fn build(self, mapper: Arc<ClassMapper>) -> Box<dyn Codec> {
        match self.backend {
            Backend::Portable => Box::new(PortableCodec::new(self, mapper)),
            Backend::Accelerated => Box::new(AcceleratedCodec::new(self, mapper)),
        }
    }
}

/// One-shot conversions between bytes and value graphs.
pub trait Codec: Send + Sync {
    fn config(&self) -> &CodecConfig;

    fn class_mapper(&self) -> &ClassMapper;

    /// Decodes one AMF0 value.
    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;

    /// Decodes one raw AMF3 value.
    fn decode_amf3(&self, bytes: &[u8]) -> Result<Value, DecodeError>;

    /// Decodes consecutive AMF0 values until the input runs out.
    fn decode_all(&self, bytes: &[u8]) -> Result<Vec<Value>, DecodeError>;

    /// Encodes `value` as AMF0, switching to AMF3 as the config says.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        trace!("encode with {:?}", self.config().object_encoding);
        let mut encoder = Encoder::with_mapper(Vec::new(), self.class_mapper(), *self.config());
        encoder.encode(value)?;
        Ok(encoder.into_inner())
    }

    /// Encodes `value` as a raw AMF3 stream.
    fn encode_amf3(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        trace!("encode amf3");
        let mut encoder = Encoder::with_mapper(Vec::new(), self.class_mapper(), *self.config());
        encoder.encode_amf3(value)?;
        Ok(encoder.into_inner())
    }
}

fn decode_one<S: Source>(mut decoder: Decoder<'_, S>, amf3: bool) -> Result<Value, DecodeError> {
    let value = if amf3 {
        decoder.decode_amf3()?
    } else {
        decoder.decode()?
    };
    if decoder.config().require_exact_length {
        decoder.finish()?;
    }
    Ok(value)
}

/// Decodes through [`IoSource`].
#[derive(Debug, Clone)]
pub struct PortableCodec {
    config: CodecConfig,
    mapper: Arc<ClassMapper>,
}

impl PortableCodec {
    pub fn new(config: CodecConfig, mapper: Arc<ClassMapper>) -> Self {
        PortableCodec { config, mapper }
    }

    /// Decodes one AMF0 value straight from a reader.
    pub fn decode_reader<R: Read>(&self, reader: R) -> Result<Value, DecodeError> {
        trace!("decode from reader");
        decode_one(self.decoder(reader), false)
    }

    fn decoder<R: Read>(&self, reader: R) -> Decoder<'_, IoSource<R>> {
        Decoder::with_source(IoSource::new(reader), &self.mapper, self.config)
    }
}

impl Codec for PortableCodec {
    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn class_mapper(&self) -> &ClassMapper {
        &self.mapper
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        trace!("decode {} bytes (portable)", bytes.len());
        decode_one(self.decoder(bytes), false)
    }

    fn decode_amf3(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        trace!("decode {} amf3 bytes (portable)", bytes.len());
        decode_one(self.decoder(bytes), true)
    }

    fn decode_all(&self, bytes: &[u8]) -> Result<Vec<Value>, DecodeError> {
        trace!("decode all of {} bytes (portable)", bytes.len());
        self.decoder(bytes).decode_all()
    }
}

/// Decodes through [`SliceSource`].
#[derive(Debug, Clone)]
pub struct AcceleratedCodec {
    config: CodecConfig,
    mapper: Arc<ClassMapper>,
}

impl AcceleratedCodec {
    pub fn new(config: CodecConfig, mapper: Arc<ClassMapper>) -> Self {
        AcceleratedCodec { config, mapper }
    }

    fn decoder<'a>(&'a self, bytes: &'a [u8]) -> Decoder<'a, SliceSource<'a>> {
        Decoder::with_source(SliceSource::new(bytes), &self.mapper, self.config)
    }
}

impl Codec for AcceleratedCodec {
    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn class_mapper(&self) -> &ClassMapper {
        &self.mapper
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        trace!("decode {} bytes (accelerated)", bytes.len());
        decode_one(self.decoder(bytes), false)
    }

    fn decode_amf3(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        trace!("decode {} amf3 bytes (accelerated)", bytes.len());
        decode_one(self.decoder(bytes), true)
    }

    fn decode_all(&self, bytes: &[u8]) -> Result<Vec<Value>, DecodeError> {
        trace!("decode all of {} bytes (accelerated)", bytes.len());
        self.decoder(bytes).decode_all()
    }
}
