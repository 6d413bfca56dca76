use crate::codec::{Codec, GeneratorCodec, PrimitiveCodec, StructuralCodec};
use crate::error::{CodecError, Result};
use crate::standard::JsonCodec;
use crate::value::Value;

/// Maps values to codecs and codec header bytes back to codecs.
///
/// Resolution scans the configured list in registration order and
/// picks the first codec whose `test` passes; header bytes are
/// `1 + index`. Codec authors must place more specific tests before
/// more general ones; ordering is caller responsibility. A value no
/// configured codec matches falls back to the JSON codec, whose header
/// is always `1 + len`.
pub struct CodecRegistry {
    codecs: Vec<Codec>,
    fallback: Box<dyn PrimitiveCodec>,
}

/// A resolved codec, borrowed from the registry.
pub enum CodecRef<'a> {
    Primitive(&'a dyn PrimitiveCodec),
    Structural(&'a dyn StructuralCodec),
    Generator(&'a dyn GeneratorCodec),
}

impl CodecRegistry {
    /// Create a registry over the given codec list with the JSON
    /// fallback.
    ///
    /// At most 254 codecs fit the one-byte header space.
    pub fn new(codecs: Vec<Codec>) -> Self {
        Self::with_fallback(codecs, Box::new(JsonCodec))
    }

    /// Create a registry with an explicit fallback codec. The fallback
    /// must match every value (`test` returning true unconditionally).
    pub fn with_fallback(codecs: Vec<Codec>, fallback: Box<dyn PrimitiveCodec>) -> Self {
        assert!(
            codecs.len() < u8::MAX as usize,
            "codec table exceeds one-byte header space"
        );
        Self { codecs, fallback }
    }

    /// Header byte of the first codec matching `value`. Always
    /// succeeds thanks to the fallback.
    pub fn resolve(&self, value: &Value) -> u8 {
        for (index, codec) in self.codecs.iter().enumerate() {
            if codec.test(value) {
                return index as u8 + 1;
            }
        }
        self.fallback_header()
    }

    /// The codec registered under `header`.
    pub fn by_header(&self, header: u8) -> Result<CodecRef<'_>> {
        if header == self.fallback_header() {
            return Ok(CodecRef::Primitive(self.fallback.as_ref()));
        }
        let index = (header as usize)
            .checked_sub(1)
            .ok_or(CodecError::UnknownCodec(header))?;
        match self.codecs.get(index) {
            Some(Codec::Primitive(codec)) => Ok(CodecRef::Primitive(codec.as_ref())),
            Some(Codec::Structural(codec)) => Ok(CodecRef::Structural(codec.as_ref())),
            Some(Codec::Generator(codec)) => Ok(CodecRef::Generator(codec.as_ref())),
            None => Err(CodecError::UnknownCodec(header)),
        }
    }

    /// The header byte reserved for the fallback codec.
    pub fn fallback_header(&self) -> u8 {
        self.codecs.len() as u8 + 1
    }
}
