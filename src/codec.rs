//! Codec contracts between typed buffers, payloads and signal values.
//!
//! Message codecs pack a typed buffer into its wire payload (and back). Signal codecs
//! convert one physical value to and from its native representation and decide whether a
//! native value is in range. Both are trait objects held in a [`CodecRegistry`] which the
//! network resolves once at load.

use crate::buffer::Native;
use crate::definition::PrimitiveType;
use crate::function::{self, FunctionHandler};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation: {0}")]
    Validation(String),
    #[error("Length mismatch: {0}")]
    LengthMismatch(String),
}

/// Per-message pack/unpack between typed buffer and payload.
///
/// `pack` writes into the existing payload; bytes the codec does not own are left as they
/// were. The same holds for `unpack` and the typed buffer.
pub trait MessageCodec: Send + Sync {
    fn pack(&self, payload: &mut [u8], buffer: &[u8]) -> Result<(), CodecError>;
    fn unpack(&self, buffer: &mut [u8], payload: &[u8]) -> Result<(), CodecError>;
}

/// Per-signal physical <-> native conversion with range check on the native value.
pub trait SignalCodec<T>: Send + Sync {
    fn encode(&self, value: f64) -> T;
    fn decode(&self, raw: T) -> f64;
    fn in_range(&self, raw: T) -> bool;
}

/// Signal codec bound to its native width.
#[derive(Clone)]
pub enum SignalBinding {
    U8(Arc<dyn SignalCodec<u8>>),
    U16(Arc<dyn SignalCodec<u16>>),
    U32(Arc<dyn SignalCodec<u32>>),
    U64(Arc<dyn SignalCodec<u64>>),
    I8(Arc<dyn SignalCodec<i8>>),
    I16(Arc<dyn SignalCodec<i16>>),
    I32(Arc<dyn SignalCodec<i32>>),
    I64(Arc<dyn SignalCodec<i64>>),
    Float(Arc<dyn SignalCodec<f32>>),
    Double(Arc<dyn SignalCodec<f64>>),
}

impl SignalBinding {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            SignalBinding::U8(_) => PrimitiveType::U8,
            SignalBinding::U16(_) => PrimitiveType::U16,
            SignalBinding::U32(_) => PrimitiveType::U32,
            SignalBinding::U64(_) => PrimitiveType::U64,
            SignalBinding::I8(_) => PrimitiveType::I8,
            SignalBinding::I16(_) => PrimitiveType::I16,
            SignalBinding::I32(_) => PrimitiveType::I32,
            SignalBinding::I64(_) => PrimitiveType::I64,
            SignalBinding::Float(_) => PrimitiveType::Float,
            SignalBinding::Double(_) => PrimitiveType::Double,
        }
    }

    /// Bind a [`LinearCodec`] at the given width.
    pub fn linear(primitive_type: PrimitiveType, codec: LinearCodec) -> Self {
        match primitive_type {
            PrimitiveType::U8 => SignalBinding::U8(Arc::new(codec)),
            PrimitiveType::U16 => SignalBinding::U16(Arc::new(codec)),
            PrimitiveType::U32 => SignalBinding::U32(Arc::new(codec)),
            PrimitiveType::U64 => SignalBinding::U64(Arc::new(codec)),
            PrimitiveType::I8 => SignalBinding::I8(Arc::new(codec)),
            PrimitiveType::I16 => SignalBinding::I16(Arc::new(codec)),
            PrimitiveType::I32 => SignalBinding::I32(Arc::new(codec)),
            PrimitiveType::I64 => SignalBinding::I64(Arc::new(codec)),
            PrimitiveType::Float => SignalBinding::Float(Arc::new(codec)),
            PrimitiveType::Double => SignalBinding::Double(Arc::new(codec)),
        }
    }
}

impl fmt::Debug for SignalBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalBinding<{}>", self.primitive_type())
    }
}

/// `physical = raw * factor + offset`, optionally bounded in physical units.
///
/// Encoding rounds to the nearest integer for integer widths and saturates at the width's
/// limits. The range check decodes the native value and compares it with the bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearCodec {
    pub factor: f64,
    pub offset: f64,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl Default for LinearCodec {
    fn default() -> Self {
        LinearCodec::identity()
    }
}

impl LinearCodec {
    pub fn identity() -> Self {
        LinearCodec::new(1.0, 0.0)
    }

    pub fn new(factor: f64, offset: f64) -> Self {
        LinearCodec {
            factor,
            offset,
            minimum: None,
            maximum: None,
        }
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

impl<T: Native> SignalCodec<T> for LinearCodec {
    fn encode(&self, value: f64) -> T {
        let raw = (value - self.offset) / self.factor;
        match T::TYPE {
            PrimitiveType::Float | PrimitiveType::Double => T::from_f64(raw),
            _ => T::from_f64(raw.round()),
        }
    }

    fn decode(&self, raw: T) -> f64 {
        raw.to_f64() * self.factor + self.offset
    }

    fn in_range(&self, raw: T) -> bool {
        let physical = SignalCodec::<T>::decode(self, raw);
        if physical.is_nan() {
            return false;
        }
        self.minimum.map_or(true, |min| physical >= min) && self.maximum.map_or(true, |max| physical <= max)
    }
}

/// One contiguous byte run copied between buffer and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub buffer_offset: usize,
    pub payload_offset: usize,
    pub len: usize,
}

/// Byte-layout message codec: copies fixed byte runs between buffer and payload.
///
/// Both sides are little-endian, so copying the low bytes of a wider buffer field
/// truncates it to a narrower wire field (e.g. a 3-byte id from a `u32`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutCodec {
    fields: Vec<FieldMap>,
}

impl LayoutCodec {
    pub fn new() -> Self {
        LayoutCodec { fields: Vec::new() }
    }

    /// Buffer and payload are the same image of `len` bytes.
    pub fn identity(len: usize) -> Self {
        LayoutCodec::new().with_field(0, 0, len)
    }

    pub fn with_field(mut self, buffer_offset: usize, payload_offset: usize, len: usize) -> Self {
        self.fields.push(FieldMap {
            buffer_offset,
            payload_offset,
            len,
        });
        self
    }

    pub fn fields(&self) -> &[FieldMap] {
        &self.fields
    }
}

fn copy_run(dst: &mut [u8], dst_offset: usize, src: &[u8], src_offset: usize, len: usize) -> Result<(), CodecError> {
    let src_len = src.len();
    let dst_len = dst.len();
    let from = src
        .get(src_offset..src_offset.saturating_add(len))
        .ok_or_else(|| CodecError::LengthMismatch(format!("source {}+{} exceeds {} bytes", src_offset, len, src_len)))?;
    let to = dst
        .get_mut(dst_offset..dst_offset.saturating_add(len))
        .ok_or_else(|| CodecError::LengthMismatch(format!("destination {}+{} exceeds {} bytes", dst_offset, len, dst_len)))?;
    to.copy_from_slice(from);
    Ok(())
}

impl MessageCodec for LayoutCodec {
    fn pack(&self, payload: &mut [u8], buffer: &[u8]) -> Result<(), CodecError> {
        for f in &self.fields {
            copy_run(payload, f.payload_offset, buffer, f.buffer_offset, f.len)?;
        }
        Ok(())
    }

    fn unpack(&self, buffer: &mut [u8], payload: &[u8]) -> Result<(), CodecError> {
        for f in &self.fields {
            copy_run(buffer, f.buffer_offset, payload, f.payload_offset, f.len)?;
        }
        Ok(())
    }
}

/// Capability map consulted by [`Network::load`](crate::network::Network::load).
///
/// Message codecs are keyed by message name, signal codecs by (message name, member name)
/// and functions by function name. Lookups for container members fall back to the
/// container's name when the member has no entry of its own.
#[derive(Default, Clone)]
pub struct CodecRegistry {
    messages: HashMap<String, Arc<dyn MessageCodec>>,
    signals: HashMap<(String, String), SignalBinding>,
    functions: HashMap<String, Arc<dyn FunctionHandler>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry::default()
    }

    /// Registry pre-populated with `counter_inc_uint8`, `crc_generate` and `crc_validate`.
    pub fn with_stock_functions() -> Self {
        let mut registry = CodecRegistry::new();
        registry.register_function(function::COUNTER_INC_UINT8, Arc::new(function::CounterIncU8));
        registry.register_function(function::CRC_GENERATE, Arc::new(function::CrcGenerate));
        registry.register_function(function::CRC_VALIDATE, Arc::new(function::CrcValidate));
        registry
    }

    pub fn register_message(&mut self, message: impl Into<String>, codec: Arc<dyn MessageCodec>) -> &mut Self {
        self.messages.insert(message.into(), codec);
        self
    }

    pub fn register_signal(
        &mut self,
        message: impl Into<String>,
        member: impl Into<String>,
        binding: SignalBinding,
    ) -> &mut Self {
        self.signals.insert((message.into(), member.into()), binding);
        self
    }

    pub fn register_function(&mut self, name: impl Into<String>, handler: Arc<dyn FunctionHandler>) -> &mut Self {
        self.functions.insert(name.into(), handler);
        self
    }

    pub fn message_codec(&self, message: &str, container: Option<&str>) -> Option<Arc<dyn MessageCodec>> {
        self.messages
            .get(message)
            .or_else(|| container.and_then(|c| self.messages.get(c)))
            .cloned()
    }

    pub fn signal_binding(&self, message: &str, container: Option<&str>, member: &str) -> Option<SignalBinding> {
        let key = (message.to_string(), member.to_string());
        if let Some(b) = self.signals.get(&key) {
            return Some(b.clone());
        }
        let container = container?;
        self.signals.get(&(container.to_string(), member.to_string())).cloned()
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn FunctionHandler>> {
        self.functions.get(name).cloned()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&String> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("CodecRegistry")
            .field("messages", &self.messages.len())
            .field("signals", &self.signals.len())
            .field("functions", &functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_codec_rounds_and_saturates_integers() {
        let codec = LinearCodec::new(0.5, 10.0);
        assert_eq!(SignalCodec::<u8>::encode(&codec, 11.2), 2);
        assert_eq!(SignalCodec::<u8>::encode(&codec, 1000.0), u8::MAX);
        assert_eq!(SignalCodec::<u8>::encode(&codec, -50.0), 0);
        assert_eq!(SignalCodec::<u8>::decode(&codec, 4), 12.0);
    }

    #[test]
    fn linear_codec_range_is_physical() {
        let codec = LinearCodec::identity().with_range(0.0, 100.0);
        assert!(SignalCodec::<u8>::in_range(&codec, 100));
        assert!(!SignalCodec::<u8>::in_range(&codec, 101));
        assert!(!SignalCodec::<f64>::in_range(&codec, f64::NAN));
    }

    #[test]
    fn layout_codec_truncates_wide_fields() {
        let codec = LayoutCodec::new().with_field(0, 0, 3).with_field(4, 3, 1);
        let buffer = [0x59, 0x02, 0x00, 0x00, 0x2a, 0x00];
        let mut payload = [0xffu8; 5];
        codec.pack(&mut payload, &buffer).unwrap();
        assert_eq!(payload, [0x59, 0x02, 0x00, 0x2a, 0xff]);
    }

    #[test]
    fn layout_codec_reports_short_payload() {
        let codec = LayoutCodec::identity(4);
        let mut payload = [0u8; 2];
        let err = codec.pack(&mut payload, &[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch(_)));
    }

    #[test]
    fn registry_falls_back_to_container() {
        let mut registry = CodecRegistry::new();
        registry.register_message("container", Arc::new(LayoutCodec::identity(4)));
        registry.register_signal("container", "header_id", SignalBinding::linear(PrimitiveType::U32, LinearCodec::identity()));
        assert!(registry.message_codec("member", Some("container")).is_some());
        assert!(registry.message_codec("member", None).is_none());
        let b = registry.signal_binding("member", Some("container"), "header_id").unwrap();
        assert_eq!(b.primitive_type(), PrimitiveType::U32);
    }
}
