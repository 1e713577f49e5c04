//! Typed buffers: the per-message struct image between signals and wire payload.
//!
//! A typed buffer is an owned byte array holding native-width fields at fixed offsets.
//! Fields are little-endian regardless of host. Every access is bounds checked; the
//! network validates `offset + width <= len` for each signal at load, so a failed access
//! during a step indicates a buffer that was resized behind the network's back.

use crate::definition::PrimitiveType;
use crate::value::NativeValue;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Rust type backing one [`PrimitiveType`].
pub trait Native: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const TYPE: PrimitiveType;

    /// Read from exactly `TYPE.width()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
    /// Write into exactly `TYPE.width()` bytes.
    fn write_le(self, bytes: &mut [u8]);
    /// Saturating numeric conversion (`as` semantics).
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn into_value(self) -> NativeValue;
}

macro_rules! impl_native {
    ($t:ty, $variant:ident, $read:expr, $write:expr) => {
        impl Native for $t {
            const TYPE: PrimitiveType = PrimitiveType::$variant;

            fn read_le(bytes: &[u8]) -> Self {
                $read(bytes)
            }

            fn write_le(self, bytes: &mut [u8]) {
                $write(bytes, self)
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn into_value(self) -> NativeValue {
                NativeValue::$variant(self)
            }
        }
    };
}

impl_native!(u8, U8, |b: &[u8]| b[0], |b: &mut [u8], v: u8| b[0] = v);
impl_native!(i8, I8, |b: &[u8]| b[0] as i8, |b: &mut [u8], v: i8| b[0] = v as u8);
impl_native!(u16, U16, LittleEndian::read_u16, LittleEndian::write_u16);
impl_native!(i16, I16, LittleEndian::read_i16, LittleEndian::write_i16);
impl_native!(u32, U32, LittleEndian::read_u32, LittleEndian::write_u32);
impl_native!(i32, I32, LittleEndian::read_i32, LittleEndian::write_i32);
impl_native!(u64, U64, LittleEndian::read_u64, LittleEndian::write_u64);
impl_native!(i64, I64, LittleEndian::read_i64, LittleEndian::write_i64);
impl_native!(f32, Float, LittleEndian::read_f32, LittleEndian::write_f32);
impl_native!(f64, Double, LittleEndian::read_f64, LittleEndian::write_f64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedBuffer {
    bytes: Vec<u8>,
}

impl TypedBuffer {
    pub fn new(len: usize) -> Self {
        TypedBuffer { bytes: vec![0u8; len] }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// True if a field of `primitive_type` at `offset` lies inside the buffer.
    pub fn fits(&self, offset: usize, primitive_type: PrimitiveType) -> bool {
        offset
            .checked_add(primitive_type.width())
            .map_or(false, |end| end <= self.bytes.len())
    }

    pub fn get<T: Native>(&self, offset: usize) -> Option<T> {
        let end = offset.checked_add(T::TYPE.width())?;
        self.bytes.get(offset..end).map(T::read_le)
    }

    /// Write `value` at `offset`; returns false (and writes nothing) if out of bounds.
    pub fn set<T: Native>(&mut self, offset: usize, value: T) -> bool {
        let end = match offset.checked_add(T::TYPE.width()) {
            Some(end) => end,
            None => return false,
        };
        match self.bytes.get_mut(offset..end) {
            Some(slot) => {
                value.write_le(slot);
                true
            }
            None => false,
        }
    }

    /// Read the field at `offset` as its declared type, for inspection.
    pub fn read(&self, offset: usize, primitive_type: PrimitiveType) -> Option<NativeValue> {
        Some(match primitive_type {
            PrimitiveType::U8 => self.get::<u8>(offset)?.into_value(),
            PrimitiveType::U16 => self.get::<u16>(offset)?.into_value(),
            PrimitiveType::U32 => self.get::<u32>(offset)?.into_value(),
            PrimitiveType::U64 => self.get::<u64>(offset)?.into_value(),
            PrimitiveType::I8 => self.get::<i8>(offset)?.into_value(),
            PrimitiveType::I16 => self.get::<i16>(offset)?.into_value(),
            PrimitiveType::I32 => self.get::<i32>(offset)?.into_value(),
            PrimitiveType::I64 => self.get::<i64>(offset)?.into_value(),
            PrimitiveType::Float => self.get::<f32>(offset)?.into_value(),
            PrimitiveType::Double => self.get::<f64>(offset)?.into_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_is_little_endian() {
        let mut buf = TypedBuffer::new(14);
        assert!(buf.set(6, 10.0f64));
        assert_eq!(&buf.as_bytes()[6..14], &[0, 0, 0, 0, 0, 0, 0x24, 0x40]);
        assert_eq!(buf.get::<f64>(6), Some(10.0));
    }

    #[test]
    fn out_of_bounds_access_writes_nothing() {
        let mut buf = TypedBuffer::new(4);
        assert!(!buf.set(2, 0xdead_beefu32));
        assert_eq!(buf.as_bytes(), &[0, 0, 0, 0]);
        assert_eq!(buf.get::<u32>(1), None);
        assert!(!buf.set(usize::MAX, 1u8));
        assert!(!buf.fits(usize::MAX, PrimitiveType::U8));
    }

    #[test]
    fn signed_values_keep_their_sign() {
        let mut buf = TypedBuffer::new(8);
        buf.set(0, -2i16);
        buf.set(2, -1i8);
        assert_eq!(buf.read(0, PrimitiveType::I16), Some(NativeValue::I16(-2)));
        assert_eq!(buf.read(2, PrimitiveType::I8), Some(NativeValue::I8(-1)));
        assert_eq!(buf.read(2, PrimitiveType::U8), Some(NativeValue::U8(0xff)));
    }
}
