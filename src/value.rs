//! Native (typed buffer) values.

use std::fmt;

/// A single value as stored in a typed buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::U8(x) => write!(f, "{}", x),
            NativeValue::U16(x) => write!(f, "{}", x),
            NativeValue::U32(x) => write!(f, "{}", x),
            NativeValue::U64(x) => write!(f, "{}", x),
            NativeValue::I8(x) => write!(f, "{}", x),
            NativeValue::I16(x) => write!(f, "{}", x),
            NativeValue::I32(x) => write!(f, "{}", x),
            NativeValue::I64(x) => write!(f, "{}", x),
            NativeValue::Float(x) => write!(f, "{}", x),
            NativeValue::Double(x) => write!(f, "{}", x),
        }
    }
}
