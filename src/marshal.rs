//! Marshal table: one entry per signal, linking a Signal Store slot to a typed buffer field.
//!
//! Entries are ordered by message declaration, then signal declaration; the entry index is
//! the Signal Store index. Values move through the table in two directions:
//!
//! - signals to buffers: encode the store value, range-check the encoded native value,
//!   write it only when in range;
//! - buffers to signals: only for messages with `update_signals` set; range-check the raw
//!   native value, decode and write the store only when in range.

use crate::buffer::{Native, TypedBuffer};
use crate::codec::{CodecRegistry, SignalBinding, SignalCodec};
use crate::error::LoadError;
use crate::message::Message;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct MarshalEntry {
    /// Index of the owning message.
    pub message: usize,
    /// Index of the signal within its message.
    pub signal: usize,
    /// Signal Store index.
    pub index: usize,
    pub codec: SignalBinding,
}

#[derive(Debug, Clone, Default)]
pub struct MarshalTable {
    entries: Vec<MarshalEntry>,
}

fn encode_into<T: Native>(codec: &dyn SignalCodec<T>, value: f64, buffer: &mut TypedBuffer, offset: usize) -> bool {
    let raw = codec.encode(value);
    if !codec.in_range(raw) {
        return false;
    }
    buffer.set(offset, raw)
}

fn decode_from<T: Native>(codec: &dyn SignalCodec<T>, buffer: &TypedBuffer, offset: usize) -> Option<f64> {
    let raw = buffer.get::<T>(offset)?;
    if !codec.in_range(raw) {
        return None;
    }
    Some(codec.decode(raw))
}

/// Encode `value` into `buffer` at `offset`. False if out of range (buffer untouched).
pub fn encode_signal(binding: &SignalBinding, value: f64, buffer: &mut TypedBuffer, offset: usize) -> bool {
    match binding {
        SignalBinding::U8(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::U16(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::U32(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::U64(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::I8(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::I16(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::I32(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::I64(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::Float(c) => encode_into(c.as_ref(), value, buffer, offset),
        SignalBinding::Double(c) => encode_into(c.as_ref(), value, buffer, offset),
    }
}

/// Decode the field at `offset`. None if the raw value is out of range.
pub fn decode_signal(binding: &SignalBinding, buffer: &TypedBuffer, offset: usize) -> Option<f64> {
    match binding {
        SignalBinding::U8(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::U16(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::U32(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::U64(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::I8(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::I16(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::I32(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::I64(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::Float(c) => decode_from(c.as_ref(), buffer, offset),
        SignalBinding::Double(c) => decode_from(c.as_ref(), buffer, offset),
    }
}

impl MarshalTable {
    /// Build the table and record discriminator back-references on `messages`.
    pub fn build(messages: &mut [Message], registry: &CodecRegistry) -> Result<Self, LoadError> {
        let mut entries = Vec::new();
        for (mi, m) in messages.iter().enumerate() {
            if m.buffer.is_empty() {
                return Err(LoadError::ZeroBufferLength { message: m.name.clone() });
            }
            for (si, s) in m.signals.iter().enumerate() {
                if !m.buffer.fits(s.buffer_offset, s.primitive_type) {
                    return Err(LoadError::SignalOutOfBounds {
                        message: m.name.clone(),
                        signal: s.name.clone(),
                        offset: s.buffer_offset,
                        width: s.primitive_type.width(),
                        buffer_len: m.buffer.len(),
                    });
                }
                let codec = registry
                    .signal_binding(&m.name, m.container.as_deref(), &s.member)
                    .ok_or_else(|| LoadError::UnresolvedSignalCodec {
                        message: m.name.clone(),
                        signal: s.member.clone(),
                    })?;
                if codec.primitive_type() != s.primitive_type {
                    return Err(LoadError::CodecTypeMismatch {
                        message: m.name.clone(),
                        signal: s.member.clone(),
                        declared: s.primitive_type,
                        found: codec.primitive_type(),
                    });
                }
                let index = entries.len();
                entries.push(MarshalEntry {
                    message: mi,
                    signal: si,
                    index,
                    codec,
                });
            }
        }

        for (ei, e) in entries.iter().enumerate() {
            let m = &mut messages[e.message];
            if m.signals[e.signal].mux_signal {
                m.signals[e.signal].mux_entry = Some(ei);
                m.mux_signal = Some(e.signal);
            }
        }

        Ok(MarshalTable { entries })
    }

    pub fn entries(&self) -> &[MarshalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Externally visible signal names; internal signals get an empty name.
    pub fn signal_names(&self, messages: &[Message]) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                let s = &messages[e.message].signals[e.signal];
                if s.internal {
                    String::new()
                } else {
                    s.name.clone()
                }
            })
            .collect()
    }

    pub fn signals_to_buffers(&self, messages: &mut [Message], store: &[f64]) {
        for e in &self.entries {
            let m = &mut messages[e.message];
            let s = &m.signals[e.signal];
            let value = if s.internal && m.container.is_some() {
                s.value
            } else {
                store[e.index]
            };
            let offset = s.buffer_offset;
            if !encode_signal(&e.codec, value, &mut m.buffer, offset) {
                trace!(msg = %m.name, signal = %m.signals[e.signal].name, value, "encode rejected");
            }
        }
    }

    /// Gated on `update_signals`; clears every flag after the pass.
    pub fn buffers_to_signals(&self, messages: &mut [Message], store: &mut [f64]) {
        for e in &self.entries {
            let m = &messages[e.message];
            if !m.update_signals {
                continue;
            }
            self.decode_into(e, m, store);
        }
        for m in messages.iter_mut() {
            m.update_signals = false;
        }
    }

    /// Decode a single entry regardless of `update_signals`; flags are left as they are.
    pub fn decode_entry(&self, entry: usize, messages: &[Message], store: &mut [f64]) {
        if let Some(e) = self.entries.get(entry) {
            self.decode_into(e, &messages[e.message], store);
        }
    }

    fn decode_into(&self, e: &MarshalEntry, m: &Message, store: &mut [f64]) {
        let s = &m.signals[e.signal];
        match decode_signal(&e.codec, &m.buffer, s.buffer_offset) {
            Some(value) => {
                trace!(msg = %m.name, signal = %s.name, value, "decoded");
                store[e.index] = value;
            }
            None => trace!(msg = %m.name, signal = %s.name, "decode rejected"),
        }
    }
}
