//! Runtime messages and signals built from the definition model.

use crate::buffer::TypedBuffer;
use crate::codec::{CodecError, MessageCodec};
use crate::definition::{PrimitiveType, SignalDefinition};
use crate::function::Function;
use crate::pack::fnv1a_32;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub member: String,
    pub primitive_type: PrimitiveType,
    pub buffer_offset: usize,
    pub init_value: f64,
    pub internal: bool,
    pub value: f64,
    pub mux_signal: bool,
    /// Marshal table entry of this signal when it is a discriminator.
    pub mux_entry: Option<usize>,
}

impl From<&SignalDefinition> for Signal {
    fn from(def: &SignalDefinition) -> Self {
        Signal {
            name: def.name.clone(),
            member: def.member.clone(),
            primitive_type: def.primitive_type,
            buffer_offset: def.buffer_offset,
            init_value: def.init_value,
            internal: def.internal,
            value: def.value,
            mux_signal: def.mux_signal,
            mux_entry: None,
        }
    }
}

pub struct Message {
    pub name: String,
    pub frame_id: u32,
    pub frame_type: u8,
    pub cycle_time_ms: u32,
    pub container: Option<String>,
    pub mux_id: u32,
    pub signals: Vec<Signal>,
    /// Index in `signals` of the discriminator, set on container headers.
    pub mux_signal: Option<usize>,
    pub(crate) buffer: TypedBuffer,
    pub(crate) payload: Vec<u8>,
    pub(crate) checksum: u32,
    pub(crate) needs_tx: bool,
    pub(crate) update_signals: bool,
    pub(crate) codec: Arc<dyn MessageCodec>,
    pub(crate) encode_functions: Vec<Function>,
    pub(crate) decode_functions: Vec<Function>,
}

impl Message {
    pub fn is_cyclic(&self) -> bool {
        self.cycle_time_ms > 0
    }

    pub fn is_container_member(&self) -> bool {
        self.container.is_some()
    }

    pub fn is_container_header(&self) -> bool {
        self.mux_signal.is_some()
    }

    pub fn buffer(&self) -> &TypedBuffer {
        &self.buffer
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Checksum of the payload last transmitted or received.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn needs_tx(&self) -> bool {
        self.needs_tx
    }

    pub fn update_signals(&self) -> bool {
        self.update_signals
    }

    pub fn payload_hash(&self) -> u32 {
        fnv1a_32(&self.payload)
    }

    pub(crate) fn pack(&mut self) -> Result<(), CodecError> {
        self.codec.pack(&mut self.payload, self.buffer.as_bytes())
    }

    pub(crate) fn unpack(&mut self) -> Result<(), CodecError> {
        self.codec.unpack(self.buffer.as_bytes_mut(), &self.payload)
    }

    /// Copy received frame bytes into the payload, truncated or zero-padded to its length.
    pub(crate) fn load_payload(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.payload.len());
        self.payload[..n].copy_from_slice(&bytes[..n]);
        self.payload[n..].fill(0);
    }

    pub fn encode_functions(&self) -> &[Function] {
        &self.encode_functions
    }

    pub fn decode_functions(&self) -> &[Function] {
        &self.decode_functions
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("name", &self.name)
            .field("frame_id", &self.frame_id)
            .field("frame_type", &self.frame_type)
            .field("cycle_time_ms", &self.cycle_time_ms)
            .field("container", &self.container)
            .field("mux_id", &self.mux_id)
            .field("signals", &self.signals)
            .field("checksum", &self.checksum)
            .field("needs_tx", &self.needs_tx)
            .field("update_signals", &self.update_signals)
            .field("encode_functions", &self.encode_functions)
            .field("decode_functions", &self.decode_functions)
            .finish()
    }
}
