//! Definition model for a bus network: messages, their signals and payload functions.
//!
//! Definitions are plain data handed to [`Network::load`](crate::network::Network::load).
//! They derive `serde` so a harness can supply them in any serde format; JSON helpers are
//! provided for convenience.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Root definition: one network with its ordered messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    pub name: String,
    #[serde(default)]
    pub messages: Vec<MessageDefinition>,
    /// Name of a signal which, when non-zero, silences all transmission.
    #[serde(default)]
    pub netoff_signal: Option<String>,
    #[serde(default)]
    pub bus_id: u32,
    #[serde(default)]
    pub node_id: u32,
    #[serde(default)]
    pub interface_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub name: String,
    pub frame_id: u32,
    #[serde(default)]
    pub frame_type: u8,
    /// Size of the typed (struct) buffer.
    pub buffer_len: usize,
    /// Size of the wire payload.
    pub payload_len: usize,
    /// 0 = event driven, otherwise transmission period in ms.
    #[serde(default)]
    pub cycle_time_ms: u32,
    /// Set on container members: name of the container (header) message.
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub mux_id: u32,
    #[serde(default)]
    pub signals: Vec<SignalDefinition>,
    #[serde(default)]
    pub encode_functions: Vec<FunctionDefinition>,
    #[serde(default)]
    pub decode_functions: Vec<FunctionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Simulation (semantic) signal name.
    pub name: String,
    /// Struct member name, used to resolve the signal codec.
    pub member: String,
    pub primitive_type: PrimitiveType,
    pub buffer_offset: usize,
    #[serde(default)]
    pub init_value: f64,
    /// Constant-valued signal of a container member (discriminator, length).
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub value: f64,
    /// Marks the discriminator of a container header.
    #[serde(default)]
    pub mux_signal: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// Primitive width of a signal inside a typed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    #[serde(alias = "uint8_t")]
    U8,
    #[serde(alias = "uint16_t")]
    U16,
    #[serde(alias = "uint32_t")]
    U32,
    #[serde(alias = "uint64_t")]
    U64,
    #[serde(alias = "int8_t")]
    I8,
    #[serde(alias = "int16_t")]
    I16,
    #[serde(alias = "int32_t")]
    I32,
    #[serde(alias = "int64_t")]
    I64,
    Float,
    Double,
}

impl PrimitiveType {
    /// Width in bytes.
    pub fn width(self) -> usize {
        match self {
            PrimitiveType::U8 | PrimitiveType::I8 => 1,
            PrimitiveType::U16 | PrimitiveType::I16 => 2,
            PrimitiveType::U32 | PrimitiveType::I32 | PrimitiveType::Float => 4,
            PrimitiveType::U64 | PrimitiveType::I64 | PrimitiveType::Double => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl NetworkDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        NetworkDefinition {
            name: name.into(),
            messages: Vec::new(),
            netoff_signal: None,
            bus_id: 0,
            node_id: 0,
            interface_id: 0,
        }
    }

    pub fn with_message(mut self, message: MessageDefinition) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_netoff_signal(mut self, signal: impl Into<String>) -> Self {
        self.netoff_signal = Some(signal.into());
        self
    }

    pub fn from_json_str(source: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json_string(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get_message(&self, name: &str) -> Option<&MessageDefinition> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Number of Signal Store slots the network will need.
    pub fn signal_count(&self) -> usize {
        self.messages.iter().map(|m| m.signals.len()).sum()
    }
}

impl MessageDefinition {
    pub fn new(name: impl Into<String>, frame_id: u32, buffer_len: usize, payload_len: usize) -> Self {
        MessageDefinition {
            name: name.into(),
            frame_id,
            frame_type: 0,
            buffer_len,
            payload_len,
            cycle_time_ms: 0,
            container: None,
            mux_id: 0,
            signals: Vec::new(),
            encode_functions: Vec::new(),
            decode_functions: Vec::new(),
        }
    }

    pub fn with_signal(mut self, signal: SignalDefinition) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn with_cycle_time(mut self, cycle_time_ms: u32) -> Self {
        self.cycle_time_ms = cycle_time_ms;
        self
    }

    pub fn with_frame_type(mut self, frame_type: u8) -> Self {
        self.frame_type = frame_type;
        self
    }

    /// Declare this message as member `mux_id` of `container`.
    pub fn in_container(mut self, container: impl Into<String>, mux_id: u32) -> Self {
        self.container = Some(container.into());
        self.mux_id = mux_id;
        self
    }

    pub fn with_encode_function(mut self, function: FunctionDefinition) -> Self {
        self.encode_functions.push(function);
        self
    }

    pub fn with_decode_function(mut self, function: FunctionDefinition) -> Self {
        self.decode_functions.push(function);
        self
    }

    pub fn is_container_member(&self) -> bool {
        self.container.is_some()
    }
}

impl SignalDefinition {
    /// Signal whose simulation name and struct member name are the same.
    pub fn new(name: impl Into<String>, primitive_type: PrimitiveType, buffer_offset: usize) -> Self {
        let name = name.into();
        SignalDefinition {
            member: name.clone(),
            name,
            primitive_type,
            buffer_offset,
            init_value: 0.0,
            internal: false,
            value: 0.0,
            mux_signal: false,
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = member.into();
        self
    }

    pub fn with_init_value(mut self, init_value: f64) -> Self {
        self.init_value = init_value;
        self
    }

    /// Constant-valued signal (container member discriminator / length fields).
    pub fn internal(mut self, value: f64) -> Self {
        self.internal = true;
        self.value = value;
        self
    }

    pub fn mux(mut self) -> Self {
        self.mux_signal = true;
        self
    }

    /// First byte past the signal, saturating for offsets near `usize::MAX`.
    pub fn end_offset(&self) -> usize {
        self.buffer_offset.saturating_add(self.primitive_type.width())
    }
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDefinition {
            name: name.into(),
            annotations: HashMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}
