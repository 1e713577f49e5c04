//! Payload functions: ordered transforms run on a message payload after packing (encode)
//! or after reception (decode).
//!
//! A [`Function`] pairs a registered [`FunctionHandler`] with the annotations declared for
//! it. Its instance state is created by the handler on the first call and cached on the
//! entry afterwards; annotations are not consulted again.

use crate::error::StepError;
use crate::message::Message;
use crate::pack::fnv1a_32;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const COUNTER_INC_UINT8: &str = "counter_inc_uint8";
pub const CRC_GENERATE: &str = "crc_generate";
pub const CRC_VALIDATE: &str = "crc_validate";

/// Annotation naming the payload byte a stock function operates on.
pub const POSITION: &str = "position";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionStatus {
    Ok,
    /// Decode only: the payload failed validation, signals must not be updated.
    BadMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionError {
    #[error("missing annotation: {key}")]
    MissingAnnotation { key: String },
    #[error("invalid annotation {key}={value}")]
    InvalidAnnotation { key: String, value: String },
    #[error("resource: {0}")]
    Resource(String),
}

impl FunctionError {
    /// Configuration errors stop the step; resource errors only skip the function.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FunctionError::Resource(_))
    }
}

pub type InstanceState = Box<dyn Any + Send>;

pub trait FunctionHandler: Send + Sync {
    /// Build the instance state from the function's annotations. Called once.
    fn init(&self, function: &Function) -> Result<InstanceState, FunctionError>;

    fn apply(&self, state: &mut InstanceState, payload: &mut [u8]) -> Result<FunctionStatus, FunctionError>;
}

pub struct Function {
    pub name: String,
    annotations: HashMap<String, String>,
    handler: Arc<dyn FunctionHandler>,
    state: Option<InstanceState>,
}

impl Function {
    pub fn new(name: impl Into<String>, annotations: HashMap<String, String>, handler: Arc<dyn FunctionHandler>) -> Self {
        Function {
            name: name.into(),
            annotations,
            handler,
            state: None,
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Run the function on `payload`, creating its instance state first if needed.
    pub fn call(&mut self, payload: &mut [u8]) -> Result<FunctionStatus, FunctionError> {
        if self.state.is_none() {
            let state = self.handler.init(self)?;
            self.state = Some(state);
        }
        match self.state.as_mut() {
            Some(state) => self.handler.apply(state, payload),
            None => Err(FunctionError::Resource(format!("{}: no instance state", self.name))),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("annotations", &self.annotations)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Why a function did not complete normally during a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    BadMessage,
    Resource(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedMessage {
    pub message: String,
    pub function: String,
    pub reason: Rejection,
}

// ==== Stock functions ====

/// Byte position parsed from the `position` annotation.
#[derive(Debug, Clone, Copy)]
struct Position(usize);

fn position_annotation(function: &Function) -> Result<InstanceState, FunctionError> {
    let value = function.annotation(POSITION).ok_or_else(|| FunctionError::MissingAnnotation {
        key: POSITION.to_string(),
    })?;
    let position = value.trim().parse::<usize>().map_err(|_| FunctionError::InvalidAnnotation {
        key: POSITION.to_string(),
        value: value.to_string(),
    })?;
    Ok(Box::new(Position(position)))
}

fn position_in(state: &mut InstanceState, payload: &[u8]) -> Result<usize, FunctionError> {
    let Position(position) = *(**state)
        .downcast_mut::<Position>()
        .ok_or_else(|| FunctionError::Resource("instance state is not a position".to_string()))?;
    if position >= payload.len() {
        return Err(FunctionError::InvalidAnnotation {
            key: POSITION.to_string(),
            value: format!("{} (payload is {} bytes)", position, payload.len()),
        });
    }
    Ok(position)
}

/// Wrapping 8-bit sum of every payload byte except the one at `skip`.
pub fn crc8_sum(payload: &[u8], skip: usize) -> u8 {
    payload
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .fold(0u8, |acc, (_, b)| acc.wrapping_add(*b))
}

/// `counter_inc_uint8`: wrapping increment of the byte at `position`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterIncU8;

impl FunctionHandler for CounterIncU8 {
    fn init(&self, function: &Function) -> Result<InstanceState, FunctionError> {
        position_annotation(function)
    }

    fn apply(&self, state: &mut InstanceState, payload: &mut [u8]) -> Result<FunctionStatus, FunctionError> {
        let position = position_in(state, payload)?;
        payload[position] = payload[position].wrapping_add(1);
        Ok(FunctionStatus::Ok)
    }
}

/// `crc_generate`: store the sum of all other bytes at `position`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrcGenerate;

impl FunctionHandler for CrcGenerate {
    fn init(&self, function: &Function) -> Result<InstanceState, FunctionError> {
        position_annotation(function)
    }

    fn apply(&self, state: &mut InstanceState, payload: &mut [u8]) -> Result<FunctionStatus, FunctionError> {
        let position = position_in(state, payload)?;
        payload[position] = crc8_sum(payload, position);
        Ok(FunctionStatus::Ok)
    }
}

/// `crc_validate`: bad message unless the byte at `position` is the sum of all others.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrcValidate;

impl FunctionHandler for CrcValidate {
    fn init(&self, function: &Function) -> Result<InstanceState, FunctionError> {
        position_annotation(function)
    }

    fn apply(&self, state: &mut InstanceState, payload: &mut [u8]) -> Result<FunctionStatus, FunctionError> {
        let position = position_in(state, payload)?;
        if payload[position] == crc8_sum(payload, position) {
            Ok(FunctionStatus::Ok)
        } else {
            Ok(FunctionStatus::BadMessage)
        }
    }
}

// ==== Pipelines ====

fn fatal(message: &str, function: &str, source: FunctionError) -> StepError {
    error!(msg = message, function, error = %source, "payload function configuration error");
    StepError::Function {
        message: message.to_string(),
        function: function.to_string(),
        source,
    }
}

/// Run encode functions on every message due for transmission.
///
/// When the functions change the payload, it is unpacked back into the typed buffer, the
/// message is marked for a signal update and the new hash becomes its checksum, so the
/// next pack does not see the modification as a fresh change.
pub fn apply_encode(messages: &mut [Message]) -> Result<Vec<RejectedMessage>, StepError> {
    let mut rejected = Vec::new();
    for m in messages.iter_mut() {
        if !m.needs_tx || m.encode_functions.is_empty() {
            continue;
        }
        let before = fnv1a_32(&m.payload);
        for f in m.encode_functions.iter_mut() {
            match f.call(&mut m.payload) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(fatal(&m.name, &f.name, e)),
                Err(e) => {
                    warn!(msg = %m.name, function = %f.name, error = %e, "encode function skipped");
                    rejected.push(RejectedMessage {
                        message: m.name.clone(),
                        function: f.name.clone(),
                        reason: Rejection::Resource(e.to_string()),
                    });
                }
            }
        }
        let after = fnv1a_32(&m.payload);
        if after != before {
            debug!(msg = %m.name, checksum = after, "encode functions modified payload");
            m.checksum = after;
            if let Err(e) = m.unpack() {
                warn!(msg = %m.name, error = %e, "unpack after encode functions failed");
                continue;
            }
            m.update_signals = true;
        }
    }
    Ok(rejected)
}

/// Run decode functions on every message with a pending signal update.
///
/// A bad message clears `update_signals`; the remaining functions of the chain still run.
pub fn apply_decode(messages: &mut [Message]) -> Result<Vec<RejectedMessage>, StepError> {
    let mut rejected = Vec::new();
    for m in messages.iter_mut() {
        if !m.update_signals {
            continue;
        }
        for f in m.decode_functions.iter_mut() {
            match f.call(&mut m.payload) {
                Ok(FunctionStatus::Ok) => {}
                Ok(FunctionStatus::BadMessage) => {
                    debug!(msg = %m.name, function = %f.name, "bad message");
                    m.update_signals = false;
                    rejected.push(RejectedMessage {
                        message: m.name.clone(),
                        function: f.name.clone(),
                        reason: Rejection::BadMessage,
                    });
                }
                Err(e) if e.is_fatal() => return Err(fatal(&m.name, &f.name, e)),
                Err(e) => {
                    warn!(msg = %m.name, function = %f.name, error = %e, "decode function skipped");
                    rejected.push(RejectedMessage {
                        message: m.name.clone(),
                        function: f.name.clone(),
                        reason: Rejection::Resource(e.to_string()),
                    });
                }
            }
        }
    }
    Ok(rejected)
}
