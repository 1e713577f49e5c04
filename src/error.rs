//! Error types for loading a network and running its steps.
//!
//! Load errors are fatal for the load operation. Step errors are only returned for
//! configuration problems discovered on first use or for a failed transport flush;
//! per-message problems (range rejections, codec failures, bad messages) are handled
//! inside the step and never surface here.

use crate::definition::PrimitiveType;
use crate::frame::TransportError;
use crate::function::FunctionError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("message {message}: buffer_len not set")]
    ZeroBufferLength { message: String },
    #[error("message {message}: signal {signal} at offset {offset} ({width} bytes) exceeds buffer of {buffer_len} bytes")]
    SignalOutOfBounds {
        message: String,
        signal: String,
        offset: usize,
        width: usize,
        buffer_len: usize,
    },
    #[error("duplicate message name: {0}")]
    DuplicateMessage(String),
    #[error("message codec not registered: {0}")]
    UnresolvedMessageCodec(String),
    #[error("signal codec not registered: {message}.{signal}")]
    UnresolvedSignalCodec { message: String, signal: String },
    #[error("signal codec for {message}.{signal} is {found}, signal is declared {declared}")]
    CodecTypeMismatch {
        message: String,
        signal: String,
        declared: PrimitiveType,
        found: PrimitiveType,
    },
    #[error("function {function} (message {message}) not registered")]
    UnresolvedFunction { message: String, function: String },
    #[error("network-off signal not found: {0}")]
    UnknownNetoffSignal(String),
    #[error("definition: {0}")]
    Definition(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("function {function} of message {message}: {source}")]
    Function {
        message: String,
        function: String,
        #[source]
        source: FunctionError,
    },
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}
