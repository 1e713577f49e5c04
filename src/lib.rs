//! # netmarshal: signal/frame marshaling for bus network simulation
//!
//! Translates between named signal values owned by a co-simulation step loop and the
//! binary payloads of bus frames (CAN style), with:
//!
//! - typed buffers holding native-width fields at fixed offsets, range-checked on the way
//!   in and out;
//! - FNV-1a change detection so unchanged payloads are not retransmitted;
//! - a 1 ms schedule retransmitting cyclic messages regardless of content;
//! - container frames whose member message is selected by a discriminator;
//! - encode/decode payload functions (alive counters, checksums).
//!
//! ## Structure
//!
//! - **Definition**: [`NetworkDefinition`] and friends, plain serde data.
//! - **Registry**: [`CodecRegistry`] maps message, signal and function names to the
//!   [`MessageCodec`], [`SignalBinding`] and [`FunctionHandler`] implementations.
//! - **Network**: [`Network::load`] resolves everything once; [`Network::step_decode`],
//!   [`Network::schedule_advance`] and [`Network::step_encode`] run one simulation step
//!   against a [`Transport`].
//!
//! ## Usage
//!
//! ```no_run
//! use netmarshal::{
//!     CodecRegistry, LayoutCodec, LinearCodec, MemoryTransport, MessageDefinition, Network,
//!     NetworkDefinition, PrimitiveType, SignalBinding, SignalDefinition,
//! };
//! use std::sync::Arc;
//!
//! let definition = NetworkDefinition::new("stub").with_message(
//!     MessageDefinition::new("example_message", 0x1f6, 1, 1)
//!         .with_cycle_time(10)
//!         .with_signal(SignalDefinition::new("enable", PrimitiveType::U8, 0)),
//! );
//! let mut registry = CodecRegistry::with_stock_functions();
//! registry.register_message("example_message", Arc::new(LayoutCodec::identity(1)));
//! registry.register_signal(
//!     "example_message",
//!     "enable",
//!     SignalBinding::linear(PrimitiveType::U8, LinearCodec::identity()),
//! );
//!
//! let mut network = Network::load(&definition, &registry).unwrap();
//! let mut bus = MemoryTransport::new();
//! for step in 0..20 {
//!     network.step_decode(&mut bus).unwrap();
//!     network.schedule_advance(step as f64 * 0.001);
//!     network.step_encode(&mut bus).unwrap();
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod container;
pub mod definition;
pub mod dump;
pub mod error;
pub mod frame;
pub mod function;
pub mod lint;
pub mod marshal;
pub mod message;
pub mod network;
pub mod pack;
pub mod schedule;
pub mod value;

pub use buffer::{Native, TypedBuffer};
pub use codec::{CodecError, CodecRegistry, LayoutCodec, LinearCodec, MessageCodec, SignalBinding, SignalCodec};
pub use definition::{FunctionDefinition, MessageDefinition, NetworkDefinition, PrimitiveType, SignalDefinition};
pub use error::{LoadError, StepError};
pub use frame::{
    DecodeSummary, EncodeSummary, Frame, MemoryTransport, StreamTransport, Transport, TransportError, WriteFailure,
};
pub use function::{Function, FunctionError, FunctionHandler, FunctionStatus, InstanceState, RejectedMessage, Rejection};
pub use marshal::{MarshalEntry, MarshalTable};
pub use message::{Message, Signal};
pub use network::Network;
pub use pack::fnv1a_32;
pub use schedule::{Schedule, ScheduleEntry};
pub use value::NativeValue;
