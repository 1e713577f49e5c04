//! Helpers shared by the integration tests.

#![allow(dead_code)]

use netmarshal::{
    CodecRegistry, Frame, LayoutCodec, LinearCodec, MemoryTransport, MessageDefinition, Network, NetworkDefinition,
    PrimitiveType, SignalBinding,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Registry with stock functions and, for every message of `definition`, an identity
/// layout codec over the buffer and identity linear codecs for its signals.
pub fn identity_registry(definition: &NetworkDefinition) -> CodecRegistry {
    let mut registry = CodecRegistry::with_stock_functions();
    for m in &definition.messages {
        register_identity(&mut registry, m);
    }
    registry
}

pub fn register_identity(registry: &mut CodecRegistry, m: &MessageDefinition) {
    registry.register_message(m.name.clone(), Arc::new(LayoutCodec::identity(m.buffer_len)));
    for s in &m.signals {
        registry.register_signal(
            m.name.clone(),
            s.member.clone(),
            SignalBinding::linear(s.primitive_type, LinearCodec::identity()),
        );
    }
}

pub fn linear(primitive_type: PrimitiveType) -> SignalBinding {
    SignalBinding::linear(primitive_type, LinearCodec::identity())
}

/// One harness step: decode, one schedule tick, encode. Returns the frames sent.
pub fn step(network: &mut Network, bus: &mut MemoryTransport) -> Vec<Frame> {
    network.step_decode(bus).expect("decode step");
    network.schedule_tick();
    network.step_encode(bus).expect("encode step");
    bus.take_outbound()
}
