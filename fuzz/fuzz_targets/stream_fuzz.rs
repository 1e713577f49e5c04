//! Stream fuzz target: feed arbitrary bytes to the stream transport and decode them into
//! a small network. Reading must end in a frame, end of stream or a transport error; the
//! decode step must not panic.
//! Build with: cargo fuzz run stream_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn network() -> netmarshal::Network {
    use netmarshal::{
        CodecRegistry, LayoutCodec, LinearCodec, MessageDefinition, Network, NetworkDefinition, PrimitiveType,
        SignalBinding, SignalDefinition,
    };
    use std::sync::Arc;

    let definition = NetworkDefinition::new("fuzz").with_message(
        MessageDefinition::new("m", 0x1f2, 4, 4)
            .with_signal(SignalDefinition::new("a", PrimitiveType::U16, 0))
            .with_signal(SignalDefinition::new("b", PrimitiveType::I16, 2)),
    );
    let mut registry = CodecRegistry::with_stock_functions();
    registry.register_message("m", Arc::new(LayoutCodec::identity(4)));
    registry.register_signal("m", "a", SignalBinding::linear(PrimitiveType::U16, LinearCodec::identity()));
    registry.register_signal("m", "b", SignalBinding::linear(PrimitiveType::I16, LinearCodec::identity()));
    match Network::load(&definition, &registry) {
        Ok(n) => n,
        Err(e) => panic!("fuzz network failed to load: {}", e),
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let mut bus = netmarshal::StreamTransport::new();
    bus.push_inbound(data);
    let mut network = network();
    let _ = network.step_decode(&mut bus);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run stream_fuzz");
}
