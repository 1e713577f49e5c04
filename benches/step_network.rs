//! Benchmark: one full harness step (decode, tick, encode) on a network of 64 messages,
//! idle (nothing changes, everything filtered on checksum) and busy (every message changes
//! and runs its encode functions).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netmarshal::function::{COUNTER_INC_UINT8, CRC_GENERATE, POSITION};
use netmarshal::{
    CodecRegistry, FunctionDefinition, LayoutCodec, LinearCodec, MemoryTransport, MessageDefinition, Network,
    NetworkDefinition, PrimitiveType, SignalBinding, SignalDefinition,
};
use std::sync::Arc;

const MESSAGES: u32 = 64;

fn build() -> Network {
    let mut definition = NetworkDefinition::new("bench");
    let mut registry = CodecRegistry::with_stock_functions();
    for i in 0..MESSAGES {
        let name = format!("message_{}", i);
        let mut m = MessageDefinition::new(name.clone(), 0x100 + i, 8, 8)
            .with_signal(SignalDefinition::new(format!("speed_{}", i), PrimitiveType::U16, 0).with_member("speed"))
            .with_signal(SignalDefinition::new(format!("torque_{}", i), PrimitiveType::I32, 2).with_member("torque"))
            .with_signal(SignalDefinition::new(format!("alive_{}", i), PrimitiveType::U8, 6).with_member("alive"))
            .with_signal(SignalDefinition::new(format!("crc_{}", i), PrimitiveType::U8, 7).with_member("crc"))
            .with_encode_function(FunctionDefinition::new(COUNTER_INC_UINT8).with_annotation(POSITION, "6"))
            .with_encode_function(FunctionDefinition::new(CRC_GENERATE).with_annotation(POSITION, "7"));
        if i % 4 == 0 {
            m = m.with_cycle_time(10);
        }
        registry.register_message(name.clone(), Arc::new(LayoutCodec::identity(8)));
        registry.register_signal(name.clone(), "speed", SignalBinding::linear(PrimitiveType::U16, LinearCodec::new(0.1, 0.0)));
        registry.register_signal(name.clone(), "torque", SignalBinding::linear(PrimitiveType::I32, LinearCodec::new(0.5, -100.0)));
        registry.register_signal(name.clone(), "alive", SignalBinding::linear(PrimitiveType::U8, LinearCodec::identity()));
        registry.register_signal(name, "crc", SignalBinding::linear(PrimitiveType::U8, LinearCodec::identity()));
        definition.messages.push(m);
    }
    Network::load(&definition, &registry).expect("load")
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_network");

    let mut network = build();
    let mut bus = MemoryTransport::new();
    group.bench_function("idle", |b| {
        b.iter(|| {
            network.step_decode(&mut bus).expect("decode");
            network.schedule_tick();
            network.step_encode(&mut bus).expect("encode");
            black_box(bus.take_outbound());
        })
    });

    let mut network = build();
    let mut bus = MemoryTransport::new();
    let mut speed = 0.0;
    group.bench_function("busy", |b| {
        b.iter(|| {
            speed = (speed + 0.1) % 6000.0;
            for v in network.signals_mut().iter_mut().step_by(4) {
                *v = speed;
            }
            network.step_decode(&mut bus).expect("decode");
            network.schedule_tick();
            network.step_encode(&mut bus).expect("encode");
            // loop the frames back so the decode path is exercised next iteration
            for frame in bus.take_outbound() {
                bus.push_inbound(black_box(frame));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
