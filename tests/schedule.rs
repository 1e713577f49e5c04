//! Cyclic transmission: alarms, tick cadence and model-time driven ticking.

mod common;

use common::{identity_registry, init_tracing, step};
use netmarshal::function::{COUNTER_INC_UINT8, POSITION};
use netmarshal::{
    Frame, FunctionDefinition, MemoryTransport, MessageDefinition, Network, NetworkDefinition, PrimitiveType,
    SignalDefinition,
};

fn cyclic_network(cycle_time_ms: u32) -> Network {
    let definition = NetworkDefinition::new("stub").with_message(
        MessageDefinition::new("example_message", 0x1f6, 1, 1)
            .with_cycle_time(cycle_time_ms)
            .with_signal(SignalDefinition::new("enable", PrimitiveType::U8, 0)),
    );
    let registry = identity_registry(&definition);
    Network::load(&definition, &registry).expect("load")
}

// ==== Cadence ====

#[test]
fn test_cyclic_message_transmits_every_cycle() {
    init_tracing();
    let mut network = cyclic_network(10);
    let mut bus = MemoryTransport::new();

    for tick in 0..=25u32 {
        if tick == 15 {
            assert!(network.set_signal("enable", 5.0));
        }
        let frames = step(&mut network, &mut bus);
        match tick {
            10 => {
                assert_eq!(frames.len(), 1, "tick 10");
                assert_eq!(frames[0].frame_id, 0x1f6);
                assert_eq!(frames[0].payload, vec![0]);
            }
            20 => {
                assert_eq!(frames.len(), 1, "tick 20");
                assert_eq!(frames[0].payload, vec![5]);
            }
            _ => assert!(frames.is_empty(), "unexpected transmission at tick {}", tick),
        }
    }
    assert_eq!(network.tick(), 26);
}

#[test]
fn test_content_change_alone_does_not_transmit_cyclic_message() {
    let mut network = cyclic_network(100);
    let mut bus = MemoryTransport::new();
    for value in 1..20 {
        network.set_signal("enable", value as f64);
        assert!(step(&mut network, &mut bus).is_empty());
    }
}

#[test]
fn test_cyclic_message_runs_encode_functions_once_per_alarm() {
    let definition = NetworkDefinition::new("stub").with_message(
        MessageDefinition::new("heartbeat", 0x1f7, 2, 2)
            .with_cycle_time(10)
            .with_signal(SignalDefinition::new("state", PrimitiveType::U8, 0))
            .with_signal(SignalDefinition::new("heartbeat_alive", PrimitiveType::U8, 1))
            .with_encode_function(FunctionDefinition::new(COUNTER_INC_UINT8).with_annotation(POSITION, "1")),
    );
    let registry = identity_registry(&definition);
    let mut network = Network::load(&definition, &registry).expect("load");
    let mut bus = MemoryTransport::new();

    for tick in 0..=25u32 {
        if tick == 15 {
            network.set_signal("state", 5.0);
        }
        let frames = step(&mut network, &mut bus);
        match tick {
            10 => assert_eq!(frames, vec![Frame::new(0x1f7, 0, vec![0, 1])]),
            20 => assert_eq!(frames, vec![Frame::new(0x1f7, 0, vec![5, 2])]),
            _ => assert!(frames.is_empty(), "unexpected transmission at tick {}", tick),
        }
    }
    assert_eq!(network.signal("heartbeat_alive"), Some(2.0));
}

#[test]
fn test_alarm_fires_at_multiples_of_cycle_time() {
    for cycle in [1u32, 2, 3, 7, 10, 25] {
        let mut network = cyclic_network(cycle);
        let mut bus = MemoryTransport::new();
        for tick in 0..200u32 {
            network.schedule_tick();
            let due = network.message("example_message").expect("message").needs_tx();
            assert_eq!(due, tick > 0 && tick % cycle == 0, "cycle {} tick {}", cycle, tick);
            network.step_encode(&mut bus).expect("encode");
        }
        assert_eq!(bus.take_outbound().len() as u32, 199 / cycle);
    }
}

#[test]
fn test_schedule_reset_restarts_at_tick_zero() {
    let mut network = cyclic_network(3);
    let mut bus = MemoryTransport::new();
    for _ in 0..5 {
        step(&mut network, &mut bus);
    }
    network.schedule_reset();
    assert_eq!(network.tick(), 0);
    assert_eq!(network.schedule().entries()[0].alarm, 0);

    bus.take_outbound();
    let sent: Vec<usize> = (0..7).map(|_| step(&mut network, &mut bus).len()).collect();
    assert_eq!(sent, vec![0, 0, 0, 1, 0, 0, 1]);
}

#[test]
fn test_event_message_has_no_schedule_entry() {
    let definition = NetworkDefinition::new("stub").with_message(
        MessageDefinition::new("event", 0x10, 1, 1).with_signal(SignalDefinition::new("x", PrimitiveType::U8, 0)),
    );
    let registry = identity_registry(&definition);
    let network = Network::load(&definition, &registry).expect("load");
    assert!(network.schedule().entries().is_empty());
}

// ==== Model time ====

#[test]
fn test_schedule_advance_converts_model_time_to_ticks() {
    let mut network = cyclic_network(10);
    assert_eq!(network.schedule_advance(0.0), 1, "initial tick");
    assert_eq!(network.schedule_advance(0.0), 0, "initial tick only once");
    assert_eq!(network.schedule_advance(0.001), 1);
    assert_eq!(network.schedule_advance(0.005), 4);
    assert_eq!(network.schedule_advance(0.005), 0);
    assert_eq!(network.schedule_advance(0.010), 5);
    assert_eq!(network.tick(), 11);

    network.schedule_reset();
    assert_eq!(network.schedule_advance(0.0), 1, "initial tick again after reset");
}

#[test]
fn test_slow_harness_still_transmits_on_cycle() {
    init_tracing();
    let mut network = cyclic_network(10);
    let mut bus = MemoryTransport::new();
    let mut sent = 0;
    // 5 ms harness steps over 100 ms
    for step_index in 0..=20 {
        let t = step_index as f64 * 0.005;
        network.step_decode(&mut bus).expect("decode");
        network.schedule_advance(t);
        network.step_encode(&mut bus).expect("encode");
        sent += bus.take_outbound().len();
    }
    assert_eq!(network.tick(), 101);
    assert_eq!(sent, 10);
}
