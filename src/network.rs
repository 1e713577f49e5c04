//! The network: messages, marshal table, Signal Store and schedule of one bus node.
//!
//! A harness drives a loaded network once per simulation step:
//!
//! ```text
//! step_decode(transport)      frames -> payloads -> buffers -> signals
//! schedule_advance(time)      1 ms ticks, cyclic alarms
//! step_encode(transport)      signals -> buffers -> payloads -> frames
//! ```
//!
//! Between steps the harness reads and writes signal values through [`Network::signal`]
//! and [`Network::set_signal`] (or index based through [`Network::signals_mut`]).

use crate::buffer::TypedBuffer;
use crate::codec::CodecRegistry;
use crate::definition::{FunctionDefinition, MessageDefinition, NetworkDefinition};
use crate::dump::describe_network;
use crate::error::{LoadError, StepError};
use crate::frame::{decode_from_bus, encode_to_bus, DecodeSummary, EncodeSummary, Transport};
use crate::function::{apply_decode, apply_encode, Function};
use crate::marshal::MarshalTable;
use crate::message::{Message, Signal};
use crate::pack::{pack_messages, unpack_messages};
use crate::schedule::Schedule;
use std::collections::HashSet;
use tracing::{debug, error, info, trace};

#[derive(Debug)]
pub struct Network {
    name: String,
    bus_id: u32,
    node_id: u32,
    interface_id: u32,
    messages: Vec<Message>,
    table: MarshalTable,
    names: Vec<String>,
    store: Vec<f64>,
    schedule: Schedule,
    netoff: Option<usize>,
}

fn build_functions(
    message: &MessageDefinition,
    defs: &[FunctionDefinition],
    registry: &CodecRegistry,
) -> Result<Vec<Function>, LoadError> {
    defs.iter()
        .map(|f| {
            let handler = registry.function(&f.name).ok_or_else(|| LoadError::UnresolvedFunction {
                message: message.name.clone(),
                function: f.name.clone(),
            })?;
            Ok(Function::new(f.name.clone(), f.annotations.clone(), handler))
        })
        .collect()
}

fn build_message(def: &MessageDefinition, registry: &CodecRegistry) -> Result<Message, LoadError> {
    let codec = registry
        .message_codec(&def.name, def.container.as_deref())
        .ok_or_else(|| LoadError::UnresolvedMessageCodec(def.name.clone()))?;
    Ok(Message {
        name: def.name.clone(),
        frame_id: def.frame_id,
        frame_type: def.frame_type,
        cycle_time_ms: def.cycle_time_ms,
        container: def.container.clone(),
        mux_id: def.mux_id,
        signals: def.signals.iter().map(Signal::from).collect(),
        mux_signal: None,
        buffer: TypedBuffer::new(def.buffer_len),
        payload: vec![0u8; def.payload_len],
        checksum: 0,
        needs_tx: false,
        update_signals: false,
        codec,
        encode_functions: build_functions(def, &def.encode_functions, registry)?,
        decode_functions: build_functions(def, &def.decode_functions, registry)?,
    })
}

impl Network {
    /// Build a network from its definition, resolving every codec and function.
    ///
    /// Initial values are marshaled and packed so the checksums reflect them; they are
    /// never transmitted on their own. The schedule starts at tick 0.
    pub fn load(definition: &NetworkDefinition, registry: &CodecRegistry) -> Result<Self, LoadError> {
        let mut seen = HashSet::new();
        for m in &definition.messages {
            if !seen.insert(m.name.as_str()) {
                return Err(LoadError::DuplicateMessage(m.name.clone()));
            }
        }

        let mut messages = definition
            .messages
            .iter()
            .map(|m| build_message(m, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let table = MarshalTable::build(&mut messages, registry)?;
        let names = table.signal_names(&messages);
        let store = table
            .entries()
            .iter()
            .map(|e| {
                let s = &messages[e.message].signals[e.signal];
                if s.internal {
                    s.value
                } else {
                    s.init_value
                }
            })
            .collect();

        let netoff = match &definition.netoff_signal {
            Some(signal) => Some(
                names
                    .iter()
                    .position(|n| !n.is_empty() && n == signal)
                    .ok_or_else(|| LoadError::UnknownNetoffSignal(signal.clone()))?,
            ),
            None => None,
        };

        let schedule = Schedule::new(&messages);
        let mut network = Network {
            name: definition.name.clone(),
            bus_id: definition.bus_id,
            node_id: definition.node_id,
            interface_id: definition.interface_id,
            messages,
            table,
            names,
            store,
            schedule,
            netoff,
        };

        network.signals_to_buffers();
        pack_messages(&mut network.messages);
        for m in network.messages.iter_mut() {
            m.needs_tx = false;
        }

        info!(
            network = %network.name,
            messages = network.messages.len(),
            signals = network.store.len(),
            cyclic = network.schedule.entries().len(),
            "network loaded"
        );
        info!("{}", describe_network(&network));
        Ok(network)
    }

    /// Release the network. Function instance state is dropped with it.
    pub fn unload(self) {
        debug!(network = %self.name, "network unloaded");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bus_id(&self) -> u32 {
        self.bus_id
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn interface_id(&self) -> u32 {
        self.interface_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn marshal_table(&self) -> &MarshalTable {
        &self.table
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    // ==== Signal Store ====

    /// Signal Store names by index; internal signals have an empty name.
    pub fn signal_names(&self) -> &[String] {
        &self.names
    }

    pub fn signals(&self) -> &[f64] {
        &self.store
    }

    pub fn signals_mut(&mut self) -> &mut [f64] {
        &mut self.store
    }

    pub fn signal_index(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.names.iter().position(|n| n == name)
    }

    pub fn signal(&self, name: &str) -> Option<f64> {
        self.signal_index(name).map(|i| self.store[i])
    }

    /// Set a signal by name; false if no such signal.
    pub fn set_signal(&mut self, name: &str, value: f64) -> bool {
        match self.signal_index(name) {
            Some(i) => {
                self.store[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn is_network_off(&self) -> bool {
        self.netoff.map_or(false, |i| self.store[i] != 0.0)
    }

    // ==== Stages ====

    pub fn signals_to_buffers(&mut self) {
        self.table.signals_to_buffers(&mut self.messages, &self.store);
    }

    pub fn buffers_to_signals(&mut self) {
        self.table.buffers_to_signals(&mut self.messages, &mut self.store);
    }

    pub fn pack(&mut self) {
        pack_messages(&mut self.messages);
    }

    pub fn unpack(&mut self) {
        unpack_messages(&mut self.messages);
    }

    // ==== Steps ====

    /// Decode inbound frames, run decode functions and update the Signal Store.
    pub fn step_decode(&mut self, transport: &mut dyn Transport) -> Result<DecodeSummary, StepError> {
        let mut summary = decode_from_bus(&mut self.messages, &self.table, &mut self.store, transport);
        summary.rejected = apply_decode(&mut self.messages)?;
        self.buffers_to_signals();
        trace!(frames = summary.frames, unmatched = summary.unmatched.len(), "decode step");
        Ok(summary)
    }

    /// Marshal and pack the Signal Store, run encode functions and transmit.
    ///
    /// Payload changes made by encode functions are decoded back into the Signal Store
    /// before returning. While the network is off no encode function runs. A frame the
    /// transport refuses is listed in [`EncodeSummary::failed`]; only a failed flush is an
    /// error.
    pub fn step_encode(&mut self, transport: &mut dyn Transport) -> Result<EncodeSummary, StepError> {
        let network_off = self.is_network_off();
        self.signals_to_buffers();
        self.pack();
        let rejected = if network_off {
            Vec::new()
        } else {
            apply_encode(&mut self.messages)?
        };
        let result = encode_to_bus(&mut self.messages, network_off, transport);
        self.buffers_to_signals();
        let mut summary = result.map_err(|e| {
            error!(network = %self.name, error = %e, "unable to flush frames");
            StepError::from(e)
        })?;
        summary.rejected = rejected;
        Ok(summary)
    }

    // ==== Schedule ====

    pub fn schedule_reset(&mut self) {
        self.schedule.reset(&self.messages);
    }

    pub fn schedule_tick(&mut self) {
        self.schedule.tick(&mut self.messages);
    }

    /// Run the ticks due at simulation time `model_time_s`; returns how many ran.
    pub fn schedule_advance(&mut self, model_time_s: f64) -> u64 {
        let due = self.schedule.due_ticks(model_time_s);
        for _ in 0..due {
            self.schedule.tick(&mut self.messages);
        }
        if due > 0 {
            trace!(model_time_s, due, tick = self.schedule.tick_count(), "schedule advanced");
        }
        due
    }

    /// Ticks run since the last schedule reset.
    pub fn tick(&self) -> u64 {
        self.schedule.tick_count()
    }
}
