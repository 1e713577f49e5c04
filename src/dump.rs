//! Text dumps of a loaded network (messages, signals, Signal Store mapping with the current
//! typed buffer values) and payloads.

use crate::network::Network;
use std::fmt::Write;

/// Space separated lowercase hex, e.g. `59 02 00 2a`.
pub fn format_payload(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Multi-line description of the network configuration, logged at load.
pub fn describe_network(network: &Network) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "network {}", network.name());
    for m in network.messages() {
        let _ = write!(
            out,
            "  message {} frame_id=0x{:x} type={} buffer={} payload={}",
            m.name,
            m.frame_id,
            m.frame_type,
            m.buffer.len(),
            m.payload.len()
        );
        if m.is_cyclic() {
            let _ = write!(out, " cycle={}ms", m.cycle_time_ms);
        }
        if let Some(c) = &m.container {
            let _ = write!(out, " container={} mux_id={}", c, m.mux_id);
        }
        out.push('\n');
        for f in m.encode_functions() {
            let _ = writeln!(out, "    encode function {}", f.name);
        }
        for f in m.decode_functions() {
            let _ = writeln!(out, "    decode function {}", f.name);
        }
    }
    for e in network.marshal_table().entries() {
        let m = &network.messages()[e.message];
        let s = &m.signals[e.signal];
        let _ = write!(
            out,
            "  [{}] {}.{} {} @{}",
            e.index, m.name, s.member, s.primitive_type, s.buffer_offset
        );
        if s.internal {
            let _ = write!(out, " internal={}", s.value);
        } else {
            let _ = write!(out, " signal={}", s.name);
        }
        if s.mux_signal {
            out.push_str(" mux");
        }
        if let Some(raw) = m.buffer.read(s.buffer_offset, s.primitive_type) {
            let _ = write!(out, " raw={}", raw);
        }
        out.push('\n');
    }
    out
}
