//! Pack/unpack between typed buffers and payloads, gated on payload change.

use crate::message::Message;
use tracing::{debug, warn};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a hash.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(FNV_OFFSET_BASIS, |h, b| (h ^ u32::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Pack one message and run the checksum gate on it.
///
/// Returns true when the packed payload differs from the stored checksum. A changed
/// non-cyclic message is marked for transmission and its checksum updated; cyclic
/// messages are left alone (only the schedule transmits them). An unchanged payload
/// clears `needs_tx`.
pub fn pack_message(m: &mut Message) -> bool {
    if let Err(e) = m.pack() {
        warn!(msg = %m.name, error = %e, "pack failed");
        m.needs_tx = false;
        return false;
    }
    let checksum = m.payload_hash();
    if checksum == m.checksum {
        m.needs_tx = false;
        return false;
    }
    if !m.is_cyclic() {
        debug!(msg = %m.name, checksum, previous = m.checksum, "payload changed");
        m.needs_tx = true;
        m.checksum = checksum;
    }
    true
}

pub fn pack_messages(messages: &mut [Message]) {
    for m in messages.iter_mut() {
        pack_message(m);
    }
}

/// Unpack every payload into its typed buffer, without gating.
pub fn unpack_messages(messages: &mut [Message]) {
    for m in messages.iter_mut() {
        if let Err(e) = m.unpack() {
            warn!(msg = %m.name, error = %e, "unpack failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }
}
