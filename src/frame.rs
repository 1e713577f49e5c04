//! Bus frames: transports and the decode/encode passes between frames and messages.
//!
//! Decoding reads every pending frame, routes it to its message (resolving container
//! members through the header's discriminator) and marks messages whose payload changed
//! for a signal update. Encoding writes one frame per message with `needs_tx` set, unless
//! the network is switched off.

use crate::container::{find_member, find_message};
use crate::dump::format_payload;
use crate::function::RejectedMessage;
use crate::marshal::MarshalTable;
use crate::message::Message;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::VecDeque;
use std::io::Cursor;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_id: u32,
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_id: u32, frame_type: u8, payload: impl Into<Vec<u8>>) -> Self {
        Frame {
            frame_id,
            frame_type,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated frame record: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("payload of {0} bytes does not fit a frame record")]
    Oversize(usize),
}

/// Raw frame I/O used by the network.
pub trait Transport {
    /// Next inbound frame, `None` once the inbound side is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError>;
    fn write_frame(&mut self, frame_id: u32, frame_type: u8, payload: &[u8]) -> Result<(), TransportError>;
    /// Publish the frames written since the last flush.
    fn flush(&mut self) -> Result<(), TransportError>;
    /// Discard the inbound side.
    fn truncate(&mut self);
}

/// Frame queues in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Frame>,
    pending: Vec<Frame>,
    outbound: Vec<Frame>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport::default()
    }

    pub fn push_inbound(&mut self, frame: Frame) {
        self.inbound.push_back(frame);
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Flushed frames, oldest first; clears the outbound side.
    pub fn take_outbound(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.outbound)
    }
}

impl Transport for MemoryTransport {
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        Ok(self.inbound.pop_front())
    }

    fn write_frame(&mut self, frame_id: u32, frame_type: u8, payload: &[u8]) -> Result<(), TransportError> {
        self.pending.push(Frame::new(frame_id, frame_type, payload));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.outbound.append(&mut self.pending);
        Ok(())
    }

    fn truncate(&mut self) {
        self.inbound.clear();
    }
}

/// Size of a stream record header: frame id (u32), frame type (u8), length (u16).
pub const RECORD_HEADER_LEN: usize = 7;

/// Length-prefixed frame records in a byte stream (little-endian).
///
/// Record: `frame_id: u32`, `frame_type: u8`, `len: u16`, then `len` payload bytes.
#[derive(Debug, Clone, Default)]
pub struct StreamTransport {
    inbound: Vec<u8>,
    read_pos: usize,
    pending: Vec<u8>,
    outbound: Vec<u8>,
}

impl StreamTransport {
    pub fn new() -> Self {
        StreamTransport::default()
    }

    /// Append raw stream bytes to the inbound side.
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Flushed stream bytes; clears the outbound side.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Encode one record.
    pub fn encode_record(out: &mut Vec<u8>, frame_id: u32, frame_type: u8, payload: &[u8]) -> Result<(), TransportError> {
        let len = u16::try_from(payload.len()).map_err(|_| TransportError::Oversize(payload.len()))?;
        out.write_u32::<LittleEndian>(frame_id)?;
        out.write_u8(frame_type)?;
        out.write_u16::<LittleEndian>(len)?;
        out.extend_from_slice(payload);
        Ok(())
    }
}

impl Transport for StreamTransport {
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        let rest = self.inbound.get(self.read_pos..).unwrap_or(&[]);
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() < RECORD_HEADER_LEN {
            return Err(TransportError::Truncated {
                needed: RECORD_HEADER_LEN,
                available: rest.len(),
            });
        }
        let mut cursor = Cursor::new(rest);
        let frame_id = cursor.read_u32::<LittleEndian>()?;
        let frame_type = cursor.read_u8()?;
        let len = cursor.read_u16::<LittleEndian>()? as usize;
        let end = RECORD_HEADER_LEN + len;
        let payload = rest.get(RECORD_HEADER_LEN..end).ok_or(TransportError::Truncated {
            needed: end,
            available: rest.len(),
        })?;
        let frame = Frame::new(frame_id, frame_type, payload);
        self.read_pos += end;
        Ok(Some(frame))
    }

    fn write_frame(&mut self, frame_id: u32, frame_type: u8, payload: &[u8]) -> Result<(), TransportError> {
        StreamTransport::encode_record(&mut self.pending, frame_id, frame_type, payload)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.outbound.append(&mut self.pending);
        Ok(())
    }

    fn truncate(&mut self) {
        self.inbound.clear();
        self.read_pos = 0;
    }
}

/// Outcome of one decode step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Frames read from the transport.
    pub frames: usize,
    /// Ids of frames that matched no message.
    pub unmatched: Vec<u32>,
    /// Messages whose decode functions rejected them (or could not run).
    pub rejected: Vec<RejectedMessage>,
    /// Read error that ended the step's read loop early.
    pub transport_error: Option<String>,
}

/// Outcome of one encode step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub sent: usize,
    /// Messages due for transmission but silenced by the network-off signal.
    pub suppressed: usize,
    pub failed: Vec<WriteFailure>,
    pub rejected: Vec<RejectedMessage>,
}

/// A frame the transport refused to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub message: String,
    pub frame_id: u32,
    pub error: String,
}

fn process_message(
    messages: &mut [Message],
    table: &MarshalTable,
    store: &mut [f64],
    index: usize,
    frame: &Frame,
    resolve_container: bool,
) {
    {
        let m = &mut messages[index];
        m.load_payload(&frame.payload);
        if let Err(e) = m.unpack() {
            warn!(msg = %m.name, error = %e, "unpack of received frame failed");
            return;
        }
    }

    let mux_entry = messages[index]
        .mux_signal
        .and_then(|si| messages[index].signals[si].mux_entry);
    if let (true, Some(entry)) = (resolve_container, mux_entry) {
        table.decode_entry(entry, messages, store);
        let discriminator = store[table.entries()[entry].index];
        match find_member(messages, frame.frame_id, discriminator) {
            Some(member) if member != index => {
                debug!(header = %messages[index].name, member = %messages[member].name, discriminator, "container member");
                process_message(messages, table, store, member, frame, false);
            }
            _ => debug!(header = %messages[index].name, discriminator, "no container member"),
        }
    }

    let m = &mut messages[index];
    let checksum = m.payload_hash();
    if checksum == m.checksum {
        debug!(msg = %m.name, checksum, "filtered on checksum");
        m.update_signals = false;
    } else {
        debug!(msg = %m.name, checksum, "decode path checksum");
        m.checksum = checksum;
        m.update_signals = true;
    }
}

/// Read every pending frame, apply it to its message, then truncate the inbound side.
pub fn decode_from_bus(
    messages: &mut [Message],
    table: &MarshalTable,
    store: &mut [f64],
    transport: &mut dyn Transport,
) -> DecodeSummary {
    let mut summary = DecodeSummary::default();
    loop {
        let frame = match transport.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "frame read failed");
                summary.transport_error = Some(e.to_string());
                break;
            }
        };
        summary.frames += 1;
        debug!(frame_id = frame.frame_id, frame_type = frame.frame_type, payload = %format_payload(&frame.payload), "rx");
        match find_message(messages, frame.frame_id) {
            Some(index) => process_message(messages, table, store, index, &frame, true),
            None => {
                debug!(frame_id = frame.frame_id, "network does not have frame id");
                summary.unmatched.push(frame.frame_id);
            }
        }
    }
    transport.truncate();
    summary
}

/// Write a frame for every message with `needs_tx` set, then flush.
///
/// With `network_off` every pending transmission is dropped instead. A refused write is
/// recorded in the summary and the remaining messages are still written; only a failed
/// flush is returned as an error.
pub fn encode_to_bus(
    messages: &mut [Message],
    network_off: bool,
    transport: &mut dyn Transport,
) -> Result<EncodeSummary, TransportError> {
    let mut summary = EncodeSummary::default();
    for m in messages.iter_mut() {
        if !m.needs_tx {
            continue;
        }
        m.needs_tx = false;
        if network_off {
            summary.suppressed += 1;
            continue;
        }
        debug!(msg = %m.name, frame_id = m.frame_id, payload = %format_payload(&m.payload), "tx");
        match transport.write_frame(m.frame_id, m.frame_type, &m.payload) {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                warn!(msg = %m.name, frame_id = m.frame_id, error = %e, "frame write failed");
                summary.failed.push(WriteFailure {
                    message: m.name.clone(),
                    frame_id: m.frame_id,
                    error: e.to_string(),
                });
            }
        }
    }
    if summary.suppressed > 0 {
        debug!(suppressed = summary.suppressed, "network off, transmission suppressed");
    }
    transport.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_records_roundtrip_through_flush() {
        let mut t = StreamTransport::new();
        t.write_frame(0x1f2, 0, &[4, 1]).unwrap();
        assert!(t.take_outbound().is_empty(), "nothing published before flush");
        t.flush().unwrap();
        let bytes = t.take_outbound();
        assert_eq!(bytes, vec![0xf2, 0x01, 0, 0, 0, 2, 0, 4, 1]);

        t.push_inbound(&bytes);
        assert_eq!(t.read_frame().unwrap(), Some(Frame::new(0x1f2, 0, vec![4, 1])));
        assert_eq!(t.read_frame().unwrap(), None);
    }

    #[test]
    fn short_record_is_truncated_error() {
        let mut t = StreamTransport::new();
        t.push_inbound(&[0xf2, 0x01, 0, 0, 0, 8, 0, 1, 2]);
        match t.read_frame() {
            Err(TransportError::Truncated { needed, available }) => {
                assert_eq!(needed, 15);
                assert_eq!(available, 9);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
        t.truncate();
        assert_eq!(t.read_frame().unwrap(), None);
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let mut out = Vec::new();
        let big = vec![0u8; u16::MAX as usize + 1];
        assert!(matches!(
            StreamTransport::encode_record(&mut out, 1, 0, &big),
            Err(TransportError::Oversize(_))
        ));
        assert!(out.is_empty());
    }
}
