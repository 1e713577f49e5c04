//! Container (multiplexed) frames: one frame id shared by a header message and several
//! member messages, selected by the header's discriminator value.

use crate::message::Message;

/// Message that receives a frame with `frame_id`.
///
/// Headers and ordinary messages take precedence; a member is only returned when no other
/// message carries the id.
pub fn find_message(messages: &[Message], frame_id: u32) -> Option<usize> {
    messages
        .iter()
        .position(|m| m.frame_id == frame_id && !m.is_container_member())
        .or_else(|| messages.iter().position(|m| m.frame_id == frame_id))
}

/// Member of the container on `frame_id` whose mux id equals `discriminator`.
///
/// A discriminator of 0, a negative or non-finite value, or one above `u32::MAX` selects
/// nothing.
pub fn find_member(messages: &[Message], frame_id: u32, discriminator: f64) -> Option<usize> {
    if !discriminator.is_finite() || discriminator < 1.0 || discriminator > f64::from(u32::MAX) {
        return None;
    }
    let mux_id = discriminator as u32;
    messages
        .iter()
        .position(|m| m.is_container_member() && m.frame_id == frame_id && m.mux_id == mux_id)
}
