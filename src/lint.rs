//! Linter for network definitions: static checks run before a network is loaded.
//!
//! ## Rules
//!
//! - **Zero buffer length**: every message needs a typed buffer.
//! - **Signal out of bounds**: `offset + width` must fit the buffer.
//! - **Overlapping signals**: two signals of one message share buffer bytes.
//! - **Duplicate message name**: names key codecs and must be unique.
//! - **Duplicate frame id**: two messages outside containers use the same frame id.
//! - **Unknown container**: a member names a container that is not declared.
//! - **Container without mux signal**: a container header has no discriminator signal.
//! - **Member without mux id**: a member with mux id 0 can never be selected.
//! - **Missing position**: a stock function is declared without its `position` annotation.
//!
//! Run the linter via the `lint_network` binary: `cargo run --bin lint_network -- network.json`.
//! Exit code 1 if any error-level findings.

use crate::definition::{MessageDefinition, NetworkDefinition};
use crate::function::{COUNTER_INC_UINT8, CRC_GENERATE, CRC_VALIDATE, POSITION};
use std::collections::{HashMap, HashSet};

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    ZeroBufferLength,
    SignalOutOfBounds,
    OverlappingSignals,
    DuplicateMessageName,
    DuplicateFrameId,
    UnknownContainer,
    ContainerWithoutMuxSignal,
    MemberWithoutMuxId,
    MissingPosition,
}

impl LintRule {
    pub fn id(self) -> &'static str {
        match self {
            LintRule::ZeroBufferLength => "zero-buffer-length",
            LintRule::SignalOutOfBounds => "signal-out-of-bounds",
            LintRule::OverlappingSignals => "overlapping-signals",
            LintRule::DuplicateMessageName => "duplicate-message-name",
            LintRule::DuplicateFrameId => "duplicate-frame-id",
            LintRule::UnknownContainer => "unknown-container",
            LintRule::ContainerWithoutMuxSignal => "container-without-mux-signal",
            LintRule::MemberWithoutMuxId => "member-without-mux-id",
            LintRule::MissingPosition => "missing-position",
        }
    }
}

/// A single lint message with location (`message` or `message.signal`).
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub location: String,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

fn push(out: &mut Vec<LintMessage>, location: String, rule: LintRule, severity: Severity, message: String) {
    out.push(LintMessage {
        location,
        rule,
        severity,
        message,
    });
}

fn lint_signals(m: &MessageDefinition, out: &mut Vec<LintMessage>) {
    if m.buffer_len == 0 {
        push(out, m.name.clone(), LintRule::ZeroBufferLength, Severity::Error, "buffer_len not set".to_string());
    }
    for s in &m.signals {
        if s.end_offset() > m.buffer_len {
            push(
                out,
                format!("{}.{}", m.name, s.name),
                LintRule::SignalOutOfBounds,
                Severity::Error,
                format!(
                    "{} at offset {} exceeds buffer of {} bytes",
                    s.primitive_type, s.buffer_offset, m.buffer_len
                ),
            );
        }
    }
    for (i, a) in m.signals.iter().enumerate() {
        for b in &m.signals[i + 1..] {
            if a.buffer_offset < b.end_offset() && b.buffer_offset < a.end_offset() {
                push(
                    out,
                    format!("{}.{}", m.name, b.name),
                    LintRule::OverlappingSignals,
                    Severity::Warning,
                    format!("overlaps {} in the typed buffer", a.name),
                );
            }
        }
    }
}

fn lint_functions(m: &MessageDefinition, out: &mut Vec<LintMessage>) {
    let stock = [COUNTER_INC_UINT8, CRC_GENERATE, CRC_VALIDATE];
    for f in m.encode_functions.iter().chain(&m.decode_functions) {
        if stock.contains(&f.name.as_str()) && !f.annotations.contains_key(POSITION) {
            push(
                out,
                format!("{}.{}", m.name, f.name),
                LintRule::MissingPosition,
                Severity::Error,
                format!("{} requires annotation `{}`", f.name, POSITION),
            );
        }
    }
}

/// Run all lint rules on a definition. Returns messages in declaration order per rule group.
pub fn lint(definition: &NetworkDefinition) -> Vec<LintMessage> {
    let mut out = Vec::new();
    let mut names = HashSet::new();
    let mut frame_ids: HashMap<u32, &str> = HashMap::new();

    for m in &definition.messages {
        if !names.insert(m.name.as_str()) {
            push(
                &mut out,
                m.name.clone(),
                LintRule::DuplicateMessageName,
                Severity::Error,
                "message name declared more than once".to_string(),
            );
        }
        lint_signals(m, &mut out);
        lint_functions(m, &mut out);

        if !m.is_container_member() {
            if let Some(first) = frame_ids.insert(m.frame_id, &m.name) {
                push(
                    &mut out,
                    m.name.clone(),
                    LintRule::DuplicateFrameId,
                    Severity::Warning,
                    format!("frame id 0x{:x} already used by {}", m.frame_id, first),
                );
            }
        }
    }

    for m in &definition.messages {
        let container = match &m.container {
            Some(c) => c,
            None => continue,
        };
        if m.mux_id == 0 {
            push(
                &mut out,
                m.name.clone(),
                LintRule::MemberWithoutMuxId,
                Severity::Warning,
                "container member has mux id 0".to_string(),
            );
        }
        match definition.get_message(container) {
            None => push(
                &mut out,
                m.name.clone(),
                LintRule::UnknownContainer,
                Severity::Error,
                format!("container {} is not declared", container),
            ),
            Some(header) if !header.signals.iter().any(|s| s.mux_signal) => push(
                &mut out,
                header.name.clone(),
                LintRule::ContainerWithoutMuxSignal,
                Severity::Error,
                format!("container of {} has no mux signal", m.name),
            ),
            Some(_) => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FunctionDefinition, PrimitiveType, SignalDefinition};

    fn rules(msgs: &[LintMessage]) -> Vec<LintRule> {
        msgs.iter().map(|m| m.rule).collect()
    }

    #[test]
    fn lint_clean_definition_passes() {
        let def = NetworkDefinition::new("stub").with_message(
            MessageDefinition::new("example_message", 0x1f6, 1, 1)
                .with_signal(SignalDefinition::new("enable", PrimitiveType::U8, 0)),
        );
        let msgs = lint(&def);
        assert!(msgs.is_empty(), "clean definition should have no findings: {:?}", msgs);
    }

    #[test]
    fn lint_bounds_and_overlap() {
        let def = NetworkDefinition::new("stub").with_message(
            MessageDefinition::new("m", 1, 4, 4)
                .with_signal(SignalDefinition::new("a", PrimitiveType::U16, 0))
                .with_signal(SignalDefinition::new("b", PrimitiveType::U8, 1))
                .with_signal(SignalDefinition::new("c", PrimitiveType::U32, 2)),
        );
        let found = rules(&lint(&def));
        assert!(found.contains(&LintRule::OverlappingSignals));
        assert!(found.contains(&LintRule::SignalOutOfBounds));

        let def = NetworkDefinition::new("stub").with_message(
            MessageDefinition::new("m", 1, 4, 4)
                .with_signal(SignalDefinition::new("a", PrimitiveType::U8, 0))
                .with_signal(SignalDefinition::new("far", PrimitiveType::U16, usize::MAX)),
        );
        let found = rules(&lint(&def));
        assert!(found.contains(&LintRule::SignalOutOfBounds));
        assert!(!found.contains(&LintRule::OverlappingSignals));
    }

    #[test]
    fn lint_container_rules() {
        let def = NetworkDefinition::new("stub")
            .with_message(
                MessageDefinition::new("container", 600, 6, 4)
                    .with_signal(SignalDefinition::new("header_id", PrimitiveType::U32, 0)),
            )
            .with_message(MessageDefinition::new("member", 600, 14, 12).in_container("container", 0))
            .with_message(MessageDefinition::new("orphan", 700, 1, 1).in_container("missing", 7));
        let msgs = lint(&def);
        let found = rules(&msgs);
        assert!(found.contains(&LintRule::ContainerWithoutMuxSignal));
        assert!(found.contains(&LintRule::MemberWithoutMuxId));
        assert!(found.contains(&LintRule::UnknownContainer));
        assert!(!found.contains(&LintRule::DuplicateFrameId), "members share the header frame id");
    }

    #[test]
    fn lint_stock_function_position() {
        let def = NetworkDefinition::new("stub").with_message(
            MessageDefinition::new("m", 1, 2, 2)
                .with_encode_function(FunctionDefinition::new(CRC_GENERATE))
                .with_decode_function(FunctionDefinition::new(CRC_VALIDATE).with_annotation(POSITION, "1")),
        );
        let msgs = lint(&def);
        assert_eq!(rules(&msgs), vec![LintRule::MissingPosition]);
        assert_eq!(msgs[0].severity, Severity::Error);
    }
}
