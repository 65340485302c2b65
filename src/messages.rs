//! Message types exchanged with the acquisition loop.
//!
//! Inbound, the loop receives [`ControlUpdate`] batches (parameter name to
//! new value). Outbound, besides frames, it emits [`Diagnostic`] messages on a
//! best-effort channel using the tagged string format `I:<text>`, `W:<text>`,
//! `E:<text>`.

use crate::core::ParameterValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

/// A single parameter change as produced by a UI or configuration layer.
///
/// ```json
/// {"name": "replay_fps", "value": 30}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Parameter name
    pub name: String,
    /// New value
    pub value: ParameterValue,
}

/// A batch of parameter changes applied together in one loop iteration.
///
/// Later values for the same name replace earlier ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlUpdate {
    values: BTreeMap<String, ParameterValue>,
}

impl ControlUpdate {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Record a new value for `name`.
    pub fn set(&mut self, name: &str, value: impl Into<ParameterValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Fold `other` into this batch; its values win.
    pub fn merge(&mut self, other: ControlUpdate) {
        self.values.extend(other.values);
    }

    /// Value recorded for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// True if the batch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct parameters in the batch.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<ControlMessage> for ControlUpdate {
    fn from(message: ControlMessage) -> Self {
        ControlUpdate::new().with(&message.name, message.value)
    }
}

impl FromIterator<ControlMessage> for ControlUpdate {
    fn from_iter<I: IntoIterator<Item = ControlMessage>>(iter: I) -> Self {
        let mut update = ControlUpdate::new();
        for message in iter {
            update.set(&message.name, message.value);
        }
        update
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    /// Informational (`I:`)
    Info,
    /// Non-fatal warning (`W:`)
    Warning,
    /// Error (`E:`)
    Error,
}

impl DiagnosticLevel {
    fn tag(self) -> char {
        match self {
            DiagnosticLevel::Info => 'I',
            DiagnosticLevel::Warning => 'W',
            DiagnosticLevel::Error => 'E',
        }
    }
}

/// Tagged status message from the acquisition loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub level: DiagnosticLevel,
    /// Message body
    pub text: String,
}

impl Diagnostic {
    /// `I:` message.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            text: text.into(),
        }
    }

    /// `W:` message.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            text: text.into(),
        }
    }

    /// `E:` message.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            text: text.into(),
        }
    }

    /// Parse the tagged wire form, e.g. `"W:Dropped frame"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (tag, text) = raw.split_once(':')?;
        let level = match tag {
            "I" => DiagnosticLevel::Info,
            "W" => DiagnosticLevel::Warning,
            "E" => DiagnosticLevel::Error,
            _ => return None,
        };
        Some(Self {
            level,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level.tag(), self.text)
    }
}

/// Default number of diagnostics buffered before new ones are discarded.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 64;

/// Producer side of the diagnostics channel. Never blocks.
#[derive(Clone, Debug)]
pub struct DiagnosticSender {
    tx: mpsc::Sender<Diagnostic>,
}

/// Consumer side of the diagnostics channel.
pub type DiagnosticReceiver = mpsc::Receiver<Diagnostic>;

impl DiagnosticSender {
    /// Send without waiting; the message is discarded if the channel is full or closed.
    pub fn emit(&self, diagnostic: Diagnostic) {
        if let Err(err) = self.tx.try_send(diagnostic) {
            tracing::trace!("Diagnostic discarded: {}", err);
        }
    }
}

/// Bounded diagnostics channel.
pub fn diagnostic_channel(capacity: usize) -> (DiagnosticSender, DiagnosticReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DiagnosticSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_merge_last_value_wins() {
        let mut first = ControlUpdate::new().with("framerate", 100.0).with("paused", true);
        first.merge(ControlUpdate::new().with("framerate", 200.0));
        assert_eq!(first.len(), 2);
        assert_eq!(first.get("framerate"), Some(&ParameterValue::Float(200.0)));
    }

    #[test]
    fn test_control_message_json() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"name": "offset", "value": 12}"#).unwrap();
        let update = ControlUpdate::from(msg);
        assert_eq!(update.get("offset"), Some(&ParameterValue::Int(12)));
    }

    #[test]
    fn test_diagnostic_wire_format() {
        let d = Diagnostic::warning("Dropped frame");
        assert_eq!(d.to_string(), "W:Dropped frame");
        assert_eq!(Diagnostic::parse("W:Dropped frame"), Some(d));
        assert_eq!(Diagnostic::parse("X:nope"), None);
    }

    #[test]
    fn test_diagnostics_never_block_when_full() {
        let (tx, mut rx) = diagnostic_channel(1);
        tx.emit(Diagnostic::info("first"));
        tx.emit(Diagnostic::info("second"));
        assert_eq!(rx.try_recv().unwrap().text, "first");
        assert!(rx.try_recv().is_err());
    }
}
