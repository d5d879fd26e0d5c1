//! Editor widget abstraction.
//!
//! The synchronization engine talks to rich-text widgets exclusively through
//! [`EditorWidget`], so any widget capable of applying deltas and reporting
//! its edits can be bound, including the in-memory
//! [`HeadlessWidget`](crate::headless::HeadlessWidget) used in tests and as a
//! reference implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delta::DeltaOp;
use crate::signal::Subscription;

/// A widget selection: caret position plus selected length, in UTF-8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub index: u32,
    pub length: u32,
}

impl Selection {
    pub fn new(index: u32, length: u32) -> Self {
        Self { index, length }
    }

    /// A collapsed selection.
    pub fn caret(index: u32) -> Self {
        Self { index, length: 0 }
    }

    pub fn end(&self) -> u32 {
        self.index + self.length
    }
}

/// Who caused a widget change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetOrigin {
    /// The end user typing, deleting, or formatting inside the widget.
    User,
    /// A programmatic push from the synchronization engine of the replica
    /// with this client id.
    Replica(u64),
    /// Any other programmatic caller.
    Api,
}

/// Events a widget emits to its observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WidgetEvent {
    TextChange {
        delta: Vec<DeltaOp>,
        origin: WidgetOrigin,
    },
    SelectionChange {
        selection: Option<Selection>,
        origin: WidgetOrigin,
    },
}

/// Widget-side rejection of a content call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    #[error("widget rejected contents: {0}")]
    Rejected(String),

    #[error("delta does not fit widget contents: {0}")]
    InvalidDelta(String),
}

pub type WidgetEventHandler = Box<dyn Fn(&WidgetEvent) + Send + Sync>;

/// The surface a rich-text widget exposes to the synchronization engine.
///
/// Content calls are all-or-nothing: a widget that rejects a delta must leave
/// its contents untouched.
pub trait EditorWidget {
    /// Replace the whole contents with a delta of insert runs.
    fn set_contents(&self, delta: &[DeltaOp], origin: WidgetOrigin) -> Result<(), WidgetError>;

    /// Transform the current contents with a retain/insert/delete delta.
    fn update_contents(&self, delta: &[DeltaOp], origin: WidgetOrigin) -> Result<(), WidgetError>;

    /// The current selection, if the widget has one.
    fn selection(&self) -> Option<Selection>;

    /// Register an observer for widget events.
    fn observe(&self, handler: WidgetEventHandler) -> Subscription;

    /// Optional presence module for rendering collaborator selections.
    fn remote_cursors(&self) -> Option<&dyn RemoteCursors> {
        None
    }
}

/// Presence decoration seam: hosts resolve received cursor payloads and feed
/// the offsets here for the widget to display.
pub trait RemoteCursors {
    fn set_cursor(&self, replica: u64, selection: Selection);
    fn clear_cursor(&self, replica: u64);
    fn cursors(&self) -> Vec<(u64, Selection)>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::attrs;

    #[test]
    fn test_selection_end() {
        assert_eq!(Selection::new(3, 4).end(), 7);
        assert_eq!(Selection::caret(5).end(), 5);
    }

    #[test]
    fn test_origin_wire_shape() {
        assert_eq!(serde_json::to_string(&WidgetOrigin::User).unwrap(), r#""user""#);
        assert_eq!(
            serde_json::to_string(&WidgetOrigin::Replica(9)).unwrap(),
            r#"{"replica":9}"#
        );
    }

    #[test]
    fn test_event_round_trip() {
        let event = WidgetEvent::TextChange {
            delta: vec![
                DeltaOp::retain(2),
                DeltaOp::insert_with("x", attrs([("bold", true)])),
            ],
            origin: WidgetOrigin::User,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: WidgetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
