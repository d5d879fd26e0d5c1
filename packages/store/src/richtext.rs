//! Bidirectional bridge between a [`Text`] primitive and an editor widget.
//!
//! ```text
//!    widget events (user)            text events (local + remote)
//!           |                                  |
//!           v                                  v
//!    +--------------+    apply_delta    +---------------+
//!    | EditorWidget | ----------------> |     Text      |
//!    |  (rich runs) | <---------------- |  (primitive)  |
//!    +--------------+  update_contents  +---------------+
//! ```
//!
//! Three rules keep the two sides convergent without feedback loops:
//!
//! 1. A text change is pushed to the widget when it came from another origin,
//!    or when the transaction that produced it left a
//!    [`RefreshReason`](crate::text::RefreshReason) marker. Markerless local
//!    changes are the widget's own edits echoing back and are dropped.
//! 2. Widget changes flow into the primitive only when their origin is
//!    [`WidgetOrigin::User`]. Pushes from this binding arrive back with a
//!    `Replica` origin and are not re-applied.
//! 3. Every insert pushed to the widget carries an attribute map that negates
//!    every format key the widget has ever used, overlaid with the insert's
//!    own attributes. Widgets inherit formatting from the preceding run when
//!    an insert has no attributes; the negation map makes plain text stay
//!    plain.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use yrs::types::Delta;
use yrs::types::ToJson;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Any, StickyIndex, Transact, TransactionMut};

use crate::delta::{attrs_from_yrs, AttrMap, AttrValue, DeltaOp};
use crate::store::{Store, StoreError};
use crate::text::{Text, TextError};
use crate::widget::{EditorWidget, Selection, WidgetError, WidgetEvent, WidgetOrigin};

/// Failures surfaced by a binding.
///
/// Observer callbacks cannot return errors to a caller, so the binding
/// records the most recent failure and hands it out through
/// [`RichTextBinding::take_error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Widget(#[from] WidgetError),

    #[error(transparent)]
    Text(#[from] TextError),

    #[error("embedded content cannot be pushed to a rich-text widget")]
    UnsupportedEmbed,
}

#[derive(Debug, Default)]
struct BindingState {
    /// Every attribute key seen in any widget event, mapped to `false`.
    negated_used_formats: AttrMap,
    destroyed: bool,
    last_error: Option<SyncError>,
}

/// Live two-way coupling of one [`Text`] and one widget.
///
/// Constructing the binding registers both observers and seeds the widget
/// with the current text contents. Dropping it (or calling
/// [`destroy`](Self::destroy)) detaches both observers.
pub struct RichTextBinding<W: EditorWidget + Send + Sync + 'static> {
    widget: Arc<W>,
    text: Text,
    state: Arc<Mutex<BindingState>>,
    text_sub: Option<yrs::Subscription>,
    widget_sub: Option<crate::signal::Subscription>,
}

impl<W: EditorWidget + Send + Sync + 'static> RichTextBinding<W> {
    pub fn new(text: Text, widget: Arc<W>) -> Result<Self, SyncError> {
        let store = text.store().clone();
        let local_origin = store.local_origin().clone();
        let client_id = store.client_id();
        let state = Arc::new(Mutex::new(BindingState::default()));

        // A marker left by operations that predate the binding is covered by
        // the full seed below and must not force-push the next change.
        text.take_refresh_reason();

        // The widget observer must be live before the seed below so the
        // attribute keys used by the initial contents get registered.
        let widget_sub = {
            let state = state.clone();
            let text = text.clone();
            widget.observe(Box::new(move |event| {
                let WidgetEvent::TextChange { delta, origin } = event else {
                    return;
                };
                register_used_formats(&state, delta);
                if *origin != WidgetOrigin::User {
                    return;
                }
                let outcome = text.store().transact(|txn| text.apply_delta_in(txn, delta));
                if let Err(err) = outcome {
                    tracing::error!(
                        text = %text.id(),
                        error = %err,
                        "widget edit rejected by text primitive"
                    );
                    state.lock().unwrap().last_error = Some(SyncError::Text(err));
                }
            }))
        };

        let text_sub = {
            let state = state.clone();
            let widget = widget.clone();
            let local_origin = local_origin.clone();
            let marker = text.refresh_marker();
            text.observe(move |txn, event| {
                let reason = mem::take(&mut *marker.lock().unwrap());
                let negated = {
                    let state = state.lock().unwrap();
                    if state.destroyed {
                        return;
                    }
                    state.negated_used_formats.clone()
                };
                let from_local = txn.origin() == Some(&local_origin);
                if from_local && !reason.is_set() {
                    tracing::trace!("markerless local change, widget already has it");
                    return;
                }
                match build_widget_delta(txn, event.delta(txn), &negated) {
                    Ok(ops) => {
                        if ops.is_empty() {
                            return;
                        }
                        tracing::trace!(
                            ?reason,
                            from_local,
                            ops = ops.len(),
                            "pushing text change to widget"
                        );
                        if let Err(err) =
                            widget.update_contents(&ops, WidgetOrigin::Replica(client_id))
                        {
                            tracing::error!(error = %err, "widget rejected synchronized update");
                            state.lock().unwrap().last_error = Some(SyncError::Widget(err));
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "text change has no widget representation");
                        state.lock().unwrap().last_error = Some(err);
                    }
                }
            })
        };

        let seed = text.to_delta()?;
        widget.set_contents(&seed, WidgetOrigin::Replica(client_id))?;
        tracing::debug!(text = %text.id(), runs = seed.len(), "bound text to widget");

        Ok(Self {
            widget,
            text,
            state,
            text_sub: Some(text_sub),
            widget_sub: Some(widget_sub),
        })
    }

    pub fn text(&self) -> &Text {
        &self.text
    }

    pub fn widget(&self) -> &Arc<W> {
        &self.widget
    }

    /// Attribute keys the binding negates on pushed inserts, in sorted order.
    pub fn used_format_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .negated_used_formats
            .keys()
            .cloned()
            .collect()
    }

    /// The most recent observer failure, if any. Reading it clears it.
    pub fn take_error(&self) -> Option<SyncError> {
        self.state.lock().unwrap().last_error.take()
    }

    /// The widget selection pinned to CRDT positions, if the widget has one.
    pub fn cursor(&self) -> Option<CursorRange> {
        let selection = self.widget.selection()?;
        self.text.store().transact(|txn| {
            let anchor = self.text.sticky_index(txn, selection.index)?;
            let focus = self.text.sticky_index(txn, selection.end())?;
            Some(CursorRange { anchor, focus })
        })
    }

    /// Hand a collaborator's selection to the widget's presence module,
    /// resolved against this replica. Unresolvable positions clear the
    /// collaborator's cursor instead.
    pub fn apply_remote_cursor(&self, replica: u64, range: &CursorRange) {
        let Some(cursors) = self.widget.remote_cursors() else {
            return;
        };
        match range.resolve(self.text.store()) {
            Some((anchor, focus)) => {
                let (start, end) = if focus >= anchor {
                    (anchor, focus)
                } else {
                    (focus, anchor)
                };
                cursors.set_cursor(replica, Selection::new(start, end - start));
            }
            None => cursors.clear_cursor(replica),
        }
    }

    /// Detach both observers. Safe to call more than once.
    pub fn destroy(&mut self) {
        let was_destroyed = {
            let mut state = self.state.lock().unwrap();
            mem::replace(&mut state.destroyed, true)
        };
        self.text_sub.take();
        self.widget_sub.take();
        if !was_destroyed {
            tracing::debug!(text = %self.text.id(), "binding destroyed");
        }
    }
}

impl<W: EditorWidget + Send + Sync + 'static> fmt::Debug for RichTextBinding<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("RichTextBinding")
            .field("text", &self.text.id())
            .field("used_formats", &state.negated_used_formats.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

/// A selection pinned to CRDT positions so it survives concurrent edits.
///
/// Ends attach to the character that follows them ([`yrs::Assoc::After`]),
/// falling back to the preceding character at the end of the text.
#[derive(Debug, Clone)]
pub struct CursorRange {
    pub anchor: StickyIndex,
    pub focus: StickyIndex,
}

impl CursorRange {
    /// Wire form: `[anchor length: u32 LE][anchor v1][focus v1]`.
    pub fn encode(&self) -> Vec<u8> {
        let anchor = self.anchor.encode_v1();
        let focus = self.focus.encode_v1();
        let mut out = Vec::with_capacity(4 + anchor.len() + focus.len());
        out.extend_from_slice(&(anchor.len() as u32).to_le_bytes());
        out.extend_from_slice(&anchor);
        out.extend_from_slice(&focus);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| StoreError::Decode("cursor payload shorter than its header".into()))?;
        let anchor_len = u32::from_le_bytes(header) as usize;
        let body = &bytes[4..];
        if anchor_len > body.len() {
            return Err(StoreError::Decode(
                "cursor anchor length exceeds payload".into(),
            ));
        }
        let anchor = StickyIndex::decode_v1(&body[..anchor_len])
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        let focus = StickyIndex::decode_v1(&body[anchor_len..])
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        Ok(Self { anchor, focus })
    }

    /// Byte offsets of both ends in the given replica, if they still resolve.
    pub fn resolve(&self, store: &Store) -> Option<(u32, u32)> {
        let txn = store.doc().transact();
        let anchor = self.anchor.get_offset(&txn)?.index;
        let focus = self.focus.get_offset(&txn)?.index;
        Some((anchor, focus))
    }
}

fn register_used_formats(state: &Arc<Mutex<BindingState>>, delta: &[DeltaOp]) {
    let mut state = state.lock().unwrap();
    for op in delta {
        let Some(attributes) = op.attributes() else {
            continue;
        };
        for key in attributes.keys() {
            if !state.negated_used_formats.contains_key(key) {
                tracing::trace!(key = %key, "registering used format");
                state
                    .negated_used_formats
                    .insert(key.clone(), AttrValue::Bool(false));
            }
        }
    }
}

/// Convert a text event delta into widget ops, materializing the negated
/// used formats on every insert. Inserts that are not plain strings abort
/// the whole conversion so nothing partial reaches the widget.
fn build_widget_delta(
    txn: &TransactionMut,
    deltas: &[Delta],
    negated: &AttrMap,
) -> Result<Vec<DeltaOp>, SyncError> {
    let mut ops = Vec::with_capacity(deltas.len());
    for delta in deltas {
        match delta {
            Delta::Inserted(value, attributes) => {
                let content = match value.to_json(txn) {
                    Any::String(text) => text.to_string(),
                    _ => return Err(SyncError::UnsupportedEmbed),
                };
                let mut merged = negated.clone();
                if let Some(attributes) = attributes.as_deref() {
                    for (key, value) in attrs_from_yrs(attributes) {
                        merged.insert(key, value);
                    }
                }
                ops.push(DeltaOp::Insert {
                    insert: content,
                    attributes: Some(merged),
                });
            }
            Delta::Retain(len, attributes) => {
                let attributes = attributes
                    .as_deref()
                    .map(attrs_from_yrs)
                    .filter(|a| !a.is_empty());
                ops.push(DeltaOp::Retain {
                    retain: *len,
                    attributes,
                });
            }
            Delta::Deleted(len) => ops.push(DeltaOp::delete(*len)),
        }
    }
    Ok(ops)
}
