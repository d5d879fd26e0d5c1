//! Text wrapper over the shared CRDT primitive.
//!
//! [`Text`] is the mutation API blocks own: transactional insert / delete /
//! format operations, delta projections, and the split protocol. Offsets are
//! UTF-8 byte positions (the primitive's native unit) and must fall on
//! character boundaries; violations surface as [`TextError::OutOfRange`]
//! before anything is applied.
//!
//! Every mutating operation tags the primitive with a one-shot
//! [`RefreshReason`] consumed by the next change observer. Bound widgets use
//! it to refresh even for changes this replica issued programmatically, since
//! structural edits (split, join, clear) are not expressible through a
//! widget's own edit path. An operation that changes nothing sets no marker:
//! a marker with no matching change event would fire on the wrong
//! transaction.
//!
//! [`PlaceholderText`] is the inert half of a split: length zero, every other
//! operation refused until the caller realizes it into a fresh [`Text`].

use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use yrs::types::text::{Diff, TextEvent, YChange};
use yrs::types::ToJson;
use yrs::{
    Any, Assoc, GetString, IndexedSequence, Observable, ReadTxn, StickyIndex, Text as YText,
    TextRef, Transact, TransactionMut,
};

use crate::delta::{attrs_from_yrs, attrs_to_yrs, delta_text, AttrMap, DeltaOp, TextRun};
use crate::store::Store;

/// One-shot marker describing why observers must refresh even when the
/// change originated on this replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshReason {
    #[default]
    None,
    Split,
    Join,
    Format,
    Delete,
    Clear,
}

impl RefreshReason {
    pub fn is_set(&self) -> bool {
        !matches!(self, RefreshReason::None)
    }
}

/// Errors from text wrapper operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    /// A live-text operation was attempted on placeholder text. The caller
    /// must realize the placeholder into a real [`Text`] first.
    #[error("placeholder text does not support {0}")]
    UnsupportedOperation(&'static str),

    /// An index or span fell outside the text, or off a character boundary.
    #[error("index {index} out of range (text length {len})")]
    OutOfRange { index: u32, len: u32 },

    /// The underlying primitive holds content the wire model cannot carry.
    #[error("text contains non-text content")]
    UnsupportedContent,
}

/// Rich text backed by a shared CRDT primitive.
#[derive(Debug, Clone)]
pub struct Text {
    store: Store,
    ytext: TextRef,
    id: Arc<str>,
    marker: Arc<Mutex<RefreshReason>>,
}

impl Text {
    /// Create (or attach to) the root text keyed by `id` in `store`. Every
    /// wrapper attached to one root shares that root's refresh-marker slot.
    pub fn new(store: &Store, id: &str) -> Self {
        let ytext = store.doc().get_or_insert_text(id);
        Self {
            store: store.clone(),
            ytext,
            id: Arc::from(id),
            marker: store.refresh_slot(id),
        }
    }

    /// Create a text and populate it from a delta in one step.
    pub fn from_delta(store: &Store, id: &str, ops: &[DeltaOp]) -> Result<Self, TextError> {
        let text = Self::new(store, id);
        text.apply_delta(ops)?;
        Ok(text)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Length in UTF-8 bytes.
    pub fn len(&self) -> u32 {
        let txn = self.store.doc().transact();
        self.ytext.len(&txn)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `content` at `index` in its own transaction. The inserted text
    /// takes on the formatting present at the insertion point; use
    /// [`apply_delta`](Self::apply_delta) or
    /// [`insert_with_attributes`](Self::insert_with_attributes) to control
    /// formatting explicitly.
    pub fn insert(&self, index: u32, content: &str) -> Result<(), TextError> {
        self.store.transact(|txn| self.insert_in(txn, index, content))
    }

    /// Insert inside a caller-provided transaction scope.
    pub fn insert_in(
        &self,
        txn: &mut TransactionMut,
        index: u32,
        content: &str,
    ) -> Result<(), TextError> {
        self.check_index(&*txn, index)?;
        if content.is_empty() {
            return Ok(());
        }
        self.ytext.insert(txn, index, content);
        self.set_marker(RefreshReason::Split);
        Ok(())
    }

    /// Insert `content` at `index` carrying formatting attributes.
    pub fn insert_with_attributes(
        &self,
        index: u32,
        content: &str,
        attributes: &AttrMap,
    ) -> Result<(), TextError> {
        self.store
            .transact(|txn| self.insert_with_attributes_in(txn, index, content, attributes))
    }

    pub fn insert_with_attributes_in(
        &self,
        txn: &mut TransactionMut,
        index: u32,
        content: &str,
        attributes: &AttrMap,
    ) -> Result<(), TextError> {
        self.check_index(&*txn, index)?;
        if content.is_empty() {
            return Ok(());
        }
        self.ytext
            .insert_with_attributes(txn, index, content, attrs_to_yrs(attributes));
        self.set_marker(RefreshReason::Split);
        Ok(())
    }

    /// Insert several runs at one fixed index. The final order matches the
    /// input order. A run without attributes inherits the formatting at the
    /// insertion point; a run with attributes is applied verbatim. Fails
    /// before applying anything if `index` is invalid.
    pub fn insert_list(&self, index: u32, runs: &[TextRun]) -> Result<(), TextError> {
        self.store.transact(|txn| self.insert_list_in(txn, index, runs))
    }

    pub fn insert_list_in(
        &self,
        txn: &mut TransactionMut,
        index: u32,
        runs: &[TextRun],
    ) -> Result<(), TextError> {
        self.check_index(&*txn, index)?;
        if runs.iter().all(|run| run.text.is_empty()) {
            return Ok(());
        }
        // Reverse order keeps the final visual order aligned with the input,
        // since every run lands at the same index.
        for run in runs.iter().rev() {
            if run.text.is_empty() {
                continue;
            }
            match &run.attributes {
                Some(a) => {
                    self.ytext
                        .insert_with_attributes(txn, index, &run.text, attrs_to_yrs(a))
                }
                None => self.ytext.insert(txn, index, &run.text),
            }
        }
        self.set_marker(RefreshReason::Split);
        Ok(())
    }

    /// Append `other`'s current content, formatting preserved.
    pub fn join(&self, other: &Text) -> Result<(), TextError> {
        let ops = other.to_delta()?;
        if ops.is_empty() {
            return Ok(());
        }
        self.store.transact(|txn| {
            let mut at = self.ytext.len(&*txn);
            for op in &ops {
                if let DeltaOp::Insert { insert, attributes } = op {
                    // An unattributed run is unformatted text and must stay
                    // that way, even when appended after a formatted run.
                    let attributes = attributes.as_ref().map(attrs_to_yrs).unwrap_or_default();
                    self.ytext
                        .insert_with_attributes(txn, at, insert, attributes);
                    at += insert.len() as u32;
                }
            }
            self.set_marker(RefreshReason::Join);
        });
        Ok(())
    }

    /// Delete `len` bytes starting at `index`.
    pub fn delete(&self, index: u32, len: u32) -> Result<(), TextError> {
        self.store.transact(|txn| self.delete_in(txn, index, len))
    }

    pub fn delete_in(
        &self,
        txn: &mut TransactionMut,
        index: u32,
        len: u32,
    ) -> Result<(), TextError> {
        self.check_span(&*txn, index, len)?;
        if len == 0 {
            return Ok(());
        }
        self.ytext.remove_range(txn, index, len);
        self.set_marker(RefreshReason::Delete);
        Ok(())
    }

    /// Delete everything.
    pub fn clear(&self) -> Result<(), TextError> {
        self.store.transact(|txn| self.clear_in(txn))
    }

    pub fn clear_in(&self, txn: &mut TransactionMut) -> Result<(), TextError> {
        let len = self.ytext.len(&*txn);
        if len > 0 {
            self.ytext.remove_range(txn, 0, len);
            self.set_marker(RefreshReason::Clear);
        }
        Ok(())
    }

    /// Apply formatting attributes over a span without changing characters.
    pub fn format(&self, index: u32, len: u32, attributes: &AttrMap) -> Result<(), TextError> {
        self.store
            .transact(|txn| self.format_in(txn, index, len, attributes))
    }

    pub fn format_in(
        &self,
        txn: &mut TransactionMut,
        index: u32,
        len: u32,
        attributes: &AttrMap,
    ) -> Result<(), TextError> {
        self.check_span(&*txn, index, len)?;
        if len == 0 || attributes.is_empty() {
            return Ok(());
        }
        self.ytext.format(txn, index, len, attrs_to_yrs(attributes));
        self.set_marker(RefreshReason::Format);
        Ok(())
    }

    /// Apply a retain/insert/delete delta against the primitive.
    ///
    /// This is the widget echo path: it sets no refresh marker, so a bound
    /// widget will not be re-notified of its own edit. Inserts without
    /// attributes land unformatted, matching what the widget displays. The
    /// whole delta is validated up front; on error nothing is applied.
    pub fn apply_delta(&self, ops: &[DeltaOp]) -> Result<(), TextError> {
        self.store.transact(|txn| self.apply_delta_in(txn, ops))
    }

    pub fn apply_delta_in(
        &self,
        txn: &mut TransactionMut,
        ops: &[DeltaOp],
    ) -> Result<(), TextError> {
        self.validate_delta(&*txn, ops)?;
        let mut pos: u32 = 0;
        for op in ops {
            match op {
                DeltaOp::Retain { retain, attributes } => {
                    if let Some(a) = attributes {
                        if !a.is_empty() {
                            self.ytext.format(txn, pos, *retain, attrs_to_yrs(a));
                        }
                    }
                    pos += retain;
                }
                DeltaOp::Insert { insert, attributes } => {
                    // Missing attributes mean explicitly unformatted here,
                    // never inherited from the surrounding text.
                    let attributes = attributes.as_ref().map(attrs_to_yrs).unwrap_or_default();
                    self.ytext
                        .insert_with_attributes(txn, pos, insert, attributes);
                    pos += insert.len() as u32;
                }
                DeltaOp::Delete { delete } => {
                    self.ytext.remove_range(txn, pos, *delete);
                }
            }
        }
        Ok(())
    }

    /// Split at `index`, producing inert placeholders for both halves. The
    /// text itself is unchanged; realizing the halves into real texts is the
    /// caller's responsibility.
    pub fn split(&self, index: u32) -> (PlaceholderText, PlaceholderText) {
        (
            PlaceholderText::new(SplitSide::Left, index),
            PlaceholderText::new(SplitSide::Right, index),
        )
    }

    /// An independent copy of the current content, backed by a fresh store.
    /// Replica identity and edit history are not carried over.
    pub fn fork(&self) -> Result<Text, TextError> {
        let ops = self.to_delta()?;
        let store = Store::new();
        Text::from_delta(&store, &self.id, &ops)
    }

    /// Current content as a delta of formatted insert runs.
    pub fn to_delta(&self) -> Result<Vec<DeltaOp>, TextError> {
        let txn = self.store.doc().transact();
        let mut ops = Vec::new();
        for diff in self.ytext.diff(&txn, YChange::identity) {
            let Diff {
                insert, attributes, ..
            } = diff;
            let chunk = match insert.to_json(&txn) {
                Any::String(s) => s.to_string(),
                _ => return Err(TextError::UnsupportedContent),
            };
            ops.push(DeltaOp::Insert {
                insert: chunk,
                attributes: attributes
                    .as_deref()
                    .map(attrs_from_yrs)
                    .filter(|a| !a.is_empty()),
            });
        }
        Ok(ops)
    }

    /// Delta for the byte range `[begin, end)`.
    ///
    /// `end` past the text clamps, mirroring string slicing, and a `begin` at
    /// or past the end yields an empty delta. Runs entirely before `begin`
    /// are dropped; the first intersecting run is trimmed from its left edge
    /// once; any run crossing `end` is trimmed from its right edge and is the
    /// last run emitted.
    pub fn slice_to_delta(&self, begin: u32, end: Option<u32>) -> Result<Vec<DeltaOp>, TextError> {
        if let Some(e) = end {
            if begin >= e {
                return Ok(Vec::new());
            }
        }
        let full = self.to_delta()?;
        if begin == 0 && end.is_none() {
            return Ok(full);
        }

        let content = delta_text(&full);
        let len = content.len() as u32;
        if begin >= len {
            return Ok(Vec::new());
        }
        if !content.is_char_boundary(begin as usize) {
            return Err(TextError::OutOfRange { index: begin, len });
        }
        let end = end.map(|e| e.min(len));
        if let Some(e) = end {
            if !content.is_char_boundary(e as usize) {
                return Err(TextError::OutOfRange { index: e, len });
            }
        }

        let mut out = Vec::new();
        let mut consumed: u32 = 0;
        for op in full {
            let (run, attributes) = match op {
                DeltaOp::Insert { insert, attributes } => (insert, attributes),
                _ => continue,
            };
            let run_start = consumed;
            let run_end = consumed + run.len() as u32;
            consumed = run_end;

            if run_end <= begin {
                continue;
            }
            if let Some(e) = end {
                if run_start >= e {
                    break;
                }
            }

            let piece_start = begin.saturating_sub(run_start) as usize;
            let mut piece_end = run.len();
            let mut crosses_end = false;
            if let Some(e) = end {
                if run_end > e {
                    crosses_end = true;
                    piece_end = (e - run_start) as usize;
                }
            }

            out.push(DeltaOp::Insert {
                insert: run[piece_start..piece_end].to_string(),
                attributes,
            });
            if crosses_end {
                break;
            }
        }
        Ok(out)
    }

    /// Consume the pending refresh marker, leaving `None` behind.
    pub fn take_refresh_reason(&self) -> RefreshReason {
        std::mem::take(&mut *self.marker.lock().unwrap())
    }

    pub(crate) fn refresh_marker(&self) -> Arc<Mutex<RefreshReason>> {
        Arc::clone(&self.marker)
    }

    pub(crate) fn observe<F>(&self, f: F) -> yrs::Subscription
    where
        F: Fn(&TransactionMut, &TextEvent) + Send + Sync + 'static,
    {
        self.ytext.observe(f)
    }

    /// Sticky position at `index` that survives concurrent edits.
    ///
    /// Positions attach to the character that follows them; at the end of
    /// the text, where none follows, they attach to the preceding one.
    pub(crate) fn sticky_index(
        &self,
        txn: &mut TransactionMut,
        index: u32,
    ) -> Option<StickyIndex> {
        if let Some(pos) = self.ytext.sticky_index(txn, index, Assoc::After) {
            return Some(pos);
        }
        self.ytext.sticky_index(txn, index, Assoc::Before)
    }

    fn set_marker(&self, reason: RefreshReason) {
        *self.marker.lock().unwrap() = reason;
    }

    fn check_index<T: ReadTxn>(&self, txn: &T, index: u32) -> Result<(), TextError> {
        let content = self.ytext.get_string(txn);
        let len = content.len() as u32;
        if index > len || !content.is_char_boundary(index as usize) {
            return Err(TextError::OutOfRange { index, len });
        }
        Ok(())
    }

    fn check_span<T: ReadTxn>(&self, txn: &T, index: u32, span: u32) -> Result<(), TextError> {
        let content = self.ytext.get_string(txn);
        let len = content.len() as u32;
        let end = index
            .checked_add(span)
            .ok_or(TextError::OutOfRange { index, len })?;
        if end > len
            || !content.is_char_boundary(index as usize)
            || !content.is_char_boundary(end as usize)
        {
            return Err(TextError::OutOfRange { index, len });
        }
        Ok(())
    }

    /// Simulate `ops` against the current content so a bad delta fails
    /// before any part of it is applied.
    fn validate_delta<T: ReadTxn>(&self, txn: &T, ops: &[DeltaOp]) -> Result<(), TextError> {
        let mut content = self.ytext.get_string(txn);
        let mut pos: usize = 0;
        for op in ops {
            let len = content.len() as u32;
            match op {
                DeltaOp::Retain { retain, .. } => {
                    let end = pos + *retain as usize;
                    if end > content.len() || !content.is_char_boundary(end) {
                        return Err(TextError::OutOfRange {
                            index: end as u32,
                            len,
                        });
                    }
                    pos = end;
                }
                DeltaOp::Insert { insert, .. } => {
                    content.insert_str(pos, insert);
                    pos += insert.len();
                }
                DeltaOp::Delete { delete } => {
                    let end = pos + *delete as usize;
                    if end > content.len() || !content.is_char_boundary(end) {
                        return Err(TextError::OutOfRange {
                            index: end as u32,
                            len,
                        });
                    }
                    content.replace_range(pos..end, "");
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let txn = self.store.doc().transact();
        f.write_str(&self.ytext.get_string(&txn))
    }
}

/// Which remainder of a split a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSide {
    Left,
    Right,
}

/// Inert stand-in for one half of a split text.
///
/// Length is always zero, and every other operation fails with
/// [`TextError::UnsupportedOperation`] until the caller realizes the
/// placeholder by materializing its intended content into a fresh [`Text`]
/// owned by a real block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderText {
    side: SplitSide,
    index: u32,
}

impl PlaceholderText {
    pub fn new(side: SplitSide, index: u32) -> Self {
        Self { side, index }
    }

    pub fn side(&self) -> SplitSide {
        self.side
    }

    /// The split offset this placeholder was produced at.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> u32 {
        0
    }

    pub fn is_empty(&self) -> bool {
        true
    }

    pub fn insert(&self, _index: u32, _content: &str) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("insert"))
    }

    pub fn insert_with_attributes(
        &self,
        _index: u32,
        _content: &str,
        _attributes: &AttrMap,
    ) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("insert_with_attributes"))
    }

    pub fn insert_list(&self, _index: u32, _runs: &[TextRun]) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("insert_list"))
    }

    pub fn delete(&self, _index: u32, _len: u32) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("delete"))
    }

    pub fn clear(&self) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("clear"))
    }

    pub fn format(&self, _index: u32, _len: u32, _attributes: &AttrMap) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("format"))
    }

    pub fn apply_delta(&self, _ops: &[DeltaOp]) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("apply_delta"))
    }

    pub fn join(&self, _other: &Text) -> Result<(), TextError> {
        Err(TextError::UnsupportedOperation("join"))
    }

    pub fn split(&self, _index: u32) -> Result<(PlaceholderText, PlaceholderText), TextError> {
        Err(TextError::UnsupportedOperation("split"))
    }

    pub fn fork(&self) -> Result<Text, TextError> {
        Err(TextError::UnsupportedOperation("fork"))
    }

    pub fn to_delta(&self) -> Result<Vec<DeltaOp>, TextError> {
        Err(TextError::UnsupportedOperation("to_delta"))
    }

    pub fn slice_to_delta(
        &self,
        _begin: u32,
        _end: Option<u32>,
    ) -> Result<Vec<DeltaOp>, TextError> {
        Err(TextError::UnsupportedOperation("slice_to_delta"))
    }
}

/// A block's text slot: live text or a placeholder awaiting realization.
#[derive(Debug, Clone)]
pub enum TextContent {
    Live(Text),
    Placeholder(PlaceholderText),
}

impl TextContent {
    pub fn len(&self) -> u32 {
        match self {
            TextContent::Live(text) => text.len(),
            TextContent::Placeholder(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, TextContent::Placeholder(_))
    }

    pub fn as_live(&self) -> Option<&Text> {
        match self {
            TextContent::Live(text) => Some(text),
            TextContent::Placeholder(_) => None,
        }
    }

    pub fn slice_to_delta(&self, begin: u32, end: Option<u32>) -> Result<Vec<DeltaOp>, TextError> {
        match self {
            TextContent::Live(text) => text.slice_to_delta(begin, end),
            TextContent::Placeholder(p) => p.slice_to_delta(begin, end),
        }
    }

    pub fn to_plain_text(&self) -> Result<String, TextError> {
        match self {
            TextContent::Live(text) => Ok(text.to_string()),
            TextContent::Placeholder(_) => {
                Err(TextError::UnsupportedOperation("to_plain_text"))
            }
        }
    }
}

impl From<Text> for TextContent {
    fn from(text: Text) -> Self {
        TextContent::Live(text)
    }
}

impl From<PlaceholderText> for TextContent {
    fn from(p: PlaceholderText) -> Self {
        TextContent::Placeholder(p)
    }
}
