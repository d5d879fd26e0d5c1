//! In-memory rich-text widget.
//!
//! [`HeadlessWidget`] stores its contents as attributed runs and applies
//! deltas the way mainstream rich-text editors do. The behavior that matters
//! most here is attribute inheritance: an insert arriving without attributes
//! through [`update_contents`](crate::widget::EditorWidget::update_contents)
//! takes on the attributes of the text it lands after. The synchronization
//! engine's negated-format materialization exists to defeat exactly that
//! behavior, so binding this widget exercises the engine under realistic
//! conditions.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::delta::{AttrMap, DeltaOp};
use crate::signal::{Signal, Subscription};
use crate::widget::{
    EditorWidget, RemoteCursors, Selection, WidgetError, WidgetEvent, WidgetEventHandler,
    WidgetOrigin,
};

/// One attributed run of widget text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub attributes: AttrMap,
}

impl Run {
    pub fn new(text: impl Into<String>, attributes: AttrMap) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }
}

/// Record of one `update_contents` call, kept for assertions on push traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub delta: Vec<DeltaOp>,
    pub origin: WidgetOrigin,
}

#[derive(Debug, Default)]
struct WidgetState {
    runs: Vec<Run>,
    selection: Option<Selection>,
    history: Vec<AppliedUpdate>,
}

/// A widget without a screen.
#[derive(Debug, Default)]
pub struct HeadlessWidget {
    state: Mutex<WidgetState>,
    events: Signal<WidgetEvent>,
    cursors: Mutex<BTreeMap<u64, Selection>>,
}

impl HeadlessWidget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents as attributed runs.
    pub fn runs(&self) -> Vec<Run> {
        self.state.lock().unwrap().runs.clone()
    }

    /// Contents with attributes stripped.
    pub fn plain_text(&self) -> String {
        let state = self.state.lock().unwrap();
        state.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Content length in UTF-8 bytes.
    pub fn len(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state.runs.iter().map(|run| run.text.len() as u32).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every delta applied through `update_contents` since the last
    /// [`clear_history`](Self::clear_history) call. User edits are event
    /// sources, not applied updates, so they are not recorded.
    pub fn history(&self) -> Vec<AppliedUpdate> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    pub fn clear_history(&self) {
        self.state.lock().unwrap().history.clear();
    }

    /// Apply a delta as if the user had edited the widget: contents change
    /// first, then observers hear a [`WidgetEvent::TextChange`] with a
    /// [`WidgetOrigin::User`] origin. A user delta is literal; an insert
    /// without attributes is unformatted, because the widget showed the user
    /// exactly what the delta says.
    pub fn user_edit(&self, delta: &[DeltaOp]) -> Result<(), WidgetError> {
        self.apply(delta, WidgetOrigin::User, false, false)
    }

    pub fn set_selection(&self, selection: Option<Selection>, origin: WidgetOrigin) {
        {
            let mut state = self.state.lock().unwrap();
            state.selection = selection;
        }
        self.events
            .emit(&WidgetEvent::SelectionChange { selection, origin });
    }

    fn apply(
        &self,
        delta: &[DeltaOp],
        origin: WidgetOrigin,
        record: bool,
        inherit_plain: bool,
    ) -> Result<(), WidgetError> {
        let event = {
            let mut state = self.state.lock().unwrap();
            let next = apply_ops(&state.runs, delta, inherit_plain)?;
            state.runs = next;
            if record {
                state.history.push(AppliedUpdate {
                    delta: delta.to_vec(),
                    origin,
                });
            }
            WidgetEvent::TextChange {
                delta: delta.to_vec(),
                origin,
            }
        };
        self.events.emit(&event);
        Ok(())
    }

    fn replace(&self, delta: &[DeltaOp], origin: WidgetOrigin) -> Result<(), WidgetError> {
        let mut runs = Vec::new();
        for op in delta {
            match op {
                DeltaOp::Insert { insert, attributes } => {
                    if insert.is_empty() {
                        continue;
                    }
                    // A full replacement rebuilds the document from scratch,
                    // so a run without attributes is simply unformatted.
                    let attributes = attributes.as_ref().map(truthy_only).unwrap_or_default();
                    push_run(&mut runs, Run::new(insert.clone(), attributes));
                }
                other => {
                    return Err(WidgetError::Rejected(format!(
                        "set_contents accepts insert runs only, got {other:?}"
                    )));
                }
            }
        }
        let event = {
            let mut state = self.state.lock().unwrap();
            state.runs = runs;
            WidgetEvent::TextChange {
                delta: delta.to_vec(),
                origin,
            }
        };
        self.events.emit(&event);
        Ok(())
    }
}

impl EditorWidget for HeadlessWidget {
    fn set_contents(&self, delta: &[DeltaOp], origin: WidgetOrigin) -> Result<(), WidgetError> {
        self.replace(delta, origin)
    }

    fn update_contents(&self, delta: &[DeltaOp], origin: WidgetOrigin) -> Result<(), WidgetError> {
        self.apply(delta, origin, true, true)
    }

    fn selection(&self) -> Option<Selection> {
        self.state.lock().unwrap().selection
    }

    fn observe(&self, handler: WidgetEventHandler) -> Subscription {
        self.events.connect(move |event| handler(event))
    }

    fn remote_cursors(&self) -> Option<&dyn RemoteCursors> {
        Some(self)
    }
}

impl RemoteCursors for HeadlessWidget {
    fn set_cursor(&self, replica: u64, selection: Selection) {
        self.cursors.lock().unwrap().insert(replica, selection);
    }

    fn clear_cursor(&self, replica: u64) {
        self.cursors.lock().unwrap().remove(&replica);
    }

    fn cursors(&self) -> Vec<(u64, Selection)> {
        self.cursors
            .lock()
            .unwrap()
            .iter()
            .map(|(id, selection)| (*id, *selection))
            .collect()
    }
}

/// Transform `runs` with `ops`. Returns the new run vector without touching
/// the input, so a failed op leaves the widget contents as they were.
/// `inherit_plain` controls what an attributeless insert means: inherited
/// formatting (the compose path) or unformatted text (the user edit path).
fn apply_ops(runs: &[Run], ops: &[DeltaOp], inherit_plain: bool) -> Result<Vec<Run>, WidgetError> {
    let mut rest: VecDeque<Run> = runs.iter().cloned().collect();
    let mut out: Vec<Run> = Vec::new();
    for op in ops {
        match op {
            DeltaOp::Retain { retain, attributes } => {
                for mut run in take_bytes(&mut rest, *retain)? {
                    if let Some(attributes) = attributes {
                        for (key, value) in attributes {
                            if value.truthy() {
                                run.attributes.insert(key.clone(), value.clone());
                            } else {
                                run.attributes.remove(key);
                            }
                        }
                    }
                    push_run(&mut out, run);
                }
            }
            DeltaOp::Insert { insert, attributes } => {
                if insert.is_empty() {
                    continue;
                }
                let attributes = match attributes {
                    Some(map) => truthy_only(map),
                    // Inheritance: the new text takes on the attributes of
                    // the run it lands after.
                    None if inherit_plain => out
                        .last()
                        .map(|run| run.attributes.clone())
                        .unwrap_or_default(),
                    None => AttrMap::new(),
                };
                push_run(&mut out, Run::new(insert.clone(), attributes));
            }
            DeltaOp::Delete { delete } => {
                take_bytes(&mut rest, *delete)?;
            }
        }
    }
    for run in rest {
        push_run(&mut out, run);
    }
    Ok(out)
}

/// Detach `count` bytes from the front of `rest`, splitting the run that
/// straddles the cut.
fn take_bytes(rest: &mut VecDeque<Run>, count: u32) -> Result<Vec<Run>, WidgetError> {
    let mut need = count as usize;
    let mut taken = Vec::new();
    while need > 0 {
        let mut run = rest.pop_front().ok_or_else(|| {
            WidgetError::InvalidDelta(format!("delta runs {need} bytes past end of contents"))
        })?;
        let len = run.text.len();
        if len <= need {
            need -= len;
            taken.push(run);
        } else {
            if !run.text.is_char_boundary(need) {
                return Err(WidgetError::InvalidDelta(
                    "span boundary splits a multi-byte character".into(),
                ));
            }
            let tail = run.text.split_off(need);
            rest.push_front(Run::new(tail, run.attributes.clone()));
            taken.push(run);
            need = 0;
        }
    }
    Ok(taken)
}

fn push_run(out: &mut Vec<Run>, run: Run) {
    if run.text.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut() {
        if last.attributes == run.attributes {
            last.text.push_str(&run.text);
            return;
        }
    }
    out.push(run);
}

fn truthy_only(map: &AttrMap) -> AttrMap {
    map.iter()
        .filter(|(_, value)| value.truthy())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::delta::{attrs, AttrMap};

    fn bold() -> AttrMap {
        attrs([("bold", true)])
    }

    #[test]
    fn test_set_contents_replaces_and_coalesces() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(
                &[
                    DeltaOp::insert_with("a", bold()),
                    DeltaOp::insert_with("b", bold()),
                    DeltaOp::insert("c"),
                ],
                WidgetOrigin::Api,
            )
            .unwrap();
        assert_eq!(
            widget.runs(),
            vec![Run::new("ab", bold()), Run::new("c", AttrMap::new())]
        );
        assert_eq!(widget.plain_text(), "abc");
        assert_eq!(widget.len(), 3);
    }

    #[test]
    fn test_set_contents_rejects_non_insert() {
        let widget = HeadlessWidget::new();
        let err = widget
            .set_contents(&[DeltaOp::retain(3)], WidgetOrigin::Api)
            .unwrap_err();
        assert!(matches!(err, WidgetError::Rejected(_)));
    }

    #[test]
    fn test_update_retain_insert_delete() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert("hello world")], WidgetOrigin::Api)
            .unwrap();
        widget
            .update_contents(
                &[DeltaOp::retain(5), DeltaOp::insert("!"), DeltaOp::delete(6)],
                WidgetOrigin::Api,
            )
            .unwrap();
        assert_eq!(widget.plain_text(), "hello!");
    }

    #[test]
    fn test_update_formats_span() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert("abcdef")], WidgetOrigin::Api)
            .unwrap();
        widget
            .update_contents(
                &[DeltaOp::retain(2), DeltaOp::retain_with(2, bold())],
                WidgetOrigin::Api,
            )
            .unwrap();
        assert_eq!(
            widget.runs(),
            vec![
                Run::new("ab", AttrMap::new()),
                Run::new("cd", bold()),
                Run::new("ef", AttrMap::new()),
            ]
        );

        // A falsy value removes the attribute again and the runs coalesce.
        widget
            .update_contents(
                &[
                    DeltaOp::retain(2),
                    DeltaOp::retain_with(2, attrs([("bold", false)])),
                ],
                WidgetOrigin::Api,
            )
            .unwrap();
        assert_eq!(widget.runs(), vec![Run::new("abcdef", AttrMap::new())]);
    }

    #[test]
    fn test_unattributed_insert_inherits_preceding_attributes() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert_with("ab", bold())], WidgetOrigin::Api)
            .unwrap();
        widget
            .update_contents(
                &[DeltaOp::retain(2), DeltaOp::insert("c")],
                WidgetOrigin::Api,
            )
            .unwrap();
        // The inherited formatting is the hazard the synchronization engine
        // neutralizes with negated formats.
        assert_eq!(widget.runs(), vec![Run::new("abc", bold())]);
    }

    #[test]
    fn test_user_edit_delta_is_literal() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert_with("ab", bold())], WidgetOrigin::Api)
            .unwrap();
        widget
            .user_edit(&[DeltaOp::retain(2), DeltaOp::insert("c")])
            .unwrap();
        // unlike update_contents, a user's plain insert stays plain
        assert_eq!(
            widget.runs(),
            vec![Run::new("ab", bold()), Run::new("c", AttrMap::new())]
        );
    }

    #[test]
    fn test_negated_insert_defeats_inheritance() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert_with("ab", bold())], WidgetOrigin::Api)
            .unwrap();
        widget
            .update_contents(
                &[
                    DeltaOp::retain(2),
                    DeltaOp::insert_with("c", attrs([("bold", false)])),
                ],
                WidgetOrigin::Api,
            )
            .unwrap();
        assert_eq!(
            widget.runs(),
            vec![Run::new("ab", bold()), Run::new("c", AttrMap::new())]
        );
    }

    #[test]
    fn test_delta_past_end_leaves_contents_unchanged() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert("abc")], WidgetOrigin::Api)
            .unwrap();
        let err = widget
            .update_contents(&[DeltaOp::retain(99)], WidgetOrigin::Api)
            .unwrap_err();
        assert!(matches!(err, WidgetError::InvalidDelta(_)));
        assert_eq!(widget.plain_text(), "abc");
        assert_eq!(widget.update_count(), 0);
    }

    #[test]
    fn test_char_boundary_split_rejected() {
        let widget = HeadlessWidget::new();
        widget
            .set_contents(&[DeltaOp::insert("héllo")], WidgetOrigin::Api)
            .unwrap();
        let err = widget
            .update_contents(&[DeltaOp::retain(2)], WidgetOrigin::Api)
            .unwrap_err();
        assert!(matches!(err, WidgetError::InvalidDelta(_)));
        assert_eq!(widget.plain_text(), "héllo");
    }

    #[test]
    fn test_history_records_updates_but_not_user_edits() {
        let widget = HeadlessWidget::new();
        widget
            .update_contents(&[DeltaOp::insert("a")], WidgetOrigin::Replica(7))
            .unwrap();
        widget
            .update_contents(
                &[DeltaOp::retain(1), DeltaOp::insert("b")],
                WidgetOrigin::Replica(7),
            )
            .unwrap();
        widget
            .user_edit(&[DeltaOp::retain(2), DeltaOp::insert("c")])
            .unwrap();

        assert_eq!(widget.plain_text(), "abc");
        assert_eq!(widget.update_count(), 2);
        assert!(widget
            .history()
            .iter()
            .all(|update| update.origin == WidgetOrigin::Replica(7)));

        widget.clear_history();
        assert_eq!(widget.update_count(), 0);
    }

    #[test]
    fn test_events_carry_origin() {
        let widget = HeadlessWidget::new();
        let seen: Arc<Mutex<Vec<WidgetEvent>>> = Arc::default();
        let sink = seen.clone();
        let _sub = widget.observe(Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        widget
            .set_contents(&[DeltaOp::insert("hi")], WidgetOrigin::Replica(3))
            .unwrap();
        widget.user_edit(&[DeltaOp::retain(2), DeltaOp::insert("!")]).unwrap();
        widget.set_selection(Some(Selection::caret(3)), WidgetOrigin::User);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(
            &seen[0],
            WidgetEvent::TextChange { origin: WidgetOrigin::Replica(3), .. }
        ));
        assert!(matches!(
            &seen[1],
            WidgetEvent::TextChange { origin: WidgetOrigin::User, .. }
        ));
        assert!(matches!(
            &seen[2],
            WidgetEvent::SelectionChange {
                selection: Some(Selection { index: 3, length: 0 }),
                origin: WidgetOrigin::User,
            }
        ));
    }

    #[test]
    fn test_remote_cursor_registry() {
        let widget = HeadlessWidget::new();
        let cursors = widget.remote_cursors().unwrap();
        cursors.set_cursor(1, Selection::new(0, 2));
        cursors.set_cursor(2, Selection::caret(5));
        cursors.set_cursor(1, Selection::caret(4));
        assert_eq!(
            cursors.cursors(),
            vec![(1, Selection::caret(4)), (2, Selection::caret(5))]
        );
        cursors.clear_cursor(1);
        assert_eq!(cursors.cursors(), vec![(2, Selection::caret(5))]);
    }

    #[test]
    fn test_selection_accessor() {
        let widget = HeadlessWidget::new();
        assert_eq!(widget.selection(), None);
        widget.set_selection(Some(Selection::new(1, 2)), WidgetOrigin::Api);
        assert_eq!(widget.selection(), Some(Selection::new(1, 2)));
        widget.set_selection(None, WidgetOrigin::Api);
        assert_eq!(widget.selection(), None);
    }
}
