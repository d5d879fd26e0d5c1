//! Example: two replicas editing the same text through widget bindings
//!
//! Each replica owns a store, a text, and a headless widget bound to it.
//! Updates travel between the stores as encoded byte payloads, the way a
//! network transport would carry them.

use std::sync::Arc;

use folio_store::{
    attrs, CursorRange, DeltaOp, EditorWidget, HeadlessWidget, RichTextBinding, Selection, Store,
    WidgetOrigin,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Replica A: a store, a text, and a widget kept in sync by the binding
    let store_a = Store::new();
    let widget_a = Arc::new(HeadlessWidget::new());
    let binding_a = RichTextBinding::new(store_a.create_text("content"), widget_a.clone())?;

    // Replica B: same document id, empty until the first update arrives
    let store_b = Store::new();
    let widget_b = Arc::new(HeadlessWidget::new());
    let binding_b = RichTextBinding::new(store_b.create_text("content"), widget_b.clone())?;

    // User A types a bold greeting into their widget
    widget_a.user_edit(&[DeltaOp::insert_with("Hello", attrs([("bold", true)]))])?;
    println!("A writes: {:?}", widget_a.plain_text());

    // Ship A's changes to B
    let update = store_a.encode_update_since(&store_b.state_vector())?;
    println!("update payload: {} bytes", update.len());
    store_b.apply_remote_update(&update)?;
    println!("B now shows: {:?}", widget_b.plain_text());

    // User B replies in plain text after the bold run
    widget_b.user_edit(&[DeltaOp::retain(5), DeltaOp::insert(" world")])?;
    let reply = store_b.encode_update_since(&store_a.state_vector())?;
    store_a.apply_remote_update(&reply)?;

    println!("A shows: {:?}", widget_a.plain_text());
    for run in widget_a.runs() {
        println!("  run {:?} {:?}", run.text, run.attributes);
    }

    // Presence: A selects "world", B pins A's cursor against its own state
    widget_a.set_selection(Some(Selection::new(6, 5)), WidgetOrigin::User);
    if let Some(cursor) = binding_a.cursor() {
        let wire = cursor.encode();
        let decoded = CursorRange::decode(&wire)?;
        binding_b.apply_remote_cursor(store_a.client_id(), &decoded);
        if let Some(cursors) = widget_b.remote_cursors() {
            for (replica, selection) in cursors.cursors() {
                println!(
                    "B sees replica {replica} selecting bytes {}..{}",
                    selection.index,
                    selection.end()
                );
            }
        }
    }

    Ok(())
}
