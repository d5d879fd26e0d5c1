//! # Folio Store
//!
//! Collaborative text engine for Folio documents: CRDT-backed text
//! primitives, the rich-text widget synchronization engine, and the replica
//! update surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ store: one replica document                 │
//! │  - root Text primitives by key              │
//! │  - transaction scopes with origin tags      │
//! │  - update encode / apply for replication    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ text: transactional mutation API            │
//! │  - insert / delete / format / join / split  │
//! │  - delta and range projections              │
//! │  - one-shot refresh markers                 │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ richtext: widget synchronization            │
//! │  - seeds and pushes to an EditorWidget      │
//! │  - suppresses feedback loops by origin      │
//! │  - negates used formats on plain inserts    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The primitive is source of truth**: widget contents are a projection
//!    seeded and updated by the binding, never the other way around
//! 2. **Convergence is delegated**: concurrent-edit merging belongs to the
//!    CRDT layer; this crate defines what each operation means
//! 3. **Byte offsets on character boundaries**: every index is a UTF-8 byte
//!    position and is validated before anything is applied
//! 4. **Widgets are untrusted**: only `User`-origin widget events mutate the
//!    primitive, and every pushed insert spells out the state of every
//!    format key the widget has used
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_store::{HeadlessWidget, RichTextBinding, Store};
//! use std::sync::Arc;
//!
//! let store = Store::new();
//! let text = store.create_text("content");
//! text.insert(0, "hello")?;
//!
//! // Couple the text to a widget; edits flow both ways.
//! let binding = RichTextBinding::new(text, Arc::new(HeadlessWidget::new()))?;
//! binding.widget().user_edit(&[/* delta */])?;
//!
//! // Replicate to another store.
//! let update = store.encode_update();
//! other_store.apply_remote_update(&update)?;
//! ```

pub mod delta;
pub mod headless;
pub mod richtext;
pub mod signal;
pub mod store;
pub mod text;
pub mod widget;


pub use delta::{attrs, delta_text, normalize_widget_delta, AttrMap, AttrValue, DeltaOp, TextRun};
pub use headless::{AppliedUpdate, HeadlessWidget, Run};
pub use richtext::{CursorRange, RichTextBinding, SyncError};
pub use signal::{Signal, Subscription};
pub use store::{Store, StoreError};
pub use text::{PlaceholderText, RefreshReason, SplitSide, Text, TextContent, TextError};
pub use widget::{
    EditorWidget, RemoteCursors, Selection, WidgetError, WidgetEvent, WidgetEventHandler,
    WidgetOrigin,
};
