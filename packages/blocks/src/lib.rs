//! # Folio Blocks
//!
//! Block tree and markup projection over [`folio_store`] texts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Block tree                   │
//! │    Page · Paragraph · List   (closed set)    │
//! ├──────────────────────────────────────────────┤
//! │  BlockModel: id, owned children, text slot,  │
//! │  change signals, child-id index              │
//! ├──────────────────────────────────────────────┤
//! │  BlockMarkup: HTML / plain-text fragments    │
//! │  over the text wrapper's slice projections   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Blocks own their children and their text handle; a tree renders by
//! postorder assembly, each block emitting its own text before its children's
//! markup. Rendering never mutates: it reads the text wrapper's delta and
//! slice projections only, and takes no part in widget synchronization.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_blocks::{Block, BlockModel, PageBlock, ParagraphBlock, ParagraphKind};
//! use folio_store::Store;
//!
//! let store = Store::new();
//! let text = store.create_text("intro");
//! text.insert(0, "Hello")?;
//!
//! let mut body = BlockModel::new("p1");
//! body.set_text(text);
//!
//! let mut page = PageBlock::new(BlockModel::new("page"), "My Page");
//! page.model
//!     .add_child(Block::Paragraph(ParagraphBlock::new(body, ParagraphKind::Text)));
//!
//! assert_eq!(Block::Page(page).to_html()?, "My PageHello");
//! ```

pub mod list;
pub mod markup;
pub mod model;
pub mod page;
pub mod paragraph;

pub use list::{ListBlock, ListKind};
pub use markup::BlockMarkup;
pub use model::{Block, BlockModel};
pub use page::PageBlock;
pub use paragraph::{ParagraphBlock, ParagraphKind};

#[cfg(test)]
mod tests {
    use folio_store::{attrs, DeltaOp, Store, Text};

    use super::*;

    fn text_paragraph(store: &Store, id: &str, ops: &[DeltaOp]) -> Block {
        let text = Text::from_delta(store, id, ops).unwrap();
        let mut model = BlockModel::new(id);
        model.set_text(text);
        Block::Paragraph(ParagraphBlock::new(model, ParagraphKind::Text))
    }

    fn sample_tree(store: &Store) -> Block {
        let mut item = BlockModel::new("l1");
        item.set_text(
            Text::from_delta(
                store,
                "l1",
                &[DeltaOp::insert_with("item", attrs([("italic", true)]))],
            )
            .unwrap(),
        );
        let list = Block::List(ListBlock::new(item, ListKind::Bulleted));

        let mut section = BlockModel::new("p2");
        section.set_text(Text::from_delta(store, "p2", &[DeltaOp::insert("middle")]).unwrap());
        section.add_child(list);

        let mut page = PageBlock::new(BlockModel::new("page"), "Notes");
        page.model.add_child(text_paragraph(
            store,
            "p1",
            &[DeltaOp::insert_with("bold", attrs([("bold", true)]))],
        ));
        page.model
            .add_child(Block::Paragraph(ParagraphBlock::new(section, ParagraphKind::Text)));
        Block::Page(page)
    }

    #[test]
    fn test_whole_tree_html_renders_depth_first() {
        let store = Store::new();
        let root = sample_tree(&store);
        assert_eq!(
            root.to_html().unwrap(),
            "Notes<strong>bold</strong>middle<em>item</em>"
        );
    }

    #[test]
    fn test_whole_tree_plain_text() {
        let store = Store::new();
        let root = sample_tree(&store);
        assert_eq!(root.to_plain_text().unwrap(), "Notesboldmiddleitem");
    }
}
