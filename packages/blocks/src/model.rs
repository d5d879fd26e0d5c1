//! Block tree: ownership, child bookkeeping, and lifecycle.
//!
//! A [`BlockModel`] is the variant-independent core of a block: an id, the
//! ordered list of owned children, an optional text slot, and the two change
//! signals. [`Block`] is the closed set of variants; ownership flows strictly
//! downward, so dropping a block drops its subtree and releases the text
//! handles with it.

use std::collections::HashMap;

use folio_store::{Signal, TextContent, TextError};

use crate::list::ListBlock;
use crate::markup::BlockMarkup;
use crate::page::PageBlock;
use crate::paragraph::ParagraphBlock;

/// Variant-independent block state.
///
/// Children are managed through [`add_child`](BlockModel::add_child),
/// [`insert_child`](BlockModel::insert_child) and
/// [`remove_child`](BlockModel::remove_child) so the child-id index stays
/// consistent with the list.
#[derive(Debug, Default)]
pub struct BlockModel {
    id: String,
    children: Vec<Block>,
    text: Option<TextContent>,
    child_map: HashMap<String, usize>,

    /// Fires when a non-child property of the block changes.
    pub props_updated: Signal<()>,
    /// Fires when the child list changes.
    pub children_updated: Signal<()>,
}

impl BlockModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn children(&self) -> &[Block] {
        &self.children
    }

    pub fn text(&self) -> Option<&TextContent> {
        self.text.as_ref()
    }

    /// Put live text or a placeholder into the block's text slot.
    pub fn set_text(&mut self, text: impl Into<TextContent>) {
        self.text = Some(text.into());
        self.props_updated.emit(&());
    }

    /// Index of the child with `id`, if owned here.
    pub fn child_index(&self, id: &str) -> Option<usize> {
        self.child_map.get(id).copied()
    }

    pub fn first_child(&self) -> Option<&Block> {
        self.children.first()
    }

    /// Append `child` to the end of the child list.
    pub fn add_child(&mut self, child: Block) {
        self.child_map
            .insert(child.id().to_string(), self.children.len());
        self.children.push(child);
        self.children_updated.emit(&());
    }

    /// Insert `child` at `index`, shifting later children rightward. An index
    /// past the end appends.
    pub fn insert_child(&mut self, index: usize, child: Block) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
        self.rebuild_child_map();
        self.children_updated.emit(&());
    }

    /// Detach and return the child with `id`.
    pub fn remove_child(&mut self, id: &str) -> Option<Block> {
        let index = self.child_map.get(id).copied()?;
        let child = self.children.remove(index);
        self.rebuild_child_map();
        self.children_updated.emit(&());
        Some(child)
    }

    fn rebuild_child_map(&mut self) {
        self.child_map.clear();
        for (index, child) in self.children.iter().enumerate() {
            self.child_map.insert(child.id().to_string(), index);
        }
    }
}

/// The closed set of block variants.
#[derive(Debug)]
pub enum Block {
    Page(PageBlock),
    Paragraph(ParagraphBlock),
    List(ListBlock),
}

impl Block {
    pub fn id(&self) -> &str {
        self.model().id()
    }

    pub fn flavour(&self) -> &'static str {
        match self {
            Block::Page(_) => PageBlock::FLAVOUR,
            Block::Paragraph(_) => ParagraphBlock::FLAVOUR,
            Block::List(_) => ListBlock::FLAVOUR,
        }
    }

    pub fn model(&self) -> &BlockModel {
        match self {
            Block::Page(b) => &b.model,
            Block::Paragraph(b) => &b.model,
            Block::List(b) => &b.model,
        }
    }

    pub fn model_mut(&mut self) -> &mut BlockModel {
        match self {
            Block::Page(b) => &mut b.model,
            Block::Paragraph(b) => &mut b.model,
            Block::List(b) => &mut b.model,
        }
    }

    pub fn first_child(&self) -> Option<&Block> {
        self.model().first_child()
    }

    /// The deepest block reachable by always taking the last child. A block
    /// with no children is its own last descendant. Descends iteratively, so
    /// tree depth never grows the call stack.
    pub fn last_descendant(&self) -> &Block {
        let mut current = self;
        while let Some(last) = current.model().children.last() {
            current = last;
        }
        current
    }

    /// Render the whole subtree to an HTML fragment, passing each child its
    /// sibling ids.
    pub fn to_html(&self) -> Result<String, TextError> {
        self.render_html("", "")
    }

    fn render_html(
        &self,
        prev_sibling_id: &str,
        next_sibling_id: &str,
    ) -> Result<String, TextError> {
        let children = self.model().children();
        let mut child_html = String::new();
        for (index, child) in children.iter().enumerate() {
            let prev = if index == 0 {
                ""
            } else {
                children[index - 1].id()
            };
            let next = children.get(index + 1).map_or("", Block::id);
            child_html.push_str(&child.render_html(prev, next)?);
        }
        self.to_html_fragment(&child_html, prev_sibling_id, next_sibling_id, None, None)
    }

    /// Render the whole subtree to plain text.
    pub fn to_plain_text(&self) -> Result<String, TextError> {
        let mut child_text = String::new();
        for child in self.model().children() {
            child_text.push_str(&child.to_plain_text()?);
        }
        self.to_plain_text_fragment(&child_text, None, None)
    }

    /// Dispose the change signals of this block and every descendant.
    /// Idempotent. Ownership is untouched: the tree still drops normally.
    pub fn dispose(&self) {
        let mut stack = vec![self];
        while let Some(block) = stack.pop() {
            let model = block.model();
            model.props_updated.dispose();
            model.children_updated.dispose();
            stack.extend(model.children().iter());
        }
        tracing::debug!(id = %self.id(), "disposed block subtree");
    }
}

impl BlockMarkup for Block {
    fn model(&self) -> &BlockModel {
        Block::model(self)
    }

    fn to_html_fragment(
        &self,
        child_html: &str,
        prev_sibling_id: &str,
        next_sibling_id: &str,
        begin: Option<u32>,
        end: Option<u32>,
    ) -> Result<String, TextError> {
        match self {
            Block::Page(b) => {
                b.to_html_fragment(child_html, prev_sibling_id, next_sibling_id, begin, end)
            }
            Block::Paragraph(b) => {
                b.to_html_fragment(child_html, prev_sibling_id, next_sibling_id, begin, end)
            }
            Block::List(b) => {
                b.to_html_fragment(child_html, prev_sibling_id, next_sibling_id, begin, end)
            }
        }
    }

    fn to_plain_text_fragment(
        &self,
        child_text: &str,
        begin: Option<u32>,
        end: Option<u32>,
    ) -> Result<String, TextError> {
        match self {
            Block::Page(b) => b.to_plain_text_fragment(child_text, begin, end),
            Block::Paragraph(b) => b.to_plain_text_fragment(child_text, begin, end),
            Block::List(b) => b.to_plain_text_fragment(child_text, begin, end),
        }
    }
}
