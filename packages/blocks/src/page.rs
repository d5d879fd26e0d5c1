//! Page blocks: the title-bearing root variant.
//!
//! A page's projection overrides the default text rendering: it emits the
//! plain title string, sliced to the requested range with rich attributes
//! ignored, followed by the children's markup.

use crate::markup::{slice_plain, BlockMarkup};
use crate::model::BlockModel;
use folio_store::TextError;

#[derive(Debug)]
pub struct PageBlock {
    pub model: BlockModel,
    title: String,
}

impl PageBlock {
    pub const FLAVOUR: &'static str = "page";

    pub fn new(model: BlockModel, title: impl Into<String>) -> Self {
        Self {
            model,
            title: title.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.model.props_updated.emit(&());
    }
}

impl BlockMarkup for PageBlock {
    fn model(&self) -> &BlockModel {
        &self.model
    }

    fn to_html_fragment(
        &self,
        child_html: &str,
        _prev_sibling_id: &str,
        _next_sibling_id: &str,
        begin: Option<u32>,
        end: Option<u32>,
    ) -> Result<String, TextError> {
        let title = slice_plain(&self.title, begin.unwrap_or(0), end)?;
        Ok(format!("{title}{child_html}"))
    }

    fn to_plain_text_fragment(
        &self,
        child_text: &str,
        begin: Option<u32>,
        end: Option<u32>,
    ) -> Result<String, TextError> {
        let title = slice_plain(&self.title, begin.unwrap_or(0), end)?;
        Ok(format!("{title}{child_text}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use folio_store::{attrs, DeltaOp, Store, Text};

    use super::*;

    #[test]
    fn test_title_renders_before_children() {
        let page = PageBlock::new(BlockModel::new("page"), "My Page");
        let html = page
            .to_html_fragment("<strong>body</strong>", "", "", None, None)
            .unwrap();
        assert_eq!(html, "My Page<strong>body</strong>");
    }

    #[test]
    fn test_title_ignores_text_slot_and_attributes() {
        let store = Store::new();
        let text = Text::from_delta(
            &store,
            "content",
            &[DeltaOp::insert_with("ignored", attrs([("bold", true)]))],
        )
        .unwrap();
        let mut model = BlockModel::new("page");
        model.set_text(text);
        let page = PageBlock::new(model, "Title");

        assert_eq!(page.to_html_fragment("", "", "", None, None).unwrap(), "Title");
        assert_eq!(page.to_plain_text_fragment("", None, None).unwrap(), "Title");
    }

    #[test]
    fn test_title_slices_by_range() {
        let page = PageBlock::new(BlockModel::new("page"), "My Page");
        let html = page.to_html_fragment("", "", "", Some(3), Some(7)).unwrap();
        assert_eq!(html, "Page");
        let text = page.to_plain_text_fragment("", Some(0), Some(2)).unwrap();
        assert_eq!(text, "My");
    }

    #[test]
    fn test_set_title_signals_props_updated() {
        let mut page = PageBlock::new(BlockModel::new("page"), "Old");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _sub = page.model.props_updated.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        page.set_title("New");
        assert_eq!(page.title(), "New");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
