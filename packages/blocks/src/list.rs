//! List blocks.

use serde::{Deserialize, Serialize};

use crate::markup::BlockMarkup;
use crate::model::BlockModel;

/// Presentation role of a list item. Does not change markup projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Bulleted,
    Numbered,
    Todo,
}

#[derive(Debug)]
pub struct ListBlock {
    pub model: BlockModel,
    kind: ListKind,
}

impl ListBlock {
    pub const FLAVOUR: &'static str = "list";

    pub fn new(model: BlockModel, kind: ListKind) -> Self {
        Self { model, kind }
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ListKind) {
        if self.kind != kind {
            self.kind = kind;
            self.model.props_updated.emit(&());
        }
    }
}

impl BlockMarkup for ListBlock {
    fn model(&self) -> &BlockModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use folio_store::{attrs, DeltaOp, Store, Text};

    use super::*;

    #[test]
    fn test_list_item_renders_its_text() {
        let store = Store::new();
        let text = Text::from_delta(
            &store,
            "content",
            &[DeltaOp::insert_with("todo item", attrs([("strikethrough", true)]))],
        )
        .unwrap();
        let mut model = BlockModel::new("l1");
        model.set_text(text);
        let block = ListBlock::new(model, ListKind::Todo);

        let html = block.to_html_fragment("", "prev", "next", None, None).unwrap();
        assert_eq!(html, "<s>todo item</s>");
    }

    #[test]
    fn test_kind_wire_shape() {
        assert_eq!(
            serde_json::to_string(&ListKind::Numbered).unwrap(),
            "\"numbered\""
        );
        let kind: ListKind = serde_json::from_str("\"todo\"").unwrap();
        assert_eq!(kind, ListKind::Todo);
    }
}
