//! Paragraph blocks: the default text-bearing variant.

use serde::{Deserialize, Serialize};

use crate::markup::BlockMarkup;
use crate::model::BlockModel;

/// Presentation role of a paragraph. Does not change markup projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphKind {
    Text,
    H1,
    H2,
    H3,
    Quote,
}

#[derive(Debug)]
pub struct ParagraphBlock {
    pub model: BlockModel,
    kind: ParagraphKind,
}

impl ParagraphBlock {
    pub const FLAVOUR: &'static str = "paragraph";

    pub fn new(model: BlockModel, kind: ParagraphKind) -> Self {
        Self { model, kind }
    }

    pub fn kind(&self) -> ParagraphKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ParagraphKind) {
        if self.kind != kind {
            self.kind = kind;
            self.model.props_updated.emit(&());
        }
    }
}

impl BlockMarkup for ParagraphBlock {
    fn model(&self) -> &BlockModel {
        &self.model
    }
}
