//! Markup projection: formatted runs to HTML, text to plain slices.
//!
//! Every block variant implements [`BlockMarkup`]. The default methods render
//! the block's own text slot; the page variant overrides them to emit its
//! plain title instead. Formatting precedence is fixed: bold, italic,
//! underline, code, strikethrough, link. A run takes the first matching tag
//! only; attributes never stack on one run.

use folio_store::{AttrMap, DeltaOp, TextError};

use crate::model::BlockModel;

/// Shared rendering interface over the block variants.
///
/// `prev_sibling_id` / `next_sibling_id` give renderers sibling context for
/// grouping decisions; the built-in variants do not consume them. Byte ranges
/// follow the text slicing rules: `begin` defaults to 0, a missing `end`
/// means the rest of the text, out-of-range ends clamp.
pub trait BlockMarkup {
    fn model(&self) -> &BlockModel;

    /// Own text as HTML, then `child_html`.
    ///
    /// A block whose slot holds placeholder text fails with
    /// [`TextError::UnsupportedOperation`]; realize the placeholder before
    /// rendering.
    fn to_html_fragment(
        &self,
        child_html: &str,
        _prev_sibling_id: &str,
        _next_sibling_id: &str,
        begin: Option<u32>,
        end: Option<u32>,
    ) -> Result<String, TextError> {
        let own = match self.model().text() {
            Some(content) => render_runs(&content.slice_to_delta(begin.unwrap_or(0), end)?),
            None => String::new(),
        };
        Ok(format!("{own}{child_html}"))
    }

    /// Own text stripped of formatting, then `child_text`.
    fn to_plain_text_fragment(
        &self,
        child_text: &str,
        begin: Option<u32>,
        end: Option<u32>,
    ) -> Result<String, TextError> {
        let own = match self.model().text() {
            Some(content) => {
                let plain = content.to_plain_text()?;
                slice_plain(&plain, begin.unwrap_or(0), end)?.to_string()
            }
            None => String::new(),
        };
        Ok(format!("{own}{child_text}"))
    }
}

/// Render the insert runs of a delta to HTML, one tag per run at most.
pub(crate) fn render_runs(ops: &[DeltaOp]) -> String {
    let mut html = String::new();
    for op in ops {
        if let DeltaOp::Insert { insert, attributes } = op {
            html.push_str(&run_to_html(insert, attributes.as_ref()));
        }
    }
    html
}

fn run_to_html(text: &str, attributes: Option<&AttrMap>) -> String {
    let Some(attrs) = attributes else {
        return text.to_string();
    };
    if truthy(attrs, "bold") {
        return format!("<strong>{text}</strong>");
    }
    if truthy(attrs, "italic") {
        return format!("<em>{text}</em>");
    }
    if truthy(attrs, "underline") {
        return format!("<u>{text}</u>");
    }
    if truthy(attrs, "code") {
        return format!("<code>{text}</code>");
    }
    if truthy(attrs, "strikethrough") {
        return format!("<s>{text}</s>");
    }
    if let Some(link) = attrs.get("link").filter(|value| value.truthy()) {
        return format!("<a href='{link}'>{text}</a>");
    }
    text.to_string()
}

fn truthy(attrs: &AttrMap, key: &str) -> bool {
    attrs.get(key).is_some_and(|value| value.truthy())
}

/// Slice `text` to `[begin, end)` with string-slicing semantics: out-of-range
/// offsets clamp, but an offset off a character boundary is an error.
pub(crate) fn slice_plain(text: &str, begin: u32, end: Option<u32>) -> Result<&str, TextError> {
    let len = text.len() as u32;
    let begin = begin.min(len);
    let end = end.map_or(len, |e| e.clamp(begin, len));
    if !text.is_char_boundary(begin as usize) {
        return Err(TextError::OutOfRange { index: begin, len });
    }
    if !text.is_char_boundary(end as usize) {
        return Err(TextError::OutOfRange { index: end, len });
    }
    Ok(&text[begin as usize..end as usize])
}

#[cfg(test)]
mod tests {
    use folio_store::attrs;

    use super::*;

    #[test]
    fn test_plain_run_renders_raw() {
        assert_eq!(run_to_html("hello", None), "hello");
    }

    #[test]
    fn test_first_matching_tag_wins() {
        // bold outranks italic even though both are set
        let html = run_to_html("x", Some(&attrs([("italic", true), ("bold", true)])));
        assert_eq!(html, "<strong>x</strong>");
    }

    #[test]
    fn test_every_tag_in_precedence_order() {
        assert_eq!(
            run_to_html("t", Some(&attrs([("bold", true)]))),
            "<strong>t</strong>"
        );
        assert_eq!(
            run_to_html("t", Some(&attrs([("italic", true)]))),
            "<em>t</em>"
        );
        assert_eq!(
            run_to_html("t", Some(&attrs([("underline", true)]))),
            "<u>t</u>"
        );
        assert_eq!(
            run_to_html("t", Some(&attrs([("code", true)]))),
            "<code>t</code>"
        );
        assert_eq!(
            run_to_html("t", Some(&attrs([("strikethrough", true)]))),
            "<s>t</s>"
        );
    }

    #[test]
    fn test_link_anchor_carries_href() {
        let html = run_to_html("docs", Some(&attrs([("link", "https://example.com/a?b=1")])));
        assert_eq!(html, "<a href='https://example.com/a?b=1'>docs</a>");
    }

    #[test]
    fn test_falsy_attributes_render_raw() {
        assert_eq!(run_to_html("x", Some(&attrs([("bold", false)]))), "x");
        assert_eq!(run_to_html("x", Some(&attrs([("link", "")]))), "x");
        assert_eq!(run_to_html("x", Some(&AttrMap::new())), "x");
    }

    #[test]
    fn test_render_runs_concatenates_in_order() {
        let ops = vec![
            DeltaOp::insert_with("ab", attrs([("bold", true)])),
            DeltaOp::insert("c"),
        ];
        assert_eq!(render_runs(&ops), "<strong>ab</strong>c");
    }

    #[test]
    fn test_slice_plain_clamps_out_of_range() {
        assert_eq!(slice_plain("hello", 1, Some(99)).unwrap(), "ello");
        assert_eq!(slice_plain("hello", 99, None).unwrap(), "");
        assert_eq!(slice_plain("hello", 2, Some(1)).unwrap(), "");
    }

    #[test]
    fn test_slice_plain_rejects_split_characters() {
        // é is two bytes; offset 2 lands inside it
        let err = slice_plain("héllo", 2, None).unwrap_err();
        assert_eq!(err, TextError::OutOfRange { index: 2, len: 6 });
    }
}
