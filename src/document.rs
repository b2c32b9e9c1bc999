use std::{collections::HashMap, ops::Range, path::Path};

use anyhow::Context as _;

use crate::{
    error::{BulletpointerError, BulletpointerResult},
    style,
};

/// Handle to an element carrying an `id` attribute, returned by
/// [`SvgDocument::find_unique_element_by_id`].
///
/// A handle is only valid for the document that produced it (or a clone of
/// that document). Accessors panic on a handle that is out of range for the
/// document it is passed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementHandle(usize);

#[derive(Clone, Debug)]
struct ElementSlot {
    tag: String,
    /// Current decoded `style` value. `None` until the element is touched if it had no style.
    style: Option<String>,
    /// Byte range of the original style value (without quotes) in `source`.
    style_value: Option<Range<usize>>,
    quote: char,
    /// Insertion point for a new attribute: end of the last attribute in the start tag.
    attrs_end: usize,
    dirty: bool,
}

/// An SVG source held as text, with the identifiable elements indexed once.
///
/// Edits are kept on the index and spliced into the original text on
/// serialization, so everything that was not toggled is written back byte for byte.
#[derive(Clone, Debug)]
pub struct SvgDocument {
    source: String,
    elements: Vec<ElementSlot>,
    ids: HashMap<String, Vec<usize>>,
}

impl SvgDocument {
    pub fn parse(source: String) -> BulletpointerResult<Self> {
        let opts = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };

        let mut elements = Vec::new();
        let mut ids: HashMap<String, Vec<usize>> = HashMap::new();
        {
            let xml = roxmltree::Document::parse_with_options(&source, opts)
                .map_err(|e| BulletpointerError::document(format!("parse xml: {e}")))?;

            for node in xml.descendants().filter(|n| n.is_element()) {
                let Some(id) = node.attribute("id") else {
                    continue;
                };

                let mut attrs_end = 0usize;
                let mut style_attr = None;
                for attr in node.attributes() {
                    attrs_end = attrs_end.max(attr.range().end);
                    if attr.namespace().is_none() && attr.name() == "style" {
                        style_attr = Some(attr);
                    }
                }

                let (style, style_value, quote) = match style_attr {
                    Some(attr) => {
                        let (range, quote) = attribute_value_span(&source, attr.range())?;
                        (Some(attr.value().to_string()), Some(range), quote)
                    }
                    None => (None, None, '"'),
                };

                ids.entry(id.to_string()).or_default().push(elements.len());
                elements.push(ElementSlot {
                    tag: node.tag_name().name().to_string(),
                    style,
                    style_value,
                    quote,
                    attrs_end,
                    dirty: false,
                });
            }
        }

        Ok(Self {
            source,
            elements,
            ids,
        })
    }

    pub fn load(path: &Path) -> BulletpointerResult<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("read svg '{}'", path.display()))?;
        Self::parse(source).map_err(|e| match e {
            BulletpointerError::Document(msg) => {
                BulletpointerError::document(format!("'{}': {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Number of elements carrying `id`.
    pub fn count_by_id(&self, id: &str) -> usize {
        self.ids.get(id).map_or(0, Vec::len)
    }

    /// Resolve `id` to its element. Zero or several matches are an error.
    pub fn find_unique_element_by_id(&self, id: &str) -> BulletpointerResult<ElementHandle> {
        match self.ids.get(id).map(Vec::as_slice) {
            Some([idx]) => Ok(ElementHandle(*idx)),
            Some(many) => Err(BulletpointerError::lookup(id, many.len())),
            None => Err(BulletpointerError::lookup(id, 0)),
        }
    }

    pub fn tag_name(&self, el: ElementHandle) -> &str {
        &self.elements[el.0].tag
    }

    /// Current `style` value of the element, empty when it has none.
    pub fn style(&self, el: ElementHandle) -> &str {
        self.elements[el.0].style.as_deref().unwrap_or("")
    }

    /// Set the element's `display` declaration to `none` (hidden) or `inline`.
    ///
    /// The style attribute is always written back, even when the value is unchanged.
    pub fn set_hidden(&mut self, el: ElementHandle, hidden: bool) {
        let slot = &mut self.elements[el.0];
        let next = style::with_display(slot.style.as_deref().unwrap_or(""), hidden);
        slot.style = Some(next);
        slot.dirty = true;
    }

    pub fn hide_by_id(&mut self, id: &str) -> BulletpointerResult<()> {
        let el = self.find_unique_element_by_id(id)?;
        self.set_hidden(el, true);
        Ok(())
    }

    pub fn show_by_id(&mut self, id: &str) -> BulletpointerResult<()> {
        let el = self.find_unique_element_by_id(id)?;
        self.set_hidden(el, false);
        Ok(())
    }

    pub fn to_svg_string(&self) -> String {
        let mut edits: Vec<(Range<usize>, String)> = self
            .elements
            .iter()
            .filter(|slot| slot.dirty)
            .map(|slot| {
                let value = slot.style.as_deref().unwrap_or("");
                match &slot.style_value {
                    Some(range) => (range.clone(), escape_attr(value, slot.quote)),
                    None => (
                        slot.attrs_end..slot.attrs_end,
                        format!(" style=\"{}\"", escape_attr(value, '"')),
                    ),
                }
            })
            .collect();
        edits.sort_by_key(|(range, _)| range.start);

        let extra: usize = edits.iter().map(|(_, text)| text.len()).sum();
        let mut out = String::with_capacity(self.source.len() + extra);
        let mut cursor = 0usize;
        for (range, text) in &edits {
            out.push_str(&self.source[cursor..range.start]);
            out.push_str(text);
            cursor = range.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    pub fn write_to(&self, path: &Path) -> BulletpointerResult<()> {
        std::fs::write(path, self.to_svg_string())
            .with_context(|| format!("write svg '{}'", path.display()))?;
        Ok(())
    }
}

/// Locate the quoted value inside an attribute span `name = "value"`.
fn attribute_value_span(
    source: &str,
    attr: Range<usize>,
) -> BulletpointerResult<(Range<usize>, char)> {
    let text = &source[attr.clone()];
    let eq = text
        .find('=')
        .ok_or_else(|| BulletpointerError::document("attribute without '='"))?;
    let open = text[eq + 1..]
        .find(['"', '\''])
        .map(|i| eq + 1 + i)
        .ok_or_else(|| BulletpointerError::document("attribute value is not quoted"))?;
    let quote = if text.as_bytes()[open] == b'\'' {
        '\''
    } else {
        '"'
    };
    let close = text
        .rfind(quote)
        .filter(|&i| i > open)
        .ok_or_else(|| BulletpointerError::document("unterminated attribute value"))?;
    Ok((attr.start + open + 1..attr.start + close, quote))
}

fn escape_attr(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' if quote == '"' => out.push_str("&quot;"),
            '\'' if quote == '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" width="160" height="90">
  <!-- title stays untouched -->
  <g id="title" inkscape:label="Title"><text>Hello</text></g>
  <g id="b1" style="fill:#000;display:inline"><text>one</text></g>
  <g id="b2" style='fill:red'><text>two</text></g>
  <rect id="dup" width="1" height="1"/>
  <rect id="dup" width="2" height="2"/>
</svg>
"#;

    fn doc() -> SvgDocument {
        SvgDocument::parse(SLIDE.to_string()).unwrap()
    }

    #[test]
    fn unique_id_resolves_to_its_element() {
        let d = doc();
        let el = d.find_unique_element_by_id("b1").unwrap();
        assert_eq!(d.tag_name(el), "g");
        assert_eq!(d.style(el), "fill:#000;display:inline");
    }

    #[test]
    fn missing_and_duplicate_ids_are_errors() {
        let d = doc();
        match d.find_unique_element_by_id("nope").unwrap_err() {
            BulletpointerError::Lookup { id, count } => {
                assert_eq!(id, "nope");
                assert_eq!(count, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        match d.find_unique_element_by_id("dup").unwrap_err() {
            BulletpointerError::Lookup { count, .. } => assert_eq!(count, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(d.count_by_id("dup"), 2);
    }

    #[test]
    fn untouched_document_serializes_verbatim() {
        assert_eq!(doc().to_svg_string(), SLIDE);
    }

    #[test]
    fn existing_style_is_rewritten_in_place() {
        let mut d = doc();
        d.hide_by_id("b1").unwrap();
        let out = d.to_svg_string();
        assert!(out.contains(r#"<g id="b1" style="fill:#000;display:none">"#));
        assert!(out.contains("<!-- title stays untouched -->"));
    }

    #[test]
    fn single_quoted_style_keeps_its_quotes() {
        let mut d = doc();
        d.hide_by_id("b2").unwrap();
        assert!(d.to_svg_string().contains("style='fill:red;display:none'"));
    }

    #[test]
    fn missing_style_is_inserted_after_last_attribute() {
        let mut d = doc();
        d.hide_by_id("title").unwrap();
        let out = d.to_svg_string();
        assert!(out.contains(r#"<g id="title" inkscape:label="Title" style="display:none">"#));

        let reparsed = SvgDocument::parse(out).unwrap();
        let el = reparsed.find_unique_element_by_id("title").unwrap();
        assert_eq!(reparsed.style(el), "display:none");
    }

    #[test]
    fn show_after_hide_yields_inline() {
        let mut d = doc();
        d.hide_by_id("b2").unwrap();
        d.show_by_id("b2").unwrap();
        let el = d.find_unique_element_by_id("b2").unwrap();
        assert_eq!(d.style(el), "fill:red;display:inline");
    }

    #[test]
    fn entities_round_trip_through_style() {
        let src = r#"<svg xmlns="http://www.w3.org/2000/svg"><g id="x" style="font-family:&quot;Sans&quot;"/></svg>"#;
        let mut d = SvgDocument::parse(src.to_string()).unwrap();
        let el = d.find_unique_element_by_id("x").unwrap();
        assert_eq!(d.style(el), r#"font-family:"Sans""#);
        d.set_hidden(el, true);
        assert!(
            d.to_svg_string()
                .contains(r#"style="font-family:&quot;Sans&quot;;display:none""#)
        );
    }

    #[test]
    fn handles_stay_valid_on_clones() {
        let mut original = doc();
        let el = original.find_unique_element_by_id("b2").unwrap();
        let mut copy = original.clone();
        copy.set_hidden(el, true);
        original.set_hidden(el, false);
        assert_eq!(copy.style(el), "fill:red;display:none");
        assert_eq!(original.style(el), "fill:red;display:inline");
    }

    #[test]
    #[should_panic]
    fn foreign_handle_out_of_range_panics() {
        let big = doc();
        let el = big.find_unique_element_by_id("b2").unwrap();
        let small = SvgDocument::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g id="only"/></svg>"#.to_string(),
        )
        .unwrap();
        let _ = small.style(el);
    }

    #[test]
    fn malformed_xml_is_a_document_error() {
        let err = SvgDocument::parse("<svg><g></svg>".to_string()).unwrap_err();
        assert!(matches!(err, BulletpointerError::Document(_)));
    }
}
