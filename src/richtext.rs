//! Structured rich text as delivered by the content API, and its conversion
//! to plain text and to HTML.
//!
//! A rich-text field is a sequence of block [`Node`]s (paragraphs, headings,
//! list items, images, embeds). Text-bearing nodes carry [`Span`]s which mark
//! inline formatting over ranges of the node's text. Span offsets count UTF-16
//! code units, because that is how the API measures them.
//!
//! The HTML renderer escapes every piece of text and every attribute it emits
//! with the exception of oEmbed markup, which the content host produces
//! itself. Its output is therefore safe to inject into a page verbatim.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use serde::Deserialize;
use std::io;

/// A block-level rich-text node.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Node {
    /// The kind of block. Nodes that omit it are treated as paragraphs.
    #[serde(rename = "type", default)]
    pub kind: NodeKind,

    #[serde(default, deserialize_with = "nullable")]
    pub text: String,

    #[serde(default)]
    pub spans: Vec<Span>,

    /// The source URL of an image node.
    #[serde(default)]
    pub url: Option<String>,

    /// The alternative text of an image node.
    #[serde(default)]
    pub alt: Option<String>,

    /// The oEmbed payload of an embed node.
    #[serde(default)]
    pub oembed: Option<Embed>,
}

impl Node {
    /// Constructs a paragraph node without formatting.
    pub fn paragraph(text: &str) -> Node {
        Node {
            kind: NodeKind::Paragraph,
            text: text.to_owned(),
            ..Node::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Paragraph,
    /// `heading1` through `heading6`.
    Heading(u8),
    Preformatted,
    ListItem,
    OrderedListItem,
    Image,
    Embed,
    /// A node type this renderer does not know. Its text is rendered as a
    /// paragraph.
    Other(String),
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Paragraph
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D>(deserializer: D) -> Result<NodeKind, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let kind = String::deserialize(deserializer)?;
        Ok(match kind.as_str() {
            "paragraph" => NodeKind::Paragraph,
            "preformatted" => NodeKind::Preformatted,
            "list-item" => NodeKind::ListItem,
            "o-list-item" => NodeKind::OrderedListItem,
            "image" => NodeKind::Image,
            "embed" => NodeKind::Embed,
            _ => match kind
                .strip_prefix("heading")
                .and_then(|level| level.parse::<u8>().ok())
            {
                Some(level) if (1..=6).contains(&level) => NodeKind::Heading(level),
                _ => NodeKind::Other(kind),
            },
        })
    }
}

/// Inline formatting over `start..end` of a node's text.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,

    #[serde(rename = "type")]
    pub kind: SpanKind,

    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink,
    Label,
    /// A span type this renderer does not know. It contributes no markup.
    Other(String),
}

impl<'de> Deserialize<'de> for SpanKind {
    fn deserialize<D>(deserializer: D) -> Result<SpanKind, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let kind = String::deserialize(deserializer)?;
        Ok(match kind.as_str() {
            "strong" => SpanKind::Strong,
            "em" => SpanKind::Em,
            "hyperlink" => SpanKind::Hyperlink,
            "label" => SpanKind::Label,
            _ => SpanKind::Other(kind),
        })
    }
}

/// Extra span payload: the destination of a hyperlink or the name of a label.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Embed {
    #[serde(default)]
    pub embed_url: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub html: Option<String>,
}

/// Treats a `null` string as empty.
pub(crate) fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Returns the plain text of `nodes`, joined by a single space.
pub fn as_text(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|node| node.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts `nodes` into HTML, appending to `out`.
pub fn push_html<W: StrWrite>(out: &mut W, nodes: &[Node]) -> io::Result<()> {
    let mut renderer = HtmlRenderer::default();
    for node in nodes {
        renderer.on_node(out, node)?;
    }
    renderer.close_list(out)
}

/// Converts `nodes` into an HTML string.
pub fn as_html(nodes: &[Node]) -> io::Result<String> {
    let mut out = String::new();
    push_html(&mut out, nodes)?;
    Ok(out)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

/// Renders [`Node`]s into HTML. Consecutive list items share one list
/// element, so the renderer remembers which list (if any) is open.
#[derive(Default)]
struct HtmlRenderer {
    open_list: Option<ListKind>,
}

impl HtmlRenderer {
    fn on_node<W: StrWrite>(&mut self, w: &mut W, node: &Node) -> io::Result<()> {
        let list = match node.kind {
            NodeKind::ListItem => Some(ListKind::Unordered),
            NodeKind::OrderedListItem => Some(ListKind::Ordered),
            _ => None,
        };
        if self.open_list != list {
            self.close_list(w)?;
            match list {
                Some(ListKind::Unordered) => w.write_str("<ul>")?,
                Some(ListKind::Ordered) => w.write_str("<ol>")?,
                None => {}
            }
            self.open_list = list;
        }

        match &node.kind {
            NodeKind::Paragraph | NodeKind::Other(_) => self.on_text_block(w, "p", node),
            NodeKind::Heading(level) => {
                self.on_text_block(w, &format!("h{}", level), node)
            }
            NodeKind::Preformatted => self.on_text_block(w, "pre", node),
            NodeKind::ListItem | NodeKind::OrderedListItem => {
                self.on_text_block(w, "li", node)
            }
            NodeKind::Image => self.on_image(w, node),
            NodeKind::Embed => self.on_embed(w, node),
        }
    }

    fn close_list<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        match self.open_list.take() {
            Some(ListKind::Unordered) => w.write_str("</ul>"),
            Some(ListKind::Ordered) => w.write_str("</ol>"),
            None => Ok(()),
        }
    }

    fn on_text_block<W: StrWrite>(&mut self, w: &mut W, tag: &str, node: &Node) -> io::Result<()> {
        write!(w, "<{}>", tag)?;
        push_spans(w, &node.text, &node.spans)?;
        write!(w, "</{}>", tag)
    }

    fn on_image<W: StrWrite>(&mut self, w: &mut W, node: &Node) -> io::Result<()> {
        w.write_str(r#"<p class="block-img"><img src=""#)?;
        escape_href(&mut *w, node.url.as_deref().unwrap_or_default())?;
        w.write_str(r#"" alt=""#)?;
        escape_html(&mut *w, node.alt.as_deref().unwrap_or_default())?;
        w.write_str(r#"" /></p>"#)
    }

    fn on_embed<W: StrWrite>(&mut self, w: &mut W, node: &Node) -> io::Result<()> {
        let embed = match &node.oembed {
            Some(embed) => embed,
            None => return Ok(()),
        };
        w.write_str(r#"<div data-oembed=""#)?;
        escape_href(&mut *w, embed.embed_url.as_deref().unwrap_or_default())?;
        w.write_str(r#"" data-oembed-type=""#)?;
        escape_html(&mut *w, embed.kind.as_deref().unwrap_or_default())?;
        w.write_str(r#"">"#)?;
        w.write_str(embed.html.as_deref().unwrap_or_default())?;
        w.write_str("</div>")
    }
}

/// Writes `text` with `spans` applied. Spans that overlap without nesting are
/// split so the emitted tags nest properly.
fn push_spans<W: StrWrite>(w: &mut W, text: &str, spans: &[Span]) -> io::Result<()> {
    // byte offset of every UTF-16 position, plus the end of the text
    let mut offsets = Vec::with_capacity(text.len() + 1);
    for (i, c) in text.char_indices() {
        for _ in 0..c.len_utf16() {
            offsets.push(i);
        }
    }
    offsets.push(text.len());
    let len = offsets.len() - 1;

    // outermost first: earlier start, then later end
    let mut order: Vec<usize> = (0..spans.len())
        .filter(|&i| spans[i].start < spans[i].end && spans[i].start < len)
        .collect();
    order.sort_by(|&a, &b| {
        spans[a]
            .start
            .cmp(&spans[b].start)
            .then(spans[b].end.cmp(&spans[a].end))
    });

    let mut boundaries: Vec<usize> = vec![0, len];
    for &i in &order {
        boundaries.push(spans[i].start);
        boundaries.push(spans[i].end.min(len));
    }
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut open: Vec<usize> = Vec::new();
    for window in boundaries.windows(2) {
        let (start, end) = (window[0], window[1]);
        let active: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&i| spans[i].start <= start && spans[i].end >= end)
            .collect();

        let common = open
            .iter()
            .zip(active.iter())
            .take_while(|(a, b)| a == b)
            .count();
        while open.len() > common {
            if let Some(i) = open.pop() {
                close_span(w, &spans[i])?;
            }
        }
        for &i in &active[common..] {
            open_span(w, &spans[i])?;
            open.push(i);
        }

        push_text(w, &text[offsets[start]..offsets[end]])?;
    }
    while let Some(i) = open.pop() {
        close_span(w, &spans[i])?;
    }
    Ok(())
}

fn open_span<W: StrWrite>(w: &mut W, span: &Span) -> io::Result<()> {
    let data = span.data.as_ref();
    match &span.kind {
        SpanKind::Strong => w.write_str("<strong>"),
        SpanKind::Em => w.write_str("<em>"),
        SpanKind::Hyperlink => {
            w.write_str(r#"<a href=""#)?;
            escape_href(&mut *w, data.and_then(|d| d.url.as_deref()).unwrap_or_default())?;
            match data.and_then(|d| d.target.as_deref()) {
                Some(target) => {
                    w.write_str(r#"" target=""#)?;
                    escape_html(&mut *w, target)?;
                    w.write_str(r#"" rel="noopener">"#)
                }
                None => w.write_str(r#"">"#),
            }
        }
        SpanKind::Label => {
            w.write_str(r#"<span class=""#)?;
            escape_html(&mut *w, data.and_then(|d| d.label.as_deref()).unwrap_or_default())?;
            w.write_str(r#"">"#)
        }
        SpanKind::Other(_) => Ok(()),
    }
}

fn close_span<W: StrWrite>(w: &mut W, span: &Span) -> io::Result<()> {
    match &span.kind {
        SpanKind::Strong => w.write_str("</strong>"),
        SpanKind::Em => w.write_str("</em>"),
        SpanKind::Hyperlink => w.write_str("</a>"),
        SpanKind::Label => w.write_str("</span>"),
        SpanKind::Other(_) => Ok(()),
    }
}

/// Escapes `text`, turning line breaks into `<br />`.
fn push_text<W: StrWrite>(w: &mut W, text: &str) -> io::Result<()> {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            w.write_str("<br />")?;
        }
        escape_html(&mut *w, line)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn nodes(json: &str) -> Vec<Node> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_as_text_joins_nodes() {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "hello world", "spans": []},
                {"type": "heading2", "text": "test", "spans": []}]"#,
        );
        assert_eq!("hello world test", as_text(&body));
    }

    #[test]
    fn test_nodes_without_type_are_paragraphs() -> io::Result<()> {
        let body = nodes(r#"[{"text": "plain"}]"#);
        assert_eq!(NodeKind::Paragraph, body[0].kind);
        assert_eq!("<p>plain</p>", as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_null_text_is_empty() {
        let body = nodes(r#"[{"type": "paragraph", "text": null}]"#);
        assert_eq!("", body[0].text);
    }

    #[test]
    fn test_headings_and_preformatted() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "heading3", "text": "Title"},
                {"type": "preformatted", "text": "let x = 1;"}]"#,
        );
        assert_eq!("<h3>Title</h3><pre>let x = 1;</pre>", as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_escapes_text() -> io::Result<()> {
        let body = vec![Node::paragraph("<script>alert(\"x\")</script> & more")];
        assert_eq!(
            "<p>&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; more</p>",
            as_html(&body)?
        );
        Ok(())
    }

    #[test]
    fn test_line_breaks() -> io::Result<()> {
        let body = vec![Node::paragraph("one\ntwo")];
        assert_eq!("<p>one<br />two</p>", as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_lists_are_grouped() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "list-item", "text": "a"},
                {"type": "list-item", "text": "b"},
                {"type": "o-list-item", "text": "c"},
                {"type": "paragraph", "text": "d"}]"#,
        );
        assert_eq!(
            "<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol><p>d</p>",
            as_html(&body)?
        );
        Ok(())
    }

    #[test]
    fn test_trailing_list_is_closed() -> io::Result<()> {
        let body = nodes(r#"[{"type": "list-item", "text": "a"}]"#);
        assert_eq!("<ul><li>a</li></ul>", as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_nested_spans() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "bold and italic", "spans": [
                {"start": 0, "end": 15, "type": "strong"},
                {"start": 9, "end": 15, "type": "em"}]}]"#,
        );
        assert_eq!(
            "<p><strong>bold and <em>italic</em></strong></p>",
            as_html(&body)?
        );
        Ok(())
    }

    #[test]
    fn test_overlapping_spans_are_split() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "abcdef", "spans": [
                {"start": 0, "end": 4, "type": "strong"},
                {"start": 2, "end": 6, "type": "em"}]}]"#,
        );
        assert_eq!(
            "<p><strong>ab<em>cd</em></strong><em>ef</em></p>",
            as_html(&body)?
        );
        Ok(())
    }

    #[test]
    fn test_hyperlink() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "see docs", "spans": [
                {"start": 4, "end": 8, "type": "hyperlink",
                 "data": {"link_type": "Web", "url": "https://example.org/a b", "target": "_blank"}}]}]"#,
        );
        assert_eq!(
            r#"<p>see <a href="https://example.org/a%20b" target="_blank" rel="noopener">docs</a></p>"#,
            as_html(&body)?
        );
        Ok(())
    }

    #[test]
    fn test_label_and_unknown_span() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "note", "spans": [
                {"start": 0, "end": 4, "type": "label", "data": {"label": "callout"}},
                {"start": 0, "end": 2, "type": "sparkle"}]}]"#,
        );
        assert_eq!(r#"<p><span class="callout">note</span></p>"#, as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_span_offsets_count_utf16_units() -> io::Result<()> {
        // "🚀" is two UTF-16 code units
        let body = nodes(
            r#"[{"type": "paragraph", "text": "🚀 go", "spans": [
                {"start": 3, "end": 5, "type": "strong"}]}]"#,
        );
        assert_eq!("<p>🚀 <strong>go</strong></p>", as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_out_of_range_spans_are_clamped() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "abc", "spans": [
                {"start": 1, "end": 99, "type": "em"},
                {"start": 50, "end": 60, "type": "strong"}]}]"#,
        );
        assert_eq!("<p>a<em>bc</em></p>", as_html(&body)?);
        Ok(())
    }

    #[test]
    fn test_image_and_embed() -> io::Result<()> {
        let body = nodes(
            r#"[{"type": "image", "url": "https://images.example/x.png", "alt": "a \"rocket\""},
                {"type": "embed", "oembed": {"embed_url": "https://youtu.be/x", "type": "video", "html": "<iframe></iframe>"}}]"#,
        );
        assert_eq!(
            concat!(
                r#"<p class="block-img"><img src="https://images.example/x.png" alt="a &quot;rocket&quot;" /></p>"#,
                r#"<div data-oembed="https://youtu.be/x" data-oembed-type="video"><iframe></iframe></div>"#,
            ),
            as_html(&body)?
        );
        Ok(())
    }

    #[test]
    fn test_unknown_node_renders_as_paragraph() -> io::Result<()> {
        let body = nodes(r#"[{"type": "heading9", "text": "odd"}]"#);
        assert_eq!(NodeKind::Other("heading9".to_owned()), body[0].kind);
        assert_eq!("<p>odd</p>", as_html(&body)?);
        Ok(())
    }
}
