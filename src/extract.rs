//! Scripture and commentary extraction from the rendered devotional page
//!
//! Pure transforms over an HTML snapshot - no browser handle involved.
//! The page layout is fixed (one site, one daily reading), so selectors
//! are constants and layout mismatches degrade to empty records.

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Container holding the day's scripture text.
pub const SCRIPTURE_CONTAINER: &str = "#font_uparea02";
/// Container holding the commentary, visible after the tab switch.
pub const COMMENTARY_CONTAINER: &str = "#font_uparea03";
/// Tab element that reveals the commentary container.
pub const COMMENTARY_TAB: &str = "#mainTitle_3";
/// Commentary title element.
pub const COMMENTARY_TITLE: &str = ".b_text";
/// Trailing copyright/info element.
pub const COMMENTARY_INFO: &str = "#dailybible_info2";
/// Class marking a section subtitle inside the commentary container.
pub const SUBTITLE_CLASS: &str = "g_text";
/// Class marking section body text.
pub const BODY_CLASS: &str = "text";

/// The day's reading: free-text header (date, series, passage reference)
/// followed by the numbered verses in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptureRecord {
    pub header: String,
    pub verses: Vec<Verse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub number: String,
    pub text: String,
}

/// Commentary on the day's reading: title, subtitle/content sections in
/// document order, and a trailing info line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentaryRecord {
    pub title: String,
    pub sections: Vec<Section>,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub subtitle: String,
    pub content: String,
}

impl ScriptureRecord {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.verses.is_empty()
    }
}

/// Extract the scripture record from a full-page HTML snapshot.
///
/// A missing container yields an empty record, not an error - the page
/// layout changing is an expected failure mode.
pub fn scripture_from_html(html: &str) -> ScriptureRecord {
    let doc = Html::parse_document(html);
    match select_first(&doc, SCRIPTURE_CONTAINER) {
        Some(container) => scripture_from_text(&element_text(container)),
        None => {
            log::warn!("scripture container {} not found", SCRIPTURE_CONTAINER);
            ScriptureRecord::default()
        }
    }
}

/// Parse the scripture container's visible text.
///
/// Non-blank lines before the first line matching `^\d+\s` form the
/// header; lines from there on are parsed as `<number> <text>` verses,
/// and lines that do not match are dropped.
pub fn scripture_from_text(text: &str) -> ScriptureRecord {
    let verse_start = Regex::new(r"^\d+\s").unwrap();
    let verse_line = Regex::new(r"^(\d+)\s(.+)$").unwrap();

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let boundary = lines
        .iter()
        .position(|line| verse_start.is_match(line))
        .unwrap_or(lines.len());

    let header = lines[..boundary].join("\n");
    let verses = lines[boundary..]
        .iter()
        .filter_map(|line| {
            verse_line.captures(line).map(|cap| Verse {
                number: cap[1].to_string(),
                text: cap[2].to_string(),
            })
        })
        .collect();

    ScriptureRecord { header, verses }
}

/// Extract the commentary record from a full-page HTML snapshot.
///
/// For each subtitle element inside the commentary container, the
/// content is the first following sibling carrying the body-text class
/// before the next subtitle element; a subtitle with no body still
/// yields a section with empty content.
pub fn commentary_from_html(html: &str) -> CommentaryRecord {
    let doc = Html::parse_document(html);

    let title = select_first(&doc, COMMENTARY_TITLE)
        .map(element_text)
        .unwrap_or_default();

    let info = select_first(&doc, COMMENTARY_INFO)
        .map(element_text)
        .unwrap_or_default();

    let mut sections = Vec::new();
    match select_first(&doc, COMMENTARY_CONTAINER) {
        Some(container) => {
            if let Ok(subtitle_sel) = Selector::parse(&format!(".{}", SUBTITLE_CLASS)) {
                for subtitle_el in container.select(&subtitle_sel) {
                    let subtitle = element_text(subtitle_el);
                    let content = first_body_after(subtitle_el);
                    if !subtitle.is_empty() || !content.is_empty() {
                        sections.push(Section { subtitle, content });
                    }
                }
            }
        }
        None => {
            log::warn!("commentary container {} not found", COMMENTARY_CONTAINER);
        }
    }

    CommentaryRecord {
        title,
        sections,
        info,
    }
}

/// Walk the element siblings after a subtitle, returning the text of the
/// first body-class element before the next subtitle. First match wins;
/// later body siblings in the same section are ignored.
fn first_body_after(subtitle: ElementRef<'_>) -> String {
    let mut node = subtitle.next_sibling();
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            if has_class(el, SUBTITLE_CLASS) {
                break;
            }
            if has_class(el, BODY_CLASS) {
                return element_text(el);
            }
        }
        node = n.next_sibling();
    }
    String::new()
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

/// Visible text of an element, approximating the browser's `innerText`:
/// whitespace runs in text nodes collapse to single spaces, `<br>`
/// becomes a newline, block elements break lines at their boundaries,
/// script/style subtrees are skipped, and every line is trimmed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in el.children() {
        append_node(child, &mut out);
    }

    let lines: Vec<&str> = out.lines().map(str::trim).collect();
    lines.join("\n").trim().to_string()
}

fn append_node(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => append_collapsed(text, out),
        Node::Element(el) => {
            let name = el.name();
            if matches!(name, "script" | "style" | "head" | "noscript") {
                return;
            }
            if name == "br" {
                out.push('\n');
                return;
            }
            let block = is_block(name);
            if block && !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            for child in node.children() {
                append_node(child, out);
            }
            if block && !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        }
        _ => {}
    }
}

fn append_collapsed(text: &str, out: &mut String) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "li"
            | "ul"
            | "ol"
            | "table"
            | "tr"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "blockquote"
    )
}
