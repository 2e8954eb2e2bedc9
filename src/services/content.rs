// src/services/content.rs

//! Article region selection and paragraph re-segmentation.
//!
//! Shared by the HTTP and browser extractors so both produce the same
//! output shape from a document.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// A region must carry more text than this to be chosen.
pub const MIN_REGION_CHARS: usize = 100;

/// Extractions with less paragraph text than this count as failures.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Sentence fragments shorter than this are dropped.
pub const MIN_FRAGMENT_CHARS: usize = 20;

/// A paragraph is closed once it grows past this.
pub const PARAGRAPH_TARGET_CHARS: usize = 150;

/// Elements that never contribute article text.
const REMOVAL_SELECTORS: &[&str] = &[
    "head",
    "script",
    "style",
    "noscript",
    "iframe",
    "svg",
    "nav",
    "header",
    "footer",
    "aside",
    "form",
    "button",
    "[role=navigation]",
    "[role=banner]",
    "[role=contentinfo]",
    "[class*=advert]",
    ".ad",
    ".ads",
    ".banner",
    ".social",
    ".share",
    ".sharing",
    ".comments",
    "#comments",
    ".comment",
    ".sidebar",
    "#sidebar",
    ".related",
    ".recommend",
    ".cookie",
    ".newsletter",
    ".breadcrumb",
];

/// Candidate article containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[itemprop=articleBody]",
    "[role=main] article",
    ".article-content",
    ".article-body",
    ".post-content",
    ".entry-content",
    ".story-body",
    "#article",
    ".article",
    ".post",
    "[role=main]",
    "main",
    "#content",
    ".content",
    "#main",
    ".main",
    "body",
];

/// Elements scanned when no container qualifies.
const BLOCK_SELECTOR: &str = "p, div, section, td, blockquote, li, pre";

/// Elements that separate words when text is flattened.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "li", "ul", "ol", "td", "tr", "table",
    "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "dd", "dt", "figcaption",
];

/// Section-break markers that close a paragraph early.
const SECTION_BREAKS: &[&str] = &["***", "* * *", "---", "###"];

static REMOVALS: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(REMOVAL_SELECTORS));
static CANDIDATES: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(CONTENT_SELECTORS));
static BLOCKS: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(&[BLOCK_SELECTOR]));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^.!?。！？]+[.!?。！？]*|[.!?。！？]+").expect("valid sentence regex")
});

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                log::error!("Invalid built-in selector '{}': {:?}", s, e);
                None
            }
        })
        .collect()
}

/// Structured article text ready to embed in a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText {
    /// `<p>` elements, HTML escaped
    pub html: String,
    /// Plain paragraph text length in characters
    pub text_chars: usize,
}

/// Extract article paragraphs from a full HTML document.
///
/// Returns `Err` with a reason when less than [`MIN_CONTENT_CHARS`] of text
/// survives; exactly the threshold is accepted.
pub fn extract_article(html: &str) -> Result<ArticleText, String> {
    let document = Html::parse_document(html);
    let region_text = select_region_text(&document);
    let paragraphs = segment_paragraphs(&region_text);
    let text_chars: usize = paragraphs.iter().map(|p| p.chars().count()).sum();

    if text_chars < MIN_CONTENT_CHARS {
        return Err(format!(
            "insufficient content ({} characters, need {})",
            text_chars, MIN_CONTENT_CHARS
        ));
    }

    Ok(ArticleText {
        html: paragraphs_to_html(&paragraphs),
        text_chars,
    })
}

/// Text of the most plausible article region of a document.
pub fn select_region_text(document: &Html) -> String {
    for selector in CANDIDATES.iter() {
        for element in document.select(selector) {
            let text = visible_text(element);
            if text.chars().count() > MIN_REGION_CHARS {
                return text;
            }
        }
    }

    let longest = BLOCKS
        .iter()
        .flat_map(|selector| document.select(selector))
        .map(visible_text)
        .filter(|text| text.chars().count() > MIN_REGION_CHARS)
        .max_by_key(|text| text.chars().count());
    if let Some(text) = longest {
        return text;
    }

    visible_text(document.root_element())
}

/// Flattened text of an element, skipping non-content descendants.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    flatten_whitespace(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text[..]),
            Node::Element(_) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if REMOVALS.iter().any(|sel| sel.matches(&child_ref)) {
                    continue;
                }
                let is_block = BLOCK_TAGS.contains(&child_ref.value().name());
                if is_block {
                    out.push(' ');
                }
                collect_text(child_ref, out);
                if is_block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn flatten_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Split text into sentence-sized fragments.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Regroup flat text into paragraphs of roughly [`PARAGRAPH_TARGET_CHARS`].
pub fn segment_paragraphs(text: &str) -> Vec<String> {
    let flat = flatten_whitespace(text);
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for fragment in split_sentences(&flat) {
        if fragment.chars().count() < MIN_FRAGMENT_CHARS {
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&fragment);

        // A break marker closes the paragraph it lands in
        let has_break = SECTION_BREAKS.iter().any(|m| fragment.contains(m));
        if has_break || current.chars().count() > PARAGRAPH_TARGET_CHARS {
            paragraphs.push(clean_paragraph(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        paragraphs.push(clean_paragraph(&current));
    }

    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

fn clean_paragraph(text: &str) -> String {
    let mut cleaned = text.to_string();
    for marker in SECTION_BREAKS {
        cleaned = cleaned.replace(marker, " ");
    }
    flatten_whitespace(&cleaned)
}

/// Render paragraphs as escaped `<p>` elements.
pub fn paragraphs_to_html(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", html_escape::encode_text(p)))
        .collect()
}
