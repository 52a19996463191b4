//! Markup-to-text normalizer.
//!
//! Turns raw document markup into the plain text that gets fingerprinted
//! and indexed. Parsing is done by `scraper` (html5ever), which recovers
//! from any malformed input, so normalization never fails.
//!
//! # Algorithm
//!
//! 1. Parse the markup into a DOM.
//! 2. Walk the tree in document order with an explicit stack.
//! 3. Skip the whole subtree of non-content elements (`script`, `style`,
//!    `nav`, `header`, `footer`, ...).
//! 4. Block-level elements open and close a segment; text inside inline
//!    elements is appended verbatim to the current segment.
//! 5. Collapse whitespace inside each segment, drop empty segments, and
//!    join the rest with a single space.
//!
//! # Example
//!
//! ```rust
//! use crosslink_core::normalize::normalize;
//!
//! assert_eq!(normalize("<h1>  Hello </h1><p>World.  </p>"), "Hello World.");
//! ```

use std::borrow::Cow;

use scraper::{Html, Node, Selector};

/// Elements removed together with all their descendants.
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "head", "nav", "header", "footer",
    "aside",
];

/// Elements that start a new text segment.
const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "body",
    "br",
    "dd",
    "details",
    "dialog",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "html",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Result of normalizing raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    /// True when the input was not valid UTF-8 and replacement characters
    /// were substituted before parsing.
    pub lossy: bool,
}

/// Extract normalized plain text from markup.
///
/// Pure and infallible: malformed markup yields whatever text the parser
/// could recover.
pub fn normalize(markup: &str) -> String {
    let document = Html::parse_document(markup);

    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    // (node, closing): closing entries mark the end of a block element.
    let mut stack = vec![(document.tree.root(), false)];

    while let Some((node, closing)) = stack.pop() {
        if closing {
            flush_segment(&mut current, &mut segments);
            continue;
        }
        match node.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(element) => {
                let name = element.name();
                if STRIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if BLOCK_ELEMENTS.contains(&name) {
                    flush_segment(&mut current, &mut segments);
                    stack.push((node, true));
                }
                let children: Vec<_> = node.children().collect();
                for child in children.into_iter().rev() {
                    stack.push((child, false));
                }
            }
            Node::Document | Node::Fragment => {
                let children: Vec<_> = node.children().collect();
                for child in children.into_iter().rev() {
                    stack.push((child, false));
                }
            }
            _ => {}
        }
    }
    flush_segment(&mut current, &mut segments);

    segments.join(" ")
}

/// Decode bytes (lossily) and normalize them.
pub fn normalize_bytes(bytes: &[u8]) -> Normalized {
    let decoded = String::from_utf8_lossy(bytes);
    let lossy = matches!(decoded, Cow::Owned(_));
    Normalized {
        text: normalize(&decoded),
        lossy,
    }
}

/// Best-effort document title: `<title>`, then the first `<h1>`.
pub fn extract_title(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    ["title", "h1"].iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        let element = document.select(&selector).next()?;
        let title = collapse_whitespace(&element.text().collect::<String>());
        if title.is_empty() {
            None
        } else {
            Some(title)
        }
    })
}

fn flush_segment(current: &mut String, segments: &mut Vec<String>) {
    let collapsed = collapse_whitespace(current);
    if !collapsed.is_empty() {
        segments.push(collapsed);
    }
    current.clear();
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_paragraph_join() {
        assert_eq!(
            normalize("<h1>  Hello </h1><p>World.  </p>"),
            "Hello World."
        );
    }

    #[test]
    fn test_strips_script_style_footer() {
        let html = r#"
            <html><head><style>.x { color: red }</style></head>
            <body>
              <nav>Home | About</nav>
              <p>Visible text.</p>
              <script>var secret = "hidden";</script>
              <footer>Copyright notice</footer>
            </body></html>"#;
        let text = normalize(html);
        assert_eq!(text, "Visible text.");
        assert!(!text.contains("secret"));
        assert!(!text.contains("color"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Home"));
    }

    #[test]
    fn test_inline_punctuation_preserved() {
        assert_eq!(
            normalize("<p>Use <code>cargo</code>, then <b>run</b>!</p>"),
            "Use cargo, then run!"
        );
    }

    #[test]
    fn test_nested_subtree_removed() {
        let html = "<div><header><h1>Site</h1><p>tagline</p></header><p>Body</p></div>";
        assert_eq!(normalize(html), "Body");
    }

    #[test]
    fn test_malformed_markup_degrades() {
        let text = normalize("<div><p>Unclosed <b>bold <i>text</div><p>next");
        assert!(text.contains("Unclosed bold text"));
        assert!(text.ends_with("next"));
    }

    #[test]
    fn test_plain_text_input() {
        assert_eq!(normalize("  just   some\n text "), "just some text");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_bytes_flags_invalid_utf8() {
        let out = normalize_bytes(b"<p>ok \xff</p>");
        assert!(out.lossy);
        assert!(out.text.starts_with("ok"));

        let clean = normalize_bytes(b"<p>ok</p>");
        assert!(!clean.lossy);
        assert_eq!(clean.text, "ok");
    }

    #[test]
    fn test_extract_title_prefers_title_tag() {
        let html = "<html><head><title> Guide </title></head><body><h1>Intro</h1></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Guide"));
        assert_eq!(extract_title("<h1>Only  heading</h1>").as_deref(), Some("Only heading"));
        assert_eq!(extract_title("<p>none</p>"), None);
    }
}
