//! Turning Matrix HTML message bodies into display text.

use crate::error::DisplayError;

/// Host-provided HTML handling, used when formatting HTML message bodies.
///
/// Hosts typically implement this to resolve embedded `mxc://` images
/// and to handle tags their text renderer supports natively.
pub trait HtmlToolbox {
    /// Pre-processes the given HTML before it is rendered.
    fn convert(&self, html: &str) -> String {
        html.to_owned()
    }

    /// Renders the given (already converted) HTML into display text.
    fn render_text(&self, html: &str) -> Result<String, DisplayError> {
        Ok(to_plain_text(html))
    }
}

/// Elements whose closing tag ends a line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
    "ul", "ol", "li", "tr", "table", "hr", "details", "summary",
];

/// Elements whose contents are never displayed.
const HIDDEN_TAGS: &[&str] = &["script", "style", "head", "title"];

/// A best-effort conversion of HTML into plain text.
///
/// Tags are dropped, line-ending elements become newlines,
/// list items get a bullet, images are replaced by their `alt` text,
/// and character entities are unescaped.
/// Whitespace is collapsed the way a browser would, except inside `<pre>`.
pub fn to_plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut pre_depth = 0usize;
    let mut hidden: Option<String> = None;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            if hidden.is_none() {
                push_text(&mut out, rest, pre_depth > 0);
            }
            break;
        };
        if hidden.is_none() {
            push_text(&mut out, &rest[..lt], pre_depth > 0);
        }
        let after_lt = &rest[lt..];
        // A `<` that can't begin a tag, as in `1 < 2`, is just text.
        if !after_lt[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!') {
            if hidden.is_none() {
                push_text(&mut out, "<", pre_depth > 0);
            }
            rest = &after_lt[1..];
            continue;
        }
        let Some(gt) = after_lt.find('>') else {
            // An unterminated tag is just text.
            if hidden.is_none() {
                push_text(&mut out, after_lt, pre_depth > 0);
            }
            break;
        };
        let tag = Tag::parse(&after_lt[1..gt]);
        rest = &after_lt[gt + 1..];

        if let Some(hidden_name) = hidden.as_deref() {
            if tag.closing && tag.name == hidden_name {
                hidden = None;
            }
            continue;
        }
        if HIDDEN_TAGS.contains(&tag.name.as_str()) && !tag.closing && !tag.self_closing {
            hidden = Some(tag.name);
            continue;
        }

        match (tag.name.as_str(), tag.closing) {
            ("br", _) => out.push('\n'),
            ("pre", false) => {
                end_line(&mut out);
                pre_depth += 1;
            }
            ("pre", true) => {
                pre_depth = pre_depth.saturating_sub(1);
                end_line(&mut out);
            }
            ("li", false) => {
                end_line(&mut out);
                out.push_str("\u{2022} ");
            }
            ("img", false) => {
                if let Some(alt) = tag.alt.as_deref().filter(|a| !a.is_empty()) {
                    push_text(&mut out, alt, false);
                }
            }
            ("hr", _) => end_line(&mut out),
            (name, false) if BLOCK_TAGS.contains(&name) => end_line(&mut out),
            (name, true) if BLOCK_TAGS.contains(&name) => {
                end_line(&mut out);
                if matches!(name, "p" | "blockquote") {
                    out.push('\n');
                }
            }
            _ => { }
        }
    }
    out
}

/// Appends the given raw text, unescaping entities and collapsing whitespace.
fn push_text(out: &mut String, raw: &str, preformatted: bool) {
    if raw.is_empty() {
        return;
    }
    let text = htmlize::unescape(raw);
    if preformatted {
        out.push_str(&text);
        return;
    }
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            let at_line_start = out.is_empty() || out.ends_with('\n');
            if !at_line_start && !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

/// Ensures the output ends with a newline, unless it is empty.
fn end_line(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    alt: Option<String>,
}

impl Tag {
    /// Parses the inside of a tag, i.e., everything between `<` and `>`.
    fn parse(inner: &str) -> Self {
        let inner = inner.trim();
        let (closing, inner) = match inner.strip_prefix('/') {
            Some(stripped) => (true, stripped.trim_start()),
            None => (false, inner),
        };
        let self_closing = inner.ends_with('/');
        let name: String = inner
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '/')
            .flat_map(char::to_lowercase)
            .collect();
        let alt = (name == "img").then(|| attribute(inner, "alt")).flatten();
        Self { name, closing, self_closing, alt }
    }
}

/// Extracts the value of the given attribute from the inside of a tag.
fn attribute(inner: &str, attr: &str) -> Option<String> {
    let lower = inner.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(pos) = lower[search_from..].find(attr) {
        let start = search_from + pos;
        search_from = start + attr.len();
        let preceded_by_space = lower[..start].ends_with(|c: char| c.is_whitespace());
        let after = lower[search_from..].trim_start();
        if !preceded_by_space || !after.starts_with('=') {
            continue;
        }
        let value_offset = inner.len() - after.len() + 1;
        let value = inner[value_offset..].trim_start();
        let quoted = value.chars().next().filter(|c| *c == '"' || *c == '\'');
        let value = match quoted {
            Some(q) => value[1..].split(q).next().unwrap_or_default(),
            None => value.split(|c: char| c.is_whitespace() || c == '/').next().unwrap_or_default(),
        };
        return Some(htmlize::unescape(value).into_owned());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_inline_tags_and_unescapes() {
        assert_eq!(to_plain_text("<b>bold</b> &amp; <i>italic</i>"), "bold & italic");
        assert_eq!(to_plain_text("a &lt;tag&gt; here"), "a <tag> here");
    }

    #[test]
    fn lone_angle_brackets_are_text() {
        assert_eq!(to_plain_text("1 < 2 and 3 > 2"), "1 < 2 and 3 > 2");
        assert_eq!(to_plain_text("<b>a</b> <= b"), "a <= b");
    }

    #[test]
    fn line_breaks_and_paragraphs() {
        assert_eq!(to_plain_text("one<br>two<br/>three"), "one\ntwo\nthree");
        assert_eq!(to_plain_text("<p>first</p><p>second</p>"), "first\n\nsecond\n\n");
    }

    #[test]
    fn blockquote_leaves_trailing_newlines() {
        assert_eq!(to_plain_text("<blockquote>quoted</blockquote>"), "quoted\n\n");
    }

    #[test]
    fn list_items_get_bullets() {
        assert_eq!(
            to_plain_text("<ul><li>one</li><li>two</li></ul>"),
            "\u{2022} one\n\u{2022} two\n",
        );
    }

    #[test]
    fn collapses_whitespace_outside_pre() {
        assert_eq!(to_plain_text("  lots   of\n\tspace "), "lots of space ");
        assert_eq!(to_plain_text("<pre>keep  this\n  as is</pre>"), "keep  this\n  as is\n");
    }

    #[test]
    fn images_use_alt_text() {
        assert_eq!(to_plain_text(r#"look <img src="mxc://x/y" alt="a cat"> here"#), "look a cat here");
        assert_eq!(to_plain_text(r#"<img src="mxc://x/y"/>"#), "");
    }

    #[test]
    fn hidden_elements_are_dropped() {
        assert_eq!(to_plain_text("a<style>p { color: red }</style>b"), "ab");
    }

    #[test]
    fn unterminated_tag_is_text() {
        assert_eq!(to_plain_text("1 < 2"), "1 < 2");
    }

    #[test]
    fn default_toolbox_uses_plain_text_conversion() {
        struct Passthrough;
        impl HtmlToolbox for Passthrough { }
        let toolbox = Passthrough;
        let converted = toolbox.convert("<b>x</b>");
        assert_eq!(converted, "<b>x</b>");
        assert_eq!(toolbox.render_text(&converted).unwrap(), "x");
    }
}
