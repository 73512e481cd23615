//! Default sanitizer for interpolated values: keeps a safelist of
//! elements and attributes suitable for user supplied content,
//! escapes everything else as text.

use html5gum::{Token, HtmlString};

const ALLOWED_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "dd", "del", "dl", "dt",
    "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "img", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "s",
    "small", "span", "strong", "sub", "sup", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "u", "ul",
];

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img"];

/// Elements dropped together with their content.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template",
    "textarea", "title",
];

const GLOBAL_ATTRIBUTES: &[&str] = &["lang", "title"];

fn allowed_attribute(element: &str, attribute: &str) -> bool {
    GLOBAL_ATTRIBUTES.contains(&attribute)
        || match element {
            "a" => matches!(attribute, "href"),
            "img" => matches!(attribute, "src" | "alt" | "width" | "height"),
            "blockquote" | "q" | "del" | "ins" => matches!(attribute, "cite"),
            "td" | "th" => matches!(attribute, "colspan" | "rowspan"),
            "ol" => matches!(attribute, "start"),
            _ => false
        }
}

fn is_url_attribute(attribute: &str) -> bool {
    matches!(attribute, "href" | "src" | "cite")
}

/// Relative URLs and http(s) or mailto URLs are accepted.
fn safe_url(url: &str) -> bool {
    // browsers ignore whitespace and control characters in schemes
    let cleaned: String = url.chars()
        .filter(|c| !(c.is_whitespace() || c.is_control()))
        .collect();
    let scheme_end = cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(i) if cleaned[i..].starts_with(':') => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true
    }
}

/// Append `s` with `&<>"'` escaped.
pub fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c)
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    push_escaped(&mut out, s);
    out
}

fn lossy(s: &HtmlString) -> std::borrow::Cow<str> {
    String::from_utf8_lossy(&**s)
}

fn lookup(list: &[&'static str], name: &str) -> Option<&'static str> {
    list.iter().copied().find(|n| n.eq_ignore_ascii_case(name))
}

/// Sanitize an HTML fragment. Tags are balanced: unclosed allowed
/// elements are closed at the end, stray end tags are dropped.
pub fn sanitize_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open: Vec<&'static str> = Vec::new();
    // element whose content is being dropped, and its nesting count
    let mut dropping: Option<(&'static str, usize)> = None;

    for token in html5gum::Tokenizer::new(input).infallible() {
        if let Some((name, count)) = dropping {
            let count = match &token {
                Token::StartTag(tag) if lossy(&tag.name).eq_ignore_ascii_case(name) =>
                    count + 1,
                Token::EndTag(tag) if lossy(&tag.name).eq_ignore_ascii_case(name) =>
                    count - 1,
                _ => count
            };
            dropping = if count == 0 { None } else { Some((name, count)) };
            continue;
        }
        match token {
            Token::StartTag(tag) => {
                let tagname = lossy(&tag.name);
                if let Some(name) = lookup(DROPPED_WITH_CONTENT, &tagname) {
                    if !tag.self_closing {
                        dropping = Some((name, 1));
                    }
                    continue;
                }
                let name = match lookup(ALLOWED_ELEMENTS, &tagname) {
                    Some(name) => name,
                    None => continue,
                };
                let mut attributes: Vec<(String, String)> = tag.attributes.iter()
                    .map(|(k, v)| (lossy(k).to_ascii_lowercase(), lossy(v).into_owned()))
                    .filter(|(k, v)| allowed_attribute(name, k)
                            && (!is_url_attribute(k) || safe_url(v)))
                    .collect();
                if name == "a" {
                    attributes.push(("rel".into(), "noopener noreferrer".into()));
                }
                attributes.sort();
                out.push('<');
                out.push_str(name);
                for (k, v) in &attributes {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    push_escaped(&mut out, v);
                    out.push('"');
                }
                out.push('>');
                if !VOID_ELEMENTS.contains(&name) {
                    open.push(name);
                }
            }
            Token::EndTag(tag) => {
                let tagname = lossy(&tag.name);
                if let Some(i) = open.iter().rposition(|n| n.eq_ignore_ascii_case(&tagname)) {
                    for name in open.drain(i..).rev() {
                        out.push_str("</");
                        out.push_str(name);
                        out.push('>');
                    }
                }
            }
            Token::String(s) => push_escaped(&mut out, &lossy(&s)),
            _ => ()
        }
    }
    for name in open.into_iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_passes_safe_markup() {
        assert_eq!(sanitize_html("Hello World"), "Hello World");
        assert_eq!(sanitize_html("<b>bold</b> and <em>em</em>"),
                   "<b>bold</b> and <em>em</em>");
        assert_eq!(sanitize_html("line<br>break"), "line<br>break");
        assert_eq!(sanitize_html("<a href=\"/p\">x</a>"),
                   "<a href=\"/p\" rel=\"noopener noreferrer\">x</a>");
    }

    #[test]
    fn t_escapes_text() {
        assert_eq!(sanitize_html("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(sanitize_html("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(escape_html("<x y='1'>"), "&lt;x y=&#39;1&#39;&gt;");
    }

    #[test]
    fn t_drops_unsafe_markup() {
        assert_eq!(sanitize_html("<script>alert(1)</script>x"), "x");
        assert_eq!(sanitize_html("<style>p{}</style><p>x</p>"), "<p>x</p>");
        assert_eq!(sanitize_html("<a href=\"javascript:alert(1)\" onclick=\"x\">y</a>"),
                   "<a rel=\"noopener noreferrer\">y</a>");
        assert_eq!(sanitize_html("<img src=\"java\tscript:x\" alt=\"a\">"),
                   "<img alt=\"a\">");
        assert_eq!(sanitize_html("<div class=\"c\">text</div>"), "text");
    }

    #[test]
    fn t_balances_tags() {
        assert_eq!(sanitize_html("<div><p>x</div>"), "<p>x</p>");
        assert_eq!(sanitize_html("<b><i>x</b>y"), "<b><i>x</i></b>y");
        assert_eq!(sanitize_html("x</p>"), "x");
    }

    #[test]
    fn t_safe_url() {
        assert!(safe_url("https://example.com/"));
        assert!(safe_url("mailto:a@b.c"));
        assert!(safe_url("/rel/path?x=a:b"));
        assert!(safe_url("page#frag:x"));
        assert!(!safe_url("JavaScript:alert(1)"));
        assert!(!safe_url(" data:text/html,x"));
    }
}
