//! Content pages: front matter and Markdown.

use pulldown_cmark::{Parser, Options, html::push_html};
use serde_json::{Map, Value};

use crate::path::base_and_suffix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Html,
    Markdown,
}

impl PageFormat {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "html" | "htm" => Some(PageFormat::Html),
            "md" | "markdown" => Some(PageFormat::Markdown),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    /// Path below `content/`, with '/' separators, e.g. "blog/first.md"
    pub relpath: String,
    /// Automatic route, e.g. "/blog/first"
    pub url_path: String,
    pub format: PageFormat,
    pub title: Option<String>,
    /// Some("") means no layout at all
    pub layout: Option<String>,
    pub params: Map<String, Value>,
    /// Template source after the front matter
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrontMatterError {
    #[error("front matter is not closed with a '---' line")]
    Unclosed,
    #[error("front matter line {0} is not of the form `key: value`")]
    InvalidLine(usize),
}

fn front_matter_value(s: &str) -> Value {
    // Quoted strings, numbers, booleans and lists are JSON, the rest
    // is taken verbatim.
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(_)) | Err(_) => Value::String(s.to_string()),
        Ok(v) => v,
    }
}

/// Split off a leading front-matter block (`---` line, `key: value`
/// lines, `---` line). Text without one yields an empty map.
pub fn parse_front_matter(text: &str) -> Result<(Map<String, Value>, &str), FrontMatterError> {
    let mut map = Map::new();
    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => (),
        _ => return Ok((map, text))
    }
    let mut pos = text.find('\n').map(|i| i + 1).unwrap_or(text.len());
    for (i, line) in lines.enumerate() {
        pos += line.len();
        let line = line.trim_end();
        if line == "---" {
            return Ok((map, &text[pos..]))
        }
        if line.trim().is_empty() || line.starts_with('#') {
            continue
        }
        let (key, value) = line.split_once(':').ok_or(
            FrontMatterError::InvalidLine(i + 2))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(FrontMatterError::InvalidLine(i + 2))
        }
        map.insert(key.to_string(), front_matter_value(value.trim()));
    }
    Err(FrontMatterError::Unclosed)
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    push_html(&mut html, parser);
    html
}

/// The URL path of a content file: "index.md" -> "/", "a/b.html" ->
/// "/a/b", "a/index.md" -> "/a".
pub fn url_path_for_content(relpath: &str) -> Option<String> {
    let (base, _suffix) = base_and_suffix(relpath)?;
    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    if segments.last() == Some(&"index") {
        segments.pop();
    }
    Some(format!("/{}", segments.join("/")))
}

impl Page {
    /// `relpath` relative to the content directory, '/'-separated.
    /// Returns None for files that aren't pages.
    pub fn parse(relpath: &str, text: &str) -> Result<Option<Page>, FrontMatterError> {
        let format = match base_and_suffix(relpath).and_then(|(_, s)| PageFormat::from_suffix(s)) {
            Some(f) => f,
            None => return Ok(None)
        };
        let url_path = match url_path_for_content(relpath) {
            Some(p) => p,
            None => return Ok(None)
        };
        let (mut params, source) = parse_front_matter(text)?;
        let title = match params.remove("title") {
            Some(Value::String(s)) => Some(s),
            Some(v) => Some(v.to_string()),
            None => None
        };
        let layout = match params.remove("layout") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Bool(false)) | Some(Value::Null) => Some(String::new()),
            Some(v) => Some(v.to_string()),
            None => None
        };
        Ok(Some(Page {
            relpath: relpath.to_string(),
            url_path,
            format,
            title,
            layout,
            params,
            source: source.to_string(),
        }))
    }
}
