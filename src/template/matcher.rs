//! Finding the extent of a block tag: its body, the optional `else`
//! split for `if`, and the position after the matching `end`.

use super::{split::split_tag_body,
            walker::{Delimiters, Walker, Segment}};

/// Result of matching a block opened by a tag ending at `body.0`.
/// All positions are absolute byte offsets into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMatch {
    /// The body; for `if` with an `else`, only the part before it.
    pub body: (usize, usize),
    /// The part between the `else` tag and the closing tag.
    pub else_body: Option<(usize, usize)>,
    /// Position just past the closing tag (or the limit when unclosed).
    pub end: usize,
    /// False if the limit was reached without finding the closing tag.
    pub closed: bool,
}

/// Whether `head` closes a block: the bare `end`, or `end<name>`
/// for a block tag `name`.
pub fn is_end_tag(head: &str, is_block: &dyn Fn(&str) -> bool) -> bool {
    head == "end"
        || head.strip_prefix("end")
               .map(|name| !name.is_empty() && is_block(name))
               .unwrap_or(false)
}

/// Scan `source[start..limit]` for the end of the block tag `name`
/// whose opening tag ends at `start`. Every block tag (as decided by
/// `is_block`) opens a nesting level; a bare `end` closes the
/// innermost one, `end<name>` only closes it if the names agree and
/// is skipped otherwise. An `else` is only recognized for `if` and
/// only at the outermost level.
pub fn match_block(
    source: &str,
    delimiters: &Delimiters,
    name: &str,
    start: usize,
    limit: usize,
    is_block: &dyn Fn(&str) -> bool,
) -> BlockMatch {
    let limit = limit.min(source.len());
    let mut open: Vec<&str> = vec![name];
    let mut else_at: Option<(usize, usize)> = None;
    for segment in Walker::new(source, delimiters, start, limit) {
        let span = match segment {
            Segment::Literal { .. } => continue,
            Segment::Unclosed { .. } => break,
            Segment::Tag(span) => span,
        };
        let body = span.body(source);
        let head = match split_tag_body(body).first() {
            Some(head) => *head,
            None => continue,
        };
        if is_end_tag(head, is_block) {
            let closes = match head.strip_prefix("end") {
                Some("") | None => true,
                Some(named) => open.last() == Some(&named),
            };
            if !closes {
                continue
            }
            open.pop();
            if open.is_empty() {
                let (body, else_body) = match else_at {
                    Some((else_open, else_after)) =>
                        ((start, else_open), Some((else_after, span.open))),
                    None =>
                        ((start, span.open), None),
                };
                return BlockMatch { body, else_body, end: span.after, closed: true }
            }
        } else if is_block(head) {
            open.push(head);
        } else if head == "else" && open.len() == 1 && name == "if" && else_at.is_none() {
            else_at = Some((span.open, span.after));
        }
    }
    BlockMatch {
        body: (start, limit),
        else_body: None,
        end: limit,
        closed: false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn is_block(name: &str) -> bool {
        matches!(name, "if" | "range" | "with" | "define" | "block")
    }

    /// Match the block opened by the first tag in `s`, returning the
    /// body text, the else text and the rest after the block.
    fn m(s: &str) -> (String, Option<String>, String, bool) {
        let d = Delimiters::default();
        let start = s.find("}}").unwrap() + 2;
        let name = s[2..].split_whitespace().next().unwrap();
        let r = match_block(s, &d, name, start, s.len(), &is_block);
        (s[r.body.0..r.body.1].to_string(),
         r.else_body.map(|(a, b)| s[a..b].to_string()),
         s[r.end..].to_string(),
         r.closed)
    }

    #[test]
    fn t_simple() {
        assert_eq!(m("{{if .a}}x{{end}}rest"),
                   ("x".into(), None, "rest".into(), true));
        assert_eq!(m("{{if .a}}x{{ endif }}rest"),
                   ("x".into(), None, "rest".into(), true));
        assert_eq!(m("{{range .a}}{{if .b}}x{{endif}}{{endrange}}rest"),
                   ("{{if .b}}x{{endif}}".into(), None, "rest".into(), true));
    }

    #[test]
    fn t_nested() {
        assert_eq!(m("{{if .a}}{{if .b}}1{{else}}2{{end}}{{else}}3{{end}}!"),
                   ("{{if .b}}1{{else}}2{{end}}".into(), Some("3".into()), "!".into(), true));
        assert_eq!(m("{{range .a}}{{with .b}}{{ . }}{{end}}{{end}}x"),
                   ("{{with .b}}{{ . }}{{end}}".into(), None, "x".into(), true));
        // else only counts for `if`
        assert_eq!(m("{{range .a}}a{{else}}b{{end}}"),
                   ("a{{else}}b".into(), None, "".into(), true));
        // an else nested in another block doesn't split the outer if
        assert_eq!(m("{{if .a}}{{with .b}}x{{else}}y{{end}}{{end}}"),
                   ("{{with .b}}x{{else}}y{{end}}".into(), None, "".into(), true));
        // balanced openings and closings in the body
        let (body, _, _, _) = m("{{define \"x\"}}{{if 1}}{{range .a}}{{end}}{{endif}}{{end}}");
        assert_eq!(body.matches("{{if").count() + body.matches("{{range").count(),
                   body.matches("{{end").count());
    }

    #[test]
    fn t_names_containing_else() {
        // a tag merely containing "else" doesn't split
        assert_eq!(m("{{if .a}}{{ .elsewhere }}{{end}}"),
                   ("{{ .elsewhere }}".into(), None, "".into(), true));
        // `endx` for unknown x is not an end tag
        assert_eq!(m("{{if .a}}{{ endless }}{{end}}"),
                   ("{{ endless }}".into(), None, "".into(), true));
    }

    #[test]
    fn t_unclosed() {
        assert_eq!(m("{{if .a}}abc{{if .b}}{{end}}"),
                   ("abc{{if .b}}{{end}}".into(), None, "".into(), false));
        // `endif` can't close the inner range, so the bare `end` does
        // and the if stays open
        assert_eq!(m("{{ if .a }}{{ range .xs }}x{{ endif }}{{ end }}"),
                   ("{{ range .xs }}x{{ endif }}{{ end }}".into(), None, "".into(), false));
        assert_eq!(m("{{if .a}}abc{{ oops"),
                   ("abc{{ oops".into(), None, "".into(), false));
    }
}
