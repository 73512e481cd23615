//! Scanning template source for tag delimiters.

use kstring::KString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub open: KString,
    pub close: KString,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            open: KString::from_static("{{"),
            close: KString::from_static("}}"),
        }
    }
}

/// Positions of a tag in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    /// Index of the opening delimiter.
    pub open: usize,
    /// Index just past the opening delimiter.
    pub body_start: usize,
    /// Index of the closing delimiter.
    pub body_end: usize,
    /// Index just past the closing delimiter.
    pub after: usize,
}

impl TagSpan {
    /// The whitespace-trimmed tag body.
    pub fn body<'s>(&self, source: &'s str) -> &'s str {
        source[self.body_start..self.body_end].trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Text `[start, end)` to be copied verbatim.
    Literal { start: usize, end: usize },
    Tag(TagSpan),
    /// An opening delimiter at `open` with no closing delimiter
    /// before the end of the range.
    Unclosed { open: usize },
}

/// Splits `source[pos..limit]` into literal and tag segments. No
/// escaping: a delimiter inside quotes is still a delimiter.
pub struct Walker<'s, 'd> {
    source: &'s str,
    delimiters: &'d Delimiters,
    pos: usize,
    limit: usize,
}

impl<'s, 'd> Walker<'s, 'd> {
    pub fn new(source: &'s str, delimiters: &'d Delimiters, pos: usize, limit: usize) -> Self {
        Walker {
            source,
            delimiters,
            pos,
            limit: limit.min(source.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Continue scanning at `pos` (used after a tag handler consumed
    /// a block). Never moves backwards.
    pub fn seek(&mut self, pos: usize) {
        if pos > self.pos {
            self.pos = pos.min(self.limit);
        }
    }
}

impl<'s, 'd> Iterator for Walker<'s, 'd> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.pos >= self.limit {
            return None
        }
        let open = &*self.delimiters.open;
        let close = &*self.delimiters.close;
        let rest = &self.source[self.pos..self.limit];
        match rest.find(open) {
            None => {
                let seg = Segment::Literal { start: self.pos, end: self.limit };
                self.pos = self.limit;
                Some(seg)
            }
            Some(0) => {
                let body_start = self.pos + open.len();
                match self.source[body_start..self.limit].find(close) {
                    Some(i) => {
                        let span = TagSpan {
                            open: self.pos,
                            body_start,
                            body_end: body_start + i,
                            after: body_start + i + close.len(),
                        };
                        self.pos = span.after;
                        Some(Segment::Tag(span))
                    }
                    None => {
                        let seg = Segment::Unclosed { open: self.pos };
                        self.pos = self.limit;
                        Some(seg)
                    }
                }
            }
            Some(i) => {
                let seg = Segment::Literal { start: self.pos, end: self.pos + i };
                self.pos += i;
                Some(seg)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn walk(s: &str) -> Vec<Segment> {
        let d = Delimiters::default();
        Walker::new(s, &d, 0, s.len()).collect()
    }

    #[test]
    fn t_walk() {
        assert_eq!(walk(""), vec![]);
        assert_eq!(walk("abc"), vec![Segment::Literal { start: 0, end: 3 }]);
        let segs = walk("a{{ x }}b");
        assert_eq!(segs, vec![
            Segment::Literal { start: 0, end: 1 },
            Segment::Tag(TagSpan { open: 1, body_start: 3, body_end: 6, after: 8 }),
            Segment::Literal { start: 8, end: 9 },
        ]);
        if let Segment::Tag(span) = segs[1] {
            assert_eq!(span.body("a{{ x }}b"), "x");
        }
        assert_eq!(walk("a{{ x"), vec![
            Segment::Literal { start: 0, end: 1 },
            Segment::Unclosed { open: 1 },
        ]);
        // no escaping inside quotes
        assert_eq!(walk("{{ \"}}\" }}").len(), 2);
    }

    #[test]
    fn t_custom_delimiters() {
        let d = Delimiters { open: "<%".into(), close: "%>".into() };
        let s = "{{x}}<% y %>";
        let segs: Vec<_> = Walker::new(s, &d, 0, s.len()).collect();
        assert_eq!(segs, vec![
            Segment::Literal { start: 0, end: 5 },
            Segment::Tag(TagSpan { open: 5, body_start: 7, body_end: 10, after: 12 }),
        ]);
    }

    #[test]
    fn t_limit() {
        let d = Delimiters::default();
        let s = "ab{{ x }}cd";
        // the closing delimiter lies beyond the limit
        let segs: Vec<_> = Walker::new(s, &d, 1, 7).collect();
        assert_eq!(segs, vec![
            Segment::Literal { start: 1, end: 2 },
            Segment::Unclosed { open: 2 },
        ]);
    }
}
