

// A path operation that doesn't actually work on Path, bummer. Only
// for strings.

pub fn _base_and_suffix<T: AsRef<[u8]> + ?Sized>(
    s: &T
) -> Option<(&[u8], &[u8])> {
    let bs: &[u8] = s.as_ref();
    let len = bs.len();
    for (i, c) in bs.iter().rev().enumerate() {
        match c {
            b'/' => return None,
            b'.' => return Some((
                &bs[..(len - i - 1)],
                &bs[(len - i)..]
            )),
            _  =>
                if ! c.is_ascii_alphanumeric() {
                    return None;
                }
        }
    }
    None
}

/// Split "foo/bar.md" into ("foo/bar", "md"). Only allows ASCII
/// alphanumeric characters in the suffix.
pub fn base_and_suffix(s: &str) -> Option<(&str, &str)> {
    let (base, suffix) = _base_and_suffix(s)?;
    // Splitting at an ASCII '.' always leaves valid UTF-8 on both sides
    Some((std::str::from_utf8(base).ok()?, std::str::from_utf8(suffix).ok()?))
}

/// Careful, this drops any empty segments, regardless whether at the
/// beginning, end or in the middle.
pub fn path_segments<'s>(s: &'s str) -> impl Iterator<Item = &'s str>
{
    s.split('/').filter(|s| !s.is_empty())
}

/// Resolves "." and ".." segments and drops empty ones. Returns None
/// if ".." would leave the root.
pub fn canonicalize_path<'s, S>(path: &'s [S]) -> Option<Vec<&'s str>>
where S: AsRef<str> + 's
{
    let mut out = Vec::new();
    for segment in path {
        let segment = segment.as_ref();
        match segment {
            "." => (),
            ".." =>
                if out.pop().is_none() {
                    return None
                },
            // Oh, don't forget this one (multiple slashes to one):
            "" => (),
            _ => out.push(segment)
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_base_and_suffix() {
        assert_eq!(base_and_suffix("foo"), None);
        assert_eq!(base_and_suffix("bar.md"), Some(("bar", "md")));
        assert_eq!(base_and_suffix("foo.md/bar"), None);
        assert_eq!(base_and_suffix("foo.md/bar.md"), Some(("foo.md/bar", "md")));
        assert_eq!(base_and_suffix("foo. md"), None);
    }

    #[test]
    fn t_canonicalize_path() {
        assert_eq!(canonicalize_path::<&str>(&[]), Some(vec![]));
        assert_eq!(canonicalize_path(&["a", "b"]), Some(vec!["a", "b"]));
        assert_eq!(canonicalize_path(&[".", "a", ".", "b", ".", ".."]),
                   Some(vec!["a"]));
        assert_eq!(canonicalize_path(&["a", "..", ".", ".."]),
                   None);
        assert_eq!(canonicalize_path(&["foo", "", ".", "", "", "a", ".", ""]),
                   Some(vec!["foo", "a"]));
    }
}
