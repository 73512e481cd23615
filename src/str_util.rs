/// Take `n` characters if available, fewer if reaching EOS before that
/// point. Returns true iff (at least) `n` characters were available.
pub fn str_take(s: &str, n: usize) -> (&str, bool) {
    let mut ci = 0;
    for (i, _) in s.char_indices() {
        if ci == n {
            return (&s[0..i], true)
        }
        ci += 1;
    }
    (s, ci == n)
}

#[test]
fn t_str_take() {
    assert_eq!(str_take("Hello", 0), ("", true));
    assert_eq!(str_take("Hällo", 2), ("Hä", true));
    assert_eq!(str_take("Hello", 5), ("Hello", true));
    assert_eq!(str_take("Hello", 6), ("Hello", false));
}

/// Uppercase the first character, lowercase the rest.
pub fn capitalize(s: &str) -> String {
    let mut cs = s.chars();
    match cs.next() {
        Some(c) => {
            let mut out: String = c.to_uppercase().collect();
            out.push_str(&cs.as_str().to_lowercase());
            out
        }
        None => String::new()
    }
}

#[test]
fn t_capitalize() {
    assert_eq!(capitalize(""), "");
    assert_eq!(capitalize("my GREAT title"), "My great title");
    assert_eq!(capitalize("ähm"), "Ähm");
}
