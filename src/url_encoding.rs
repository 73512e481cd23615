use pct_str::{PctString, URIReserved, InvalidPctString, PctStr};

pub fn url_encode(s: &str) -> String {
    let p = PctString::encode(s.chars(), URIReserved);
    p.to_string()
}

// Own the message instead of carrying the borrowed
// InvalidPctString<&str>, so the error can outlive the request.
#[derive(Debug, thiserror::Error)]
#[error("url decoding error: {0}")]
pub struct UrlDecodingError(Box<String>);

impl From<InvalidPctString<&str>> for UrlDecodingError {
    fn from(e: InvalidPctString<&str>) -> Self {
        Self(Box::new(format!("{}", e)))
    }
}

pub fn url_decode(s: &str) -> Result<String, UrlDecodingError> {
    let p = PctStr::new(s)?;
    Ok(p.decode())
}

/// Decode `application/x-www-form-urlencoded` text, i.e. a query
/// string: '+' stands for a space. Keys without '=' get an empty
/// value.
pub fn parse_query(s: &str) -> Result<Vec<(String, String)>, UrlDecodingError> {
    let decode = |part: &str| url_decode(&part.replace('+', " "));
    let mut v = Vec::new();
    for partraw in s.split('&') {
        if ! partraw.is_empty() {
            if let Some((key, val)) = partraw.split_once('=') {
                v.push((decode(key)?, decode(val)?));
            } else {
                v.push((decode(partraw)?, "".into()));
            }
        }
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_query() -> Result<(), UrlDecodingError> {
        assert_eq!(parse_query("")?, vec![]);
        assert_eq!(parse_query("a=1&b=x+y%21&flag")?,
                   vec![("a".into(), "1".into()),
                        ("b".into(), "x y!".into()),
                        ("flag".into(), "".into())]);
        assert!(parse_query("a=%zz").is_err());
        assert_eq!(url_decode(&url_encode("a b/c"))?, "a b/c");
        Ok(())
    }
}
