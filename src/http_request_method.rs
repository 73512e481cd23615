//! Pattern matching and processing help for HTTP request methods.

// https://developer.mozilla.org/en-US/docs/Web/HTTP/Methods

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

/// The methods handlers get to see; everything else is answered
/// with 501 before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethodSimple {
    GET,
    HEAD,
    POST,
}

impl HttpRequestMethodSimple {
    pub fn is_post(self) -> bool {
        match self {
            HttpRequestMethodSimple::GET => false,
            HttpRequestMethodSimple::HEAD => false,
            HttpRequestMethodSimple::POST => true
        }
    }
}

impl HttpRequestMethod {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Self::GET),
            "HEAD" => Ok(Self::HEAD),
            "POST" => Ok(Self::POST),
            "PUT" => Ok(Self::PUT),
            "PATCH" => Ok(Self::PATCH),
            "DELETE" => Ok(Self::DELETE),
            "OPTIONS" => Ok(Self::OPTIONS),
            "CONNECT" => Ok(Self::CONNECT),
            "TRACE" => Ok(Self::TRACE),
            _ => bail!("invalid http request method {s:?}")
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GET => "GET",
            Self::HEAD => "HEAD",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::PATCH => "PATCH",
            Self::DELETE => "DELETE",
            Self::OPTIONS => "OPTIONS",
            Self::CONNECT => "CONNECT",
            Self::TRACE => "TRACE",
        }
    }

    pub fn to_simple(self) -> Option<HttpRequestMethodSimple> {
        match self {
            Self::GET => Some(HttpRequestMethodSimple::GET),
            Self::HEAD => Some(HttpRequestMethodSimple::HEAD),
            Self::POST => Some(HttpRequestMethodSimple::POST),
            _ => None
        }
    }

    pub fn is_post(self) -> bool {
        self == Self::POST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_from_str() -> Result<()> {
        assert_eq!(HttpRequestMethod::from_str("POST")?, HttpRequestMethod::POST);
        assert_eq!(HttpRequestMethod::from_str("PATCH")?.as_str(), "PATCH");
        assert!(HttpRequestMethod::from_str("get").is_err());
        assert_eq!(HttpRequestMethod::HEAD.to_simple(), Some(HttpRequestMethodSimple::HEAD));
        assert_eq!(HttpRequestMethod::DELETE.to_simple(), None);
        Ok(())
    }
}
