use std::borrow::Cow;

use rouille::{Response, ResponseBody};

use crate::acontext::host_without_port;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::template::sanitize::escape_html;


pub fn errorpage_from_status(status: HttpResponseStatusCode) -> Response {
    let title = status.title();
    let explanation = escape_html(status.desc());
    let resp = format!("<html><head><title>{title}</title></head><body><h1>{title}</h1>\
                        <p>{explanation}</p></body></html>\n");
    htmlresponse(status, resp)
}

pub fn htmlresponse(status: HttpResponseStatusCode, html: String) -> Response {
    Response {
        status_code: status.code(),
        headers: vec![(Cow::from("Content-type"),
                       Cow::from("text/html; charset=utf-8"))],
        data: ResponseBody::from_string(html),
        upgrade: None,
    }
}

/// Only allow local targets (`/...` but not `//host...`), to
/// avoid redirecting visitors to other sites.
pub fn local_redirect_target(target: Option<&str>) -> &str {
    match target {
        Some(t) if t.starts_with('/') && ! t.starts_with("//") => t,
        _ => "/"
    }
}

/// The path (and query) part of a `Referer` header value if it
/// points to `host` (ports are ignored).
pub fn referer_path<'s>(referer: &'s str, host: &str) -> Option<&'s str> {
    let rest = referer.strip_prefix("https://")
        .or_else(|| referer.strip_prefix("http://"))?;
    let (refhost, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if host_without_port(refhost) == host_without_port(host) {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_local_redirect_target() {
        assert_eq!(local_redirect_target(Some("/a/b?x=1")), "/a/b?x=1");
        assert_eq!(local_redirect_target(Some("//evil.example/")), "/");
        assert_eq!(local_redirect_target(Some("https://evil.example/")), "/");
        assert_eq!(local_redirect_target(None), "/");
    }

    #[test]
    fn t_referer_path() {
        assert_eq!(referer_path("https://Example.com/contact?x", "example.com"),
                   Some("/contact?x"));
        assert_eq!(referer_path("http://example.com", "example.com"), Some("/"));
        assert_eq!(referer_path("https://other.com/contact", "example.com"), None);
        assert_eq!(referer_path("ftp://example.com/", "example.com"), None);
        assert_eq!(referer_path("http://localhost:3000/a", "localhost"), Some("/a"));
    }

    #[test]
    fn t_errorpage() {
        let r = errorpage_from_status(HttpResponseStatusCode::NotFound404);
        assert_eq!(r.status_code, 404);
    }
}
