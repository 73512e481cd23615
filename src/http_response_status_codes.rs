//! The HTTP response status codes this server sends.

// https://developer.mozilla.org/en-US/docs/Web/HTTP/Status

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpResponseStatusCode {
    OK200,
    MovedPermanently301,
    Found302,
    SeeOther303,
    NotModified304,
    TemporaryRedirect307,
    PermanentRedirect308,
    BadRequest400,
    Unauthorized401,
    Forbidden403,
    NotFound404,
    MethodNotAllowed405,
    InternalServerError500,
    NotImplemented501,
}

impl HttpResponseStatusCode {
    pub fn code(self) -> u16 {
        match self {
            Self::OK200 => 200,
            Self::MovedPermanently301 => 301,
            Self::Found302 => 302,
            Self::SeeOther303 => 303,
            Self::NotModified304 => 304,
            Self::TemporaryRedirect307 => 307,
            Self::PermanentRedirect308 => 308,
            Self::BadRequest400 => 400,
            Self::Unauthorized401 => 401,
            Self::Forbidden403 => 403,
            Self::NotFound404 => 404,
            Self::MethodNotAllowed405 => 405,
            Self::InternalServerError500 => 500,
            Self::NotImplemented501 => 501,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::OK200 => "OK",
            Self::MovedPermanently301 => "Moved Permanently",
            Self::Found302 => "Found",
            Self::SeeOther303 => "See Other",
            Self::NotModified304 => "Not Modified",
            Self::TemporaryRedirect307 => "Temporary Redirect",
            Self::PermanentRedirect308 => "Permanent Redirect",
            Self::BadRequest400 => "Bad Request",
            Self::Unauthorized401 => "Unauthorized",
            Self::Forbidden403 => "Forbidden",
            Self::NotFound404 => "Not Found",
            Self::MethodNotAllowed405 => "Method Not Allowed",
            Self::InternalServerError500 => "Internal Server Error",
            Self::NotImplemented501 => "Not Implemented",
        }
    }

    /// Explanation shown on error pages.
    pub fn desc(self) -> &'static str {
        match self {
            Self::OK200 => "The request succeeded.",
            Self::MovedPermanently301 | Self::PermanentRedirect308 =>
                "The resource has moved permanently.",
            Self::Found302 | Self::TemporaryRedirect307 =>
                "The resource is temporarily available elsewhere.",
            Self::SeeOther303 => "The result can be found elsewhere.",
            Self::NotModified304 => "The resource has not changed.",
            Self::BadRequest400 => "The request could not be understood.",
            Self::Unauthorized401 => "You need to log in to see this page.",
            Self::Forbidden403 => "You are not allowed to see this page.",
            Self::NotFound404 => "The requested page does not exist.",
            Self::MethodNotAllowed405 => "This page does not support the request method.",
            Self::InternalServerError500 =>
                "There was an error on our side. Please try again later.",
            Self::NotImplemented501 => "The request method is not supported.",
        }
    }

    pub fn is_redirect(self) -> bool {
        (300..400).contains(&self.code()) && self != Self::NotModified304
    }
}
