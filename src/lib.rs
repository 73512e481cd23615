pub mod warn;
pub mod boxed_error;
pub mod util;
pub mod str_util;
pub mod path;
pub mod easy_fs;
pub mod hash_util;
pub mod url_encoding;

pub mod template;
pub mod site;
pub mod access_control;

pub mod router;
pub mod hostrouter;
pub mod handler;
pub mod acontext;
pub mod aresponse;
pub mod webutils;
pub mod http_response_status_codes;
pub mod http_request_method;
pub mod apachelog;
pub mod server;
pub mod config;
