use std::fs::File;
use std::io::ErrorKind;
use std::time::{Duration, SystemTime, UNIX_EPOCH, Instant};
use std::{fmt::Debug, path::PathBuf, borrow::Cow};

use anyhow::{Result, Context, anyhow};
use httpdate::{fmt_http_date, parse_http_date};
use kstring::KString;
use rouille::{Response, extension_to_mime, ResponseBody, post_input,
              input::post::raw_urlencoded_post_input};
use serde_json::{Map, Value};

use crate::access_control::{CheckAccessErrorKind, trimcheck::trimcheck_formname};
use crate::acontext::AContext;
use crate::aresponse::{AResponse, ToAResponse};
use crate::http_request_method::HttpRequestMethodSimple;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::path::canonicalize_path;
use crate::site::Site;
use crate::url_encoding::parse_query;
use crate::webutils::{htmlresponse, errorpage_from_status, local_redirect_target, referer_path};
use crate::{or_return_none, warn, warn_thread};

// Responses to login attempts are sent no earlier than this after
// the request came in, whether successful or not.
const LOGIN_RESPONSE_TIME: Duration = Duration::from_millis(1000);

// `mtime > modsince` is ~always true since mtime has nanoseconds and
// modsince doesn't. Thus only report newer if at least a second
// newer.
fn file_is_newer_than_snapshot_time(mtime: SystemTime, modsince: SystemTime) -> bool {
    match mtime.duration_since(modsince) {
        // older than snapshot time: client is cheating, or the file
        // has been restored to an older version
        Err(_e) => false,
        Ok(secsnewer) => secsnewer >= Duration::from_secs(1)
    }
}

macro_rules! cow {
    ($a:expr, $b:expr) => {
        (Cow::from($a), Cow::from($b))
    }
}


pub trait Handler: Debug + Send + Sync {
    /// Returning Ok(None) means, the handler is refusing to handle
    /// the request. It is to be handled as 404 not found by the
    /// caller. Err means, the handler has accepted to handle the
    /// request but failed to; this will be handled as internal server
    /// error. `pathrest` are the path segments after the route's
    /// prefix, empty for exact routes.
    fn call(
        &self,
        context: &AContext,
        site: &Site,
        method: HttpRequestMethodSimple,
        pathrest: &[&str])
        -> Result<Option<AResponse>>;
}

fn redirect_303(target: &str) -> AResponse {
    Response::redirect_303(target.to_string()).into()
}

/// Where to send the visitor after a form post: back to the page
/// they came from if it is on this site, else `/`.
fn back_target(context: &AContext) -> String {
    let host = context.host_or_listen_addr();
    let path = context.referer().and_then(|r| referer_path(r, &host));
    local_redirect_target(path).to_string()
}

// ------------------------------------------------------------------
/// Render a page of the site.
#[derive(Debug)]
pub struct PageHandler {
    /// Path below `content/`
    page: KString,
    /// Overrides the page's layout
    layout: Option<KString>,
}

impl PageHandler {
    pub fn new(page: &str, layout: Option<&str>) -> Self {
        PageHandler {
            page: KString::from_ref(page),
            layout: layout.map(KString::from_ref),
        }
    }
}

impl Handler for PageHandler {
    fn call(
        &self,
        context: &AContext,
        site: &Site,
        _method: HttpRequestMethodSimple,
        pathrest: &[&str])
        -> Result<Option<AResponse>>
    {
        if ! pathrest.is_empty() {
            return Ok(None)
        }
        let page = site.page(&self.page).ok_or_else(
            || anyhow!("site {:?} has no page {:?}", site.name, self.page))?;
        let user = match context.user(&site.databases) {
            Ok(user) => user,
            Err(e) => {
                warn!("site {:?}: looking up user: {e:#}", site.name);
                None
            }
        };
        let query = match parse_query(context.query_string()) {
            Ok(query) => query,
            Err(e) => {
                warn!("ignoring query string: {e}");
                Vec::new()
            }
        };
        let path = context.path();
        let local = Site::request_data(user.as_ref(), &path, &query,
                                       &context.host_or_listen_addr());
        let rendered = site.render_page(page, self.layout.as_deref(), local)?;
        if let Err(e) = site.databases.record_page_view(&path) {
            warn!("site {:?}: recording page view: {e:#}", site.name);
        }
        Ok(Some(htmlresponse(HttpResponseStatusCode::OK200, rendered.output).into()))
    }
}

// ------------------------------------------------------------------
/// Serve files from the local file system
#[derive(Debug)]
pub struct FileHandler {
    /// Path to base directory in local file system from which to
    /// serve the files. No ".." or "." are allowed in the surplus of
    /// the request path.
    basepath: PathBuf,
}

impl FileHandler {
    pub fn new(basepath: impl Into<PathBuf>) -> FileHandler {
        FileHandler {
            basepath: basepath.into()
        }
    }
}

impl Handler for FileHandler {
    /// Returns None if the file does not exist
    fn call(
        &self,
        context: &AContext,
        _site: &Site,
        method: HttpRequestMethodSimple,
        pathrest: &[&str])
        -> Result<Option<AResponse>>
    {
        if method.is_post() {
            return Ok(Some(errorpage_from_status(
                HttpResponseStatusCode::MethodNotAllowed405).into()))
        }
        let canonpath = or_return_none!(canonicalize_path(pathrest));
        if canonpath.is_empty() {
            return Ok(None) // Since it's a directory, not a file.
        }
        let full_path: PathBuf = self.basepath.join(canonpath.join("/"));

        let metadata =
            match full_path.metadata() {
                Ok(m) => m,
                Err(e) =>
                    match e.kind() {
                        ErrorKind::NotFound => return Ok(None),
                        _ => return Err(e).with_context(
                            || anyhow!("can't open file for reading: {:?}",
                                       full_path))
                    }
            };
        if ! metadata.is_file() {
            return Ok(None)
        }
        let mimetype = full_path.extension()
            .and_then(|e| e.to_str())
            .map(extension_to_mime)
            .unwrap_or("application/octet-stream");
        let fh = match File::open(&full_path) {
            Ok(fh) => fh,
            Err(e) => match e.kind() {
                ErrorKind::NotFound => return Ok(None),
                _ => return Err(e).with_context(
                    || anyhow!("can't open file for reading: {:?}", full_path))
            }
        };
        let mtime: SystemTime = metadata.modified()?;
        // Allowed cache age grows with the age of the file
        let age_seconds = mtime.elapsed().unwrap_or(Duration::ZERO).as_secs();
        let age_allowed = age_seconds + age_seconds / 10;
        let expires = SystemTime::now().checked_add(Duration::from_secs(age_allowed))
            .ok_or_else(|| anyhow!("time overflow??"))?;
        let mtime_seconds = mtime.duration_since(UNIX_EPOCH)?.as_secs();
        let etag_quoted = format!("{:?}", mtime_seconds.to_string());

        let headers = vec![
            cow!("Content-type", mimetype),
            cow!("Last-Modified", fmt_http_date(mtime)),
            cow!("Cache-Control", format!("max-age={}", age_allowed)),
            cow!("Expires", fmt_http_date(expires)),
            cow!("ETag", etag_quoted.clone()),
        ];
        let size = usize::try_from(metadata.len())?;
        let send_file = |headers| -> Result<Option<AResponse>> {
            Ok(Some(Response {
                status_code: HttpResponseStatusCode::OK200.code(),
                headers,
                data: ResponseBody::from_reader_and_size(fh, size),
                upgrade: None,
            }.into()))
        };
        // Still send the headers with 304, to let the client know
        // that the file might even be *older* than what it saw.
        let send_notmodified = |headers| -> Result<Option<AResponse>> {
            Ok(Some(Response {
                status_code: HttpResponseStatusCode::NotModified304.code(),
                headers,
                data: ResponseBody::empty(),
                upgrade: None,
            }.into()))
        };
        if let Some(nonematch_str) = context.header("If-None-Match") {
            if nonematch_str == etag_quoted {
                send_notmodified(headers)
            } else {
                send_file(headers)
            }
        } else if let Some(modsince_str) = context.header("If-Modified-Since") {
            match parse_http_date(modsince_str) {
                Ok(modsince) =>
                    if file_is_newer_than_snapshot_time(mtime, modsince) {
                        send_file(headers)
                    } else {
                        send_notmodified(headers)
                    },
                Err(e) => {
                    warn!("invalid If-Modified-Since {modsince_str:?}: {e}");
                    send_file(headers)
                }
            }
        } else {
            send_file(headers)
        }
    }
}

// ------------------------------------------------------------------
/// `POST /login` with `username`, `password` and optionally
/// `return_path` fields.
#[derive(Debug)]
pub struct LoginHandler;

/// `path` with its query replaced by `query`.
fn with_query(path: &str, query: &str) -> String {
    let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
    format!("{path}?{query}")
}

impl Handler for LoginHandler {
    fn call(
        &self,
        context: &AContext,
        site: &Site,
        method: HttpRequestMethodSimple,
        pathrest: &[&str])
        -> Result<Option<AResponse>>
    {
        if ! method.is_post() || ! pathrest.is_empty() {
            return Ok(None)
        }
        let start = Instant::now();
        let delayed = |response: Response| -> Result<Option<AResponse>> {
            Ok(Some(response.to_aresponse(start.checked_add(LOGIN_RESPONSE_TIME))))
        };
        let inp = match post_input!(context.request(), {
            username: String,
            password: String,
            return_path: Option<String>,
        }) {
            Ok(inp) => inp,
            Err(e) => {
                warn!("login: invalid form data: {e}");
                return Ok(Some(errorpage_from_status(
                    HttpResponseStatusCode::BadRequest400).into()))
            }
        };
        let failed = || {
            Response::redirect_303(with_query(&back_target(context), "login=failed"))
        };
        match site.databases.check_username_password(&inp.username, &inp.password) {
            Ok(Some(user)) => {
                let user_id = user.id.ok_or_else(
                    || anyhow!("user from the database without id"))?;
                site.databases.login(context.session_id(), context.sessionid_hasher(),
                                     user_id)?;
                context.set_user(Some(user));
                delayed(Response::redirect_303(
                    local_redirect_target(inp.return_path.as_deref()).to_string()))
            }
            Ok(None) => delayed(failed()),
            Err(e) =>
                if matches!(&*e, CheckAccessErrorKind::InputCheckFailure(_)) {
                    delayed(failed())
                } else {
                    Err(e)?
                }
        }
    }
}

// ------------------------------------------------------------------
/// `POST /logout`, optionally with a `return_path` field.
#[derive(Debug)]
pub struct LogoutHandler;

impl Handler for LogoutHandler {
    fn call(
        &self,
        context: &AContext,
        site: &Site,
        method: HttpRequestMethodSimple,
        pathrest: &[&str])
        -> Result<Option<AResponse>>
    {
        if ! method.is_post() || ! pathrest.is_empty() {
            return Ok(None)
        }
        let return_path = post_input!(context.request(), {
            return_path: Option<String>,
        }).ok().and_then(|inp| inp.return_path);
        site.databases.logout(context.session_id(), context.sessionid_hasher())?;
        context.set_user(None);
        let target = match return_path {
            Some(p) => local_redirect_target(Some(&p)).to_string(),
            None => back_target(context),
        };
        Ok(Some(redirect_303(&target)))
    }
}

// ------------------------------------------------------------------
/// `POST /forms/<name>`: store all url-encoded fields.
#[derive(Debug)]
pub struct FormHandler;

/// Repeated keys collect their values in a list.
pub fn fields_to_json(fields: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, val) in fields {
        match map.get_mut(&key) {
            None => { map.insert(key, Value::String(val)); }
            Some(Value::Array(vals)) => vals.push(Value::String(val)),
            Some(old) => {
                let first = old.take();
                *old = Value::Array(vec![first, Value::String(val)]);
            }
        }
    }
    map
}

impl Handler for FormHandler {
    fn call(
        &self,
        context: &AContext,
        site: &Site,
        method: HttpRequestMethodSimple,
        pathrest: &[&str])
        -> Result<Option<AResponse>>
    {
        let name = match pathrest {
            [name] if method.is_post() => *name,
            _ => return Ok(None)
        };
        if trimcheck_formname(name).is_err() {
            return Ok(None)
        }
        let fields = match raw_urlencoded_post_input(context.request()) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("form {name:?}: invalid form data: {e}");
                return Ok(Some(errorpage_from_status(
                    HttpResponseStatusCode::BadRequest400).into()))
            }
        };
        let id = site.databases.record_form_submission(name, &fields_to_json(fields))?;
        warn_thread!("site {:?}: stored submission {id} of form {name:?}", site.name);
        Ok(Some(redirect_303(&back_target(context))))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn t_file_is_newer_than_snapshot_time() {
        let t = UNIX_EPOCH + Duration::from_secs(1000);
        assert!(! file_is_newer_than_snapshot_time(t, t));
        assert!(! file_is_newer_than_snapshot_time(t + Duration::from_millis(500), t));
        assert!(file_is_newer_than_snapshot_time(t + Duration::from_secs(2), t));
        assert!(! file_is_newer_than_snapshot_time(t, t + Duration::from_secs(2)));
    }

    #[test]
    fn t_fields_to_json() {
        let fields = vec![("a".into(), "1".into()),
                          ("b".into(), "x".into()),
                          ("a".into(), "2".into()),
                          ("a".into(), "3".into())];
        assert_eq!(Value::Object(fields_to_json(fields)),
                   json!({"a": ["1", "2", "3"], "b": "x"}));
    }

    #[test]
    fn t_with_query() {
        assert_eq!(with_query("/contact?x=1", "login=failed"), "/contact?login=failed");
        assert_eq!(with_query("/", "login=failed"), "/?login=failed");
    }
}
