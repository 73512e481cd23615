use std::{net::IpAddr, time::SystemTime, cell::RefCell};

use anyhow::Result;
use blake3::Hasher;
use rouille::{Request, session::Session};

use crate::{access_control::{Databases, types::User},
            http_request_method::HttpRequestMethod};


/// Per-request view of the rouille request with the session and
/// lazily looked up user.
pub struct AContext<'r, 's, 'h> {
    // Fallback for host(): what this server listens on
    listen_addr: &'r str,
    now: SystemTime,
    method: HttpRequestMethod,
    request: &'r Request,
    session: &'r Session<'s>,
    // A `blake3::Hasher` that has already been filled with some secret data.
    sessionid_hasher: &'h Hasher,
    // None: not looked up yet
    user: RefCell<Option<Option<User>>>,
}

impl<'r, 's, 'h> AContext<'r, 's, 'h> {
    pub fn new(
        request: &'r Request, listen_addr: &'r str, session: &'r Session<'s>,
        sessionid_hasher: &'h Hasher,
    ) -> Result<Self>
    {
        let method = HttpRequestMethod::from_str(request.method())?;
        Ok(AContext {
            listen_addr,
            now: SystemTime::now(),
            method,
            request,
            session,
            sessionid_hasher,
            user: RefCell::new(None),
        })
    }

    /// Like the request part in Apache style Combined Log Format
    pub fn request_line(&self) -> String {
        // `Request` does not appear to maintain the original request
        // line string, thus have to reconstruct it.
        format!("{} {}",
                self.request.method(),
                self.request.raw_url())
    }
    /// `foo` part in `?foo`
    pub fn query_string(&self) -> &str {
        self.request.raw_query_string()
    }
    pub fn user_agent(&self) -> Option<&str> {
        self.request.header("user-agent")
    }
    pub fn client_ip(&self) -> IpAddr {
        self.request.remote_addr().ip()
    }
    pub fn method(&self) -> HttpRequestMethod { self.method }
    /// The Host header without port, lowercased.
    pub fn host(&self) -> Option<String> {
        self.request.header("host").map(host_without_port)
    }
    pub fn host_or_listen_addr(&self) -> String {
        self.host().unwrap_or_else(|| self.listen_addr.to_string())
    }
    /// Path only, percent-decoded
    pub fn path(&self) -> String { self.request.url() }
    pub fn now(&self) -> &SystemTime { &self.now }
    pub fn referer(&self) -> Option<&str> {
        self.header("referer")
    }
    pub fn header(&self, key: &str) -> Option<&str> { self.request.header(key) }

    pub fn request(&self) -> &Request { self.request }
    pub fn session(&self) -> &Session { self.session }
    pub fn session_id(&self) -> &str { self.session.id() }
    pub fn sessionid_hasher(&self) -> &Hasher { self.sessionid_hasher }

    /// The logged-in user, looked up in `dbs` on first call.
    pub fn user(&self, dbs: &Databases) -> Result<Option<User>> {
        if let Some(user) = &*self.user.borrow() {
            return Ok(user.clone())
        }
        let user = dbs.get_user_from_session_id(self.session_id(), self.sessionid_hasher)?;
        *self.user.borrow_mut() = Some(user.clone());
        Ok(user)
    }

    /// Replace the cached user, e.g. after login or logout.
    pub fn set_user(&self, user: Option<User>) {
        *self.user.borrow_mut() = Some(user);
    }

    /// The username if the user has been looked up and is logged in.
    pub fn cached_username(&self) -> Option<String> {
        match &*self.user.borrow() {
            Some(Some(user)) => Some(user.username.clone()),
            _ => None
        }
    }
}

pub fn host_without_port(host: &str) -> String {
    let host = if host.starts_with('[') {
        // IPv6 literal
        match host.find(']') {
            Some(i) => &host[..=i],
            None => host,
        }
    } else {
        match host.rfind(':') {
            Some(i) => &host[..i],
            None => host,
        }
    };
    host.to_lowercase()
}
