//! Route according to the domain

use std::{sync::{Arc, Mutex}, collections::HashMap, path::Path};

use anyhow::{Result, bail, anyhow};
use kstring::KString;

use crate::{site::Site,
            acontext::AContext,
            apachelog::Logs,
            webutils::errorpage_from_status,
            http_response_status_codes::HttpResponseStatusCode,
            http_request_method::HttpRequestMethodSimple,
            aresponse::AResponse};

/// Route for a particular site, reachable via one or more hosts
/// (domains).
pub struct HostRouter {
    pub site: Arc<Site>,
    /// Logs when using either routed or fallback handler.
    pub logs: Arc<Mutex<Logs>>,
}

impl HostRouter {
    /// Opens the site's logs in `<logbasedir>/<site name>/`.
    pub fn open(site: Arc<Site>, logbasedir: &Path, is_https: bool) -> Result<Self> {
        let logs = Logs::open_in_basedir(&logbasedir.join(&*site.name), is_https)?;
        Ok(HostRouter { site, logs })
    }

    /// GET and HEAD requests go to the site's page routes, POST
    /// requests to its actions.
    pub fn handle_request(
        &self,
        context: &AContext,
        method: HttpRequestMethodSimple,
    ) -> (Arc<Mutex<Logs>>, anyhow::Result<AResponse>)
    {
        let path = context.path();
        let router = if method.is_post() { &self.site.actions } else { &self.site.routes };
        if let Some((handler, rest)) = router.get(&path) {
            match handler.call(context, &self.site, method, &rest) {
                Ok(Some(response)) => return (self.logs.clone(), Ok(response)),
                Ok(None) => (),
                Err(e) => return (self.logs.clone(), Err(e)),
            }
        }
        let status =
            if method.is_post() && self.site.routes.get(&path).is_some() {
                HttpResponseStatusCode::MethodNotAllowed405
            } else {
                HttpResponseStatusCode::NotFound404
            };
        (self.logs.clone(), Ok(errorpage_from_status(status).into()))
    }
}

/// Routes for all hosts (domains)
pub struct HostsRouter {
    /// Hostnames are stored in lowercased form.
    pub routers: HashMap<KString, Arc<HostRouter>>,
    /// Fallback when either no `Host` header was sent, or it was not
    /// found in `routers`.
    pub fallback: Option<Arc<HostRouter>>,
    /// Logs when there is no fallback handler.
    pub logs: Arc<Mutex<Logs>>,
}

impl HostsRouter {
    pub fn new(fallback: Option<Arc<HostRouter>>,
               logs: Arc<Mutex<Logs>>
    ) -> HostsRouter {
        HostsRouter {
            routers: Default::default(),
            fallback,
            logs
        }
    }

    /// Two sites claiming the same host is an error.
    pub fn add(&mut self,
               hostname: &str,
               hostrouter: Arc<HostRouter>
    ) -> Result<&mut Self> {
        let key = KString::from_string(hostname.to_lowercase());
        if let Some(old) = self.routers.get(&key) {
            bail!("host {hostname:?} is claimed by both site {:?} and {:?}",
                  old.site.name, hostrouter.site.name)
        }
        self.routers.insert(key, hostrouter);
        Ok(self)
    }

    /// The router for `host` (without port), else the fallback.
    pub fn get(&self, host: Option<&str>) -> Option<&Arc<HostRouter>> {
        host.and_then(|host| self.routers.get(&KString::from_string(host.to_lowercase())))
            .or(self.fallback.as_ref())
    }

    /// One `HostRouter` per site, each registered for all of its
    /// hosts. Unknown hosts go to the site named `fallback_site`, or
    /// in dev mode to the first site.
    pub fn for_sites(
        sites: &[Arc<Site>],
        fallback_site: Option<&str>,
        is_dev: bool,
        logbasedir: &Path,
        is_https: bool,
    ) -> Result<HostsRouter>
    {
        let hostrouters = sites.iter().map(
            |site| HostRouter::open(site.clone(), logbasedir, is_https).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let fallback =
            if let Some(name) = fallback_site {
                Some(hostrouters.iter().find(|r| &*r.site.name == name).cloned()
                     .ok_or_else(|| anyhow!("fallback site {name:?} not found"))?)
            } else if is_dev {
                hostrouters.first().cloned()
            } else {
                None
            };
        let mut hostsrouter = HostsRouter::new(
            fallback, Logs::open_in_basedir(logbasedir, is_https)?);
        for hostrouter in hostrouters {
            for host in &hostrouter.site.config.hosts {
                hostsrouter.add(host, hostrouter.clone())?;
            }
        }
        Ok(hostsrouter)
    }
}
