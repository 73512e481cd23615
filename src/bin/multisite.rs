use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use multisite::config::Config;
use multisite::hostrouter::HostsRouter;
use multisite::server::{run_server, SESSION_TIMEOUT_SECONDS};
use multisite::site::Site;
use multisite::warn;
use multisite::warn::DO_WARN_THREAD;

fn main() -> Result<()> {
    DO_WARN_THREAD.store(true, std::sync::atomic::Ordering::SeqCst);

    let Config {
        sitesdir,
        listen_http,
        listen_https,
        tlskeys,
        sessionid_hasher,
        fallback_site,
        is_dev,
        logbasedir,
    } = Config::from_env()?;

    let sites = Site::load_all(&sitesdir)?;
    if sites.is_empty() {
        bail!("no sites found in {sitesdir:?}")
    }
    for site in &sites {
        eprintln!("Loaded site {:?} for hosts {:?}", site.name, site.config.hosts);
    }
    eprintln!("Logging to dir {logbasedir:?}");

    let new_hostsrouter = |is_https| -> Result<_> {
        Ok(Arc::new(HostsRouter::for_sites(
            &sites, fallback_site.as_deref(), is_dev, &logbasedir, is_https)?))
    };

    let mut threads = vec![
        run_server("multisite_http", listen_http, None,
                   new_hostsrouter(false)?, sessionid_hasher.clone())?
    ];
    if let Some(tlskeys) = tlskeys {
        threads.push(run_server("multisite_https", listen_https, Some(tlskeys),
                                new_hostsrouter(true)?, sessionid_hasher)?);
    } else if is_dev {
        // run fake service
        threads.push(run_server("multisite_https", listen_https, None,
                                new_hostsrouter(true)?, sessionid_hasher)?);
    } else {
        warn!("don't have keys, thus not running the HTTPS service!");
    }

    thread::Builder::new().name("multisite_expire_sessions".into()).spawn({
        let sites = sites.clone();
        move || loop {
            for site in &sites {
                if let Err(e) = site.databases.expire_sessions(
                    SESSION_TIMEOUT_SECONDS as i64)
                {
                    warn!("site {:?}: expiring sessions: {e:#}", site.name);
                }
            }
            thread::sleep(Duration::from_secs(SESSION_TIMEOUT_SECONDS));
        }
    })?;

    for thread in threads {
        if thread.join().is_err() {
            warn!("server thread panicked");
        }
    }
    bail!("Server stopped.");
}
