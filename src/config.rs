//! Server configuration from environment variables.

use std::path::PathBuf;

use anyhow::Result;
use blake3::Hasher;

use crate::hash_util::sessionid_hasher;
use crate::server::Tlskeys;
use crate::util::{getenv, getenv_or, xgetenv, log_basedir};

pub struct Config {
    /// Each subdirectory is a site
    pub sitesdir: PathBuf,
    pub listen_http: String,
    /// Only used if `tlskeys` is set
    pub listen_https: String,
    pub tlskeys: Option<Tlskeys>,
    pub sessionid_hasher: Hasher,
    /// Name of the site serving unknown hosts
    pub fallback_site: Option<String>,
    pub is_dev: bool,
    pub logbasedir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let tlskeys = getenv("TLSKEYSFILEBASE")?
            .map(|base| Tlskeys::read(&base))
            .transpose()?;
        Ok(Config {
            sitesdir: getenv_or("SITESDIR", Some("sites"))?.into(),
            listen_http: getenv_or("LISTEN_HTTP", Some("127.0.0.1:3000"))?,
            listen_https: getenv_or("LISTEN_HTTPS", Some("127.0.0.1:3001"))?,
            tlskeys,
            sessionid_hasher: sessionid_hasher(&xgetenv("SESSIONID_HASHER_SECRET")?),
            fallback_site: getenv("FALLBACK_SITE")?,
            is_dev: getenv("IS_DEV")?.is_some(),
            logbasedir: log_basedir()?.into(),
        })
    }
}
