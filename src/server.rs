//! Running the rouille server.

use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

use anyhow::{Result, bail};
use blake3::Hasher;
use rouille::session::session;
use rouille::{Server, Request, Response};

use crate::acontext::AContext;
use crate::apachelog::{log_combined, Logs};
use crate::aresponse::AResponse;
use crate::easy_fs::read_to_string;
use crate::hostrouter::HostsRouter;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::webutils::errorpage_from_status;
use crate::warn;

/// Session cookie name and lifetime.
const SESSION_COOKIE: &str = "sid";
pub const SESSION_TIMEOUT_SECONDS: u64 = 3600;

/// Make a handler for Rouille's `Server::new` procedure.
pub fn server_handler(
    listen_addr: String,
    hostsrouter: Arc<HostsRouter>,
    sessionid_hasher: Hasher,
) -> impl for<'r> Fn(&'r Request) -> Response
{
    move |request: &Request| -> Response {
        session(request, SESSION_COOKIE, SESSION_TIMEOUT_SECONDS, |session| {
            let okhandler = |context: &AContext| -> AResponse {
                log_combined(
                    context,
                    || -> (Arc<Mutex<Logs>>, anyhow::Result<AResponse>) {
                        let method = context.method();
                        match method.to_simple() {
                            Some(simplemethod) => {
                                let host = context.host();
                                if let Some(hostrouter) = hostsrouter.get(host.as_deref()) {
                                    return hostrouter.handle_request(context, simplemethod)
                                }
                                (hostsrouter.logs.clone(),
                                 Ok(errorpage_from_status(
                                     HttpResponseStatusCode::NotFound404).into()))
                            }
                            None => {
                                warn!("method {:?} not implemented", method.as_str());
                                (hostsrouter.logs.clone(),
                                 Ok(errorpage_from_status(
                                     HttpResponseStatusCode::NotImplemented501).into()))
                            }
                        }
                    })
            };
            let aresponse = match AContext::new(request, &listen_addr, session,
                                                &sessionid_hasher) {
                Ok(context) => okhandler(&context),
                Err(e) => {
                    warn!("{e:#}");
                    AResponse::from(errorpage_from_status(
                        HttpResponseStatusCode::NotImplemented501))
                }
            };
            aresponse.delay();
            aresponse.response
        })
    }
}


pub struct Tlskeys {
    pub crt: Vec<u8>,
    pub key: Vec<u8>,
}

impl Tlskeys {
    /// Reads `<base>.crt` and `<base>.key`.
    pub fn read(base: &str) -> Result<Tlskeys> {
        Ok(Tlskeys {
            crt: read_to_string(Path::new(&format!("{base}.crt")))?.into_bytes(),
            key: read_to_string(Path::new(&format!("{base}.key")))?.into_bytes(),
        })
    }
}

/// Run a rouille server in a new thread. Returns once the server is
/// listening, or with the error if it could not be started.
pub fn run_server(
    thread_name: &str,
    addr: String,
    tlskeys: Option<Tlskeys>,
    hostsrouter: Arc<HostsRouter>,
    sessionid_hasher: Hasher,
) -> Result<JoinHandle<()>>
{
    let (started_tx, started_rx) = mpsc::sync_channel(1);
    let thread = thread::Builder::new().name(thread_name.into()).spawn({
        let addr = addr.clone();
        move || {
            let handler = server_handler(addr.clone(), hostsrouter, sessionid_hasher);
            let server =
                if let Some(Tlskeys { crt, key }) = tlskeys {
                    Server::new_ssl(addr, handler, crt, key)
                } else {
                    Server::new(addr, handler)
                };
            match server {
                Ok(server) => {
                    let _ = started_tx.send(Ok(server.server_addr()));
                    server.run()
                }
                Err(e) => {
                    let _ = started_tx.send(Err(e.to_string()));
                }
            }
        }
    })?;
    match started_rx.recv() {
        Ok(Ok(local_addr)) => {
            eprintln!("Listening on {local_addr}");
            Ok(thread)
        }
        Ok(Err(e)) => bail!("starting server on {addr:?}: {e}"),
        Err(_) => bail!("server thread for {addr:?} exited before starting"),
    }
}
