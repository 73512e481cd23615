//! Write HTTP access log files in the Combined Log Format (extended
//! Common Log Format) for access logs (Apache style), as per
//! <https://httpd.apache.org/docs/2.4/logs.html>.

use std::mem::swap;
use std::panic;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::{time::{Duration, SystemTime, Instant}, io::{stderr, BufWriter}};
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc, Datelike, Timelike};
use rouille::ResponseBody;

use crate::acontext::AContext;
use crate::aresponse::AResponse;
use crate::easy_fs::open_log_output;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::webutils::errorpage_from_status;
use crate::{warn, try_result};

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun",
                            "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

// "06/Dec/2023:02:02:47 +0000"
pub fn write_time(
    outp: &mut impl Write,
    time: SystemTime
) -> Result<()> {
    let dt: DateTime<Utc> = DateTime::from(time);
    write!(outp, "{:02}/{}/{:04}:{:02}:{:02}:{:02} +0000",
           dt.day(), MONTHS[dt.month0() as usize], dt.year(),
           dt.hour(), dt.minute(), dt.second())?;
    Ok(())
}

// 18.134.151.89 - - [06/Dec/2023:02:02:47 +0100] "GET /login.jsp HTTP/1.1" 404 447 "-" "Mozilla/5.0"
// We also add the duration at the end.

fn body_length(aresponse: &mut AResponse) -> Option<usize> {
    // The body fields are private, the only way to get at the length
    // is to take the body apart and put it back together.
    let mut responsebody = ResponseBody::empty();
    swap(&mut responsebody, &mut aresponse.response.data);
    let (data, length) = responsebody.into_reader_and_size();
    responsebody =
        if let Some(len) = length {
            ResponseBody::from_reader_and_size(data, len)
        } else {
            ResponseBody::from_reader(data)
        };
    swap(&mut responsebody, &mut aresponse.response.data);
    length
}

/// Write to access.log
pub fn write_combined(
    outp: &mut impl Write,
    context: &AContext,
    duration: Duration,
    aresponse: &mut AResponse, // temporarily swaps out ResponseBody and back
) -> Result<()> {
    // Write the time when the log entry is made, not when the
    // request started
    let now = SystemTime::now();
    let user = context.cached_username().unwrap_or_else(|| "-".into());
    write!(outp, "{} - {user} [", context.client_ip())?;
    write_time(outp, now)?;
    let len = body_length(aresponse);
    writeln!(outp, "] {:?} {} {} {:?} {:?} {duration:?}",
             context.request_line(),
             aresponse.response.status_code,
             len.unwrap_or(0),
             context.referer().unwrap_or("-"),
             context.user_agent().unwrap_or("-")
    )?;
    outp.flush()?;
    Ok(())
}

/// Write to error.log
fn write_error(
    outp: &mut impl Write,
    context: &AContext,
    duration: Duration,
    err: anyhow::Error,
) -> Result<()> {
    let now = SystemTime::now();
    write!(outp, "[")?;
    write_time(outp, now)?;
    writeln!(outp, "] [error] [client {}] {:?} {duration:?}: {err:#}",
             context.client_ip(),
             context.request_line())?;
    outp.flush()?;
    Ok(())
}

/// Panic log to stderr.
fn write_panic_stderr(
    context: &AContext,
    duration: Duration
) {
    let _: Result<(), std::io::Error> = try_result!{
        let mut outp = BufWriter::new(stderr().lock());
        // stderr is fed to a supervisor that adds timestamps
        writeln!(&mut outp, "[panic] handling {:?} after {duration:?}",
                 context.request_line())?;
        outp.flush()?;
        Ok(())
    };
}


// rouille::log_custom can't be used: the log files depend on the
// site, which is only known inside the handler. Thus the same
// approach, adapted.

/// The log files of one site and listener: access_log for
/// responses, error_log for handler errors. Should do buffering
/// (i.e. be BufWriter), the code calls flush once per entry.
pub struct Logs {
    pub access_log: Box<dyn Write + Send + Sync>,
    pub error_log: Box<dyn Write + Send + Sync>,
}

impl Logs {
    pub fn open_in_basedir(
        logbasedir: &Path,
        is_https: bool
    ) -> Result<Arc<Mutex<Logs>>>
    {
        let s = if is_https { "s" } else { "" };
        Ok(Arc::new(Mutex::new(Logs {
            access_log: open_log_output(
                logbasedir.join(format!("http{s}_access.log")))?,
            error_log: open_log_output(
                logbasedir.join(format!("http{s}_error.log")))?,
        })))
    }
}


pub fn log_combined<F>(
    context: &AContext,
    handler: F
) -> AResponse
where
    F: FnOnce() -> (Arc<Mutex<Logs>>, anyhow::Result<AResponse>),
{
    let start_instant = Instant::now();

    // Call the handler and catch panics; unwinding is always
    // resumed afterwards.
    let result = panic::catch_unwind(panic::AssertUnwindSafe(handler));
    let elapsed = start_instant.elapsed();

    match result {
        Ok((logs, result)) => match result {
            Ok(mut response) => {
                match logs.lock() {
                    Ok(mut logs) =>
                        if let Err(e) = write_combined(
                            &mut logs.access_log, context, elapsed, &mut response)
                        {
                            warn!("could not write to access log: {e:#}")
                        },
                    Err(_) => warn!("access log mutex is poisoned"),
                }
                response
            }
            Err(err) => {
                match logs.lock() {
                    Ok(mut logs) =>
                        if let Err(e) = write_error(
                            &mut logs.error_log, context, elapsed, err)
                        {
                            warn!("could not write to error log: {e:#}")
                        },
                    Err(_) => warn!("error log mutex is poisoned: {err:#}"),
                }
                errorpage_from_status(HttpResponseStatusCode::InternalServerError500)
                    .into()
            }
        },
        Err(payload) => {
            write_panic_stderr(context, elapsed);
            // The panic handler will print the payload contents
            panic::resume_unwind(payload);
        }
    }
}
