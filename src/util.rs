use std::{ffi::OsStr, path::PathBuf, fs::create_dir_all, env::VarError,
          time::{SystemTime, UNIX_EPOCH}};

use anyhow::{Result, anyhow, Context, bail};


/// Similar to `?` in a context that returns `Option`, this propagates
/// `None` values, but wraps them in `Ok`. I.e. behaves like `?`
/// except if the `Option` context is wrapped in a `Result`.
#[macro_export]
macro_rules! or_return_none {
    ($e:expr) => {{
        let res = $e;
        if let Some(val) = res {
            val
        } else {
            return Ok(None)
        }
    }}
}

#[macro_export]
macro_rules! try_result {
    ( $($b:tt)* ) => ( (|| -> Result<_, _> { $($b)* })() )
}


pub fn unixtime_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        // clock before 1970, don't care
        .unwrap_or(0)
}

pub fn osstr_to_str(s: &OsStr) -> Result<&str> {
    match s.to_str() {
        Some(s2) => Ok(s2),
        None => bail!("can't properly decode to string {:?}",
                      s.to_string_lossy())
    }
}

pub fn program_name() -> Result<String> {
    let path = std::env::args_os().into_iter().next().ok_or_else(
            || anyhow!("missing program executable path in args_os"))?;
    let pb = PathBuf::from(path);
    let fname = pb.file_name().ok_or_else(|| anyhow!("cannot get file name from path {:?}",
                                                     pb.to_string_lossy()))?;
    Ok(osstr_to_str(fname).with_context(
        || anyhow!("cannot decode file name {:?}",
                   fname.to_string_lossy()))?
       .to_string())
}

/// `$HOME/log/<program name>`, or `LOGDIR` if set; created if missing.
pub fn log_basedir() -> Result<String> {
    let logbasedir =
        if let Some(dir) = getenv("LOGDIR")? {
            dir
        } else {
            format!("{}/log/{}",
                    std::env::var("HOME").with_context(
                        || anyhow!("can't get HOME env var"))?,
                    program_name()?)
        };
    create_dir_all(&logbasedir).with_context(
        || anyhow!("can't create log base directory {:?}",
                   logbasedir))?;
    Ok(logbasedir)
}

/// Get an env var as a String; decoding failures are reported as
/// errors. If the var is not set and no fallback was given, an error
/// is reported as well.
pub fn getenv_or(name: &str, fallbackvalue: Option<&str>) -> Result<String> {
    match std::env::var(name) {
        Ok(s) => Ok(s),
        Err(e) => match e {
            VarError::NotPresent =>
                match fallbackvalue {
                    Some(v) => Ok(v.to_string()),
                    None => bail!("{name:?} env var is missing and \
                                   no default provided"),
                },
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Get an env var as a String; decoding failures are reported as
/// errors.
pub fn getenv(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(s) => Ok(Some(s)),
        Err(e) => match e {
            VarError::NotPresent => Ok(None),
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Like getenv but reports an error mentioning the variable name if
/// it isn't set.
pub fn xgetenv(name: &str) -> Result<String> {
    getenv(name)?.ok_or_else(
        || anyhow!("missing env var {name:?}"))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_getenv_or() -> Result<()> {
        assert_eq!(getenv_or("MULTISITE_SURELY_UNSET_VAR", Some("x"))?, "x");
        assert!(getenv_or("MULTISITE_SURELY_UNSET_VAR", None).is_err());
        assert_eq!(getenv("MULTISITE_SURELY_UNSET_VAR")?, None);
        Ok(())
    }
}
