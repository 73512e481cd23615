use std::fmt::Display;

use crate::def_boxed_thiserror;

// SQLITE_BUSY and SQLITE_LOCKED
const TRANSIENT_CODES: [isize; 2] = [5, 6];

def_boxed_thiserror!(SQLitePosError, pub struct SQLitePosErrorInner {
    pub error: sqlite::Error,
    pub file: &'static str,
    pub line: u32
});

impl Display for SQLitePosErrorInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("SQLite error: {} at {:?} line {}",
                                 self.error,
                                 self.file,
                                 self.line))
    }
}

impl SQLitePosError {
    /// Whether another connection holding a lock caused the error,
    /// i.e. retrying later may succeed.
    pub fn is_busy(&self) -> bool {
        match self.error.code {
            Some(code) => TRANSIENT_CODES.contains(&code),
            None => false
        }
    }
}

/// Like `?` on a `sqlite::Result`, but records the source location
/// of the failing call in a `SQLitePosError`, which is then
/// converted into the error type of the surrounding function.
#[macro_export]
macro_rules! try_sqlite {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => {
                let e: $crate::access_control::sqliteposerror::SQLitePosError =
                    $crate::access_control::sqliteposerror::SQLitePosErrorInner {
                        error: e, file: file!(), line: line!()
                    }.into();
                Err(e)?
            }
        }
    }
}
