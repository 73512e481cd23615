//! Lazily opened SQLite connections, one per database file and
//! thread.

use std::{cell::RefCell, collections::HashMap, path::{Path, PathBuf}, rc::Rc};

use sqlite::Connection;

use crate::{try_sqlite, warn_thread};
use super::transaction::{TransactionError, TransactionErrorKind};

// milliseconds
const BUSY_TIMEOUT: usize = 2000;

pub struct Db {
    path: PathBuf,
    connection: Option<Connection>,
}

impl Db {
    pub fn new(path: &Path) -> Self {
        Db {
            path: path.to_owned(),
            connection: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the database on first use.
    pub fn connection(&mut self) -> Result<&Connection, TransactionError> {
        if self.connection.is_none() {
            let mut c = try_sqlite!(sqlite::open(&self.path));
            try_sqlite!(c.execute("PRAGMA foreign_keys = ON"));
            try_sqlite!(c.set_busy_timeout(BUSY_TIMEOUT));
            warn_thread!("opened database {:?}", self.path);
            self.connection = Some(c);
        }
        match &self.connection {
            Some(c) => Ok(c),
            None => Err(TransactionErrorKind::NotConnected)?
        }
    }
}

thread_local!{
    static DBS: RefCell<HashMap<PathBuf, Rc<RefCell<Db>>>> =
        RefCell::new(HashMap::new());
}

/// Run `f` with this thread's connection to the database at
/// `path`. Re-entering for the same path while `f` runs is an error.
pub fn with_db<F, R, E>(path: &Path, f: F) -> Result<R, E>
where F: FnOnce(&mut Db) -> Result<R, E>,
      E: From<TransactionError>
{
    let db = DBS.with(|dbs| {
        dbs.borrow_mut()
            .entry(path.to_owned())
            .or_insert_with(|| Rc::new(RefCell::new(Db::new(path))))
            .clone()
    });
    let mut db = db.try_borrow_mut().map_err(
        |_| TransactionError::from(TransactionErrorKind::InUse(path.to_owned())))?;
    f(&mut db)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn t_with_db() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.db");
        with_db(&path, |db| -> Result<()> {
            db.connection()?.execute("create table T (x integer)")?;
            assert_eq!(db.path(), path.as_path());
            // nested use of the same file is refused
            let nested = with_db(&path, |_| -> Result<()> { Ok(()) });
            assert!(nested.is_err());
            Ok(())
        })?;
        // the connection is kept and reused
        with_db(&path, |db| -> Result<()> {
            db.connection()?.execute("insert into T values (1)")?;
            Ok(())
        })?;
        Ok(())
    }
}
