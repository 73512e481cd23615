use std::{fmt::Debug, path::{Path, PathBuf}, time::Duration};

use sqlite::{Connection, Statement};

use crate::{warn, warn_thread, def_boxed_thiserror, try_sqlite, try_result};
use super::{db::{Db, with_db}, sqliteposerror::SQLitePosError};

def_boxed_thiserror!(TransactionError, pub enum TransactionErrorKind {
    #[error("sqlite Db is not connected")]
    NotConnected,
    #[error("database {0:?} is already in use by this thread")]
    InUse(PathBuf),
    #[error("sqlite initialisation error: {0}")]
    InitError(#[from] SQLitePosError),
    #[error("sqlite error on transaction begin: {0}")]
    BeginError(sqlite::Error),
    #[error("sqlite error on transaction commit: {0}")]
    CommitError(sqlite::Error),
});

impl TransactionError {
    fn is_busy(&self) -> bool {
        match &**self {
            TransactionErrorKind::NotConnected => false,
            TransactionErrorKind::InUse(_) => false,
            TransactionErrorKind::InitError(e) => e.is_busy(),
            TransactionErrorKind::BeginError(_) => true,
            TransactionErrorKind::CommitError(_) => true,
        }
    }
}

/// Errors from transaction handlers decide whether the whole
/// transaction is worth another attempt.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for SQLitePosError {
    fn is_transient(&self) -> bool {
        self.is_busy()
    }
}

impl Retryable for anyhow::Error {
    fn is_transient(&self) -> bool {
        match self.downcast_ref::<SQLitePosError>() {
            Some(e) => e.is_busy(),
            None => false
        }
    }
}

pub struct Transaction<'t> {
    conn: &'t Connection,
    is_committed: bool
}

impl<'t> Transaction<'t> {
    /// Taking mut since there can only be one transaction in
    /// progress. The transaction will be rolled back when dropped and
    /// not committed.
    pub fn new(db: &'t mut Db) -> Result<Self, TransactionError> {
        let conn = db.connection()?;
        if let Err(e) = conn.execute("BEGIN TRANSACTION") {
            Err(TransactionErrorKind::BeginError(e))?
        }
        warn_thread!("begun transaction");
        Ok(Self {
            conn,
            is_committed: false
        })
    }

    pub fn commit(mut self) -> Result<(), TransactionError> {
        if let Err(e) = self.conn.execute("COMMIT TRANSACTION") {
            Err(TransactionErrorKind::CommitError(e))?
        }
        self.is_committed = true;
        warn_thread!("committed transaction");
        Ok(())
    }

    pub fn prepare(&self, sql: &str) -> Result<Statement<'t>, SQLitePosError> {
        Ok(try_sqlite!(self.conn.prepare(sql)))
    }

    pub fn execute(&self, sql: &str) -> Result<(), SQLitePosError> {
        try_sqlite!(self.conn.execute(sql));
        Ok(())
    }
}

impl<'t> Drop for Transaction<'t> {
    fn drop(&mut self) {
        if ! self.is_committed {
            if let Err(e) = self.conn.execute("ROLLBACK TRANSACTION") {
                warn!("drop Transaction: ROLLBACK gave error: {e:?}");
            }
            warn_thread!("rolled back transaction");
        }
    }
}


// Can't take type arguments with def_boxed_thiserror, thus use an
// unboxed representation.
#[derive(thiserror::Error, Debug)]
pub enum TransactError<E: Debug> {
    #[error("transaction error: {0}")]
    TransactionError(TransactionError),
    #[error("error in transaction handler: {0}")]
    HandlerError(E),
}

impl<E: Debug> From<TransactionError> for TransactError<E> {
    fn from(e: TransactionError) -> Self {
        TransactError::TransactionError(e)
    }
}

impl<E: Debug + From<TransactionError>> TransactError<E> {
    /// Merge both cases into the handler's error type.
    pub fn flatten(self) -> E {
        match self {
            TransactError::TransactionError(e) => e.into(),
            TransactError::HandlerError(e) => e,
        }
    }
}

/// Run `f` in a transaction, committing if it returns `Ok`. Busy
/// errors lead to retries with exponential backoff.
pub fn transact<F, R, E>(db: &mut Db, f: F) -> Result<R, TransactError<E>>
where F: Fn(&mut Transaction) -> Result<R, E>,
      E: Debug + Retryable
{
    let mut sleeptime = 500; // microseconds
    let mut attempt = 1;
    let last_attempt = 12; // ~2 seconds total
    loop {
        let r: Result<Result<R, E>, TransactionError> = try_result!{
            let mut trans = Transaction::new(db)?;
            let r: Result<R, E> = f(&mut trans);
            if r.is_ok() {
                trans.commit()?;
            }
            Ok(r)
        };
        macro_rules! retry {
            ( $errkind:expr, $errconstr:expr, $e:ident ) => {{
                if attempt < last_attempt {
                    warn!("transact: on attempt {attempt} got {} error: {:?}",
                          $errkind, $e);
                    attempt += 1;
                    std::thread::sleep(Duration::from_micros(sleeptime));
                    sleeptime *= 2;
                } else {
                    return Err($errconstr($e))
                }
            }}
        }
        match r {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) =>
                if e.is_transient() {
                    retry!("handler", TransactError::HandlerError, e)
                } else {
                    return Err(TransactError::HandlerError(e))
                },
            Err(e) =>
                if e.is_busy() {
                    retry!("transaction", TransactError::TransactionError, e)
                } else {
                    return Err(TransactError::TransactionError(e))
                }
        }
    }
}

/// `transact` on this thread's connection to the database at `path`.
pub fn db_transaction<F, R, E>(path: &Path, f: F) -> Result<R, E>
where F: Fn(&mut Transaction) -> Result<R, E>,
      E: Debug + Retryable + From<TransactionError>
{
    with_db(path, |db| transact(db, f).map_err(TransactError::flatten))
}
