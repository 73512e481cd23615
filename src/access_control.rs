//! Per-site databases: users and sessions for login, form
//! submissions, page-view analytics. Each lives in its own SQLite
//! file under `<site>/data/`.

pub mod trimcheck;
pub mod db;
pub mod schema;
pub mod statements;
pub mod types;
pub mod transaction;
pub mod util;
pub mod sqliteposerror;

use std::path::{Path, PathBuf};

use anyhow::{Result, Context, anyhow};
use blake3::Hasher;

use crate::{hash_util::{verify_password, create_password_hash, sessionid_hash, HashingError},
            util::unixtime_now,
            def_boxed_thiserror, warn};
use self::{trimcheck::{trimcheck_username, trimcheck_password, trimcheck_name,
                       trimcheck_formname, InputCheckFailure},
           transaction::{db_transaction, Retryable, TransactionError},
           types::{User, Session, FormSubmission, PageView},
           util::UniqueError,
           sqliteposerror::SQLitePosError};

def_boxed_thiserror!(CheckAccessError, pub enum CheckAccessErrorKind {
    #[error("checking access: password hashing error")]
    HashingError(#[from] HashingError),
    #[error("checking access: input verification failure")]
    InputCheckFailure(#[from] InputCheckFailure),
    #[error("checking access")]
    SQLitePosError(#[from] SQLitePosError),
    #[error("checking access")]
    UniqueError(#[from] UniqueError),
    #[error("checking access")]
    TransactionError(#[from] TransactionError),
    #[error("user {0:?} already exists")]
    UserExists(String),
});

impl Retryable for CheckAccessError {
    fn is_transient(&self) -> bool {
        match &**self {
            CheckAccessErrorKind::SQLitePosError(e) => e.is_busy(),
            CheckAccessErrorKind::UniqueError(e) => e.is_transient(),
            _ => false
        }
    }
}

/// The database files of one site.
#[derive(Debug, Clone)]
pub struct Databases {
    pub users: PathBuf,
    pub sessions: PathBuf,
    pub forms: PathBuf,
    pub analytics: PathBuf,
}

impl Databases {
    /// Create `datadir` if needed and bring all schemas up.
    pub fn open(datadir: &Path) -> Result<Self> {
        std::fs::create_dir_all(datadir).with_context(
            || anyhow!("creating data directory {datadir:?}"))?;
        let dbs = Databases {
            users: datadir.join("users.db"),
            sessions: datadir.join("sessions.db"),
            forms: datadir.join("forms.db"),
            analytics: datadir.join("analytics.db"),
        };
        for (path, sql) in [(&dbs.users, schema::USERS),
                            (&dbs.sessions, schema::SESSIONS),
                            (&dbs.forms, schema::FORMS),
                            (&dbs.analytics, schema::ANALYTICS)] {
            db_transaction(path, |trans| -> Result<()> {
                Ok(trans.execute(sql)?)
            }).with_context(|| anyhow!("creating schema in {path:?}"))?;
        }
        Ok(dbs)
    }

    pub fn check_username_password(
        &self, username: &str, password: &str
    ) -> Result<Option<User>, CheckAccessError>
    {
        let username = trimcheck_username(username)?;
        let password = trimcheck_password(password)?;
        let user = db_transaction(&self.users, |trans| -> Result<Option<User>, CheckAccessError> {
            Ok(trans.get_user_by_username(username)?)
        })?;
        match user {
            Some(user) =>
                if verify_password(password, &user.hashed_pass)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                },
            None => Ok(None)
        }
    }

    /// Also refreshes the session's last request time.
    pub fn get_user_from_session_id(
        &self, session_id: &str, hasher: &Hasher
    ) -> Result<Option<User>, CheckAccessError> {
        let hash = sessionid_hash(hasher, session_id);
        let now = unixtime_now();
        let user_id = db_transaction(&self.sessions, |trans| -> Result<Option<i64>, CheckAccessError> {
            if let Some(mut session) = trans.get_session_by_hash(&hash)? {
                session.last_request_time = now;
                trans.update_session(&session)?;
                Ok(session.user_id)
            } else {
                Ok(None)
            }
        })?;
        if let Some(id) = user_id {
            let user = db_transaction(&self.users, |trans| -> Result<Option<User>, CheckAccessError> {
                Ok(trans.get_user_by_id(id)?)
            })?;
            if user.is_none() {
                warn!("user {id} deleted while session is still active?");
            }
            Ok(user)
        } else {
            Ok(None)
        }
    }

    /// Bind the session to `user_id`.
    pub fn login(
        &self, session_id: &str, hasher: &Hasher, user_id: i64
    ) -> Result<(), CheckAccessError> {
        let hash = sessionid_hash(hasher, session_id);
        let now = unixtime_now();
        db_transaction(&self.sessions, |trans| -> Result<(), CheckAccessError> {
            if let Some(mut session) = trans.get_session_by_hash(&hash)? {
                if let Some(prev_user_id) = session.user_id {
                    if prev_user_id != user_id {
                        warn!("session switches from user {prev_user_id} to {user_id}");
                    }
                }
                session.user_id = Some(user_id);
                session.last_request_time = now;
                trans.update_session(&session)?;
            } else {
                trans.insert_session(&Session {
                    id: None,
                    sessionid_hash: hash.to_vec(),
                    user_id: Some(user_id),
                    last_request_time: now,
                })?;
            }
            Ok(())
        })
    }

    /// Forget the session. Returns whether it was logged in.
    pub fn logout(
        &self, session_id: &str, hasher: &Hasher
    ) -> Result<bool, CheckAccessError> {
        let hash = sessionid_hash(hasher, session_id);
        db_transaction(&self.sessions, |trans| -> Result<bool, CheckAccessError> {
            let was_logged_in = trans.get_session_by_hash(&hash)?
                .map(|session| session.user_id.is_some())
                .unwrap_or(false);
            trans.delete_session_by_hash(&hash)?;
            Ok(was_logged_in)
        })
    }

    /// Remove sessions idle for longer than `max_age` seconds.
    pub fn expire_sessions(&self, max_age: i64) -> Result<(), CheckAccessError> {
        let cutoff = unixtime_now() - max_age;
        db_transaction(&self.sessions, |trans| -> Result<(), CheckAccessError> {
            Ok(trans.delete_sessions_before(cutoff)?)
        })
    }

    pub fn add_user(
        &self, username: &str, name: &str, password: &str
    ) -> Result<User, CheckAccessError> {
        let username = trimcheck_username(username)?;
        let name = trimcheck_name(name)?;
        let password = trimcheck_password(password)?;
        let mut user = User {
            id: None,
            username: username.into(),
            name: name.into(),
            hashed_pass: create_password_hash(password)?,
            created: unixtime_now(),
        };
        let id = db_transaction(&self.users, |trans| -> Result<i64, CheckAccessError> {
            if trans.get_user_by_username(username)?.is_some() {
                Err(CheckAccessErrorKind::UserExists(username.into()))?
            }
            Ok(trans.insert_user(&user)?)
        })?;
        user.id = Some(id);
        Ok(user)
    }

    pub fn set_password(
        &self, username: &str, password: &str
    ) -> Result<bool, CheckAccessError> {
        let username = trimcheck_username(username)?;
        let hashed_pass = create_password_hash(trimcheck_password(password)?)?;
        db_transaction(&self.users, |trans| -> Result<bool, CheckAccessError> {
            if let Some(mut user) = trans.get_user_by_username(username)? {
                user.hashed_pass = hashed_pass.clone();
                trans.update_user(&user)?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    /// Store the fields of a submission of the form `form`. Returns
    /// the submission id.
    pub fn record_form_submission(
        &self, form: &str, fields: &serde_json::Map<String, serde_json::Value>
    ) -> Result<i64> {
        let form = trimcheck_formname(form)?;
        let submission = FormSubmission {
            id: None,
            form: form.into(),
            fields: serde_json::to_string(fields)?,
            unixtime: unixtime_now(),
        };
        db_transaction(&self.forms, |trans| -> Result<i64> {
            Ok(trans.insert_form_submission(&submission)?)
        })
    }

    pub fn form_submissions(&self, form: &str) -> Result<Vec<FormSubmission>> {
        db_transaction(&self.forms, |trans| -> Result<Vec<FormSubmission>> {
            Ok(trans.form_submissions(form)?)
        })
    }

    pub fn record_page_view(&self, path: &str) -> Result<()> {
        let view = PageView {
            id: None,
            path: path.into(),
            unixtime: unixtime_now(),
        };
        db_transaction(&self.analytics, |trans| -> Result<()> {
            Ok(trans.insert_page_view(&view)?)
        })
    }

    pub fn count_page_views(&self, path: &str) -> Result<i64> {
        db_transaction(&self.analytics, |trans| -> Result<i64> {
            Ok(trans.count_page_views(path)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::hash_util::sessionid_hasher;
    use super::*;

    fn dbs() -> Result<(tempfile::TempDir, Databases)> {
        let dir = tempfile::tempdir()?;
        let dbs = Databases::open(&dir.path().join("data"))?;
        Ok((dir, dbs))
    }

    #[test]
    fn t_open_is_idempotent() -> Result<()> {
        let (dir, _dbs) = dbs()?;
        let dbs = Databases::open(&dir.path().join("data"))?;
        assert!(dbs.users.exists());
        assert!(dbs.analytics.exists());
        Ok(())
    }

    #[test]
    fn t_users() -> Result<()> {
        let (_dir, dbs) = dbs()?;
        let user = dbs.add_user(" alice ", "Alice A.", "secret-password")?;
        assert_eq!(user.username, "alice");
        assert!(user.id.is_some());
        match &*dbs.add_user("alice", "Other", "another-password").unwrap_err() {
            CheckAccessErrorKind::UserExists(name) => assert_eq!(name, "alice"),
            e => panic!("unexpected error {e}"),
        }

        assert_eq!(dbs.check_username_password("alice", "secret-password")?, Some(user.clone()));
        assert_eq!(dbs.check_username_password("alice", "wrong-password")?, None);
        assert_eq!(dbs.check_username_password("bob", "secret-password")?, None);
        assert!(dbs.check_username_password("alice", "short").is_err());

        assert!(dbs.set_password("alice", "new-password")?);
        assert_eq!(dbs.check_username_password("alice", "secret-password")?, None);
        assert!(dbs.check_username_password("alice", "new-password")?.is_some());
        assert!(! dbs.set_password("bob", "new-password")?);
        Ok(())
    }

    #[test]
    fn t_sessions() -> Result<()> {
        let (_dir, dbs) = dbs()?;
        let hasher = sessionid_hasher("test secret");
        let user = dbs.add_user("alice", "Alice", "secret-password")?;
        let id = user.id.expect("stored user has an id");

        assert_eq!(dbs.get_user_from_session_id("sid1", &hasher)?, None);
        dbs.login("sid1", &hasher, id)?;
        assert_eq!(dbs.get_user_from_session_id("sid1", &hasher)?, Some(user.clone()));
        assert_eq!(dbs.get_user_from_session_id("sid2", &hasher)?, None);
        // a different secret does not find the session
        let other = sessionid_hasher("other secret");
        assert_eq!(dbs.get_user_from_session_id("sid1", &other)?, None);

        // logging in again on the same session is fine
        dbs.login("sid1", &hasher, id)?;
        assert!(dbs.logout("sid1", &hasher)?);
        assert!(! dbs.logout("sid1", &hasher)?);
        assert_eq!(dbs.get_user_from_session_id("sid1", &hasher)?, None);

        dbs.login("sid3", &hasher, id)?;
        dbs.expire_sessions(-10)?;
        assert_eq!(dbs.get_user_from_session_id("sid3", &hasher)?, None);
        Ok(())
    }

    #[test]
    fn t_forms_and_page_views() -> Result<()> {
        let (_dir, dbs) = dbs()?;
        let mut fields = serde_json::Map::new();
        fields.insert("email".into(), "a@example.com".into());
        let id1 = dbs.record_form_submission("contact", &fields)?;
        let id2 = dbs.record_form_submission("contact", &fields)?;
        assert!(id2 > id1);
        assert!(dbs.record_form_submission("../x", &fields).is_err());
        let submissions = dbs.form_submissions("contact")?;
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].id, Some(id2));
        assert_eq!(submissions[0].fields, r#"{"email":"a@example.com"}"#);

        dbs.record_page_view("/")?;
        dbs.record_page_view("/")?;
        dbs.record_page_view("/about")?;
        assert_eq!(dbs.count_page_views("/")?, 2);
        assert_eq!(dbs.count_page_views("/nowhere")?, 0);
        Ok(())
    }
}
