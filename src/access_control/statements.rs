use crate::try_sqlite;
use super::{transaction::Transaction,
            types::{User, Count, Session, FormSubmission, PageView, FromStatement},
            util::{get_unique_by, execute_bound, UniqueError, UniqueErrorKind},
            sqliteposerror::SQLitePosError};

impl<'t> Transaction<'t> {
    /// Row id assigned by the last insert on this connection.
    pub fn last_insert_id(&self) -> Result<i64, UniqueError> {
        let mut sth = self.prepare("select last_insert_rowid()")?;
        let no_arguments: &[i64] = &[];
        let id: Option<Count> = get_unique_by("last_insert_rowid", &mut sth, no_arguments)?;
        match id {
            Some(Count(id)) => Ok(id),
            None => Err(UniqueErrorKind::NoRow { statement_name: "last_insert_rowid" })?
        }
    }

    // ---- users.db --------------------------------------------------

    pub fn get_user_by_id(
        &self, id: i64
    ) -> Result<Option<User>, UniqueError>
    {
        let mut sth = self.prepare(
            "select id, username, name, hashed_pass, created \
             from User where id = ?")?;
        get_unique_by("select_user_by_id", &mut sth, [id].as_ref())
    }

    pub fn get_user_by_username(
        &self, username: &str
    ) -> Result<Option<User>, UniqueError>
    {
        let mut sth = self.prepare(
            "select id, username, name, hashed_pass, created \
             from User where username = ?")?;
        get_unique_by("select_user_by_username", &mut sth, [username].as_ref())
    }

    /// Returns the new id.
    pub fn insert_user(&self, user: &User) -> Result<i64, UniqueError> {
        let mut sth = self.prepare(
            "insert into User (username, name, hashed_pass, created) \
             values (?, ?, ?, ?)")?;
        execute_bound(&mut sth, &User { id: None, ..user.clone() })?;
        self.last_insert_id()
    }

    pub fn update_user(&self, user: &User) -> Result<(), SQLitePosError> {
        let mut sth = self.prepare(
            "update User set username = ?, name = ?, hashed_pass = ?, created = ? \
             where id = ?")?;
        execute_bound(&mut sth, user)
    }

    // ---- sessions.db -----------------------------------------------

    pub fn get_session_by_hash(
        &self, sessionid_hash: &[u8]
    ) -> Result<Option<Session>, UniqueError>
    {
        let mut sth = self.prepare(
            "select id, sessionid_hash, user_id, last_request_time \
             from Session where sessionid_hash = ?")?;
        get_unique_by("select_session_by_hash", &mut sth, [sessionid_hash].as_ref())
    }

    pub fn insert_session(&self, session: &Session) -> Result<i64, UniqueError> {
        let mut sth = self.prepare(
            "insert into Session (sessionid_hash, user_id, last_request_time) \
             values (?, ?, ?)")?;
        execute_bound(&mut sth, &Session { id: None, ..session.clone() })?;
        self.last_insert_id()
    }

    pub fn update_session(&self, session: &Session) -> Result<(), SQLitePosError> {
        let mut sth = self.prepare(
            "update Session set sessionid_hash = ?, user_id = ?, last_request_time = ? \
             where id = ?")?;
        execute_bound(&mut sth, session)
    }

    pub fn delete_session_by_hash(&self, sessionid_hash: &[u8]) -> Result<(), SQLitePosError> {
        let mut sth = self.prepare("delete from Session where sessionid_hash = ?")?;
        execute_bound(&mut sth, [sessionid_hash].as_ref())
    }

    /// Drop sessions whose last request is older than `unixtime`.
    pub fn delete_sessions_before(&self, unixtime: i64) -> Result<(), SQLitePosError> {
        let mut sth = self.prepare("delete from Session where last_request_time < ?")?;
        execute_bound(&mut sth, [unixtime].as_ref())
    }

    // ---- forms.db --------------------------------------------------

    pub fn insert_form_submission(
        &self, submission: &FormSubmission
    ) -> Result<i64, UniqueError> {
        let mut sth = self.prepare(
            "insert into FormSubmission (form, fields, unixtime) values (?, ?, ?)")?;
        execute_bound(&mut sth, &FormSubmission { id: None, ..submission.clone() })?;
        self.last_insert_id()
    }

    /// Most recent first.
    pub fn form_submissions(&self, form: &str) -> Result<Vec<FormSubmission>, SQLitePosError> {
        let mut sth = self.prepare(
            "select id, form, fields, unixtime from FormSubmission \
             where form = ? order by unixtime desc, id desc")?;
        try_sqlite!(sth.bind([form].as_ref()));
        let mut submissions = Vec::new();
        while let sqlite::State::Row = try_sqlite!(sth.next()) {
            let (submission, _) = try_sqlite!(
                FormSubmission::from_statement(&mut sth));
            submissions.push(submission);
        }
        Ok(submissions)
    }

    // ---- analytics.db ----------------------------------------------

    pub fn insert_page_view(&self, view: &PageView) -> Result<(), SQLitePosError> {
        let mut sth = self.prepare(
            "insert into PageView (path, unixtime) values (?, ?)")?;
        execute_bound(&mut sth, &PageView { id: None, ..view.clone() })
    }

    pub fn count_page_views(&self, path: &str) -> Result<i64, UniqueError> {
        let mut sth = self.prepare("select count(*) from PageView where path = ?")?;
        let count: Option<Count> =
            get_unique_by("count_page_views", &mut sth, [path].as_ref())?;
        Ok(count.map(|Count(n)| n).unwrap_or(0))
    }
}
