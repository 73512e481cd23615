use sqlite::{Statement, Bindable, BindableWithIndex};


pub trait FromStatement {
    fn from_statement<'s, 'slf>(
        sth: &'s mut Statement<'slf>
    ) -> Result<(Self, &'s mut Statement<'slf>), sqlite::Error>
    where Self: Sized;
}

// Binding a record binds its fields from index 1 on, in column
// order; the id, if present, comes last (for `where id = ?`).
fn offset(n: usize) -> usize { n + 1 }

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    pub name: String,
    pub hashed_pass: String,
    pub created: i64, // unixtime
}

impl FromStatement for User {
    fn from_statement<'s, 'slf>(
        sth: &'s mut Statement<'slf>
    ) -> Result<(Self, &'s mut Statement<'slf>), sqlite::Error> {
        Ok((User {
            id: Some(sth.read(0)?),
            username: sth.read(1)?,
            name: sth.read(2)?,
            hashed_pass: sth.read(3)?,
            created: sth.read(4)?,
        }, sth))
    }
}
impl Bindable for &User {
    fn bind(self, st: &mut Statement) -> sqlite::Result<()> {
        self.username.as_str().bind(st, offset(0))?;
        self.name.as_str().bind(st, offset(1))?;
        self.hashed_pass.as_str().bind(st, offset(2))?;
        self.created.bind(st, offset(3))?;
        if let Some(id) = self.id {
            id.bind(st, offset(4))?;
        }
        Ok(())
    }
}

// fake DB object for count(*) and last_insert_rowid() queries
#[derive(Debug)]
pub struct Count(pub i64);

impl FromStatement for Count {
    fn from_statement<'s, 'slf>(
        sth: &'s mut Statement<'slf>
    ) -> Result<(Self, &'s mut Statement<'slf>), sqlite::Error>
    {
        Ok((Count(sth.read(0)?), sth))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Option<i64>,
    /// Keyed hash of the session cookie value, never the value itself
    pub sessionid_hash: Vec<u8>,
    pub user_id: Option<i64>, // None: not logged in
    pub last_request_time: i64, // unixtime
}

impl FromStatement for Session {
    fn from_statement<'s, 'slf>(
        sth: &'s mut Statement<'slf>
    ) -> Result<(Self, &'s mut Statement<'slf>), sqlite::Error> {
        Ok((Self {
            id: Some(sth.read(0)?),
            sessionid_hash: sth.read(1)?,
            user_id: sth.read(2)?,
            last_request_time: sth.read(3)?,
        }, sth))
    }
}
impl Bindable for &Session {
    fn bind(self, st: &mut Statement) -> sqlite::Result<()> {
        self.sessionid_hash.as_slice().bind(st, offset(0))?;
        self.user_id.bind(st, offset(1))?;
        self.last_request_time.bind(st, offset(2))?;
        if let Some(id) = self.id {
            id.bind(st, offset(3))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub id: Option<i64>,
    pub form: String,
    /// JSON object of the submitted fields
    pub fields: String,
    pub unixtime: i64,
}

impl FromStatement for FormSubmission {
    fn from_statement<'s, 'slf>(
        sth: &'s mut Statement<'slf>
    ) -> Result<(Self, &'s mut Statement<'slf>), sqlite::Error> {
        Ok((Self {
            id: Some(sth.read(0)?),
            form: sth.read(1)?,
            fields: sth.read(2)?,
            unixtime: sth.read(3)?,
        }, sth))
    }
}
impl Bindable for &FormSubmission {
    fn bind(self, st: &mut Statement) -> sqlite::Result<()> {
        self.form.as_str().bind(st, offset(0))?;
        self.fields.as_str().bind(st, offset(1))?;
        self.unixtime.bind(st, offset(2))?;
        if let Some(id) = self.id {
            id.bind(st, offset(3))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub id: Option<i64>,
    pub path: String,
    pub unixtime: i64,
}

impl Bindable for &PageView {
    fn bind(self, st: &mut Statement) -> sqlite::Result<()> {
        self.path.as_str().bind(st, offset(0))?;
        self.unixtime.bind(st, offset(1))?;
        if let Some(id) = self.id {
            id.bind(st, offset(2))?;
        }
        Ok(())
    }
}
