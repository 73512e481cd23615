//! Table definitions of the per-site databases. Applied at site
//! load, hence idempotent.

pub const USERS: &str = "
create table if not exists User (
    id integer primary key autoincrement,
    username text not null unique,
    name text not null,
    hashed_pass text not null,
    created integer not null
)";

pub const SESSIONS: &str = "
create table if not exists Session (
    id integer primary key autoincrement,
    sessionid_hash blob not null unique,
    user_id integer,
    last_request_time integer not null
);
create index if not exists Session_last_request_time
    on Session (last_request_time)";

pub const FORMS: &str = "
create table if not exists FormSubmission (
    id integer primary key autoincrement,
    form text not null,
    fields text not null,
    unixtime integer not null
)";

pub const ANALYTICS: &str = "
create table if not exists PageView (
    id integer primary key autoincrement,
    path text not null,
    unixtime integer not null
);
create index if not exists PageView_path on PageView (path)";
