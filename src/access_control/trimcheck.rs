//! Sanitize user-provided inputs

use std::ops::RangeInclusive;

use crate::def_boxed_thiserror;

// number of string characters
const LENRANGE_USERNAME: RangeInclusive<u32> = 2..=40;
const LENRANGE_NAME: RangeInclusive<u32> = 1..=120;
const LENRANGE_PASSWORD: RangeInclusive<u32> = 8..=200;
const LENRANGE_FORMNAME: RangeInclusive<u32> = 1..=60;

def_boxed_thiserror!(InputCheckFailure, pub enum InputCheckFailureKind {
    #[error("{0} is too long, must be {1:?} characters")]
    TooLong(&'static str, RangeInclusive<u32>),
    #[error("{0} is too short, must be {1:?} characters")]
    TooShort(&'static str, RangeInclusive<u32>),
    #[error("{0} contains the \\0 character")]
    ContainsNull(&'static str),
    #[error("{0} may only contain ASCII letters, digits, '-' and '_'")]
    InvalidCharacter(&'static str),
});

fn trimcheck_<'s>(
    fieldname: &'static str,
    len_range: RangeInclusive<u32>,
    s: &'s str
) -> Result<&'s str, InputCheckFailure>
{
    if s.contains('\0') {
        Err(InputCheckFailureKind::ContainsNull(fieldname))?
    }
    let s = s.trim();
    let len = s.chars().count();
    if len < *len_range.start() as usize {
        Err(InputCheckFailureKind::TooShort(fieldname, len_range))?
    } else if len > *len_range.end() as usize {
        Err(InputCheckFailureKind::TooLong(fieldname, len_range))?
    } else {
        Ok(s)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

pub fn trimcheck_username(s: &str) -> Result<&str, InputCheckFailure> {
    trimcheck_("username", LENRANGE_USERNAME, s)
}

/// The display name of a user.
pub fn trimcheck_name(s: &str) -> Result<&str, InputCheckFailure> {
    trimcheck_("name", LENRANGE_NAME, s)
}

pub fn trimcheck_password(s: &str) -> Result<&str, InputCheckFailure> {
    trimcheck_("password", LENRANGE_PASSWORD, s)
}

/// Form names appear in URLs (`/forms/<name>`).
pub fn trimcheck_formname(s: &str) -> Result<&str, InputCheckFailure> {
    let s = trimcheck_("form name", LENRANGE_FORMNAME, s)?;
    if s.chars().all(is_identifier_char) {
        Ok(s)
    } else {
        Err(InputCheckFailureKind::InvalidCharacter("form name"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind<T: std::fmt::Debug>(r: Result<T, InputCheckFailure>) -> String {
        match r {
            Ok(v) => format!("Ok({v:?})"),
            Err(e) => match &*e {
                InputCheckFailureKind::TooLong(..) => "TooLong".into(),
                InputCheckFailureKind::TooShort(..) => "TooShort".into(),
                InputCheckFailureKind::ContainsNull(..) => "ContainsNull".into(),
                InputCheckFailureKind::InvalidCharacter(..) => "InvalidCharacter".into(),
            }
        }
    }

    #[test]
    fn t_trimcheck() {
        assert_eq!(kind(trimcheck_username("  alice ")), "Ok(\"alice\")");
        assert_eq!(kind(trimcheck_username("a")), "TooShort");
        assert_eq!(kind(trimcheck_username("al\0ice")), "ContainsNull");
        assert_eq!(kind(trimcheck_password("short")), "TooShort");
        assert_eq!(kind(trimcheck_password(&"x".repeat(200))).len(), 206);
        assert_eq!(kind(trimcheck_password(&"x".repeat(201))), "TooLong");
        // counted in characters, not bytes
        assert_eq!(kind(trimcheck_username(&"ü".repeat(40))).len(), 2 * 40 + 6);
        assert_eq!(kind(trimcheck_formname("contact-us")), "Ok(\"contact-us\")");
        assert_eq!(kind(trimcheck_formname("../etc")), "InvalidCharacter");
        assert_eq!(kind(trimcheck_name("")), "TooShort");
    }

    #[test]
    fn t_message() {
        let e = trimcheck_username("a").unwrap_err();
        assert_eq!(e.to_string(), "username is too short, must be 2..=40 characters");
    }
}
