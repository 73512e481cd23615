//! Built-in filters, applied via `{{ value | name args.. }}`.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, bail, anyhow};
use itertools::Itertools;
use kstring::KString;

use crate::str_util::{str_take, capitalize};
use super::{FilterFn,
            value::{Value, ValueKind, Context, to_output_string, as_integer, is_truthy}};

/// Flag set by the `raw` filter: the current interpolation is
/// written without sanitizing.
pub const RAW_FLAG: &str = "raw";

/// What a filter may see and touch besides its value and arguments.
pub struct FilterContext<'a> {
    pub local: &'a Context,
    pub flags: &'a mut HashMap<KString, bool>,
}

fn arg<'v>(args: &'v [Value], i: usize, filtername: &str, what: &str) -> Result<&'v Value> {
    args.get(i).ok_or_else(
        || anyhow!("{filtername}: missing {what} argument"))
}

fn string_arg(args: &[Value], i: usize, filtername: &str, what: &str) -> Result<String> {
    Ok(to_output_string(arg(args, i, filtername, what)?))
}

fn integer_arg(args: &[Value], i: usize, filtername: &str, what: &str) -> Result<i64> {
    let v = arg(args, i, filtername, what)?;
    as_integer(v).ok_or_else(
        || anyhow!("{filtername}: {what} argument must be an integer, got {}",
                   ValueKind::of(v)))
}

/// Map a possibly negative index onto `0..=len`.
fn clamp_index(i: i64, len: usize) -> usize {
    if i < 0 {
        len.saturating_sub(i.unsigned_abs() as usize)
    } else {
        (i as usize).min(len)
    }
}

fn string_map(v: &Value, f: impl FnOnce(&str) -> String) -> Value {
    Value::String(match v {
        Value::String(s) => f(s),
        _ => f(&to_output_string(v))
    })
}


fn upcase(v: &Value, _: ValueKind, _: &[Value], _: &mut FilterContext) -> Result<Value> {
    Ok(string_map(v, |s| s.to_uppercase()))
}

fn downcase(v: &Value, _: ValueKind, _: &[Value], _: &mut FilterContext) -> Result<Value> {
    Ok(string_map(v, |s| s.to_lowercase()))
}

fn capitalize_filter(v: &Value, _: ValueKind, _: &[Value], _: &mut FilterContext) -> Result<Value> {
    Ok(string_map(v, capitalize))
}

fn trim(v: &Value, _: ValueKind, _: &[Value], _: &mut FilterContext) -> Result<Value> {
    Ok(string_map(v, |s| s.trim().to_string()))
}

fn split(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let s = to_output_string(v);
    let parts: Vec<Value> =
        match args.first() {
            Some(sep) => {
                let sep = to_output_string(sep);
                if sep.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
                }
            }
            None => s.split_whitespace().map(|p| Value::String(p.to_string())).collect()
        };
    Ok(Value::Array(parts))
}

fn join(v: &Value, kind: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let sep = args.first().map(to_output_string).unwrap_or_else(|| " ".into());
    match v {
        Value::Array(items) => Ok(Value::String(items.iter().map(to_output_string).join(&sep))),
        Value::String(_) => Ok(v.clone()),
        _ => bail!("join: expecting a sequence, got {kind}")
    }
}

fn replace(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let old = string_arg(args, 0, "replace", "search")?;
    let new = string_arg(args, 1, "replace", "replacement")?;
    if old.is_empty() {
        bail!("replace: search string is empty")
    }
    Ok(string_map(v, |s| s.replace(&old, &new)))
}

fn remove(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let old = string_arg(args, 0, "remove", "substring")?;
    if old.is_empty() {
        return Ok(v.clone())
    }
    Ok(string_map(v, |s| s.replace(&old, "")))
}

fn append(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let suffix = string_arg(args, 0, "append", "string")?;
    Ok(string_map(v, |s| format!("{s}{suffix}")))
}

fn prepend(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let prefix = string_arg(args, 0, "prepend", "string")?;
    Ok(string_map(v, |s| format!("{prefix}{s}")))
}

/// `truncate n [ellipsis]`: at most n characters including the
/// ellipsis (default "...").
fn truncate(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let n = integer_arg(args, 0, "truncate", "length")?;
    if n < 0 {
        bail!("truncate: negative length {n}")
    }
    let n = n as usize;
    let ellipsis = match args.get(1) {
        Some(e) => to_output_string(e),
        None => "...".into()
    };
    let s = to_output_string(v);
    if s.chars().count() <= n {
        return Ok(Value::String(s))
    }
    let ellipsis_len = ellipsis.chars().count();
    if ellipsis_len >= n {
        return Ok(Value::String(str_take(&ellipsis, n).0.to_string()))
    }
    let (head, _) = str_take(&s, n - ellipsis_len);
    Ok(Value::String(format!("{head}{ellipsis}")))
}

/// `slice start [end]`, end exclusive; negative positions count from
/// the end. Works on strings (by character) and sequences.
fn slice(v: &Value, kind: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let start = integer_arg(args, 0, "slice", "start")?;
    let end = if args.len() > 1 { Some(integer_arg(args, 1, "slice", "end")?) } else { None };
    let range = |len: usize| {
        let a = clamp_index(start, len);
        let b = end.map(|e| clamp_index(e, len)).unwrap_or(len);
        (a, b.max(a))
    };
    match v {
        Value::Array(items) => {
            let (a, b) = range(items.len());
            Ok(Value::Array(items[a..b].to_vec()))
        }
        Value::String(s) => {
            let (a, b) = range(s.chars().count());
            Ok(Value::String(s.chars().skip(a).take(b - a).collect()))
        }
        _ => bail!("slice: expecting a string or sequence, got {kind}")
    }
}

fn contains(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let needle = arg(args, 0, "contains", "item")?;
    let found = match v {
        Value::Array(items) => items.iter().any(
            |item| item == needle || to_output_string(item) == to_output_string(needle)),
        Value::Object(m) => m.contains_key(&to_output_string(needle)),
        Value::Null => false,
        _ => to_output_string(v).contains(&to_output_string(needle)),
    };
    Ok(Value::Bool(found))
}

fn default(v: &Value, _: ValueKind, args: &[Value], _: &mut FilterContext) -> Result<Value> {
    let fallback = arg(args, 0, "default", "fallback")?;
    if is_truthy(v) {
        Ok(v.clone())
    } else {
        Ok(fallback.clone())
    }
}

fn to_json(v: &Value, _: ValueKind, _: &[Value], _: &mut FilterContext) -> Result<Value> {
    Ok(Value::String(serde_json::to_string(v)?))
}

fn size(v: &Value, kind: ValueKind, _: &[Value], _: &mut FilterContext) -> Result<Value> {
    let n = match v {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(m) => m.len(),
        Value::Null => 0,
        _ => bail!("size: not defined for a {kind}")
    };
    Ok(Value::from(n))
}

fn raw(v: &Value, _: ValueKind, _: &[Value], cx: &mut FilterContext) -> Result<Value> {
    cx.flags.insert(KString::from_static(RAW_FLAG), true);
    Ok(v.clone())
}


/// Wrap a filter function for registration.
pub fn filter_fn<F>(f: F) -> Arc<FilterFn>
where F: Fn(&Value, ValueKind, &[Value], &mut FilterContext) -> Result<Value>
    + Send + Sync + 'static
{
    Arc::new(f)
}

pub fn builtin_filters() -> HashMap<KString, Arc<FilterFn>> {
    let list: [(&'static str, Arc<FilterFn>); 18] = [
        ("upcase", filter_fn(upcase)),
        ("downcase", filter_fn(downcase)),
        ("capitalize", filter_fn(capitalize_filter)),
        ("trim", filter_fn(trim)),
        ("strip", filter_fn(trim)),
        ("split", filter_fn(split)),
        ("join", filter_fn(join)),
        ("replace", filter_fn(replace)),
        ("remove", filter_fn(remove)),
        ("append", filter_fn(append)),
        ("prepend", filter_fn(prepend)),
        ("truncate", filter_fn(truncate)),
        ("slice", filter_fn(slice)),
        ("contains", filter_fn(contains)),
        ("default", filter_fn(default)),
        ("toJSON", filter_fn(to_json)),
        ("size", filter_fn(size)),
        ("raw", filter_fn(raw)),
    ];
    list.into_iter()
        .map(|(name, f)| (KString::from_static(name), f))
        .collect()
}
