//! Built-in tags: `if`/`else`, `range`, `with`, `define`, `block`,
//! `template`.

use std::collections::HashMap;

use kstring::KString;

use super::{Evaluation, TagCall, TagDef,
            error::TemplateErrorKind,
            value::{Value, ValueKind, Context, DOT, unquote, is_truthy, context_from_value}};

fn tag_if(ev: &mut Evaluation, out: &mut String, call: &TagCall) -> usize {
    let m = ev.match_block(call);
    let condition =
        if call.args.is_empty() {
            ev.record(TemplateErrorKind::MissingArgument {
                pos: call.span.open,
                name: call.name.into(),
                what: "condition",
            });
            false
        } else {
            ev.eval_pipeline(&call.args, call.span.open, true)
                .map(|v| is_truthy(&v))
                .unwrap_or(false)
        };
    if condition {
        ev.render_range(call.source, m.body.0, m.body.1, out);
    } else if let Some((start, end)) = m.else_body {
        ev.render_range(call.source, start, end, out);
    }
    m.end
}

fn tag_range(ev: &mut Evaluation, out: &mut String, call: &TagCall) -> usize {
    let m = ev.match_block(call);
    let pos = call.span.open;
    let collection = match ev.eval_pipeline(&call.args, pos, false) {
        Some(v) => v,
        None => {
            if call.args.is_empty() {
                ev.record(TemplateErrorKind::MissingArgument {
                    pos,
                    name: call.name.into(),
                    what: "collection",
                });
            }
            return m.end
        }
    };
    let items: Vec<(Option<String>, Value)> = match collection {
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Object(map) => {
            let mut items: Vec<_> = map.into_iter().map(|(k, v)| (Some(k), v)).collect();
            items.sort_by(|a, b| a.0.cmp(&b.0));
            items
        }
        Value::String(s) =>
            s.chars().map(|c| (None, Value::String(c.to_string()))).collect(),
        other => {
            ev.record(TemplateErrorKind::NonIterable { pos, kind: ValueKind::of(&other) });
            return m.end
        }
    };
    for (index, (key, item)) in items.into_iter().enumerate() {
        if !ev.count_iteration(pos) {
            break
        }
        let mut local = Context::new();
        local.insert(DOT.into(), item);
        local.insert("index".into(), Value::from(index));
        if let Some(key) = key {
            local.insert("key".into(), Value::String(key));
        }
        ev.render_with(local, call.source, m.body.0, m.body.1, out);
    }
    m.end
}

fn tag_with(ev: &mut Evaluation, out: &mut String, call: &TagCall) -> usize {
    let m = ev.match_block(call);
    let value = ev.eval_pipeline(&call.args, call.span.open, true)
        .unwrap_or(Value::Null);
    if is_truthy(&value) {
        let mut local = ev.local().clone();
        if let Value::Object(map) = &value {
            local.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        local.insert(DOT.into(), value);
        ev.render_with(local, call.source, m.body.0, m.body.1, out);
    }
    m.end
}

/// The block name argument, unquoted; records an error if missing.
fn name_arg<'s>(ev: &mut Evaluation, call: &TagCall<'s>) -> Option<&'s str> {
    match call.args.first() {
        Some(name) => Some(unquote(*name)),
        None => {
            ev.record(TemplateErrorKind::MissingArgument {
                pos: call.span.open,
                name: call.name.into(),
                what: "name",
            });
            None
        }
    }
}

/// The context given after the block name, if any.
fn context_arg(ev: &mut Evaluation, call: &TagCall) -> Option<Context> {
    let tokens = call.args.get(1..).unwrap_or(&[]);
    if tokens.is_empty() {
        return None
    }
    let value = ev.eval_pipeline(tokens, call.span.open, false).unwrap_or(Value::Null);
    Some(context_from_value(value))
}

fn tag_define(ev: &mut Evaluation, _out: &mut String, call: &TagCall) -> usize {
    let m = ev.match_block(call);
    if let Some(name) = name_arg(ev, call) {
        ev.define_block(name, &call.source[m.body.0..m.body.1]);
    }
    m.end
}

fn tag_block(ev: &mut Evaluation, out: &mut String, call: &TagCall) -> usize {
    let m = ev.match_block(call);
    let name = match name_arg(ev, call) {
        Some(name) => name,
        None => return m.end
    };
    let local = context_arg(ev, call);
    match ev.block(name) {
        Some(text) => ev.render_block_text(&text, local, out),
        None => {
            ev.define_block(name, &call.source[m.body.0..m.body.1]);
            match local {
                Some(local) => ev.render_with(local, call.source, m.body.0, m.body.1, out),
                None => ev.render_range(call.source, m.body.0, m.body.1, out),
            }
        }
    }
    m.end
}

fn tag_template(ev: &mut Evaluation, out: &mut String, call: &TagCall) -> usize {
    if let Some(name) = name_arg(ev, call) {
        match ev.block(name) {
            Some(text) => {
                let local = context_arg(ev, call);
                ev.render_block_text(&text, local, out);
            }
            None => ev.record(TemplateErrorKind::TemplateNotFound {
                pos: call.span.open,
                name: name.into(),
            }),
        }
    }
    call.span.after
}

pub fn builtin_tags() -> HashMap<KString, TagDef> {
    [
        ("if", TagDef::block(tag_if)),
        ("range", TagDef::block(tag_range)),
        ("with", TagDef::block(tag_with)),
        ("define", TagDef::block(tag_define)),
        ("block", TagDef::block(tag_block)),
        ("template", TagDef::inline(tag_template)),
    ].into_iter()
        .map(|(name, def)| (KString::from_static(name), def))
        .collect()
}
