//! Looking up `.`-paths and `$`-variables.

use super::{Evaluation,
            error::TemplateErrorKind,
            value::{Value, DOT, descend}};

enum Lookup {
    Found(Value),
    /// The first segment was found, the rest of the path wasn't.
    NoPath,
    /// Nothing knows the first segment.
    NoVariable,
}

impl<'e> Evaluation<'e> {
    /// The value `{{ . }}` stands for: the current item if there is
    /// one, the whole local context otherwise.
    pub fn dot_value(&self) -> Value {
        match self.local.get(DOT) {
            Some(v) => v.clone(),
            None => Value::Object(self.local.clone()),
        }
    }

    /// Resolve a `.`-path; `extra` tokens are appended as further
    /// path segments. With `lenient`, a missing value is null instead
    /// of an error.
    pub fn resolve_path(
        &mut self, head: &str, extra: &[&str], pos: usize, lenient: bool
    ) -> Option<Value> {
        let keys: Vec<&str> = head.trim_start_matches('.')
            .split('.')
            .filter(|k| !k.is_empty())
            .chain(extra.iter().copied())
            .collect();
        if keys.is_empty() {
            return Some(self.dot_value())
        }
        match self.lookup(&keys) {
            Lookup::Found(v) => Some(v),
            _ if lenient => Some(Value::Null),
            Lookup::NoPath => {
                self.record(TemplateErrorKind::UnknownPath {
                    pos,
                    path: format!(".{}", keys.join(".")),
                });
                None
            }
            Lookup::NoVariable => {
                self.record(TemplateErrorKind::UnknownVariable {
                    pos,
                    name: format!(".{}", keys[0]),
                });
                None
            }
        }
    }

    /// Order: local context, the mapping bound to `"."`, global
    /// data, request-local adapters, engine adapters.
    fn lookup(&self, keys: &[&str]) -> Lookup {
        let (first, rest) = (keys[0], &keys[1..]);
        let descend_from = |v: &Value| match descend(v, rest) {
            Some(v) => Lookup::Found(v.clone()),
            None => Lookup::NoPath,
        };
        if let Some(v) = self.local.get(first) {
            return descend_from(v)
        }
        if let Some(Value::Object(item)) = self.local.get(DOT) {
            if let Some(v) = item.get(first) {
                return descend_from(v)
            }
        }
        if let Some(v) = self.engine.globals.get(first) {
            return descend_from(v)
        }
        let adapter = self.adapters.get(first)
            .or_else(|| self.engine.adapters.get(first));
        if let Some(adapter) = adapter {
            return match adapter.get(keys) {
                Some(v) => Lookup::Found(v),
                None => Lookup::NoPath,
            }
        }
        Lookup::NoVariable
    }

    /// Resolve `$name` or `$name.a.b`.
    pub fn resolve_variable(&mut self, head: &str, pos: usize, lenient: bool) -> Option<Value> {
        let mut keys = head[1..].split('.');
        let name = keys.next().unwrap_or("");
        let rest: Vec<&str> = keys.filter(|k| !k.is_empty()).collect();
        let found = match self.variables.get(name) {
            Some(v) => descend(v, &rest).cloned().ok_or(false),
            None => Err(true),
        };
        match found {
            Ok(v) => Some(v),
            Err(_) if lenient => Some(Value::Null),
            Err(true) => {
                self.record(TemplateErrorKind::UnknownVariable { pos, name: format!("${name}") });
                None
            }
            Err(false) => {
                self.record(TemplateErrorKind::UnknownPath { pos, path: head.into() });
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use anyhow::Result;
    use serde_json::json;
    use super::super::{EngineBuilder, ValueAdapter, value::context_from_value};

    #[test]
    fn t_resolution_order() -> Result<()> {
        let engine = EngineBuilder::new()
            .globals(context_from_value(json!({"g": "global", "shadowed": "global"})))
            .adapter("Site", Arc::new(ValueAdapter(json!({"Title": "T"}))))?
            .build();
        let mut ev = engine.evaluation();
        ev.local = context_from_value(json!({
            "shadowed": "local",
            ".": {"item": 1, "shadowed": "dot"},
            "list": [10, {"x": "y"}],
        }));
        assert_eq!(ev.resolve_path(".shadowed", &[], 0, false), Some(json!("local")));
        assert_eq!(ev.resolve_path(".item", &[], 0, false), Some(json!(1)));
        assert_eq!(ev.resolve_path(".g", &[], 0, false), Some(json!("global")));
        assert_eq!(ev.resolve_path(".Site.Title", &[], 0, false), Some(json!("T")));
        assert_eq!(ev.resolve_path(".list.1.x", &[], 0, false), Some(json!("y")));
        assert_eq!(ev.resolve_path(".list", &["1", "x"], 0, false), Some(json!("y")));
        assert_eq!(ev.resolve_path(".", &[], 0, false),
                   Some(json!({"item": 1, "shadowed": "dot"})));
        assert!(ev.errors().is_empty());

        assert_eq!(ev.resolve_path(".list.5", &[], 7, false), None);
        assert_eq!(ev.resolve_path(".nope", &[], 8, false), None);
        assert_eq!(ev.resolve_path(".Site.Nope", &[], 9, false), None);
        assert_eq!(ev.resolve_path(".nope", &[], 10, true), Some(json!(null)));
        let codes: Vec<_> = ev.errors().iter().map(|e| (e.code(), e.pos())).collect();
        assert_eq!(codes, vec![("unknown-path", 7), ("unknown-variable", 8),
                               ("unknown-path", 9)]);
        Ok(())
    }

    #[test]
    fn t_variables() {
        let engine = EngineBuilder::new().build();
        let mut ev = engine.evaluation();
        ev.set_variable("u", json!({"name": "Ada"}));
        assert_eq!(ev.resolve_variable("$u.name", 0, false), Some(json!("Ada")));
        assert_eq!(ev.resolve_variable("$v", 0, false), None);
        assert_eq!(ev.resolve_variable("$u.age", 0, false), None);
        assert_eq!(ev.resolve_variable("$v", 0, true), Some(json!(null)));
        let codes: Vec<_> = ev.errors().iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec!["unknown-variable", "unknown-path"]);
    }
}
