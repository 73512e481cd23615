//! Evaluating `head [args..] | filter [args..] | ...`.

use super::{Evaluation,
            error::TemplateErrorKind,
            filters::FilterContext,
            split::{pipeline_groups, classify, TokenKind},
            value::{Value, ValueKind, literal_value}};

impl<'e> Evaluation<'e> {
    /// Evaluate a single token: path, variable, or literal.
    pub fn eval_token(&mut self, token: &str, pos: usize, lenient: bool) -> Option<Value> {
        self.eval_head(&[token], pos, lenient)
    }

    fn eval_head(&mut self, group: &[&str], pos: usize, lenient: bool) -> Option<Value> {
        let (head, rest) = group.split_first()?;
        match classify(head) {
            TokenKind::Path => self.resolve_path(head, rest, pos, lenient),
            TokenKind::Variable => self.resolve_variable(head, pos, lenient),
            TokenKind::Quoted | TokenKind::Word => Some(literal_value(head)),
        }
    }

    /// Evaluate a token list as a value pipeline. None if the head
    /// could not be resolved (the error is recorded). Failing filters
    /// record an error and leave the value unchanged.
    pub fn eval_pipeline(&mut self, tokens: &[&str], pos: usize, lenient: bool) -> Option<Value> {
        let groups = pipeline_groups(tokens);
        let (head, filters) = groups.split_first()?;
        let mut value = self.eval_head(head, pos, lenient)?;
        for group in filters {
            let (name, args) = match group.split_first() {
                Some(v) => v,
                None => {
                    self.record(TemplateErrorKind::UnknownFilter { pos, name: String::new() });
                    continue
                }
            };
            let engine = self.engine;
            let filter = match engine.filters.get(*name) {
                Some(f) => f,
                None => {
                    self.record(TemplateErrorKind::UnknownFilter { pos, name: (*name).into() });
                    continue
                }
            };
            let args: Vec<Value> = args.iter()
                .map(|a| self.eval_token(a, pos, lenient).unwrap_or(Value::Null))
                .collect();
            let kind = ValueKind::of(&value);
            let mut cx = FilterContext { local: &self.local, flags: &mut self.flags };
            match filter(&value, kind, &args, &mut cx) {
                Ok(v) => value = v,
                Err(e) => self.record(TemplateErrorKind::FilterError {
                    pos,
                    name: (*name).into(),
                    message: e.to_string(),
                }),
            }
        }
        Some(value)
    }
}


#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;
    use super::super::{EngineBuilder, Engine, Context, value::context_from_value};

    fn render(engine: &Engine, s: &str, ctx: serde_json::Value) -> (String, Vec<&'static str>) {
        let r = engine.render(s, context_from_value(ctx));
        (r.output, r.errors.iter().map(|e| e.code()).collect())
    }

    #[test]
    fn t_pipelines() {
        let engine = EngineBuilder::new().build();
        let ctx = json!({"x": "Hello", "sep": "-", "xs": ["a", "b"]});
        assert_eq!(render(&engine, "{{ .x | upcase | downcase }}", ctx.clone()),
                   ("hello".into(), vec![]));
        assert_eq!(render(&engine, "{{ .xs | join .sep }}", ctx.clone()),
                   ("a-b".into(), vec![]));
        assert_eq!(render(&engine, "{{ \"a b\" | upcase }}", ctx.clone()),
                   ("A B".into(), vec![]));
        assert_eq!(render(&engine, "{{ .x | truncate 4 \"…\" }}", ctx.clone()),
                   ("Hel…".into(), vec![]));
        assert_eq!(render(&engine, "{{ .x|nope|upcase }}", ctx.clone()),
                   ("HELLO".into(), vec!["unknown-filter"]));
        // a failing filter keeps the prior value
        assert_eq!(render(&engine, "{{ .x | slice }}", ctx.clone()),
                   ("Hello".into(), vec!["filter-error"]));
        assert_eq!(render(&engine, "{{ .x | }}", ctx),
                   ("Hello".into(), vec!["unknown-filter"]));
    }

    #[test]
    fn t_custom_filter() -> Result<()> {
        let engine = EngineBuilder::new()
            .filter("twice", |v, _, _, _| {
                let s = super::super::value::to_output_string(v);
                Ok(json!(format!("{s}{s}")))
            })
            .build();
        let r = engine.render("{{ .a | twice }}", Context::from_iter([("a".to_string(), json!(3))]));
        assert_eq!(r.output, "33");
        Ok(())
    }
}
