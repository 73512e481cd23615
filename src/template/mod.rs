//! A streaming text template engine.
//!
//! Templates are plain text with tags between delimiters (`{{` and
//! `}}` by default): value interpolations with filter pipelines
//! (`{{ .Page.Title | upcase }}`), variables (`{{ $n := .x }}`), and
//! block tags (`if`/`else`, `range`, `with`, `define`, `block`,
//! `template`) closed by `{{ end }}`. Source is interpreted directly,
//! without an intermediate representation; errors are collected and
//! never stop the render.
//!
//! An [`Engine`] is immutable after [`EngineBuilder::build`] and can
//! be shared between threads. All mutable render state lives in an
//! [`Evaluation`], created per request via [`Engine::evaluation`].

pub mod error;
pub mod value;
pub mod walker;
pub mod split;
pub mod adapter;
pub mod filters;
pub mod matcher;
pub mod sanitize;
pub mod eval;
pub mod resolve;
pub mod pipeline;
pub mod tags;

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, bail};
use kstring::KString;

pub use error::{TemplateError, TemplateErrorKind};
pub use value::{Value, Context, ValueKind};
pub use walker::{Delimiters, TagSpan};
pub use adapter::{DataAdapter, ValueAdapter};
pub use filters::FilterContext;
pub use eval::Evaluation;

pub type FilterFn = dyn Fn(&Value, ValueKind, &[Value], &mut FilterContext) -> Result<Value>
    + Send + Sync;

/// A tag handler renders into the output buffer and returns the
/// absolute source position at which rendering continues, which must
/// lie beyond the opening delimiter of the tag.
pub type TagFn = dyn Fn(&mut Evaluation, &mut String, &TagCall) -> usize + Send + Sync;

pub type SanitizerFn = dyn Fn(&str) -> String + Send + Sync;

#[derive(Clone)]
pub struct TagDef {
    /// Whether the tag opens a block closed by `end`. Used for
    /// nesting when matching blocks.
    pub block: bool,
    pub handler: Arc<TagFn>,
}

impl TagDef {
    pub fn block<F>(f: F) -> Self
    where F: Fn(&mut Evaluation, &mut String, &TagCall) -> usize + Send + Sync + 'static
    {
        TagDef { block: true, handler: Arc::new(f) }
    }

    pub fn inline<F>(f: F) -> Self
    where F: Fn(&mut Evaluation, &mut String, &TagCall) -> usize + Send + Sync + 'static
    {
        TagDef { block: false, handler: Arc::new(f) }
    }
}

/// What a tag handler is invoked with.
#[derive(Debug)]
pub struct TagCall<'s> {
    pub name: &'s str,
    /// The tokens following the tag name.
    pub args: Vec<&'s str>,
    /// The whole source being rendered; positions index into it.
    pub source: &'s str,
    pub span: TagSpan,
    /// End of the range currently being rendered.
    pub limit: usize,
}

#[derive(Debug)]
pub struct Rendered {
    pub output: String,
    pub errors: Vec<TemplateError>,
}

impl Rendered {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

/// The immutable part of the engine: delimiters, registries,
/// sanitizer and global data.
pub struct Engine {
    pub(crate) delimiters: Delimiters,
    pub(crate) filters: HashMap<KString, Arc<FilterFn>>,
    pub(crate) tags: HashMap<KString, TagDef>,
    pub(crate) adapters: HashMap<KString, Arc<dyn DataAdapter>>,
    pub(crate) sanitizer: Option<Arc<SanitizerFn>>,
    pub(crate) globals: Context,
    pub(crate) max_depth: usize,
    pub(crate) max_iterations: usize,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Fresh per-request render state. Blocks defined through it
    /// persist across its renders.
    pub fn evaluation(&self) -> Evaluation {
        Evaluation::new(self)
    }

    /// One-shot render with fresh state; no blocks survive.
    pub fn render(&self, source: &str, local: Context) -> Rendered {
        self.evaluation().render(source, local)
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn globals(&self) -> &Context {
        &self.globals
    }

    pub fn is_block_tag(&self, name: &str) -> bool {
        self.tags.get(name).map(|t| t.block).unwrap_or(false)
    }

    pub fn has_adapter(&self, prefix: &str) -> bool {
        self.adapters.contains_key(prefix)
    }
}

pub struct EngineBuilder {
    engine: Engine,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Default delimiters, the built-in filters and tags, and the
    /// default HTML sanitizer.
    pub fn new() -> Self {
        EngineBuilder {
            engine: Engine {
                delimiters: Delimiters::default(),
                filters: filters::builtin_filters(),
                tags: tags::builtin_tags(),
                adapters: HashMap::new(),
                sanitizer: Some(Arc::new(sanitize::sanitize_html)),
                globals: Context::new(),
                max_depth: DEFAULT_MAX_DEPTH,
                max_iterations: DEFAULT_MAX_ITERATIONS,
            }
        }
    }

    pub fn delimiters(mut self, open: &str, close: &str) -> Result<Self> {
        if open.is_empty() || close.is_empty() {
            bail!("delimiters must not be empty: {open:?} {close:?}")
        }
        self.engine.delimiters = Delimiters {
            open: KString::from_ref(open),
            close: KString::from_ref(close),
        };
        Ok(self)
    }

    pub fn filter<F>(mut self, name: &str, f: F) -> Self
    where F: Fn(&Value, ValueKind, &[Value], &mut FilterContext) -> Result<Value>
        + Send + Sync + 'static
    {
        self.engine.filters.insert(KString::from_ref(name), Arc::new(f));
        self
    }

    pub fn tag(mut self, name: &str, def: TagDef) -> Self {
        self.engine.tags.insert(KString::from_ref(name), def);
        self
    }

    /// Register a data adapter for paths starting with `.prefix`.
    pub fn adapter(mut self, prefix: &str, adapter: Arc<dyn DataAdapter>) -> Result<Self> {
        if self.engine.adapters.contains_key(prefix) {
            bail!("a data adapter for prefix {prefix:?} is already registered")
        }
        self.engine.adapters.insert(KString::from_ref(prefix), adapter);
        Ok(self)
    }

    pub fn sanitizer(mut self, sanitizer: Option<Arc<SanitizerFn>>) -> Self {
        self.engine.sanitizer = sanitizer;
        self
    }

    /// Switch between the default sanitizer and none.
    pub fn sanitize(self, on: bool) -> Self {
        let sanitizer: Option<Arc<SanitizerFn>> =
            if on { Some(Arc::new(sanitize::sanitize_html)) } else { None };
        self.sanitizer(sanitizer)
    }

    pub fn globals(mut self, globals: Context) -> Self {
        self.engine.globals = globals;
        self
    }

    pub fn max_depth(mut self, n: usize) -> Self {
        self.engine.max_depth = n;
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.engine.max_iterations = n;
        self
    }

    pub fn build(self) -> Engine {
        self.engine
    }
}


#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use super::value::context_from_value;

    fn ctx(v: serde_json::Value) -> Context {
        context_from_value(v)
    }

    fn codes(r: &Rendered) -> Vec<&'static str> {
        r.errors.iter().map(|e| e.code()).collect()
    }

    /// Render with a fresh default engine, returning the output and
    /// the error codes.
    fn r(s: &str, data: serde_json::Value) -> (String, Vec<&'static str>) {
        let engine = EngineBuilder::new().build();
        let rendered = engine.render(s, ctx(data));
        let c = codes(&rendered);
        (rendered.output, c)
    }

    macro_rules! t {
        ($s:expr, $data:tt, $out:expr) => {
            assert_eq!(r($s, json!($data)), ($out.to_string(), vec![]));
        };
        ($s:expr, $data:tt, $out:expr, [$($code:expr),*]) => {
            assert_eq!(r($s, json!($data)), ($out.to_string(), vec![$($code),*]));
        };
    }

    #[test]
    fn t_without_tags_is_identity() {
        for s in ["", "plain text", "a } b }} c", "{ {x} }", "<b>html</b> & more\n"] {
            t!(s, {}, s);
        }
    }

    #[test]
    fn t_scenarios() {
        t!("Hello {{ .Name }}!", {"Name": "World"}, "Hello World!");
        t!("{{ if .ok }}A{{ else }}B{{ end }}", {"ok": true}, "A");
        t!("{{ if .ok }}A{{ else }}B{{ end }}", {"ok": false}, "B");
        t!("{{ if .ok }}A{{ else }}B{{ end }}", {}, "B");
        t!("{{ range .xs }}{{ .index }}:{{ . }} {{ end }}", {"xs": ["a", "b", "c"]},
           "0:a 1:b 2:c ");
        t!("{{ with .u }}{{ .name }}{{ end }}", {"u": {"name": "Ada"}}, "Ada");
        t!("{{ with .u }}{{ .name }}{{ end }}", {"u": null}, "");
        t!("{{ $n := .x }}{{ $n }}-{{ $n }}", {"x": "z"}, "z-z");
    }

    #[test]
    fn t_layout_inheritance() {
        let engine = EngineBuilder::new().build();
        let layout = "<html>{{ block \"body\" . }}default{{ end }}</html>";
        let page = "{{ define \"body\" }}hi{{ end }}";

        let mut ev = engine.evaluation();
        let p = ev.render(page, Context::new());
        assert_eq!((p.output.as_str(), p.errors.len()), ("", 0));
        let l = ev.render(layout, Context::new());
        assert_eq!((l.output.as_str(), l.errors.len()), ("<html>hi</html>", 0));

        ev.clear_blocks();
        assert_eq!(ev.render(layout, Context::new()).output, "<html>default</html>");

        // one-shot renders don't keep blocks
        engine.render(page, Context::new());
        assert_eq!(engine.render(layout, Context::new()).output, "<html>default</html>");
    }

    #[test]
    fn t_round_trips() {
        t!("{{ .x | upcase | downcase }}", {"x": "Hello"}, "hello");
        t!("{{ define \"b\" }}X{{ end }}{{ block \"b\" . }}Y{{ end }}", {}, "X");
        t!("{{ block \"b\" . }}Y{{ end }}{{ block \"b\" . }}Y{{ end }}", {}, "YY");
    }

    #[test]
    fn t_boundaries() {
        t!("a{{ }}b", {}, "ab", ["empty-tag"]);
        t!("a{{ .missing }}b", {}, "ab", ["unknown-variable"]);
        t!("before {{ if false }}inside", {}, "before ", ["unclosed-tag"]);
        t!("before {{ if true }}inside", {}, "before inside", ["unclosed-tag"]);
        // a named end only closes a block of the same name
        t!("{{ if .a }}{{ range .xs }}x{{ endif }}{{ end }}", {"a": 1, "xs": [1]},
           "x", ["unclosed-tag", "stray-end"]);
        t!("{{ range 42 }}x{{ end }}", {}, "", ["non-iterable"]);
        t!("a {{ b", {}, "a {{ b", ["unclosed-opening"]);
        t!("{{ end }}{{ endif }}x", {}, "x", ["stray-end", "stray-end"]);
        t!("{{ else }}", {}, "", ["stray-else"]);
        t!("{{ frobnicate .x }}", {}, "", ["unknown-tag"]);
        t!("{{ range .nope }}x{{ end }}", {}, "", ["unknown-variable"]);
        t!("{{ template \"nope\" }}!", {}, "!", ["template-not-found"]);
        t!("{{ define }}x{{ end }}", {}, "", ["missing-argument"]);
        t!("{{ $n := .x | upcase }}{{ $n := }}", {"x": 1}, "",
           ["invalid-assignment", "invalid-assignment"]);
    }

    #[test]
    fn t_error_positions() {
        let engine = EngineBuilder::new().build();
        let rendered = engine.render("ab{{ .x }}{{ .y.z }}", ctx(json!({"y": 1})));
        let found: Vec<_> = rendered.errors.iter().map(|e| (e.code(), e.pos())).collect();
        assert_eq!(found, vec![("unknown-variable", 2), ("unknown-path", 10)]);
        assert_eq!(rendered.errors[0].to_string(), "unknown variable \".x\" at 2");
    }

    #[test]
    fn t_conditionals() {
        let s = "{{ if .a }}{{ if .b }}1{{ else }}2{{ end }}{{ else }}3{{ end }}";
        t!(s, {"a": 1, "b": 1}, "1");
        t!(s, {"a": 1, "b": 0}, "2");
        t!(s, {"a": 0, "b": 1}, "3");
        t!("{{ if .xs }}y{{ end }}", {"xs": []}, "");
        t!("{{ if .xs }}y{{ endif }}", {"xs": [0]}, "y");
        t!("{{ if .s | trim }}y{{ else }}n{{ end }}", {"s": "  "}, "n");
    }

    #[test]
    fn t_iteration() {
        for n in 0..4 {
            let xs: Vec<usize> = (0..n).collect();
            t!("{{ range .xs }}x{{ end }}", {"xs": xs}, "x".repeat(n));
        }
        t!("{{ range .m }}{{ .key }}={{ . }};{{ end }}", {"m": {"b": 2, "a": 1}}, "a=1;b=2;");
        t!("{{ range .s }}{{ . }}|{{ end }}", {"s": "hé"}, "h|é|");
        t!("{{ range .users }}{{ .name }},{{ end }}",
           {"users": [{"name": "a"}, {"name": "b"}]}, "a,b,");
        t!("{{ range .xs }}{{ range . }}{{ . }}{{ end }};{{ end }}",
           {"xs": [[1, 2], [3]]}, "12;3;");
    }

    #[test]
    fn t_with_sees_enclosing_keys() {
        t!("{{ with .u }}{{ .outer }}{{ end }}", {"u": {"n": 1}, "outer": "O"}, "O");
        t!("{{ with .u }}{{ .name }}/{{ .n }}{{ end }}",
           {"u": {"name": "in"}, "name": "out", "n": 2}, "in/2");
        t!("{{ range .xs }}{{ with .u }}{{ .key }}{{ .n }}{{ end }};{{ end }}",
           {"xs": {"k": {"u": {"n": 1}}}}, "k1;");
    }

    #[test]
    fn t_context_is_restored() {
        t!("{{ with .u }}{{ .name }}{{ end }}{{ .name }}",
           {"u": {"name": "in"}, "name": "out"}, "inout");
        t!("{{ range .xs }}{{ end }}{{ .xs | size }}", {"xs": [1]}, "1");

        let engine = EngineBuilder::new().build();
        let mut ev = engine.evaluation();
        let before = ev.local().clone();
        ev.render("{{ range .xs }}{{ with . }}{{ . }}{{ end }}{{ end }}",
                  ctx(json!({"xs": [1, 2]})));
        assert_eq!(ev.local(), &before);
    }

    #[test]
    fn t_tag_output_equals_body_output() {
        let data = json!({"u": {"name": "Ada", "tags": ["x", "y"]}});
        let with = r("{{ with .u }}{{ .name }}:{{ .tags | join \",\" }}{{ end }}", data.clone());
        let body = r("{{ .name }}:{{ .tags | join \",\" }}", data["u"].clone());
        assert_eq!(with, body);
    }

    #[test]
    fn t_blocks_and_templates() {
        t!("{{ define \"card\" }}[{{ .title }}]{{ end }}{{ template \"card\" .p }}",
           {"p": {"title": "T"}}, "[T]");
        t!("{{ define \"s\" }}<{{ . }}>{{ end }}{{ template \"s\" \"v\" }}", {}, "<v>");
        t!("{{ define \"d\" }}1{{ end }}{{ define \"d\" }}2{{ end }}{{ template \"d\" }}",
           {}, "2");
        t!("{{ block \"b\" .p }}{{ .title }}{{ end }}", {"p": {"title": "T"}}, "T");
    }

    #[test]
    fn t_sanitizing() {
        let data = json!({"h": "<script>x</script><b>y</b>"});
        t!("<i>{{ .h }}</i>", (data.clone()), "<i><b>y</b></i>");
        t!("{{ .h | raw }}", (data.clone()), "<script>x</script><b>y</b>");
        // raw applies to one interpolation only
        t!("{{ .h | raw }}{{ .h }}", (data.clone()), "<script>x</script><b>y</b><b>y</b>");

        let engine = EngineBuilder::new().sanitize(false).build();
        assert_eq!(engine.render("{{ .h }}", ctx(data.clone())).output,
                   "<script>x</script><b>y</b>");

        let engine = EngineBuilder::new()
            .sanitizer(Some(Arc::new(|s: &str| s.replace('<', "&lt;"))))
            .build();
        assert_eq!(engine.render("{{ .h }}", ctx(json!({"h": "<b>"}))).output, "&lt;b>");
    }

    #[test]
    fn t_custom_delimiters() -> Result<()> {
        let engine = EngineBuilder::new().delimiters("<%", "%>")?.build();
        let rendered = engine.render("{{ x }}<% if .a %><% .a %><% end %>", ctx(json!({"a": 1})));
        assert_eq!(rendered.output, "{{ x }}1");
        assert!(EngineBuilder::new().delimiters("", "}}").is_err());
        Ok(())
    }

    #[test]
    fn t_globals() {
        let engine = EngineBuilder::new()
            .globals(ctx(json!({"site": "S", "x": "global"})))
            .build();
        let rendered = engine.render("{{ .site }} {{ .x }}", ctx(json!({"x": "local"})));
        assert_eq!(rendered.output, "S local");
        let rendered = engine.render("{{ range .xs }}{{ .site }}{{ end }}", ctx(json!({"xs": [1]})));
        assert_eq!(rendered.output, "S");
    }

    #[test]
    fn t_adapters() -> Result<()> {
        let engine = EngineBuilder::new()
            .adapter("Site", Arc::new(ValueAdapter(json!({"Title": "My site"}))))?
            .build();
        assert!(EngineBuilder::new()
                .adapter("A", Arc::new(ValueAdapter(json!(1))))?
                .adapter("A", Arc::new(ValueAdapter(json!(2))))
                .is_err());

        let mut ev = engine.evaluation();
        assert!(ev.bind_adapter("Site", Arc::new(ValueAdapter(json!({})))).is_err());
        ev.bind_adapter("Page", Arc::new(|path: &[&str]| -> Option<Value> {
            match path {
                [_, "Path"] => Some(json!("/x")),
                _ => None
            }
        }))?;
        let rendered = ev.render("{{ .Site.Title }} {{ .Page.Path }}{{ .Page.Nope }}",
                                 Context::new());
        assert_eq!(rendered.output, "My site /x");
        assert_eq!(codes(&rendered), vec!["unknown-path"]);
        Ok(())
    }

    #[test]
    fn t_custom_tags() {
        let engine = EngineBuilder::new()
            .tag("upper", TagDef::block(|ev, out, call| {
                let m = ev.match_block(call);
                let mut inner = String::new();
                ev.render_range(call.source, m.body.0, m.body.1, &mut inner);
                out.push_str(&inner.to_uppercase());
                m.end
            }))
            .tag("hr", TagDef::inline(|_, out, call| {
                out.push_str("<hr>");
                call.span.after
            }))
            .tag("stuck", TagDef::inline(|_, _, call| call.span.open))
            .build();
        let rendered = engine.render(
            "{{ upper }}a{{ if 1 }}b{{ end }}c{{ end }}{{ hr }}{{ stuck }}.",
            Context::new());
        assert_eq!(rendered.output, "ABC<hr>.");
        assert_eq!(codes(&rendered), vec!["no-progress"]);
    }

    #[test]
    fn t_limits() {
        let engine = EngineBuilder::new().max_depth(5).max_iterations(3).build();
        let rendered = engine.render(
            "{{ define \"a\" }}x{{ template \"a\" }}{{ end }}{{ template \"a\" }}",
            Context::new());
        assert_eq!(rendered.output, "xxxx");
        assert_eq!(codes(&rendered), vec!["recursion-limit"]);

        let rendered = engine.render("{{ range .xs }}{{ . }}{{ end }}",
                                     ctx(json!({"xs": [1, 2, 3, 4, 5]})));
        assert_eq!(rendered.output, "123");
        assert_eq!(codes(&rendered), vec!["iteration-limit"]);
    }

    #[test]
    fn t_evaluation_state() {
        let engine = EngineBuilder::new().build();
        let mut ev = engine.evaluation();
        ev.set_variable("v", json!("V"));
        ev.define_block("b", "<{{ $v }}>");
        ev.set_meta("template", "page.html");
        let rendered = ev.render("{{ template \"b\" }}{{ $w := 1 }}", Context::new());
        assert_eq!(rendered.output, "<V>");
        assert_eq!(ev.variable("w"), Some(&json!(1)));
        assert_eq!(ev.meta("template"), Some("page.html"));
        assert!(ev.block("b").is_some());
        assert!(!ev.flag("x"));
        ev.set_flag("x", true);
        assert!(ev.flag("x"));
    }

    #[test]
    fn t_concurrent_use() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();

        let engine = Arc::new(EngineBuilder::new().build());
        let threads: Vec<_> = (0..4).map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut ev = engine.evaluation();
                let page = format!("{{{{ define \"body\" }}}}{i}{{{{ end }}}}");
                ev.render(&page, Context::new());
                ev.render("{{ block \"body\" . }}{{ end }}:{{ .n }}", ctx(json!({"n": i})))
                    .output
            })
        }).collect();
        for (i, t) in threads.into_iter().enumerate() {
            assert_eq!(t.join().unwrap(), format!("{i}:{i}"));
        }
    }
}
