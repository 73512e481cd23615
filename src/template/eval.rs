//! Per-request render state and the render loop.

use std::{collections::HashMap, mem, sync::Arc};

use anyhow::{Result, bail};
use kstring::KString;

use super::{Engine, Rendered, TagCall,
            adapter::DataAdapter,
            error::{TemplateError, TemplateErrorKind},
            filters::RAW_FLAG,
            matcher::{BlockMatch, match_block, is_end_tag},
            split::{split_tag_body, classify, TokenKind},
            value::{Value, Context, layered, to_output_string},
            walker::{Walker, Segment, TagSpan}};

/// The mutable side of rendering: local context, variables, blocks,
/// flags, metadata, request-local adapters and the error list. Not
/// shared between threads; create one per request.
pub struct Evaluation<'e> {
    pub(crate) engine: &'e Engine,
    pub(crate) local: Context,
    pub(crate) variables: HashMap<KString, Value>,
    blocks: HashMap<KString, Arc<str>>,
    pub(crate) adapters: HashMap<KString, Arc<dyn DataAdapter>>,
    pub(crate) flags: HashMap<KString, bool>,
    meta: HashMap<KString, String>,
    errors: Vec<TemplateError>,
    depth: usize,
    iterations: usize,
}

impl<'e> Evaluation<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Evaluation {
            engine,
            local: Context::new(),
            variables: HashMap::new(),
            blocks: HashMap::new(),
            adapters: HashMap::new(),
            flags: HashMap::new(),
            meta: HashMap::new(),
            errors: Vec::new(),
            depth: 0,
            iterations: 0,
        }
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Render `source` with `local` layered over the engine's global
    /// data. The local context seen before the call is restored
    /// afterwards; blocks defined by the render are kept.
    pub fn render(&mut self, source: &str, local: Context) -> Rendered {
        let mut output = String::with_capacity(source.len() * 12 / 10);
        let saved = mem::replace(&mut self.local, layered(&self.engine.globals, local));
        self.iterations = 0;
        self.render_range(source, 0, source.len(), &mut output);
        self.local = saved;
        Rendered {
            output,
            errors: mem::take(&mut self.errors),
        }
    }

    /// Render `source[start..limit]` into `out` under the current
    /// local context. Re-entry point for tag handlers.
    pub fn render_range(&mut self, source: &str, start: usize, limit: usize, out: &mut String) {
        if self.depth >= self.engine.max_depth {
            self.record(TemplateErrorKind::RecursionLimit {
                pos: start,
                limit: self.engine.max_depth,
            });
            return
        }
        self.depth += 1;
        let engine = self.engine;
        let limit = limit.min(source.len());
        let mut walker = Walker::new(source, &engine.delimiters, start, limit);
        while let Some(segment) = walker.next() {
            match segment {
                Segment::Literal { start, end } => out.push_str(&source[start..end]),
                Segment::Unclosed { open } => {
                    self.record(TemplateErrorKind::UnclosedOpening { pos: open });
                    out.push_str(&source[open..limit]);
                }
                Segment::Tag(span) => {
                    let next = self.dispatch(source, span, limit, out);
                    walker.seek(next);
                }
            }
        }
        self.depth -= 1;
    }

    /// Render `source[start..limit]` with `local` as the local
    /// context, restoring the current one afterwards.
    pub fn render_with(
        &mut self, local: Context, source: &str, start: usize, limit: usize, out: &mut String
    ) {
        let saved = mem::replace(&mut self.local, local);
        self.render_range(source, start, limit, out);
        self.local = saved;
    }

    /// Render a stored block's text in full.
    pub fn render_block_text(&mut self, text: &str, local: Option<Context>, out: &mut String) {
        match local {
            Some(local) => self.render_with(local, text, 0, text.len(), out),
            None => self.render_range(text, 0, text.len(), out),
        }
    }

    fn dispatch(&mut self, source: &str, span: TagSpan, limit: usize, out: &mut String) -> usize {
        let tokens = split_tag_body(span.body(source));
        let (head, args) = match tokens.split_first() {
            Some((head, args)) => (*head, args),
            None => {
                self.record(TemplateErrorKind::EmptyTag { pos: span.open });
                return span.after
            }
        };
        match classify(head) {
            TokenKind::Path | TokenKind::Quoted =>
                self.interpolate(&tokens, span.open, out),
            TokenKind::Variable =>
                if args.first() == Some(&":=") {
                    self.assign(head, &args[1..], span.open)
                } else {
                    self.interpolate(&tokens, span.open, out)
                },
            TokenKind::Word => {
                let engine = self.engine;
                if let Some(def) = engine.tags.get(head) {
                    let call = TagCall {
                        name: head,
                        args: args.to_vec(),
                        source,
                        span,
                        limit,
                    };
                    let next = (def.handler)(self, out, &call);
                    if next > span.open {
                        return next
                    }
                    self.record(TemplateErrorKind::NoProgress {
                        pos: span.open,
                        name: head.into(),
                    });
                } else if is_end_tag(head, &|name| engine.is_block_tag(name)) {
                    self.record(TemplateErrorKind::StrayEnd {
                        pos: span.open,
                        name: head.into(),
                    });
                } else if head == "else" {
                    self.record(TemplateErrorKind::StrayElse { pos: span.open });
                } else {
                    self.record(TemplateErrorKind::UnknownTag {
                        pos: span.open,
                        name: head.into(),
                    });
                }
            }
        }
        span.after
    }

    fn interpolate(&mut self, tokens: &[&str], pos: usize, out: &mut String) {
        self.flags.remove(RAW_FLAG);
        let value = match self.eval_pipeline(tokens, pos, false) {
            Some(value) => value,
            None => return
        };
        let s = to_output_string(&value);
        let raw = self.flags.remove(RAW_FLAG).unwrap_or(false);
        match &self.engine.sanitizer {
            Some(sanitize) if !raw => out.push_str(&sanitize(&s)),
            _ => out.push_str(&s)
        }
    }

    /// `$name := token`; only a single right-hand token is accepted.
    fn assign(&mut self, head: &str, rhs: &[&str], pos: usize) {
        let name = &head[1..];
        if name.is_empty() || name.contains('.') {
            self.record(TemplateErrorKind::InvalidAssignment {
                pos,
                message: "invalid variable name",
            });
            return
        }
        match rhs {
            [token] =>
                if let Some(value) = self.eval_pipeline(&[*token], pos, false) {
                    self.variables.insert(KString::from_ref(name), value);
                },
            [] => self.record(TemplateErrorKind::InvalidAssignment {
                pos,
                message: "missing right-hand side",
            }),
            _ => self.record(TemplateErrorKind::InvalidAssignment {
                pos,
                message: "right-hand side must be a single token",
            }),
        }
    }

    /// Match the block opened by `call`, recording `unclosed-tag`
    /// if it isn't closed before the end of the current range.
    pub fn match_block(&mut self, call: &TagCall) -> BlockMatch {
        let engine = self.engine;
        let m = match_block(call.source, &engine.delimiters, call.name,
                            call.span.after, call.limit,
                            &|name| engine.is_block_tag(name));
        if !m.closed {
            self.record(TemplateErrorKind::UnclosedTag {
                pos: call.span.open,
                name: call.name.into(),
            });
        }
        m
    }

    /// Count one loop iteration; false once the engine's limit is
    /// exceeded (recorded once per render).
    pub fn count_iteration(&mut self, pos: usize) -> bool {
        self.iterations += 1;
        let limit = self.engine.max_iterations;
        if self.iterations > limit {
            if self.iterations == limit + 1 {
                self.record(TemplateErrorKind::IterationLimit { pos, limit });
            }
            return false
        }
        true
    }

    pub fn record(&mut self, kind: TemplateErrorKind) {
        self.errors.push(TemplateError::from(kind));
    }

    pub fn errors(&self) -> &[TemplateError] {
        &self.errors
    }

    // ---- Blocks -------------------------------------------------------

    /// Store raw template text under `name`, replacing any previous
    /// definition.
    pub fn define_block(&mut self, name: &str, text: &str) {
        self.blocks.insert(KString::from_ref(name), Arc::from(text));
    }

    pub fn block(&self, name: &str) -> Option<Arc<str>> {
        self.blocks.get(name).cloned()
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
    }

    // ---- Variables, adapters, flags, metadata ---------------------------

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(KString::from_ref(name), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Bind a request-local data adapter; replaces an earlier binding
    /// of the same prefix, but prefixes of the engine's adapters can't
    /// be shadowed.
    pub fn bind_adapter(&mut self, prefix: &str, adapter: Arc<dyn DataAdapter>) -> Result<()> {
        if self.engine.has_adapter(prefix) {
            bail!("prefix {prefix:?} is already claimed by an engine adapter")
        }
        self.adapters.insert(KString::from_ref(prefix), adapter);
        Ok(())
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, name: &str, on: bool) {
        self.flags.insert(KString::from_ref(name), on);
    }

    pub fn set_meta(&mut self, key: &str, value: &str) {
        self.meta.insert(KString::from_ref(key), value.to_string());
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(|s| s.as_str())
    }

    /// The current local context.
    pub fn local(&self) -> &Context {
        &self.local
    }
}
