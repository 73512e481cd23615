//! A site (tenant): its configuration, layouts, partials and pages
//! loaded from `<sitesdir>/<name>/`, the template engine configured
//! for it, its routes and its databases.

pub mod page;
pub mod adapters;

use std::{collections::HashMap, path::{Path, PathBuf}, sync::Arc};

use kstring::KString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{access_control::{Databases, types::User},
            def_boxed_thiserror,
            easy_fs::{files_below, easy_filepaths_in_dir, FileKind},
            handler::{Handler, PageHandler, FileHandler, LoginHandler, LogoutHandler,
                      FormHandler},
            path::base_and_suffix,
            router::Router,
            template::{Engine, Evaluation, Context, Rendered, TemplateError,
                       value::context_from_value},
            warn};
use self::{page::{Page, PageFormat, FrontMatterError, markdown_to_html},
           adapters::{SiteAdapter, PageAdapter}};

def_boxed_thiserror!(SiteLoadError, pub enum SiteLoadErrorKind {
    #[error("reading {path:?}: {error}")]
    Io { path: PathBuf, error: String },
    #[error("invalid site config {path:?}: {error}")]
    Config { path: PathBuf, #[source] error: serde_json::Error },
    #[error("invalid site config {path:?}: {message}")]
    InvalidConfig { path: PathBuf, message: String },
    #[error("content file {path:?}: {error}")]
    FrontMatter { path: String, #[source] error: FrontMatterError },
    #[error("duplicate route {route:?} (page {page:?})")]
    DuplicateRoute { route: String, page: String },
    #[error("route {route:?} refers to missing page {page:?}")]
    MissingPage { route: String, page: String },
    #[error("page {page:?} uses missing layout {layout:?}")]
    MissingLayout { page: String, layout: String },
    #[error("opening databases: {0}")]
    Database(String),
});

fn default_true() -> bool { true }

/// Explicit route in addition to the automatic ones.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub path: String,
    /// Path below `content/`, e.g. "about.md"
    pub page: String,
    #[serde(default)]
    pub layout: Option<String>,
}

/// Contents of `site.json`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub title: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub default_layout: Option<String>,
    #[serde(default = "default_true")]
    pub sanitize: bool,
    #[serde(default)]
    pub delimiters: Option<(String, String)>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

pub struct Site {
    pub name: String,
    pub dir: PathBuf,
    pub config: SiteConfig,
    pub databases: Databases,
    engine: Engine,
    layouts: HashMap<KString, Arc<str>>,
    partials: Vec<(KString, Arc<str>)>,
    pages: HashMap<KString, Page>,
    /// GET and HEAD
    pub routes: Router<Arc<dyn Handler>>,
    /// POST
    pub actions: Router<Arc<dyn Handler>>,
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Site({:?})", self.name))
    }
}

fn log_errors(ev: &Evaluation, errors: &[TemplateError]) {
    let site = ev.meta("site").unwrap_or("-");
    let template = ev.meta("template").unwrap_or("-");
    for e in errors {
        warn!("site {site:?}: template {template:?}: {e}");
    }
}

fn io_error(path: &Path, error: impl std::fmt::Display) -> SiteLoadError {
    SiteLoadErrorKind::Io { path: path.to_owned(), error: format!("{error:#}") }.into()
}

fn read_file(path: &Path) -> Result<String, SiteLoadError> {
    std::fs::read_to_string(path).map_err(|e| io_error(path, e))
}

/// Template files below `dir` keyed by their path without suffix,
/// e.g. "base" for `layouts/base.html`. A missing `dir` is empty.
fn load_templates(dir: &Path) -> Result<Vec<(KString, Arc<str>)>, SiteLoadError> {
    if ! dir.is_dir() {
        return Ok(Vec::new())
    }
    let mut templates = Vec::new();
    for relpath in files_below(dir).map_err(|e| io_error(dir, e))? {
        let rel = relpath.to_string_lossy().replace('\\', "/");
        if let Some((base, "html")) = base_and_suffix(&rel) {
            let text = read_file(&dir.join(&relpath))?;
            templates.push((KString::from_ref(base), Arc::from(text)));
        }
    }
    Ok(templates)
}

impl Site {
    /// Load the site in `dir`; its name is the directory name.
    pub fn load(dir: &Path) -> Result<Site, SiteLoadError> {
        let name = dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io_error(dir, "not a site directory"))?;
        let config_path = dir.join("site.json");
        let config: SiteConfig = serde_json::from_str(&read_file(&config_path)?).map_err(
            |error| SiteLoadErrorKind::Config { path: config_path.clone(), error })?;
        let invalid_config = |message: String| -> SiteLoadError {
            SiteLoadErrorKind::InvalidConfig { path: config_path.clone(), message }.into()
        };

        let layouts: HashMap<KString, Arc<str>> =
            load_templates(&dir.join("layouts"))?.into_iter().collect();
        let partials = load_templates(&dir.join("partials"))?;

        let content_dir = dir.join("content");
        let mut pages: HashMap<KString, Page> = HashMap::new();
        if content_dir.is_dir() {
            for relpath in files_below(&content_dir).map_err(|e| io_error(&content_dir, e))? {
                let rel = relpath.to_string_lossy().replace('\\', "/");
                let text = read_file(&content_dir.join(&relpath))?;
                match Page::parse(&rel, &text) {
                    Ok(Some(page)) => { pages.insert(KString::from_ref(&rel), page); }
                    Ok(None) => warn!("site {name:?}: ignoring non-page content file {rel:?}"),
                    Err(error) => Err(SiteLoadErrorKind::FrontMatter { path: rel, error })?,
                }
            }
        }

        let check_layout = |page: &str, layout: Option<&str>| -> Result<(), SiteLoadError> {
            if let Some(layout) = layout {
                if ! layout.is_empty() && ! layouts.contains_key(layout) {
                    Err(SiteLoadErrorKind::MissingLayout {
                        page: page.into(), layout: layout.into()
                    })?
                }
            }
            Ok(())
        };

        // Routes, sorted for deterministic duplicate reports
        let mut routes: Router<Arc<dyn Handler>> = Router::new();
        let mut page_keys: Vec<&KString> = pages.keys().collect();
        page_keys.sort();
        for key in page_keys {
            let page = &pages[key];
            check_layout(key, page.layout.as_deref().or(config.default_layout.as_deref()))?;
            if routes.contains(&page.url_path) {
                Err(SiteLoadErrorKind::DuplicateRoute {
                    route: page.url_path.clone(), page: key.to_string()
                })?
            }
            routes.add(&page.url_path, Arc::new(PageHandler::new(key.as_str(), None)))
                .map_err(|e| invalid_config(e.to_string()))?;
        }
        for route in &config.routes {
            if ! pages.contains_key(route.page.as_str()) {
                Err(SiteLoadErrorKind::MissingPage {
                    route: route.path.clone(), page: route.page.clone()
                })?
            }
            check_layout(&route.page, route.layout.as_deref())?;
            if routes.contains(&route.path) {
                Err(SiteLoadErrorKind::DuplicateRoute {
                    route: route.path.clone(), page: route.page.clone()
                })?
            }
            routes.add(&route.path, Arc::new(PageHandler::new(
                &route.page, route.layout.as_deref())))
                .map_err(|e| invalid_config(e.to_string()))?;
        }
        let static_dir = dir.join("static");
        if static_dir.is_dir() {
            routes.add_prefix("/static", Arc::new(FileHandler::new(static_dir)))
                .map_err(|e| invalid_config(e.to_string()))?;
        }

        let mut actions: Router<Arc<dyn Handler>> = Router::new();
        (|| -> anyhow::Result<()> {
            actions
                .add("/login", Arc::new(LoginHandler))?
                .add("/logout", Arc::new(LogoutHandler))?
                .add_prefix("/forms", Arc::new(FormHandler))?;
            Ok(())
        })().map_err(|e| invalid_config(e.to_string()))?;

        let globals = match &config.data {
            Value::Null => Context::new(),
            Value::Object(_) => context_from_value(config.data.clone()),
            _ => return Err(invalid_config("`data` must be an object".into()))
        };
        let site_adapter = SiteAdapter::new(
            &config.title, &name, &config.hosts, &json!(globals), pages.values());
        let mut builder = Engine::builder()
            .sanitize(config.sanitize)
            .globals(globals)
            .adapter("Site", Arc::new(site_adapter))
            .map_err(|e| invalid_config(e.to_string()))?;
        if let Some((open, close)) = &config.delimiters {
            builder = builder.delimiters(open, close)
                .map_err(|e| invalid_config(e.to_string()))?;
        }
        if let Some(n) = config.max_iterations {
            builder = builder.max_iterations(n);
        }
        let engine = builder.build();

        let databases = Databases::open(&dir.join("data"))
            .map_err(|e| SiteLoadErrorKind::Database(format!("{e:#}")))?;

        Ok(Site {
            name,
            dir: dir.to_owned(),
            config,
            databases,
            engine,
            layouts,
            partials,
            pages,
            routes,
            actions,
        })
    }

    /// Load every subdirectory of `sitesdir` holding a `site.json`.
    pub fn load_all(sitesdir: &Path) -> anyhow::Result<Vec<Arc<Site>>> {
        let mut dirs = Vec::new();
        for entry in easy_filepaths_in_dir(sitesdir.to_path_buf())? {
            let (path, kind) = entry?;
            if kind == FileKind::Dir && path.join("site.json").is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        let mut sites = Vec::new();
        for dir in dirs {
            sites.push(Arc::new(Site::load(&dir)?));
        }
        Ok(sites)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// By path below `content/`.
    pub fn page(&self, relpath: &str) -> Option<&Page> {
        self.pages.get(relpath)
    }

    pub fn layout(&self, name: &str) -> Option<&Arc<str>> {
        self.layouts.get(name)
    }

    /// Render a page, then its layout (`layout` overrides the page's
    /// and the site default). Template errors are logged and
    /// returned alongside the output.
    pub fn render_page(
        &self, page: &Page, layout: Option<&str>, local: Context
    ) -> anyhow::Result<Rendered> {
        let mut ev = self.engine.evaluation();
        ev.set_meta("site", &self.name);
        ev.set_meta("template", &page.relpath);
        for (name, text) in &self.partials {
            ev.define_block(&format!("partials/{name}"), text);
        }
        ev.bind_adapter("Page", Arc::new(PageAdapter::new(page, None)))?;
        let rendered = ev.render(&page.source, local.clone());
        log_errors(&ev, &rendered.errors);
        let mut errors = rendered.errors;
        let content = match page.format {
            PageFormat::Html => rendered.output,
            PageFormat::Markdown => markdown_to_html(&rendered.output),
        };

        let layout = layout
            .or(page.layout.as_deref())
            .or(self.config.default_layout.as_deref())
            .filter(|l| ! l.is_empty());
        let output = if let Some(name) = layout {
            let source = self.layouts.get(name).ok_or_else(
                || anyhow::anyhow!("missing layout {name:?}"))?.clone();
            let template = format!("layouts/{name}");
            ev.set_meta("template", &template);
            ev.bind_adapter("Page", Arc::new(PageAdapter::new(page, Some(content))))?;
            let rendered = ev.render(&source, local);
            log_errors(&ev, &rendered.errors);
            errors.extend(rendered.errors);
            rendered.output
        } else {
            content
        };
        Ok(Rendered { output, errors })
    }

    /// The local data of a page render: `User` and `Request`.
    pub fn request_data(
        user: Option<&User>,
        path: &str, query: &[(String, String)], host: &str
    ) -> Context {
        let params: serde_json::Map<String, Value> = query.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let mut local = Context::new();
        local.insert("User".into(), match user {
            Some(user) => json!({"Name": user.name, "Username": user.username}),
            None => Value::Null,
        });
        local.insert("Request".into(), json!({
            "Path": path,
            "Query": params,
            "Host": host,
        }));
        local
    }
}

#[cfg(test)]
mod tests {
    use std::fs::create_dir_all;

    use anyhow::Result;

    use super::*;

    fn write(dir: &Path, relpath: &str, contents: &str) -> Result<()> {
        let path = dir.join(relpath);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    const SITE_JSON: &str = r#"{
        "title": "Example",
        "hosts": ["example.com", "www.example.com"],
        "data": {"owner": "Alice"},
        "routes": [{"path": "/info", "page": "about.html", "layout": "plain"}],
        "default_layout": "base"
    }"#;

    fn example_site(base: &Path) -> Result<PathBuf> {
        let dir = base.join("site");
        write(&dir, "site.json", SITE_JSON)?;
        write(&dir, "layouts/base.html",
              "<title>{{ .Page.Title }} - {{ .Site.Title }}</title>\
               {{ template \"partials/nav\" }}\
               <main>{{ block \"main\" }}{{ .Page.Content | raw }}{{ end }}</main>\
               <footer>{{ .owner }}</footer>")?;
        write(&dir, "layouts/plain.html", "<div>{{ .Page.Content | raw }}</div>")?;
        write(&dir, "partials/nav.html", "<nav>{{ .Site.Name }}</nav>")?;
        write(&dir, "content/index.md", "---\ntitle: Home\n---\n# Welcome {{ .owner }}\n")?;
        write(&dir, "content/about.html",
              "---\ntitle: About\n---\n\
               {{ define \"main\" }}<p>custom {{ .Page.Title }}</p>{{ end }}<p>about</p>")?;
        write(&dir, "content/hello.html",
              "---\nlayout: false\n---\n\
               {{ if .User }}hi {{ .User.Name }}{{ else }}anon{{ end }} \
               {{ .Request.Query.q }} {{ .Request.Path }}")?;
        write(&dir, "content/docs/index.md", "---\ntitle: Docs\n---\ndocs")?;
        write(&dir, "static/style.css", "body {}")?;
        Ok(dir)
    }

    fn render(site: &Site, relpath: &str, layout: Option<&str>) -> Result<Rendered> {
        let page = site.page(relpath).ok_or_else(|| anyhow::anyhow!("no page {relpath:?}"))?;
        site.render_page(page, layout, Site::request_data(None, "/", &[], "example.com"))
    }

    #[test]
    fn t_load_routes() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let site = Site::load(&example_site(tmp.path())?)?;
        assert_eq!(site.name, "site");
        assert_eq!(site.config.hosts, ["example.com", "www.example.com"]);
        assert_eq!(site.routes.paths(), ["", "about", "docs", "hello", "info"]);
        let (_, rest) = site.routes.get("/static/css/style.css")
            .ok_or_else(|| anyhow::anyhow!("no static route"))?;
        assert_eq!(rest, ["css", "style.css"]);
        let (_, rest) = site.actions.get("/forms/contact")
            .ok_or_else(|| anyhow::anyhow!("no forms route"))?;
        assert_eq!(rest, ["contact"]);
        assert!(site.actions.get("/login").is_some());
        assert!(site.actions.get("/about").is_none());
        assert!(tmp.path().join("site/data/users.db").is_file());
        Ok(())
    }

    #[test]
    fn t_render_markdown_with_layout() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let site = Site::load(&example_site(tmp.path())?)?;
        let rendered = render(&site, "index.md", None)?;
        assert!(rendered.is_ok(), "{:?}", rendered.errors);
        let out = &rendered.output;
        assert!(out.starts_with("<title>Home - Example</title><nav>site</nav><main>"), "{out}");
        assert!(out.contains("<h1>Welcome Alice</h1>"), "{out}");
        assert!(out.ends_with("</main><footer>Alice</footer>"), "{out}");
        Ok(())
    }

    #[test]
    fn t_render_define_fills_layout_block() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let site = Site::load(&example_site(tmp.path())?)?;
        let rendered = render(&site, "about.html", None)?;
        assert!(rendered.is_ok(), "{:?}", rendered.errors);
        assert!(rendered.output.contains("<main><p>custom About</p></main>"),
                "{}", rendered.output);
        assert!(! rendered.output.contains("<p>about</p>"));

        let rendered = render(&site, "about.html", Some("plain"))?;
        assert_eq!(rendered.output, "<div><p>about</p></div>");
        Ok(())
    }

    #[test]
    fn t_render_request_data() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let site = Site::load(&example_site(tmp.path())?)?;
        let page = site.page("hello.html").ok_or_else(|| anyhow::anyhow!("no page"))?;
        let query = [("q".to_string(), "x".to_string())];
        let rendered = site.render_page(
            page, None, Site::request_data(None, "/hello", &query, "example.com"))?;
        assert_eq!(rendered.output, "anon x /hello");
        let user = User {
            id: Some(1),
            username: "bob".into(),
            name: "Bob".into(),
            hashed_pass: "".into(),
            created: 0,
        };
        let rendered = site.render_page(
            page, None, Site::request_data(Some(&user), "/hello", &query, "example.com"))?;
        assert_eq!(rendered.output, "hi Bob x /hello");
        Ok(())
    }

    #[test]
    fn t_template_errors_are_returned() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = example_site(tmp.path())?;
        write(&dir, "content/broken.html", "---\nlayout: plain\n---\na {{ } b")?;
        let site = Site::load(&dir)?;
        let rendered = render(&site, "broken.html", None)?;
        assert!(! rendered.is_ok());
        assert!(rendered.output.starts_with("<div>a "), "{}", rendered.output);
        Ok(())
    }

    #[test]
    fn t_load_errors() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = example_site(tmp.path())?;

        write(&dir, "content/about.md", "other about")?;
        let e = Site::load(&dir).err().ok_or_else(|| anyhow::anyhow!("no error"))?;
        assert!(matches!(&*e, SiteLoadErrorKind::DuplicateRoute { route, .. }
                         if route == "/about"), "{e}");
        std::fs::remove_file(dir.join("content/about.md"))?;

        write(&dir, "content/odd.html", "---\nlayout: nope\n---\n")?;
        let e = Site::load(&dir).err().ok_or_else(|| anyhow::anyhow!("no error"))?;
        assert!(matches!(&*e, SiteLoadErrorKind::MissingLayout { layout, .. }
                         if layout == "nope"), "{e}");
        std::fs::remove_file(dir.join("content/odd.html"))?;

        write(&dir, "content/open.html", "---\ntitle: x\n")?;
        let e = Site::load(&dir).err().ok_or_else(|| anyhow::anyhow!("no error"))?;
        assert!(matches!(&*e, SiteLoadErrorKind::FrontMatter { .. }), "{e}");
        std::fs::remove_file(dir.join("content/open.html"))?;

        let t = |config: &str| -> Result<SiteLoadError> {
            write(&dir, "site.json", config)?;
            Site::load(&dir).err().ok_or_else(|| anyhow::anyhow!("no error for {config}"))
        };
        assert!(matches!(&*t(r#"{"title": "x", "colour": "red"}"#)?,
                         SiteLoadErrorKind::Config { .. }));
        assert!(matches!(&*t(r#"{"title": "x", "data": 3}"#)?,
                         SiteLoadErrorKind::InvalidConfig { .. }));
        assert!(matches!(&*t(r#"{"title": "x", "routes": [{"path": "/x", "page": "x.md"}]}"#)?,
                         SiteLoadErrorKind::MissingPage { .. }));
        assert!(matches!(&*t(r#"{"title": "x", "routes": [{"path": "/", "page": "about.html"}]}"#)?,
                         SiteLoadErrorKind::DuplicateRoute { .. }));
        assert!(matches!(&*t(r#"{"title": "x", "delimiters": ["", "}}"]}"#)?,
                         SiteLoadErrorKind::InvalidConfig { .. }));

        write(&dir, "site.json", SITE_JSON)?;
        Site::load(&dir)?;
        Ok(())
    }

    #[test]
    fn t_load_all() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        example_site(tmp.path())?;
        write(tmp.path(), "another/site.json", r#"{"title": "Another"}"#)?;
        create_dir_all(tmp.path().join("not-a-site"))?;
        let sites = Site::load_all(tmp.path())?;
        let names: Vec<&str> = sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["another", "site"]);
        assert!(sites[0].routes.paths().is_empty());
        Ok(())
    }
}
