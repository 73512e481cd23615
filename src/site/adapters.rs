//! The `.Site` and `.Page` data adapters.

use serde_json::{Map, Value, json};

use crate::template::{DataAdapter, value::descend};
use super::page::Page;

/// `.Site.Title`, `.Site.Name`, `.Site.Hosts`, `.Site.Data.x`, and
/// `.Site.Pages` (list of `{Path, Title}`, sorted by path).
#[derive(Debug, Clone)]
pub struct SiteAdapter {
    title: Value,
    name: Value,
    hosts: Value,
    data: Value,
    pages: Value,
}

impl SiteAdapter {
    pub fn new<'p>(
        title: &str, name: &str, hosts: &[String], data: &Value,
        pages: impl Iterator<Item = &'p Page>
    ) -> Self {
        let mut pages: Vec<&Page> = pages.collect();
        pages.sort_by(|a, b| a.url_path.cmp(&b.url_path));
        SiteAdapter {
            title: json!(title),
            name: json!(name),
            hosts: json!(hosts),
            data: data.clone(),
            pages: Value::Array(pages.into_iter().map(|p| json!({
                "Path": p.url_path,
                "Title": p.title,
            })).collect()),
        }
    }
}

impl DataAdapter for SiteAdapter {
    fn get(&self, path: &[&str]) -> Option<Value> {
        let (field, rest) = match path {
            [_prefix] => return Some(json!({
                "Title": self.title,
                "Name": self.name,
                "Hosts": self.hosts,
                "Data": self.data,
                "Pages": self.pages,
            })),
            [_prefix, field, rest @ ..] => (*field, rest),
            [] => return None,
        };
        let value = match field {
            "Title" => &self.title,
            "Name" => &self.name,
            "Hosts" => &self.hosts,
            "Data" => &self.data,
            "Pages" => &self.pages,
            _ => return None
        };
        descend(value, rest).cloned()
    }
}

/// `.Page.Title`, `.Page.Path`, `.Page.Params.x`, and once the page
/// itself has been rendered, `.Page.Content`.
#[derive(Debug, Clone)]
pub struct PageAdapter {
    fields: Value,
}

impl PageAdapter {
    pub fn new(page: &Page, content: Option<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("Title".into(), json!(page.title));
        fields.insert("Path".into(), json!(page.url_path));
        fields.insert("File".into(), json!(page.relpath));
        fields.insert("Params".into(), Value::Object(page.params.clone()));
        if let Some(content) = content {
            fields.insert("Content".into(), Value::String(content));
        }
        PageAdapter { fields: Value::Object(fields) }
    }
}

impl DataAdapter for PageAdapter {
    fn get(&self, path: &[&str]) -> Option<Value> {
        descend(&self.fields, path.get(1..)?).cloned()
    }
}
