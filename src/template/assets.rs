//! Asset injection - stylesheet and script tags for the rendered page

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dom::{Document, NodeId};
use crate::error::{Result, TemplateError};

/// Characters escaped in asset paths; `/`, `?`, `#` and `%` pass through
const PATH_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A stylesheet or script to inject, ordered by descending priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(alias = "filePath", alias = "path")]
    pub file_path: String,
    #[serde(default)]
    pub priority: i32,
}

/// Kind of tag an asset becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// `<link rel="stylesheet">` in `<head>`
    Stylesheet,
    /// `<script src>` at the end of `<body>`
    Script,
}

impl AssetRecord {
    pub fn new(file_path: &str, priority: i32) -> Self {
        Self {
            file_path: file_path.to_string(),
            priority,
        }
    }

    /// Determine the tag kind from the file extension (query and fragment ignored)
    pub fn kind(&self) -> Result<AssetKind> {
        let path = self
            .file_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "css" => Ok(AssetKind::Stylesheet),
            "js" => Ok(AssetKind::Script),
            _ => Err(TemplateError::UnsupportedAssetType {
                path: self.file_path.clone(),
                extension,
            }),
        }
    }
}

/// Sort by descending priority; equal priorities keep their order
pub fn sort_by_priority(assets: &mut [AssetRecord]) {
    assets.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Join the base URI and an asset path with exactly one `/`
///
/// # Examples
/// ```ignore
/// asset_url("https://cdn.example.com/", "/css/site.css") // -> "https://cdn.example.com/css/site.css"
/// ```
pub fn asset_url(base_uri: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//") {
        return path.to_string();
    }
    let base = base_uri.trim_end_matches('/');
    let path = utf8_percent_encode(path.trim_start_matches('/'), PATH_UNSAFE).to_string();
    format!("{}/{}", base, path)
}

/// Append a tag per asset: stylesheets to `<head>`, scripts to `<body>`, in
/// input order. Every asset is checked first, so an unsupported type leaves
/// the document untouched.
pub fn inject_assets(doc: &mut Document, base_uri: &str, assets: &[AssetRecord]) -> Result<()> {
    let kinds = assets
        .iter()
        .map(AssetRecord::kind)
        .collect::<Result<Vec<_>>>()?;

    for (asset, kind) in assets.iter().zip(kinds) {
        let url = asset_url(base_uri, &asset.file_path);
        match kind {
            AssetKind::Stylesheet => {
                let head = ensure_head(doc);
                let link = doc.create_element_with(
                    "link",
                    &[("rel", "stylesheet"), ("type", "text/css"), ("href", url.as_str())],
                );
                doc.append_child(head, link);
            }
            AssetKind::Script => {
                let body = ensure_body(doc);
                let script = doc
                    .create_element_with("script", &[("type", "text/javascript"), ("src", url.as_str())]);
                doc.append_child(body, script);
            }
        }
        tracing::debug!("Injected {:?} asset: {}", kind, url);
    }
    Ok(())
}

fn ensure_head(doc: &mut Document) -> NodeId {
    if let Some(head) = doc.first_element_named("head") {
        return head;
    }
    let head = doc.create_element("head");
    let parent = doc.first_element_named("html").unwrap_or(doc.root());
    doc.prepend_child(parent, head);
    head
}

fn ensure_body(doc: &mut Document) -> NodeId {
    if let Some(body) = doc.first_element_named("body") {
        return body;
    }
    let body = doc.create_element("body");
    let parent = doc.first_element_named("html").unwrap_or(doc.root());
    doc.append_child(parent, body);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head><title>t</title></head><body><main></main></body></html>";

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(AssetRecord::new("a/site.CSS", 1).kind().unwrap(), AssetKind::Stylesheet);
        assert_eq!(AssetRecord::new("app.js?v=3", 1).kind().unwrap(), AssetKind::Script);
        let err = AssetRecord::new("logo.png", 1).kind().unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnsupportedAssetType { extension, .. } if extension == "png"
        ));
    }

    #[test]
    fn test_asset_url() {
        assert_eq!(asset_url("/", "css/site.css"), "/css/site.css");
        assert_eq!(
            asset_url("https://cdn.example.com/static/", "/js/app.js"),
            "https://cdn.example.com/static/js/app.js"
        );
        assert_eq!(asset_url("/", "my file.css"), "/my%20file.css");
        assert_eq!(
            asset_url("/", "https://unpkg.com/x.js"),
            "https://unpkg.com/x.js"
        );
    }

    #[test]
    fn test_sort_by_priority_is_stable() {
        let mut assets = vec![
            AssetRecord::new("low.js", 1),
            AssetRecord::new("first.css", 10),
            AssetRecord::new("second.css", 10),
        ];
        sort_by_priority(&mut assets);
        let order: Vec<_> = assets.iter().map(|a| a.file_path.as_str()).collect();
        assert_eq!(order, vec!["first.css", "second.css", "low.js"]);
    }

    #[test]
    fn test_injects_into_head_and_body() {
        let mut doc = Document::parse(PAGE);
        let assets = vec![
            AssetRecord::new("css/site.css", 10),
            AssetRecord::new("js/app.js", 5),
        ];
        inject_assets(&mut doc, "/static", &assets).unwrap();

        let links = doc.find_all("link").unwrap();
        let scripts = doc.find_all("script").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(scripts.len(), 1);

        let head = doc.find("head").unwrap().unwrap();
        let body = doc.find("body").unwrap().unwrap();
        assert_eq!(doc.parent(links[0]), Some(head));
        assert_eq!(doc.parent(scripts[0]), Some(body));
        assert_eq!(doc.attribute(links[0], "href"), Some("/static/css/site.css"));
        assert_eq!(doc.attribute(scripts[0], "src"), Some("/static/js/app.js"));
        assert!(doc.to_html().contains(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"/static/css/site.css\"></head>"
        ));
        assert!(doc.to_html().contains(
            "<script type=\"text/javascript\" src=\"/static/js/app.js\"></script></body>"
        ));
    }

    #[test]
    fn test_injection_keeps_input_order() {
        let mut doc = Document::parse(PAGE);
        let assets = vec![
            AssetRecord::new("b.css", 1),
            AssetRecord::new("a.css", 1),
        ];
        inject_assets(&mut doc, "/", &assets).unwrap();
        let hrefs: Vec<_> = doc
            .find_all("link")
            .unwrap()
            .into_iter()
            .map(|id| doc.attribute(id, "href").unwrap().to_string())
            .collect();
        assert_eq!(hrefs, vec!["/b.css", "/a.css"]);
    }

    #[test]
    fn test_unsupported_asset_leaves_document_untouched() {
        let mut doc = Document::parse(PAGE);
        let before = doc.to_html();
        let assets = vec![AssetRecord::new("a.css", 2), AssetRecord::new("font.woff", 1)];
        let err = inject_assets(&mut doc, "/", &assets).unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedAssetType { .. }));
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn test_missing_head_and_body_are_created() {
        let mut doc = Document::parse("<p>bare</p>");
        let assets = vec![AssetRecord::new("a.css", 2), AssetRecord::new("a.js", 1)];
        inject_assets(&mut doc, "/", &assets).unwrap();
        assert_eq!(
            doc.to_html(),
            "<head><link rel=\"stylesheet\" type=\"text/css\" href=\"/a.css\"></head><p>bare</p><body><script type=\"text/javascript\" src=\"/a.js\"></script></body>"
        );
    }

    #[test]
    fn test_deserialize_records() {
        let assets: Vec<AssetRecord> =
            serde_yaml::from_str("- filePath: css/a.css\n  priority: 3\n- file_path: js/b.js\n")
                .unwrap();
        assert_eq!(assets[0], AssetRecord::new("css/a.css", 3));
        assert_eq!(assets[1], AssetRecord::new("js/b.js", 0));
    }
}
