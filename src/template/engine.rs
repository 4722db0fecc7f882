//! Template engine - owns the live document for one render
//!
//! An engine is meant to serve a single request at a time: the document and
//! the variable store are exclusively owned, while the template cache can be
//! shared between engines through [`TemplateLoader::with_cache`].

use indexmap::IndexMap;
use std::sync::Arc;

use super::assets::{self, AssetRecord};
use super::directives::{self, Directive};
use super::loader::{TemplateLoader, TemplateSource};
use super::placeholders;
use super::vars::{DataModel, Value, VariableStore};
use crate::config::EngineConfig;
use crate::dom::{Document, NodeId};
use crate::error::{Result, TemplateError};

pub struct TemplateEngine {
    loader: TemplateLoader,
    vars: VariableStore,
    document: Option<Document>,
    base_uri: String,
    assets: Vec<AssetRecord>,
    escape_placeholders: bool,
}

impl TemplateEngine {
    /// Create an engine with an empty variable store
    pub fn new(loader: TemplateLoader) -> Self {
        Self {
            loader,
            vars: VariableStore::new(),
            document: None,
            base_uri: "/".to_string(),
            assets: Vec::new(),
            escape_placeholders: false,
        }
    }

    /// Create an engine seeded from a data model
    pub fn with_model(loader: TemplateLoader, model: &dyn DataModel) -> Self {
        let mut engine = Self::new(loader);
        engine.vars = VariableStore::from_model(model);
        engine
    }

    /// Create an engine from configuration, reading templates from disk
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::configured(TemplateLoader::new(&config.template_dir), config)
    }

    /// Create an engine from configuration with a custom template source
    pub fn from_config_with_source<S: TemplateSource + 'static>(
        config: &EngineConfig,
        source: S,
    ) -> Self {
        Self::configured(TemplateLoader::with_source(&config.template_dir, source), config)
    }

    fn configured(loader: TemplateLoader, config: &EngineConfig) -> Self {
        let mut engine = Self::new(loader)
            .with_base_uri(&config.base_uri)
            .with_assets(config.assets.clone())
            .with_escaping(config.escape_placeholders);
        engine.vars.merge(config.seed_variables());
        engine
    }

    pub fn with_base_uri(mut self, base_uri: &str) -> Self {
        self.base_uri = base_uri.to_string();
        self
    }

    /// Assets injected by [`render`](Self::render), kept sorted by priority
    pub fn with_assets(mut self, mut assets: Vec<AssetRecord>) -> Self {
        assets::sort_by_priority(&mut assets);
        self.assets = assets;
        self
    }

    /// HTML-escape placeholder values during substitution
    pub fn with_escaping(mut self, escape: bool) -> Self {
        self.escape_placeholders = escape;
        self
    }

    pub fn loader(&self) -> &TemplateLoader {
        &self.loader
    }

    pub fn variables(&self) -> &VariableStore {
        &self.vars
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn assets(&self) -> &[AssetRecord] {
        &self.assets
    }

    /// Set a variable
    pub fn assign<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.vars.assign(key, value);
    }

    /// Merge a map of variables; later keys overwrite earlier ones
    pub fn assign_all(&mut self, values: IndexMap<String, Value>) {
        self.vars.merge(values);
    }

    /// Merge every attribute of a data model
    pub fn assign_model(&mut self, model: &dyn DataModel) {
        self.vars.merge(model.attributes());
    }

    pub fn clear_variables(&mut self) {
        self.vars.clear();
    }

    pub fn clear_cache(&self) {
        self.loader.clear_cache();
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.loader.has_template(name)
    }

    pub fn template_names(&self) -> Vec<String> {
        self.loader.template_names()
    }

    /// Load raw template content. With `is_base`, the content also becomes
    /// the live document, replacing any previous one.
    pub fn load_template(&mut self, name: &str, is_base: bool) -> Result<String> {
        let content = self.loader.load(name)?;
        if is_base {
            self.document = Some(Document::parse(&content));
            tracing::debug!("Loaded base template: {}", name);
        }
        Ok(content.to_string())
    }

    /// Use an HTML string as the live document
    pub fn load_html(&mut self, html: &str) {
        self.document = Some(Document::parse(html));
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Result<&Document> {
        self.document.as_ref().ok_or(TemplateError::NoDocumentLoaded)
    }

    pub fn document_mut(&mut self) -> Result<&mut Document> {
        self.document.as_mut().ok_or(TemplateError::NoDocumentLoaded)
    }

    /// Drop the live document
    pub fn take_document(&mut self) -> Option<Document> {
        self.document.take()
    }

    pub fn find(&self, selector: &str) -> Result<Option<NodeId>> {
        self.document()?.find(selector)
    }

    pub fn find_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.document()?.find_all(selector)
    }

    /// Load a template and append it as the last children of the element with `host_id`
    pub fn inject_view(&mut self, name: &str, host_id: &str) -> Result<()> {
        let host = self
            .document()?
            .element_by_id(host_id)
            .ok_or_else(|| TemplateError::InvalidHostNode(host_id.to_string()))?;
        let content = self.loader.load(name)?;

        let doc = self.document_mut()?;
        let nodes = doc.parse_fragment(&content);
        if !doc.append_child(host, nodes) {
            return Err(TemplateError::InvalidHostNode(host_id.to_string()));
        }
        tracing::debug!("Injected view '{}' into #{}", name, host_id);
        Ok(())
    }

    /// Run every directive pass over the live document
    pub fn process_directives(&mut self) -> Result<()> {
        let doc = self.document.as_mut().ok_or(TemplateError::NoDocumentLoaded)?;
        directives::process_all(doc, &self.vars, &self.loader)
    }

    /// Run a single directive pass; returns how many elements it processed
    pub fn process_directive(&mut self, directive: Directive) -> Result<usize> {
        let doc = self.document.as_mut().ok_or(TemplateError::NoDocumentLoaded)?;
        directive.apply(doc, &self.vars, &self.loader)
    }

    /// Append stylesheet and script tags for `assets`, in the given order
    pub fn inject_assets(&mut self, assets: &[AssetRecord]) -> Result<()> {
        let doc = self.document.as_mut().ok_or(TemplateError::NoDocumentLoaded)?;
        assets::inject_assets(doc, &self.base_uri, assets)
    }

    /// Serialize the live document
    pub fn save_html(&self) -> Result<String> {
        Ok(self.document()?.to_html())
    }

    /// Replace `{{ path }}` placeholders in serialized HTML
    pub fn substitute_placeholders(&self, html: &str) -> String {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let missing = placeholders::unresolved_paths(html, &self.vars);
            if !missing.is_empty() {
                tracing::debug!("Unresolved placeholders: {}", missing.join(", "));
            }
        }
        placeholders::substitute(html, &self.vars, self.escape_placeholders)
    }

    /// Full pipeline: load the base template, run the directive passes,
    /// inject the configured assets, serialize, substitute placeholders
    pub fn render(&mut self, name: &str, variables: &dyn DataModel) -> Result<String> {
        self.assign_model(variables);
        self.load_template(name, true)?;
        self.finish()
    }

    /// Same as [`render`](Self::render) for a template given as a string
    pub fn render_string(&mut self, html: &str, variables: &dyn DataModel) -> Result<String> {
        self.assign_model(variables);
        self.load_html(html);
        self.finish()
    }

    fn finish(&mut self) -> Result<String> {
        self.process_directives()?;
        if !self.assets.is_empty() {
            let assets = std::mem::take(&mut self.assets);
            let injected = self.inject_assets(&assets);
            self.assets = assets;
            injected?;
        }
        let html = self.save_html()?;
        Ok(self.substitute_placeholders(&html))
    }
}

/// Render one template with a fresh engine sharing `cache`
pub fn render_with_cache(
    config: &EngineConfig,
    cache: Arc<super::loader::TemplateCache>,
    name: &str,
    variables: &dyn DataModel,
) -> Result<String> {
    let loader = TemplateLoader::new(&config.template_dir).with_cache(cache);
    TemplateEngine::configured(loader, config).render(name, variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::loader::tests::CountingSource;
    use crate::template::loader::TemplateCache;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const LAYOUT: &str = "<!DOCTYPE html><html><head><title>{{ title }}</title></head>\
<body><header data-include=\"partials/nav\"></header>\
<main id=\"content\"></main>\
<ul data-template=\"items\"><li>{{item}}-{{index}}</li></ul>\
<section data-view=\"promo\" data-if=\"show_promo\"></section>\
<form data-model=\"user\"><input data-bind=\"user.name\"><p data-bind=\"user.email\"></p></form>\
</body></html>";

    fn source() -> CountingSource {
        CountingSource::new(
            "/t",
            &[
                ("layout.html", LAYOUT),
                ("partials/nav.html", "<nav>{{ site.name }}</nav>"),
                ("promo.html", "<strong>Sale</strong>"),
                ("article.html", "<article>{{ body }}</article>"),
            ],
        )
    }

    fn engine(source: &CountingSource) -> TemplateEngine {
        TemplateEngine::new(TemplateLoader::with_source("/t", source.clone()))
    }

    fn variables() -> IndexMap<String, Value> {
        let mut vars = IndexMap::new();
        vars.insert("title".to_string(), Value::from("Home"));
        vars.insert("items".to_string(), Value::from(vec!["a", "b"]));
        vars.insert("show_promo".to_string(), Value::from(true));
        vars.insert("site".to_string(), Value::from(json!({"name": "Weave"})));
        vars.insert(
            "user".to_string(),
            Value::from(json!({"name": "Ada", "email": "ada@example.com"})),
        );
        vars
    }

    #[test]
    fn test_render_full_pipeline() {
        let source = source();
        let mut engine = engine(&source);
        let html = engine.render("layout", &variables()).unwrap();
        assert_eq!(
            html,
            "<!DOCTYPE html><html><head><title>Home</title></head>\
<body><nav>Weave</nav>\
<main id=\"content\"></main>\
<ul><li>a-0</li><li>b-1</li></ul>\
<section><strong>Sale</strong></section>\
<form><input value=\"Ada\"><p>ada@example.com</p></form>\
</body></html>"
        );
    }

    #[test]
    fn test_render_leaves_no_directives_or_placeholders() {
        let source = source();
        let mut engine = engine(&source);
        let mut vars = variables();
        vars.shift_remove("site");
        let html = engine.render("layout", &vars).unwrap();
        for attr in ["data-include", "data-template", "data-view", "data-model", "data-bind", "data-if"] {
            assert!(!html.contains(attr), "{} left in {}", attr, html);
        }
        assert!(!html.contains("{{"));
        assert!(html.contains("<nav></nav>"));
    }

    #[test]
    fn test_false_condition_drops_view() {
        let source = source();
        let mut engine = engine(&source);
        let mut vars = variables();
        vars.insert("show_promo".to_string(), Value::from(false));
        let html = engine.render("layout", &vars).unwrap();
        assert!(!html.contains("<section"));
        assert!(!html.contains("Sale"));
    }

    #[test]
    fn test_missing_view_renders_error_comment() {
        let source = CountingSource::new(
            "/t",
            &[("page.html", "<div data-view=\"ghost\" data-if=\"flag\"></div><p>ok</p>")],
        );
        let mut engine = engine(&source);
        engine.assign("flag", true);
        let html = engine.render("page", &IndexMap::<String, Value>::new()).unwrap();
        assert!(html.contains("<!-- View Error: Template not found: /t/ghost.html -->"));
        assert!(html.ends_with("<p>ok</p>"));
    }

    #[test]
    fn test_missing_base_template_is_fatal() {
        let source = source();
        let mut engine = engine(&source);
        let err = engine.render("nope", &IndexMap::<String, Value>::new()).unwrap_err();
        assert!(matches!(err, TemplateError::TemplateNotFound(_)));
        assert!(!engine.has_document());
    }

    #[test]
    fn test_load_template_reads_file_once() {
        let source = source();
        let mut engine = engine(&source);
        let first = engine.load_template("article", false).unwrap();
        let second = engine.load_template("article", false).unwrap();
        assert_eq!(first, second);
        assert_eq!(source.reads(), 1);
        assert!(!engine.has_document());

        engine.clear_cache();
        engine.load_template("article", true).unwrap();
        assert_eq!(source.reads(), 2);
        assert!(engine.has_document());
    }

    #[test]
    fn test_queries_need_a_document() {
        let source = source();
        let mut engine = engine(&source);
        assert!(matches!(engine.save_html(), Err(TemplateError::NoDocumentLoaded)));
        assert!(matches!(engine.find("div"), Err(TemplateError::NoDocumentLoaded)));
        assert!(matches!(engine.find_all("div"), Err(TemplateError::NoDocumentLoaded)));
        assert!(matches!(
            engine.inject_view("article", "content"),
            Err(TemplateError::NoDocumentLoaded)
        ));
        assert!(matches!(
            engine.process_directives(),
            Err(TemplateError::NoDocumentLoaded)
        ));
    }

    #[test]
    fn test_inject_view_appends_under_host() {
        let source = source();
        let mut engine = engine(&source);
        engine.load_html("<main id=\"content\"><h1>t</h1></main>");
        engine.inject_view("article", "content").unwrap();
        assert_eq!(
            engine.save_html().unwrap(),
            "<main id=\"content\"><h1>t</h1><article>{{ body }}</article></main>"
        );

        engine.assign("body", "Hello");
        let html = engine.save_html().unwrap();
        assert_eq!(
            engine.substitute_placeholders(&html),
            "<main id=\"content\"><h1>t</h1><article>Hello</article></main>"
        );
    }

    #[test]
    fn test_inject_view_rejects_missing_host() {
        let source = source();
        let mut engine = engine(&source);
        engine.load_html("<main id=\"content\"></main>");
        let err = engine.inject_view("article", "sidebar").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidHostNode(id) if id == "sidebar"));
        assert_eq!(source.reads(), 0);
    }

    #[test]
    fn test_configured_assets_are_injected_by_priority() {
        let source = source();
        let mut engine = engine(&source).with_base_uri("/static").with_assets(vec![
            AssetRecord::new("js/app.js", 5),
            AssetRecord::new("css/site.css", 10),
        ]);
        let html = engine.render("layout", &variables()).unwrap();
        assert!(html.contains(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"/static/css/site.css\"></head>"
        ));
        assert!(html.contains(
            "<script type=\"text/javascript\" src=\"/static/js/app.js\"></script></body>"
        ));
        assert_eq!(engine.find_all("link").unwrap().len(), 1);
        assert_eq!(engine.find_all("script").unwrap().len(), 1);
    }

    #[test]
    fn test_unsupported_asset_fails_render() {
        let source = source();
        let mut engine = engine(&source).with_assets(vec![AssetRecord::new("logo.svg", 1)]);
        let err = engine.render("layout", &variables()).unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedAssetType { .. }));
        assert_eq!(engine.assets().len(), 1);
    }

    #[test]
    fn test_model_seeds_variables() {
        let source = source();
        let mut model = IndexMap::new();
        model.insert("title".to_string(), Value::from("Seeded"));
        let mut engine =
            TemplateEngine::with_model(TemplateLoader::with_source("/t", source.clone()), &model);
        assert_eq!(engine.variables().resolve("title"), "Seeded");

        let html = engine
            .render_string("<h1>{{ title }}</h1><p>{{ extra }}</p>", &IndexMap::<String, Value>::new())
            .unwrap();
        assert_eq!(html, "<h1>Seeded</h1><p></p>");

        engine.clear_variables();
        assert!(engine.variables().is_empty());
    }

    #[test]
    fn test_escaping_switch() {
        let source = source();
        let mut engine = engine(&source).with_escaping(true);
        engine.assign("name", "<b>x</b>");
        let html = engine.render_string("<p>{{name}}</p>", &IndexMap::<String, Value>::new()).unwrap();
        assert_eq!(html, "<p>&lt;b&gt;x&lt;/b&gt;</p>");
    }

    #[test]
    fn test_single_directive_pass() {
        let source = source();
        let mut engine = engine(&source);
        engine.assign("items", vec!["x"]);
        engine.load_html("<ol data-template=\"items\"><li>{{item}}</li></ol><div data-include=\"promo\"></div>");
        assert_eq!(engine.process_directive(Directive::Template).unwrap(), 1);
        assert_eq!(
            engine.save_html().unwrap(),
            "<ol><li>x</li></ol><div data-include=\"promo\"></div>"
        );
    }

    #[test]
    fn test_engines_share_cache() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("page.html"), "<p>{{ who }}</p>").unwrap();
        let config = EngineConfig {
            template_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let cache = Arc::new(TemplateCache::new());

        let mut vars = IndexMap::new();
        vars.insert("who".to_string(), Value::from("first"));
        let first = render_with_cache(&config, cache.clone(), "page", &vars).unwrap();
        assert_eq!(first, "<p>first</p>");

        fs::remove_file(dir.path().join("page.html")).unwrap();
        vars.insert("who".to_string(), Value::from("second"));
        let second = render_with_cache(&config, cache.clone(), "page", &vars).unwrap();
        assert_eq!(second, "<p>second</p>");
        assert_eq!(cache.len(), 1);
    }
}
