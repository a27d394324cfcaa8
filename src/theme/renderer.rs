use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tera::{Context, Function, Tera, Value};
use tracing::debug;

use crate::core::error::BuildError;
use crate::models::{RenderContext, SiteConfig};
use crate::utils::markdown;

/// 局部模板的最大嵌套深度
const MAX_PARTIAL_DEPTH: usize = 16;

/// 布局模板渲染器
///
/// 每次构建重新读取布局文件，不做缓存。模板中可见的变量只有
/// [`RenderContext`] 里的内容；`render_partial` 函数和 `markdown` 过滤器
/// 在创建时显式注册。
pub struct ThemeRenderer {
    /// 模板引擎
    tera: Tera,
    /// 布局模板名
    layout: String,
}

impl ThemeRenderer {
    /// 从站点配置加载布局模板
    pub fn load(config: &SiteConfig) -> Result<Self, BuildError> {
        let path = config.layout_path();
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BuildError::MissingLayout(path));
            }
            Err(e) => return Err(BuildError::io(path, e)),
        };

        debug!("Loaded layout {}", path.display());
        Self::from_source(&config.layout, &source, PartialRenderer::new(config))
            .map_err(|source| BuildError::Template { path, source })
    }

    /// 直接从模板源码创建渲染器
    pub fn from_source(name: &str, source: &str, partials: PartialRenderer) -> tera::Result<Self> {
        let mut tera = Tera::default();
        configure(&mut tera, partials);
        tera.add_raw_template(name, source)?;

        Ok(ThemeRenderer {
            tera,
            layout: name.to_string(),
        })
    }

    /// 渲染布局
    pub fn render(&self, context: &RenderContext) -> tera::Result<String> {
        self.tera.render(&self.layout, &context.to_tera()?)
    }
}

/// 关闭自动转义，注册过滤器和函数
fn configure(tera: &mut Tera, partials: PartialRenderer) {
    // `{{ content }}` 需要原样输出 HTML
    tera.autoescape_on(vec![]);
    tera.register_filter("markdown", markdown_filter);
    tera.register_function("render_partial", partials);
}

/// `render_partial(name="header", key=value, ...)`
///
/// 读取 `<partials_dir>/<prefix><name>.<ext>`，只以其余关键字参数作为变量渲染。
#[derive(Debug, Clone)]
pub struct PartialRenderer {
    dir: PathBuf,
    prefix: String,
    extension: String,
    depth: usize,
}

impl PartialRenderer {
    pub fn new(config: &SiteConfig) -> Self {
        Self::with_naming(
            config.partials_dir.clone(),
            &config.partial_prefix,
            &config.partial_extension,
        )
    }

    pub fn with_naming(dir: impl Into<PathBuf>, prefix: &str, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            depth: 0,
        }
    }

    /// 局部模板文件路径
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", self.prefix, name, self.extension))
    }

    fn nested(&self) -> tera::Result<Self> {
        if self.depth >= MAX_PARTIAL_DEPTH {
            return Err(tera::Error::msg(format!(
                "render_partial: nesting deeper than {} levels",
                MAX_PARTIAL_DEPTH
            )));
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }

    fn render_partial(&self, name: &str, locals: &HashMap<String, Value>) -> tera::Result<String> {
        let path = self.path_for(name);
        let source = fs::read_to_string(&path).map_err(|e| {
            tera::Error::chain(format!("failed to read partial `{}`", path.display()), e)
        })?;

        let template_name = path.display().to_string();
        let mut tera = Tera::default();
        configure(&mut tera, self.nested()?);
        tera.add_raw_template(&template_name, &source)?;
        tera.render(&template_name, &Context::from_serialize(locals)?)
    }
}

impl Function for PartialRenderer {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("render_partial: missing string argument `name`"))?;

        let mut locals = args.clone();
        locals.remove("name");

        self.render_partial(name, &locals).map(Value::String)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

fn markdown_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    match value.as_str() {
        Some(text) => Ok(Value::String(markdown::render(text))),
        None => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SharedData;
    use serde_json::json;

    fn context(value: serde_json::Value) -> RenderContext {
        let shared: SharedData = match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        };
        RenderContext::new(&shared, Default::default(), "<p>body</p>".to_string())
    }

    fn no_partials() -> PartialRenderer {
        PartialRenderer::with_naming("/nonexistent", "_", "html")
    }

    #[test]
    fn test_content_is_not_escaped() {
        let theme = ThemeRenderer::from_source("layout.html", "<body>{{ content }}</body>", no_partials()).unwrap();
        assert_eq!(theme.render(&context(json!({}))).unwrap(), "<body><p>body</p></body>");
    }

    #[test]
    fn test_variables() {
        let theme =
            ThemeRenderer::from_source("layout.html", "{{ site_name }}: {{ title }}", no_partials()).unwrap();
        let out = theme.render(&context(json!({"site_name": "Demo", "title": "About"}))).unwrap();
        assert_eq!(out, "Demo: About");
    }

    #[test]
    fn test_syntax_error() {
        assert!(ThemeRenderer::from_source("layout.html", "{{ content ", no_partials()).is_err());
    }

    #[test]
    fn test_markdown_filter() {
        let theme = ThemeRenderer::from_source("layout.html", "{{ summary | markdown }}", no_partials()).unwrap();
        let out = theme.render(&context(json!({"summary": "*hi*"}))).unwrap();
        assert_eq!(out, "<p><em>hi</em></p>\n");
    }

    #[test]
    fn test_partial_sees_only_locals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("_header.html"),
            "<h1>{{ heading }}</h1>{% if content is defined %}LEAK{% endif %}",
        )
        .unwrap();

        let partials = PartialRenderer::with_naming(dir.path(), "_", "html");
        let theme = ThemeRenderer::from_source(
            "layout.html",
            r#"{{ render_partial(name="header", heading=title) }}{{ content }}"#,
            partials,
        )
        .unwrap();

        let out = theme.render(&context(json!({"title": "Hello"}))).unwrap();
        assert_eq!(out, "<h1>Hello</h1><p>body</p>");
    }

    #[test]
    fn test_nested_partials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("_outer.html"), r#"[{{ render_partial(name="inner", v=v) }}]"#).unwrap();
        fs::write(dir.path().join("_inner.html"), "{{ v }}").unwrap();

        let partials = PartialRenderer::with_naming(dir.path(), "_", "html");
        let theme =
            ThemeRenderer::from_source("layout.html", r#"{{ render_partial(name="outer", v=1) }}"#, partials)
                .unwrap();
        assert_eq!(theme.render(&context(json!({}))).unwrap(), "[1]");
    }

    #[test]
    fn test_recursive_partial_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("_loop.html"), r#"{{ render_partial(name="loop") }}"#).unwrap();

        let partials = PartialRenderer::with_naming(dir.path(), "_", "html");
        let theme =
            ThemeRenderer::from_source("layout.html", r#"{{ render_partial(name="loop") }}"#, partials).unwrap();
        assert!(theme.render(&context(json!({}))).is_err());
    }

    #[test]
    fn test_missing_partial() {
        let theme = ThemeRenderer::from_source(
            "layout.html",
            r#"{{ render_partial(name="nope") }}"#,
            no_partials(),
        )
        .unwrap();
        assert!(theme.render(&context(json!({}))).is_err());
    }

    #[test]
    fn test_load_missing_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        assert!(matches!(ThemeRenderer::load(&config), Err(BuildError::MissingLayout(_))));
    }

    #[test]
    fn test_partial_path() {
        let partials = PartialRenderer::with_naming("/t/partials", "_", "html");
        assert_eq!(partials.path_for("nav"), PathBuf::from("/t/partials/_nav.html"));
    }
}
