use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{PageError, PagesFailed};
use crate::utils;

/// 字符串键到结构化值的映射，front matter 与共享数据都使用它
pub type Metadata = Map<String, Value>;

/// 全站共享数据，每次构建重新加载，构建期间只读
pub type SharedData = Metadata;

/// 渲染上下文中保留给页面正文的键
pub const CONTENT_KEY: &str = "content";

/// 页面正文的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Markdown,
    /// 原样输出（例如手写的 HTML 页面）
    Raw,
}

/// 单个页面，只在一次构建中存在
#[derive(Debug, Clone)]
pub struct Page {
    /// 源文件路径
    pub source: PathBuf,
    /// 文件原始内容
    pub raw: String,
}

impl Page {
    pub fn new(source: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            raw: raw.into(),
        }
    }

    /// 读取页面文件
    pub fn read(path: &Path) -> Result<Self, PageError> {
        let raw = fs::read_to_string(path).map_err(|source| PageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, raw))
    }

    /// 文件扩展名（不含点）
    pub fn extension(&self) -> Option<&str> {
        self.source.extension().and_then(|e| e.to_str())
    }

    pub fn content_kind(&self, markdown_extensions: &[String]) -> ContentKind {
        if utils::is_markdown_file(&self.source, markdown_extensions) {
            ContentKind::Markdown
        } else {
            ContentKind::Raw
        }
    }

    /// 输出文件名：`hello.md` -> `hello.html`
    pub fn output_name(&self) -> Result<String, PageError> {
        utils::output_file_name(&self.source).ok_or_else(|| PageError::OutputName {
            path: self.source.clone(),
        })
    }
}

/// 传给布局模板的全部变量
///
/// 合并顺序固定：先共享数据，再页面 front matter（同名键覆盖共享数据），
/// 最后写入 `content`，因此正文永远不会被同名键覆盖。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext(Metadata);

impl RenderContext {
    pub fn new(shared: &SharedData, front_matter: Metadata, content: String) -> Self {
        let mut vars = shared.clone();
        vars.extend(front_matter);
        vars.insert(CONTENT_KEY.to_string(), Value::String(content));
        Self(vars)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn content(&self) -> &str {
        self.0
            .get(CONTENT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Metadata {
        &self.0
    }

    pub fn to_tera(&self) -> tera::Result<tera::Context> {
        tera::Context::from_serialize(&self.0)
    }
}

/// 单个页面的失败记录
#[derive(Debug)]
pub struct PageFailure {
    pub source: PathBuf,
    pub error: PageError,
}

/// 一次构建的结果
#[derive(Debug, Default)]
pub struct BuildReport {
    /// 已写出的 HTML 文件
    pub generated: Vec<PathBuf>,
    pub failures: Vec<PageFailure>,
    /// 复制的资源文件数；没有资源目录时为 `None`
    pub assets_copied: Option<usize>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// 一次性构建的结论：任何页面失败都是错误，命令行据此以非零状态退出
    pub fn check(&self) -> Result<(), PagesFailed> {
        if self.is_success() {
            Ok(())
        } else {
            Err(PagesFailed(self.failures.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_page_overrides_shared() {
        let shared = map(json!({"title": "A", "author": "X"}));
        let front = map(json!({"title": "B"}));
        let ctx = RenderContext::new(&shared, front, String::new());
        assert_eq!(ctx.get("title"), Some(&json!("B")));
        assert_eq!(ctx.get("author"), Some(&json!("X")));
    }

    #[test]
    fn test_content_always_wins() {
        let shared = map(json!({"content": "from shared"}));
        let front = map(json!({"content": "from page"}));
        let ctx = RenderContext::new(&shared, front, "<p>body</p>".to_string());
        assert_eq!(ctx.content(), "<p>body</p>");
        assert_eq!(ctx.as_map().len(), 1);
    }

    #[test]
    fn test_page_attributes() {
        let md = vec!["md".to_string()];
        let page = Page::new("pages/hello.md", "# Hi");
        assert_eq!(page.extension(), Some("md"));
        assert_eq!(page.content_kind(&md), ContentKind::Markdown);
        assert_eq!(page.output_name().unwrap(), "hello.html");

        let raw = Page::new("pages/contact.html", "<p>hi</p>");
        assert_eq!(raw.content_kind(&md), ContentKind::Raw);
        assert_eq!(raw.output_name().unwrap(), "contact.html");
    }

    #[test]
    fn test_report_check() {
        let mut report = BuildReport::default();
        assert!(report.check().is_ok());

        report.failures.push(PageFailure {
            source: PathBuf::from("pages/bad.md"),
            error: PageError::OutputName {
                path: PathBuf::from("pages/bad.md"),
            },
        });
        let err = report.check().unwrap_err();
        assert_eq!(err.0, 1);
        assert_eq!(err.to_string(), "1 page(s) failed to build");
    }

    #[test]
    fn test_read_missing_page() {
        let err = Page::read(Path::new("/definitely/not/here.md")).unwrap_err();
        assert!(matches!(err, PageError::Read { .. }));
    }
}
