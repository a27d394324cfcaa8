use crate::core::error::PageError;
use crate::core::front_matter;
use crate::models::{ContentKind, Page, RenderContext, SharedData};
use crate::theme::ThemeRenderer;
use crate::utils::markdown;

/// 页面渲染器：front matter -> 正文转换 -> 合并数据 -> 布局
pub struct PageRenderer<'a> {
    theme: &'a ThemeRenderer,
    markdown_extensions: &'a [String],
}

impl<'a> PageRenderer<'a> {
    pub fn new(theme: &'a ThemeRenderer, markdown_extensions: &'a [String]) -> Self {
        Self {
            theme,
            markdown_extensions,
        }
    }

    /// 生成页面的渲染上下文
    pub fn context(&self, page: &Page, shared: &SharedData) -> Result<RenderContext, PageError> {
        let (front_matter, body) =
            front_matter::parse(&page.raw).map_err(|source| PageError::FrontMatter {
                path: page.source.clone(),
                source,
            })?;

        let content = match page.content_kind(self.markdown_extensions) {
            ContentKind::Markdown => markdown::render(body),
            ContentKind::Raw => body.to_string(),
        };

        Ok(RenderContext::new(shared, front_matter, content))
    }

    /// 渲染单个页面为完整 HTML
    pub fn render(&self, page: &Page, shared: &SharedData) -> Result<String, PageError> {
        let context = self.context(page, shared)?;
        self.theme.render(&context).map_err(|source| PageError::Render {
            path: page.source.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::PartialRenderer;
    use serde_json::{json, Value};

    fn theme(source: &str) -> ThemeRenderer {
        ThemeRenderer::from_source(
            "layout.html",
            source,
            PartialRenderer::with_naming("/nonexistent", "_", "html"),
        )
        .unwrap()
    }

    fn md() -> Vec<String> {
        vec!["md".to_string(), "markdown".to_string()]
    }

    fn shared(value: Value) -> SharedData {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_markdown_page() {
        let theme = theme("<body>{{ content }}</body>");
        let exts = md();
        let renderer = PageRenderer::new(&theme, &exts);
        let html = renderer
            .render(&Page::new("pages/hello.md", "# Hi"), &SharedData::new())
            .unwrap();
        assert_eq!(html, "<body><h1>Hi</h1>\n</body>");
    }

    #[test]
    fn test_raw_page_passes_through() {
        let theme = theme("<body>{{ content }}</body>");
        let exts = md();
        let renderer = PageRenderer::new(&theme, &exts);
        let html = renderer
            .render(&Page::new("pages/raw.html", "# not markdown"), &SharedData::new())
            .unwrap();
        assert_eq!(html, "<body># not markdown</body>");
    }

    #[test]
    fn test_same_as_rendering_content_directly() {
        let layout = theme("<main>{{ content }}</main>");
        let exts = md();
        let renderer = PageRenderer::new(&layout, &exts);
        let raw = "Some *text*\n\n- a\n- b\n";

        let rendered = renderer
            .render(&Page::new("pages/p.md", raw), &SharedData::new())
            .unwrap();
        let direct = layout
            .render(&RenderContext::new(&SharedData::new(), Default::default(), markdown::render(raw)))
            .unwrap();
        assert_eq!(rendered, direct);
    }

    #[test]
    fn test_merge_precedence() {
        let layout = theme("");
        let exts = md();
        let renderer = PageRenderer::new(&layout, &exts);
        let page = Page::new("pages/p.md", "---\ntitle: B\n---\nbody");

        let ctx = renderer
            .context(&page, &shared(json!({"title": "A", "author": "X"})))
            .unwrap();
        assert_eq!(ctx.get("title"), Some(&json!("B")));
        assert_eq!(ctx.get("author"), Some(&json!("X")));
        assert_eq!(ctx.content(), "<p>body</p>\n");
    }

    #[test]
    fn test_front_matter_cannot_replace_content() {
        let layout = theme("{{ content }}");
        let exts = md();
        let renderer = PageRenderer::new(&layout, &exts);
        let page = Page::new("pages/p.html", "---\ncontent: hijacked\n---\nreal");
        assert_eq!(renderer.render(&page, &SharedData::new()).unwrap(), "real");
    }

    #[test]
    fn test_shared_and_page_values() {
        let layout = theme("<title>{{ title }} | {{ site_name }}</title>{{ content }}");
        let exts = md();
        let renderer = PageRenderer::new(&layout, &exts);
        let page = Page::new("pages/about.md", "---\ntitle: About\n---\nText");

        let html = renderer
            .render(&page, &shared(json!({"site_name": "Demo"})))
            .unwrap();
        assert!(html.contains("<title>About | Demo</title>"));
        assert!(html.contains("<p>Text</p>"));
    }

    #[test]
    fn test_front_matter_error_names_page() {
        let layout = theme("{{ content }}");
        let exts = md();
        let renderer = PageRenderer::new(&layout, &exts);
        let page = Page::new("pages/broken.md", "---\ntitle: [oops\n---\n");

        let err = renderer.render(&page, &SharedData::new()).unwrap_err();
        assert!(matches!(err, PageError::FrontMatter { ref path, .. } if path.ends_with("broken.md")));
    }

    #[test]
    fn test_undefined_variable_is_render_error() {
        let layout = theme("{{ missing }}");
        let exts = md();
        let renderer = PageRenderer::new(&layout, &exts);
        let err = renderer
            .render(&Page::new("pages/a.md", "x"), &SharedData::new())
            .unwrap_err();
        assert!(matches!(err, PageError::Render { .. }));
    }
}
