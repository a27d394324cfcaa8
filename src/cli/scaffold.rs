use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pocket::models::config::{CONFIG_FILE, DEFAULT_DATA_FILE};

// 默认配置文件，所有值均为默认值
const DEFAULT_CONFIG: &str = r#"# 目录配置
pages_dir: pages
templates_dir: templates
assets_dir: assets
output_dir: site

# 模板配置
layout: layout.html
partials_dir: partials
partial_prefix: _
partial_extension: html

# 写作配置
markdown_extensions:
  - md
  - markdown

# 构建前清空输出目录
clean: false

# 监视模式下的去抖时间（毫秒）
debounce_ms: 300
"#;

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{% if title %}{{ title }} | {% endif %}{{ site_name }}</title>
  <link rel="stylesheet" href="/assets/css/style.css">
</head>
<body>
  {{ render_partial(name="header", site_name=site_name) }}
  <main>
{{ content }}
  </main>
</body>
</html>
"#;

const HEADER_HTML: &str = r#"<header>
  <a href="/index.html">{{ site_name }}</a>
  <nav><a href="/about.html">About</a></nav>
</header>
"#;

const INDEX_MD: &str = r#"---
title: Home
---

# Welcome

This page was generated from `pages/index.md`.

Edit it, save, and the site rebuilds itself.
"#;

const ABOUT_HTML: &str = r#"---
title: About
---
<h1>About</h1>
<p>Pages with any extension other than <code>.md</code> are copied into the layout as-is.</p>
"#;

const STYLE_CSS: &str = r#"body {
  font-family: system-ui, sans-serif;
  max-width: 42rem;
  margin: 2rem auto;
  line-height: 1.6;
}

header {
  display: flex;
  justify-content: space-between;
}
"#;

// 初始化网站文件结构，包括默认模板和示例页面
pub fn initialize_site_structure(site_path: &Path, site_title: &str) -> Result<()> {
    let pages_dir = site_path.join("pages");
    let templates_dir = site_path.join("templates");
    let partials_dir = templates_dir.join("partials");
    let css_dir = site_path.join("assets").join("css");

    for dir in [&pages_dir, &templates_dir, &partials_dir, &css_dir] {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut data = BTreeMap::new();
    data.insert("site_name", site_title);
    let data_yaml = serde_yaml::to_string(&data)?;

    let files = [
        (site_path.join(CONFIG_FILE), DEFAULT_CONFIG),
        (site_path.join(DEFAULT_DATA_FILE), data_yaml.as_str()),
        (templates_dir.join("layout.html"), LAYOUT_HTML),
        (partials_dir.join("_header.html"), HEADER_HTML),
        (pages_dir.join("index.md"), INDEX_MD),
        (pages_dir.join("about.html"), ABOUT_HTML),
        (css_dir.join("style.css"), STYLE_CSS),
    ];

    for (path, content) in files {
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
