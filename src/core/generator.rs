use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::core::error::{BuildError, DataError, PageError};
use crate::core::renderer::PageRenderer;
use crate::models::config::DataSource;
use crate::models::{BuildReport, Page, PageFailure, SharedData, SiteConfig};
use crate::theme::ThemeRenderer;
use crate::utils::{self, yaml};

/// 站点构建器
///
/// 每次调用 [`SiteBuilder::build`] 都会重新读取共享数据、布局和全部页面，
/// 构建之间不保留任何状态。
#[derive(Debug, Clone)]
pub struct SiteBuilder {
    config: SiteConfig,
    /// 命令行 `--clean`，重新加载配置后仍然生效
    force_clean: bool,
}

impl SiteBuilder {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            force_clean: false,
        }
    }

    /// 无论 `_config.yml` 如何设置，构建前都清空输出目录
    pub fn force_clean(mut self) -> Self {
        self.force_clean = true;
        self.config.clean = true;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// 重新读取站点根目录下的 `_config.yml`，然后完整构建
    ///
    /// 监视目录的变化需要重启监视才能生效，这里只记录警告。
    pub fn rebuild(&mut self) -> Result<BuildReport, BuildError> {
        let mut config = SiteConfig::load(&self.config.root)?;
        config.clean |= self.force_clean;

        if config.watch_targets() != self.config.watch_targets() {
            warn!("Source locations changed in _config.yml, restart to watch the new paths");
        }
        self.config = config;
        self.build()
    }

    /// 完整构建一次站点
    ///
    /// 单个页面的失败记录在 [`BuildReport::failures`] 中，不会中断其余页面。
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let config = &self.config;
        let output_dir = &config.output_dir;

        if config.clean {
            self.clean_output()?;
        }
        fs::create_dir_all(output_dir).map_err(|e| BuildError::io(output_dir, e))?;

        let shared = self.load_shared_data()?;
        let theme = ThemeRenderer::load(config)?;
        let renderer = PageRenderer::new(&theme, &config.markdown_extensions);

        let mut report = BuildReport::default();
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();

        for source in self.page_sources()? {
            match self.process_page(&renderer, &source, &shared) {
                Ok(output) => {
                    let name = display_name(&output);
                    if let Some(previous) = claimed.insert(name.clone(), source.clone()) {
                        warn!(
                            "{} overwrites output of {} ({})",
                            self.rel(&source),
                            self.rel(&previous),
                            name
                        );
                    }
                    info!("Generated: {}", name);
                    report.generated.push(output);
                }
                Err(err) => {
                    error!("{}", utils::error_chain(&err));
                    report.failures.push(PageFailure { source, error: err });
                }
            }
        }

        report.assets_copied = self.copy_static_files()?;
        if report.assets_copied.is_some() {
            info!("Static files copied.");
        }

        if report.is_success() {
            info!(
                "{}",
                format!("Built {} page(s) into {}", report.generated.len(), self.rel(output_dir)).green()
            );
        } else {
            warn!(
                "{}",
                format!(
                    "Built {} page(s), {} failed",
                    report.generated.len(),
                    report.failures.len()
                )
                .yellow()
            );
        }

        Ok(report)
    }

    /// 加载共享数据
    pub fn load_shared_data(&self) -> Result<SharedData, BuildError> {
        let (path, required) = match &self.config.data {
            DataSource::Required(path) => (path, true),
            DataSource::Optional(path) => (path, false),
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if required {
                    return Err(BuildError::MissingData(path.clone()));
                }
                debug!("No shared data at {}, using empty data", path.display());
                return Ok(SharedData::new());
            }
            Err(e) => return Err(data_error(path, e)),
        };

        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| data_error(path, e))?;
        let data = yaml::to_metadata(value, yaml::TagPolicy::Unwrap).map_err(|e| data_error(path, e))?;

        debug!("Loaded {} shared data key(s) from {}", data.len(), path.display());
        Ok(data)
    }

    /// 页面目录下的直接子文件，按文件名排序，不递归
    pub fn page_sources(&self) -> Result<Vec<PathBuf>, BuildError> {
        let pages_dir = &self.config.pages_dir;
        if !pages_dir.is_dir() {
            return Err(BuildError::MissingPages(pages_dir.clone()));
        }

        let mut sources = Vec::new();
        for entry in WalkDir::new(pages_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            // 指向目录的链接同样跳过，失效的链接留给读取时报告
            if hidden || entry.path().is_dir() {
                debug!("Skipping {}", self.rel(entry.path()));
                continue;
            }
            sources.push(entry.into_path());
        }
        Ok(sources)
    }

    /// 渲染并写出单个页面，返回输出文件路径
    fn process_page(
        &self,
        renderer: &PageRenderer<'_>,
        source: &Path,
        shared: &SharedData,
    ) -> Result<PathBuf, PageError> {
        let page = Page::read(source)?;
        let html = renderer.render(&page, shared)?;

        let output = self.config.output_dir.join(page.output_name()?);
        fs::write(&output, html).map_err(|source| PageError::Write {
            path: output.clone(),
            source,
        })?;
        Ok(output)
    }

    /// 递归复制资源目录到输出目录；资源目录不存在时返回 `None`
    fn copy_static_files(&self) -> Result<Option<usize>, BuildError> {
        let assets_dir = &self.config.assets_dir;
        if !assets_dir.is_dir() {
            debug!("No assets directory at {}", assets_dir.display());
            return Ok(None);
        }

        let target_dir = self.config.assets_output_dir();
        fs::create_dir_all(&target_dir).map_err(|e| BuildError::io(&target_dir, e))?;

        let mut copied = 0;
        for entry in WalkDir::new(assets_dir).min_depth(1).follow_links(true) {
            let entry = entry?;
            let rel_path = entry.path().strip_prefix(assets_dir).unwrap_or(entry.path());
            let dest_path = target_dir.join(rel_path);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest_path).map_err(|e| BuildError::io(&dest_path, e))?;
            } else {
                if let Some(parent) = dest_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
                }
                fs::copy(entry.path(), &dest_path).map_err(|e| BuildError::io(entry.path(), e))?;
                copied += 1;
            }
        }

        debug!("Copied {} asset file(s) to {}", copied, target_dir.display());
        Ok(Some(copied))
    }

    /// 删除输出目录；拒绝删除站点根目录或包含源目录的路径
    fn clean_output(&self) -> Result<(), BuildError> {
        let config = &self.config;
        let output_dir = &config.output_dir;

        let sources: [&Path; 5] = [
            &config.root,
            &config.pages_dir,
            &config.templates_dir,
            &config.assets_dir,
            config.data.path(),
        ];
        // `..` 与符号链接都要先解析，字面比较会放过 `output_dir: ..`
        let output = utils::resolve_path(output_dir).map_err(|e| BuildError::io(output_dir, e))?;
        for source in sources {
            let source = utils::resolve_path(source).map_err(|e| BuildError::io(source, e))?;
            if source.starts_with(&output) {
                return Err(BuildError::UnsafeClean(output_dir.clone()));
            }
        }

        match fs::remove_dir_all(output_dir) {
            Ok(()) => {
                info!("Cleaned {}", self.rel(output_dir));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(output_dir, e)),
        }
    }

    fn rel(&self, path: &Path) -> String {
        utils::display_relative(path, &self.config.root)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn data_error(path: &Path, source: impl Into<DataError>) -> BuildError {
    BuildError::Data {
        path: path.to_path_buf(),
        source: source.into(),
    }
}
