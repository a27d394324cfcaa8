use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::core::watcher::WatchTarget;

/// 站点配置文件名
pub const CONFIG_FILE: &str = "_config.yml";
/// 未显式配置时使用的共享数据文件
pub const DEFAULT_DATA_FILE: &str = "data.yml";

/// `_config.yml` 的内容，所有路径相对于站点根目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pages_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub output_dir: PathBuf,
    /// 布局模板文件名（位于模板目录下）
    pub layout: String,
    /// 局部模板目录，相对于模板目录
    pub partials_dir: PathBuf,
    pub partial_prefix: String,
    pub partial_extension: String,
    /// 显式配置时文件必须存在；未配置时可选地读取 `data.yml`
    pub data_file: Option<PathBuf>,
    pub markdown_extensions: Vec<String>,
    /// 构建前清空输出目录
    pub clean: bool,
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("pages"),
            templates_dir: PathBuf::from("templates"),
            assets_dir: PathBuf::from("assets"),
            output_dir: PathBuf::from("site"),
            layout: "layout.html".to_string(),
            partials_dir: PathBuf::from("partials"),
            partial_prefix: "_".to_string(),
            partial_extension: "html".to_string(),
            data_file: None,
            markdown_extensions: vec!["md".to_string(), "markdown".to_string()],
            clean: false,
            debounce_ms: 300,
        }
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| ConfigError::Yaml(path.to_path_buf(), e))
    }

    /// 解析配置文本；空文件等同于默认配置
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// 共享数据的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// 配置文件中显式指定，缺失即为致命错误
    Required(PathBuf),
    /// 默认路径，缺失时视为空数据
    Optional(PathBuf),
}

impl DataSource {
    pub fn path(&self) -> &Path {
        match self {
            DataSource::Required(path) | DataSource::Optional(path) => path,
        }
    }
}

/// 解析后的站点配置，所有路径都已拼接到站点根目录上
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub pages_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub output_dir: PathBuf,
    pub layout: String,
    pub partials_dir: PathBuf,
    pub partial_prefix: String,
    pub partial_extension: String,
    pub data: DataSource,
    pub markdown_extensions: Vec<String>,
    pub clean: bool,
    pub debounce: Duration,
}

impl SiteConfig {
    /// 使用默认配置创建站点配置
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::resolve(root, Config::default())
    }

    /// 读取站点根目录下的 `_config.yml`，不存在时使用默认配置
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE);
        let config = if config_path.exists() {
            Config::from_file(&config_path)?
        } else {
            Config::default()
        };
        Ok(Self::resolve(root, config))
    }

    pub fn resolve(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        let templates_dir = root.join(&config.templates_dir);
        let data = match config.data_file {
            Some(path) => DataSource::Required(root.join(path)),
            None => DataSource::Optional(root.join(DEFAULT_DATA_FILE)),
        };

        Self {
            config_path: root.join(CONFIG_FILE),
            pages_dir: root.join(&config.pages_dir),
            assets_dir: root.join(&config.assets_dir),
            output_dir: root.join(&config.output_dir),
            partials_dir: templates_dir.join(&config.partials_dir),
            templates_dir,
            layout: config.layout,
            partial_prefix: config.partial_prefix,
            partial_extension: config.partial_extension,
            data,
            markdown_extensions: config.markdown_extensions,
            clean: config.clean,
            debounce: Duration::from_millis(config.debounce_ms),
            root,
        }
    }

    /// 布局模板的完整路径
    pub fn layout_path(&self) -> PathBuf {
        self.templates_dir.join(&self.layout)
    }

    /// 资源目录在输出目录中的位置：`site/assets`
    pub fn assets_output_dir(&self) -> PathBuf {
        match self.assets_dir.file_name() {
            Some(name) => self.output_dir.join(name),
            None => self.output_dir.join("assets"),
        }
    }

    /// 监视目标：三个源目录递归监视，共享数据与 `_config.yml` 按文件监视
    ///
    /// 页面目录中的隐藏文件不会被构建，因此也不触发重新生成。
    pub fn watch_targets(&self) -> Vec<WatchTarget> {
        vec![
            WatchTarget::Tree {
                path: self.pages_dir.clone(),
                skip_hidden: true,
            },
            WatchTarget::Tree {
                path: self.templates_dir.clone(),
                skip_hidden: false,
            },
            WatchTarget::Tree {
                path: self.assets_dir.clone(),
                skip_hidden: false,
            },
            WatchTarget::File(self.data.path().to_path_buf()),
            WatchTarget::File(self.config_path.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_layout() {
        let site = SiteConfig::new("/tmp/blog");
        assert_eq!(site.pages_dir, PathBuf::from("/tmp/blog/pages"));
        assert_eq!(site.templates_dir, PathBuf::from("/tmp/blog/templates"));
        assert_eq!(site.assets_dir, PathBuf::from("/tmp/blog/assets"));
        assert_eq!(site.output_dir, PathBuf::from("/tmp/blog/site"));
        assert_eq!(site.layout_path(), PathBuf::from("/tmp/blog/templates/layout.html"));
        assert_eq!(site.partials_dir, PathBuf::from("/tmp/blog/templates/partials"));
        assert_eq!(site.assets_output_dir(), PathBuf::from("/tmp/blog/site/assets"));
        assert_eq!(site.data, DataSource::Optional(PathBuf::from("/tmp/blog/data.yml")));
        assert_eq!(site.debounce, Duration::from_millis(300));
        assert!(!site.clean);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_yaml("output_dir: public\ndata_file: _data/site.yml\nclean: true\n").unwrap();
        let site = SiteConfig::resolve("/srv", config);
        assert_eq!(site.output_dir, PathBuf::from("/srv/public"));
        assert_eq!(site.pages_dir, PathBuf::from("/srv/pages"));
        assert_eq!(site.data, DataSource::Required(PathBuf::from("/srv/_data/site.yml")));
        assert!(site.clean);
    }

    #[test]
    fn test_watch_targets() {
        let site = SiteConfig::new("/srv");
        let targets = site.watch_targets();
        assert!(targets.contains(&WatchTarget::File(PathBuf::from("/srv/data.yml"))));
        assert!(targets.contains(&WatchTarget::File(PathBuf::from("/srv/_config.yml"))));
        assert!(targets.contains(&WatchTarget::Tree {
            path: PathBuf::from("/srv/pages"),
            skip_hidden: true,
        }));
        assert!(targets.contains(&WatchTarget::Tree {
            path: PathBuf::from("/srv/assets"),
            skip_hidden: false,
        }));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml("ouptut_dir: public\n").is_err());
    }

    #[test]
    fn test_load_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let site = SiteConfig::load(dir.path()).unwrap();
        assert_eq!(site.output_dir, dir.path().join("site"));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "pages_dir: [unclosed\n").unwrap();
        let err = SiteConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(ref path, _) if path.ends_with(CONFIG_FILE)));
    }
}
