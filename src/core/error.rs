use std::path::PathBuf;
use thiserror::Error;

use crate::utils::yaml::YamlValueError;

/// `_config.yml` 读取或解析失败
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid config `{}`", .0.display())]
    Yaml(PathBuf, #[source] serde_yaml::Error),
}

/// front matter 解析错误
#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("front matter opened with `---` but never closed")]
    Unclosed,

    #[error("front matter is not valid YAML")]
    Yaml(#[source] serde_yaml::Error),

    #[error(transparent)]
    Value(#[from] YamlValueError),
}

/// 单个页面的错误，只影响该页面
#[derive(Error, Debug)]
pub enum PageError {
    #[error("failed to read page `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front matter in `{}`", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("failed to render `{}`", .path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("failed to write `{}`", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot derive an output file name from `{}`", .path.display())]
    OutputName { path: PathBuf },
}

/// 整个构建无法继续的错误
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("layout template not found: {}", .0.display())]
    MissingLayout(PathBuf),

    #[error("failed to load template `{}`", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("shared data file not found: {}", .0.display())]
    MissingData(PathBuf),

    #[error("invalid shared data in `{}`", .path.display())]
    Data {
        path: PathBuf,
        #[source]
        source: DataError,
    },

    #[error("pages directory not found: {}", .0.display())]
    MissingPages(PathBuf),

    #[error("refusing to clean `{}`: it contains site sources", .0.display())]
    UnsafeClean(PathBuf),

    #[error("I/O error on `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directory")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 一次性构建中有页面失败
#[derive(Error, Debug)]
#[error("{0} page(s) failed to build")]
pub struct PagesFailed(pub usize);

/// 共享数据文件的具体错误
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Value(#[from] YamlValueError),
}

/// 文件监视错误
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to create file watcher")]
    Init(#[source] notify::Error),

    #[error("failed to watch `{}`", .path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("none of the source directories exist, nothing to watch")]
    NothingToWatch,

    #[error("file watcher failed {attempts} times in a row, giving up")]
    Backend {
        attempts: usize,
        #[source]
        source: notify::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}
