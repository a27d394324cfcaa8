use std::error::Error;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

pub mod markdown;
pub mod yaml;

/// 检查文件扩展名是否属于给定的 Markdown 扩展名列表（不区分大小写）
pub fn is_markdown_file<P: AsRef<Path>>(path: P, extensions: &[String]) -> bool {
    let path = path.as_ref();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext))
    } else {
        false
    }
}

/// 由源文件名生成输出文件名：`hello.md` -> `hello.html`
pub fn output_file_name<P: AsRef<Path>>(path: P) -> Option<String> {
    let stem = path.as_ref().file_stem()?.to_str()?;
    Some(format!("{}.html", stem))
}

/// 相对于站点根目录显示路径，便于日志阅读
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// 解析为绝对的真实路径
///
/// 已存在的部分经 `fs::canonicalize` 解析符号链接，不存在的部分按字面处理
/// `.` 与 `..`，因此尚未创建的输出目录也能得到可比较的路径。
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if let Ok(real) = fs::canonicalize(&resolved) {
                    resolved = real;
                }
            }
        }
    }
    Ok(resolved)
}

/// 把错误及其 source 链拼成一行
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
