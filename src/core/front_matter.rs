//! Front matter 解析。
//!
//! 只有文件第一行恰好是 `---` 时才视为带有 front matter，之后直到下一行
//! `---` 为止的内容按受限模式解析为 YAML 映射，其余部分为正文。

use serde_yaml::Value;

use crate::core::error::FrontMatterError;
use crate::models::Metadata;
use crate::utils::yaml::{self, TagPolicy};

const DELIMITER: &str = "---";
const BOM: char = '\u{feff}';

/// 把页面原始内容拆分为 front matter 与正文
///
/// 没有开头分隔线时返回空映射和完整输入。
pub fn parse(raw: &str) -> Result<(Metadata, &str), FrontMatterError> {
    let text = raw.strip_prefix(BOM).unwrap_or(raw);

    let (first, rest) = split_line(text);
    if !is_delimiter(first) {
        return Ok((Metadata::new(), raw));
    }

    let (block, body) = split_block(rest).ok_or(FrontMatterError::Unclosed)?;
    let value: Value = serde_yaml::from_str(block).map_err(FrontMatterError::Yaml)?;
    let front_matter = yaml::to_metadata(value, TagPolicy::Reject)?;

    Ok((front_matter, body))
}

/// 在开头分隔线之后寻找结束分隔线，返回 (YAML 块, 正文)
fn split_block(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    while offset < text.len() {
        let (line, rest) = split_line(&text[offset..]);
        if is_delimiter(line) {
            return Some((&text[..offset], rest));
        }
        offset += line.len() + 1;
    }
    None
}

fn split_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(idx) => (&text[..idx], &text[idx + 1..]),
        None => (text, ""),
    }
}

fn is_delimiter(line: &str) -> bool {
    line.strip_suffix('\r').unwrap_or(line) == DELIMITER
}
