//! YAML 到模板值（`tera::Value`，即 `serde_json::Value`）的转换。
//!
//! 页面 front matter 以 [`TagPolicy::Reject`] 转换：任何 YAML 标签都会报错，
//! 只允许 null、布尔、数字、字符串、序列与映射。共享数据以
//! [`TagPolicy::Unwrap`] 转换：标签被剥离，只保留其内部的值。

use serde_json::{Map, Number, Value as JsonValue};
use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::models::Metadata;

/// 遇到 YAML 标签时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPolicy {
    /// 受限模式：标签视为错误
    Reject,
    /// 完整模式：剥离标签
    Unwrap,
}

#[derive(Error, Debug)]
pub enum YamlValueError {
    #[error("tagged value `{0}` is not allowed, only plain data is accepted")]
    Tagged(String),

    #[error("mapping key must be a scalar, found {0}")]
    Key(&'static str),

    #[error("expected a mapping at the top level, found {0}")]
    NotAMapping(&'static str),
}

/// 将顶层 YAML 文档转换为键值映射；空文档视为空映射
pub fn to_metadata(value: YamlValue, policy: TagPolicy) -> Result<Metadata, YamlValueError> {
    match value {
        YamlValue::Null => Ok(Metadata::new()),
        YamlValue::Tagged(tagged) => match policy {
            TagPolicy::Reject => Err(YamlValueError::Tagged(tagged.tag.to_string())),
            TagPolicy::Unwrap => to_metadata(tagged.value, policy),
        },
        YamlValue::Mapping(mapping) => to_object(mapping, policy),
        other => Err(YamlValueError::NotAMapping(kind(&other))),
    }
}

/// 将任意 YAML 值转换为模板值
pub fn to_json(value: YamlValue, policy: TagPolicy) -> Result<JsonValue, YamlValueError> {
    Ok(match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::Number(Number::from(i))
            } else if let Some(u) = n.as_u64() {
                JsonValue::Number(Number::from(u))
            } else {
                // NaN 与无穷大无法表示为 JSON 数字
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
        }
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(seq) => JsonValue::Array(
            seq.into_iter()
                .map(|v| to_json(v, policy))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        YamlValue::Mapping(mapping) => JsonValue::Object(to_object(mapping, policy)?),
        YamlValue::Tagged(tagged) => match policy {
            TagPolicy::Reject => return Err(YamlValueError::Tagged(tagged.tag.to_string())),
            TagPolicy::Unwrap => to_json(tagged.value, policy)?,
        },
    })
}

fn to_object(mapping: serde_yaml::Mapping, policy: TagPolicy) -> Result<Map<String, JsonValue>, YamlValueError> {
    let mut object = Map::new();
    for (k, v) in mapping {
        object.insert(key_to_string(k, policy)?, to_json(v, policy)?);
    }
    Ok(object)
}

fn key_to_string(key: YamlValue, policy: TagPolicy) -> Result<String, YamlValueError> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Tagged(tagged) => match policy {
            TagPolicy::Reject => Err(YamlValueError::Tagged(tagged.tag.to_string())),
            TagPolicy::Unwrap => key_to_string(tagged.value, policy),
        },
        other => Err(YamlValueError::Key(kind(&other))),
    }
}

fn kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a sequence",
        YamlValue::Mapping(_) => "a mapping",
        YamlValue::Tagged(_) => "a tagged value",
    }
}
