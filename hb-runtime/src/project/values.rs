//! # 值存储
//!
//! 读取 `values.json`：`{ name: { type, value } }`。运行时只读。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ProjectError;

/// 带类型的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum StoredValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector2([f32; 2]),
    Color([u8; 3]),
}

impl StoredValue {
    /// 转为引擎形态的 JSON 值（与场景文件中的写法一致）
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::from(s.as_str()),
            Self::Bool(b) => Value::from(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Vector2([x, y]) => Value::from(vec![*x as f64, *y as f64]),
            Self::Color([r, g, b]) => Value::from(vec![*r, *g, *b]),
        }
    }
}

/// 值存储
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStore {
    values: BTreeMap<String, StoredValue>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件加载；文件不存在时返回空存储
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        if !path.is_file() {
            warn!(path = ?path, "值文件不存在，使用空值存储");
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).map_err(|e| ProjectError::ValuesParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| ProjectError::ValuesParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            values: serde_json::from_str(content)?,
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: StoredValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&StoredValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
