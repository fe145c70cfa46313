//! # Config 模块
//!
//! 引擎级配置（与具体项目无关）。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (config.json)
//! 3. 默认值（最低）

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 引擎安装目录，`HBEngine/` 前缀的路径相对它解析
    #[serde(default = "default_engine_root")]
    pub engine_root: PathBuf,

    /// 帧率上限
    #[serde(default = "default_fps_cap")]
    pub fps_cap: f32,

    /// 窗口标题；未配置时使用项目设置中的 `Game.title`
    #[serde(default)]
    pub window_title: Option<String>,

    /// 算作"推进"的按键（winit `KeyCode` 名，如 `Space`、`Enter`）
    #[serde(default = "default_advance_keys")]
    pub advance_keys: Vec<String>,
}

fn default_engine_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_fps_cap() -> f32 {
    60.0
}

fn default_advance_keys() -> Vec<String> {
    vec!["Space".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_root: default_engine_root(),
            fps_cap: default_fps_cap(),
            window_title: None,
            advance_keys: default_advance_keys(),
        }
    }
}

impl EngineConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并打印警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = ?path, "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!(path = ?path, "配置文件加载成功");
                    config
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "配置文件解析失败，使用默认配置");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = ?path, error = %e, "配置文件读取失败，使用默认配置");
                Self::default()
            }
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fps_cap.is_finite() && self.fps_cap >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fps_cap 必须不小于 1，当前为 {}",
                self.fps_cap
            )));
        }
        if self.advance_keys.is_empty() {
            return Err(ConfigError::Invalid("advance_keys 不能为空".to_string()));
        }
        Ok(())
    }

    /// 按键名是否为推进键
    pub fn is_advance_key(&self, name: &str) -> bool {
        self.advance_keys.iter().any(|k| k == name)
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置验证失败: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.fps_cap, 60.0);
        assert!(config.is_advance_key("Space"));
        assert!(!config.is_advance_key("Enter"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "fps_cap": 30, "advance_keys": ["Space", "Enter"] }"#).unwrap();

        let config = EngineConfig::load(&path);
        assert_eq!(config.fps_cap, 30.0);
        assert!(config.is_advance_key("Enter"));
        assert_eq!(config.engine_root, PathBuf::from("."));
        assert_eq!(config.window_title, None);
    }

    #[test]
    fn test_missing_or_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            EngineConfig::load(dir.path().join("missing.json")),
            EngineConfig::default()
        );

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ fps_cap: ").unwrap();
        assert_eq!(EngineConfig::load(&path), EngineConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.fps_cap = 0.0;
        assert!(config.validate().is_err());

        config.fps_cap = 60.0;
        config.advance_keys.clear();
        assert!(config.validate().is_err());
    }
}
