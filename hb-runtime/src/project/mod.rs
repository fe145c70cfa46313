//! # Project 模块
//!
//! 项目级只读配置：项目设置、值存储与 Action 元数据目录。
//!
//! ## 全局参数解析顺序
//!
//! 参数描述符的 `global.target` 先在值存储中按名字查找，
//! 再在项目设置中按带点路径查找（如 `Dialogue.speaker_font`）。

pub mod settings;
pub mod values;

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::ProjectError;
use crate::metadata::ActionCatalog;

pub use settings::{GameSettings, ProjectSettings, WindowSettings};
pub use values::{StoredValue, ValueStore};

/// 项目设置文件名
pub const SETTINGS_FILE: &str = "project_settings.json";

/// 值文件名
pub const VALUES_FILE: &str = "values.json";

/// 已加载的项目
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub settings: ProjectSettings,
    pub values: ValueStore,
    pub catalog: ActionCatalog,
}

impl Project {
    /// 从项目目录加载
    ///
    /// 设置文件缺失或无法解析是致命错误；值文件缺失时使用空存储。
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        let settings = ProjectSettings::load(root.join(SETTINGS_FILE))?;
        let values = ValueStore::load(root.join(VALUES_FILE))?;
        let catalog = ActionCatalog::builtin()?;
        info!(
            root = ?root,
            title = %settings.game.title,
            values = values.len(),
            "项目加载完成"
        );
        Ok(Self {
            root,
            settings,
            values,
            catalog,
        })
    }

    /// 从内存中的设置与值构建（不读文件）
    pub fn from_parts(
        root: impl Into<PathBuf>,
        settings: ProjectSettings,
        values: ValueStore,
    ) -> Result<Self, ProjectError> {
        Ok(Self {
            root: root.into(),
            settings,
            values,
            catalog: ActionCatalog::builtin()?,
        })
    }

    /// 解析全局绑定目标
    pub fn lookup_global(&self, target: &str) -> Option<Value> {
        if let Some(value) = self.values.get(target) {
            return Some(value.to_json());
        }
        self.settings.lookup(target).cloned()
    }

    /// 主分辨率
    pub fn main_resolution(&self) -> (u32, u32) {
        self.settings.main_resolution()
    }
}
