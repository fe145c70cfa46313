//! # 项目设置
//!
//! 读取 `project_settings.json`。
//!
//! 文件内容叠加在内置默认值之上，所以任何带点路径
//! （如 `Dialogue.speaker_font`）都能作为全局参数的绑定目标。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::error::ProjectError;

/// 找不到可用分辨率时使用的主分辨率
pub const FALLBACK_RESOLUTION: (u32, u32) = (1280, 720);

/// `Game` 段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// **起始场景**（相对项目根目录）
    #[serde(default)]
    pub starting_scene: Option<String>,

    /// 起始场景类型
    #[serde(default = "default_starting_scene_type")]
    pub starting_scene_type: String,
}

/// `Window` 段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// 当前分辨率在 `resolution_options` 中的索引
    #[serde(default)]
    pub resolution: usize,

    /// 可选分辨率列表
    #[serde(default = "default_resolution_options")]
    pub resolution_options: Vec<[u32; 2]>,

    /// 是否全屏
    #[serde(default)]
    pub fullscreen: bool,
}

fn default_title() -> String {
    "HBEngine".to_string()
}

fn default_starting_scene_type() -> String {
    "Scene_Dialogue".to_string()
}

fn default_resolution_options() -> Vec<[u32; 2]> {
    vec![[1280, 720], [1920, 1080]]
}

/// 内置默认值
fn default_raw() -> Value {
    json!({
        "Game": {
            "title": default_title(),
            "starting_scene_type": default_starting_scene_type()
        },
        "Window": {
            "resolution": 0,
            "resolution_options": default_resolution_options(),
            "fullscreen": false
        },
        "Text": {
            "default_font": "",
            "default_text_size": 24,
            "default_text_color": [255, 255, 255]
        },
        "Dialogue": {
            "speaker_font": "",
            "speaker_text_size": 28,
            "speaker_text_color": [255, 255, 255],
            "dialogue_font": "",
            "dialogue_text_size": 24,
            "dialogue_text_color": [255, 255, 255],
            "speaker_frame": "HBEngine/Content/Sprites/Dialogue/speaker_frame.png",
            "dialogue_frame": "HBEngine/Content/Sprites/Dialogue/dialogue_frame.png"
        },
        "Choice": {
            "button_sprite": "HBEngine/Content/Sprites/Choice/button_normal.png",
            "button_sprite_hover": "HBEngine/Content/Sprites/Choice/button_hover.png",
            "button_sprite_clicked": "HBEngine/Content/Sprites/Choice/button_clicked.png"
        }
    })
}

/// 项目设置（只读）
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    pub game: GameSettings,
    pub window: WindowSettings,
    raw: Value,
}

impl ProjectSettings {
    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ProjectError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ProjectError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 从 JSON 文本解析（叠加在默认值之上）
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let overlay: Value = serde_json::from_str(content)?;
        let mut raw = default_raw();
        merge(&mut raw, overlay);
        Self::from_raw(raw)
    }

    fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        let game = serde_json::from_value(raw["Game"].clone())?;
        let window = serde_json::from_value(raw["Window"].clone())?;
        Ok(Self { game, window, raw })
    }

    /// 起始场景（空字符串视为未配置）
    pub fn starting_scene(&self) -> Option<&str> {
        self.game
            .starting_scene
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// 主分辨率
    pub fn main_resolution(&self) -> (u32, u32) {
        let options = &self.window.resolution_options;
        match options.get(self.window.resolution).or_else(|| options.first()) {
            Some([w, h]) if *w > 0 && *h > 0 => {
                if self.window.resolution >= options.len() {
                    warn!(
                        index = self.window.resolution,
                        "Window.resolution 超出 resolution_options 范围，使用第一个选项"
                    );
                }
                (*w, *h)
            }
            _ => FALLBACK_RESOLUTION,
        }
    }

    /// 按带点路径查找设置值
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut current = &self.raw;
        for part in dotted.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        let raw = default_raw();
        Self {
            game: serde_json::from_value(raw["Game"].clone()).unwrap_or_else(|_| GameSettings {
                title: default_title(),
                starting_scene: None,
                starting_scene_type: default_starting_scene_type(),
            }),
            window: WindowSettings {
                resolution: 0,
                resolution_options: default_resolution_options(),
                fullscreen: false,
            },
            raw,
        }
    }
}

/// 深度合并：`overlay` 中的对象逐键覆盖 `base`
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
