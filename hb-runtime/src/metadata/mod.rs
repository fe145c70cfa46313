//! # Metadata 模块
//!
//! Action 元数据目录：描述每个 Action 的参数、类型、默认值与全局绑定。
//!
//! 目录是参数形态的唯一来源：
//! - 编辑器形态 ⇄ 引擎形态的转换按描述符递归遍历（见 [`convert`]）
//! - 运行时 Action 通过 [`params::Params`] 按描述符读取参数
//!
//! ## 目录格式
//!
//! ```text
//! { <category>: { icon, options: [ ActionDescriptor, ... ] } }
//! ```

pub mod convert;
pub mod params;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProjectError;

pub use convert::{EditorAction, editor_to_engine, engine_to_editor, instance_name};
pub use params::Params;

/// 引擎形态的参数树（`{ param_name: value, ... }`）
pub type ActionData = Map<String, Value>;

/// 内置元数据目录
const BUILTIN_CATALOG: &str = include_str!("../../content/action_metadata.json");

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    String,
    Bool,
    Int,
    Float,
    Vector2,
    Paragraph,
    Color,
    File,
    #[serde(rename = "File_Font")]
    FileFont,
    #[serde(rename = "File_Image")]
    FileImage,
    Dropdown,
    Container,
    Event,
    #[serde(rename = "CUST_Resolution")]
    CustResolution,
}

/// 全局绑定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalBinding {
    /// 为 true 时参数值取自项目级的 `target`
    pub active: bool,
    /// 值存储中的名字，或项目设置中的带点路径
    pub target: String,
}

/// 参数描述符（同时也是编辑器形态的单个参数节点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// 参数名（加载时由所在映射的键填充）
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ParamKind,

    /// 当前值（编辑器形态）；目录中省略时等于 `default`
    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub default: Value,

    #[serde(default = "default_true")]
    pub editable: bool,

    #[serde(default)]
    pub preview: bool,

    /// 必需参数不使用 `default` 兜底
    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalBinding>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ParamDescriptor>,

    /// 可变实例列表的模板（如对话选项）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Box<ParamDescriptor>>,

    /// Dropdown 的可选项，仅编辑器使用
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ParamDescriptor {
    /// 是否为模板实例列表
    pub fn is_template_list(&self) -> bool {
        self.kind == ParamKind::Container && self.template.is_some()
    }

    /// 填充名字与初始值（递归）
    fn normalize(&mut self, name: &str) {
        self.name = name.to_string();
        if self.value.is_null() {
            self.value = self.default.clone();
        }
        normalize_requirements(&mut self.children);
        if let Some(template) = &mut self.template {
            template.normalize("");
        }
    }
}

fn normalize_requirements(requirements: &mut BTreeMap<String, ParamDescriptor>) {
    for (name, param) in requirements.iter_mut() {
        param.normalize(name);
    }
}

/// Action 描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action_name: String,
    pub display_name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "default_true")]
    pub skippable: bool,
    #[serde(default)]
    pub requirements: BTreeMap<String, ParamDescriptor>,
}

/// 目录分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCategory {
    #[serde(default)]
    pub icon: String,
    pub options: Vec<ActionDescriptor>,
}

/// Action 元数据目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCatalog {
    categories: BTreeMap<String, ActionCategory>,
}

impl ActionCatalog {
    /// 内置目录
    pub fn builtin() -> Result<Self, ProjectError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(content: &str) -> Result<Self, ProjectError> {
        let mut catalog: Self =
            serde_json::from_str(content).map_err(|e| ProjectError::Catalog(e.to_string()))?;
        for category in catalog.categories.values_mut() {
            for descriptor in &mut category.options {
                normalize_requirements(&mut descriptor.requirements);
            }
        }
        Ok(catalog)
    }

    /// 按名字查找描述符
    pub fn get(&self, action_name: &str) -> Option<&ActionDescriptor> {
        self.descriptors().find(|d| d.action_name == action_name)
    }

    /// 所有描述符
    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.categories.values().flat_map(|c| c.options.iter())
    }

    pub fn categories(&self) -> &BTreeMap<String, ActionCategory> {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = ActionCatalog::builtin().unwrap();
        let sprite = catalog.get("create_sprite").unwrap();
        assert!(sprite.skippable);
        assert!(sprite.requirements["key"].required);
        assert_eq!(sprite.requirements["key"].name, "key");
        assert_eq!(sprite.requirements["position"].value, json!([0.5, 0.5]));

        assert!(!catalog.get("quit_game").unwrap().skippable);
        assert!(catalog.get("fly").is_none());
    }

    #[test]
    fn test_nested_names_filled() {
        let catalog = ActionCatalog::builtin().unwrap();
        let dialogue = catalog.get("dialogue").unwrap();
        let speaker = &dialogue.requirements["speaker"];
        assert_eq!(speaker.kind, ParamKind::Container);
        assert_eq!(speaker.children["font"].name, "font");
        assert_eq!(
            speaker.children["font"].global,
            Some(GlobalBinding {
                active: true,
                target: "Dialogue.speaker_font".to_string()
            })
        );
    }

    #[test]
    fn test_template_list_detection() {
        let catalog = ActionCatalog::builtin().unwrap();
        let choice = catalog.get("create_choice").unwrap();
        assert!(choice.requirements["choices"].is_template_list());
        assert!(!choice.requirements["key"].is_template_list());
    }

    #[test]
    fn test_invalid_catalog() {
        let err = ActionCatalog::from_json(r#"{ "Scene": { "options": [ { "x": 1 } ] } }"#);
        assert!(matches!(err, Err(ProjectError::Catalog(_))));
    }
}
