//! # 参数读取
//!
//! Action 在 `start` 时通过 [`Params`] 读取引擎形态的参数。
//!
//! ## 取值顺序
//!
//! 1. 实例中给出的值
//! 2. 描述符带全局绑定时，取项目级的值（值存储优先，其次项目设置）
//! 3. 描述符的 `default`（必需参数跳过这一步，直接报 `MissingRequiredParameter`）

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::{Map, Value};

use super::{ActionData, ParamDescriptor, instance_name};
use crate::error::ActionError;
use crate::geometry::{Rgb, Vec2};
use crate::project::Project;
use crate::renderable::Placement;

static EMPTY_DATA: LazyLock<ActionData> = LazyLock::new(Map::new);
static EMPTY_REQUIREMENTS: BTreeMap<String, ParamDescriptor> = BTreeMap::new();

/// 参数读取器
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    action: &'a str,
    requirements: &'a BTreeMap<String, ParamDescriptor>,
    data: &'a ActionData,
    project: &'a Project,
}

impl<'a> Params<'a> {
    /// 按 Action 名查找描述符并创建读取器
    pub fn for_action(
        project: &'a Project,
        action: &'a str,
        data: &'a ActionData,
    ) -> Result<Self, ActionError> {
        let descriptor =
            project
                .catalog
                .get(action)
                .ok_or_else(|| ActionError::UnknownActionName {
                    name: action.to_string(),
                })?;
        Ok(Self {
            action,
            requirements: &descriptor.requirements,
            data,
            project,
        })
    }

    pub fn action(&self) -> &'a str {
        self.action
    }

    /// 原始数据
    pub fn data(&self) -> &'a ActionData {
        self.data
    }

    /// 实例是否显式给出了这个参数
    pub fn has(&self, name: &str) -> bool {
        self.data.get(name).is_some_and(|v| !v.is_null())
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>, ActionError> {
        let descriptor = self.requirements.get(name);
        let required = descriptor.is_some_and(|d| d.required);

        let given = self
            .data
            .get(name)
            .filter(|v| !v.is_null())
            .filter(|v| !(required && v.as_str().is_some_and(str::is_empty)));
        if let Some(value) = given {
            return Ok(Some(value.clone()));
        }

        if let Some(global) = descriptor.and_then(|d| d.global.as_ref())
            && let Some(value) = self.project.lookup_global(&global.target)
        {
            return Ok(Some(value));
        }

        match descriptor {
            Some(_) if required => Err(ActionError::MissingRequiredParameter {
                action: self.action.to_string(),
                param: name.to_string(),
            }),
            Some(d) if !d.default.is_null() => Ok(Some(d.default.clone())),
            _ => Ok(None),
        }
    }

    fn invalid(&self, name: &str, expected: &str) -> ActionError {
        ActionError::InvalidParameter {
            action: self.action.to_string(),
            param: name.to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn string(&self, name: &str) -> Result<String, ActionError> {
        Ok(self.opt_string(name)?.unwrap_or_default())
    }

    /// 空字符串视为未给出
    pub fn opt_string(&self, name: &str) -> Result<Option<String>, ActionError> {
        match self.resolve(name)? {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.invalid(name, "String")),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ActionError> {
        match self.resolve(name)? {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(_) => Err(self.invalid(name, "Bool")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, ActionError> {
        match self.resolve(name)? {
            None => Ok(0),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .ok_or_else(|| self.invalid(name, "Int")),
            Some(_) => Err(self.invalid(name, "Int")),
        }
    }

    pub fn float(&self, name: &str) -> Result<f32, ActionError> {
        Ok(self.opt_float(name)?.unwrap_or(0.0))
    }

    pub fn opt_float(&self, name: &str) -> Result<Option<f32>, ActionError> {
        match self.resolve(name)? {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(|f| Some(f as f32))
                .ok_or_else(|| self.invalid(name, "Float")),
            Some(_) => Err(self.invalid(name, "Float")),
        }
    }

    pub fn vector2(&self, name: &str) -> Result<Vec2, ActionError> {
        Ok(self.opt_vector2(name)?.unwrap_or_default())
    }

    /// `[x, y]`
    pub fn opt_vector2(&self, name: &str) -> Result<Option<Vec2>, ActionError> {
        let Some(value) = self.resolve(name)? else {
            return Ok(None);
        };
        match value.as_array().map(Vec::as_slice) {
            Some([x, y]) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => Ok(Some(Vec2::new(x as f32, y as f32))),
                _ => Err(self.invalid(name, "Vector2")),
            },
            _ => Err(self.invalid(name, "Vector2")),
        }
    }

    /// `[r, g, b]`，缺省为白色
    pub fn color(&self, name: &str) -> Result<Rgb, ActionError> {
        let Some(value) = self.resolve(name)? else {
            return Ok(Rgb::WHITE);
        };
        let channel = |v: &Value| v.as_u64().and_then(|c| u8::try_from(c).ok());
        match value.as_array().map(Vec::as_slice) {
            Some([r, g, b]) => match (channel(r), channel(g), channel(b)) {
                (Some(r), Some(g), Some(b)) => Ok(Rgb(r, g, b)),
                _ => Err(self.invalid(name, "Color")),
            },
            _ => Err(self.invalid(name, "Color")),
        }
    }

    /// Container 参数的子读取器
    pub fn child(&self, name: &str) -> Params<'a> {
        let requirements = self
            .requirements
            .get(name)
            .map(|d| &d.children)
            .unwrap_or(&EMPTY_REQUIREMENTS);
        let data = self
            .data
            .get(name)
            .and_then(Value::as_object)
            .unwrap_or(&*EMPTY_DATA);
        Params {
            action: self.action,
            requirements,
            data,
            project: self.project,
        }
    }

    /// 模板实例列表：`{ 实例名: {...} }`，也接受数组写法
    pub fn entries(&self, name: &str) -> Vec<(String, &'a ActionData)> {
        match self.data.get(name) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_object().map(|o| (k.clone(), o)))
                .collect(),
            Some(Value::Array(list)) => list
                .iter()
                .filter_map(Value::as_object)
                .enumerate()
                .map(|(i, o)| (instance_name(name, i), o))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// 模板实例列表，每个实例按模板的子描述符读取
    pub fn instances(&self, name: &str) -> Vec<(String, Params<'a>)> {
        let requirements = self
            .requirements
            .get(name)
            .and_then(|d| d.template.as_deref())
            .map(|t| &t.children)
            .unwrap_or(&EMPTY_REQUIREMENTS);
        self.entries(name)
            .into_iter()
            .map(|(instance, data)| {
                (
                    instance,
                    Params {
                        action: self.action,
                        requirements,
                        data,
                        project: self.project,
                    },
                )
            })
            .collect()
    }

    /// Event 参数：`{ action: <名字>, ...参数 }`，也接受只写 Action 名
    pub fn event(&self, name: &str) -> Result<Option<ActionData>, ActionError> {
        match self.data.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => {
                let mut data = Map::new();
                data.insert("action".to_string(), Value::from(s.as_str()));
                Ok(Some(data))
            }
            Some(Value::Object(map)) => match map.get("action").and_then(Value::as_str) {
                Some(action) if !action.is_empty() => Ok(Some(map.clone())),
                _ => Ok(None),
            },
            Some(_) => Err(self.invalid(name, "Event")),
        }
    }

    /// 位置、居中对齐与 z 序
    pub fn placement(&self) -> Result<Placement, ActionError> {
        Ok(Placement {
            position: self.vector2("position")?,
            center_align: self.bool("center_align")?,
            z_order: self.int("z_order")? as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectSettings, StoredValue, ValueStore};
    use serde_json::json;

    fn project() -> Project {
        let mut values = ValueStore::new();
        values.insert("Text.default_text_size", StoredValue::Int(40));
        Project::from_parts("/p", ProjectSettings::default(), values).unwrap()
    }

    fn data(value: Value) -> ActionData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_instance_then_global_then_default() {
        let project = project();
        let given = data(json!({ "key": "t", "text_size": 12 }));
        let params = Params::for_action(&project, "create_text", &given).unwrap();
        assert_eq!(params.int("text_size").unwrap(), 12);
        assert_eq!(params.color("text_color").unwrap(), Rgb::WHITE);
        assert_eq!(params.vector2("position").unwrap(), Vec2::new(0.5, 0.5));

        let omitted = data(json!({ "key": "t" }));
        let params = Params::for_action(&project, "create_text", &omitted).unwrap();
        assert_eq!(params.int("text_size").unwrap(), 40);
    }

    #[test]
    fn test_required_parameter() {
        let project = project();
        let empty_key = data(json!({ "key": "", "sprite": "a.png" }));
        let params = Params::for_action(&project, "create_sprite", &empty_key).unwrap();
        assert_eq!(
            params.string("key"),
            Err(ActionError::MissingRequiredParameter {
                action: "create_sprite".to_string(),
                param: "key".to_string()
            })
        );
        assert_eq!(params.string("sprite").unwrap(), "a.png");
    }

    #[test]
    fn test_invalid_types() {
        let project = project();
        let bad = data(json!({ "key": "a", "sprite": "a.png", "position": "center" }));
        let params = Params::for_action(&project, "create_sprite", &bad).unwrap();
        assert!(matches!(
            params.vector2("position"),
            Err(ActionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_child_and_entries() {
        let project = project();
        let given = data(json!({
            "choices": [
                { "key": "A", "branch": "Left" },
                { "key": "B", "branch": "Right" }
            ]
        }));
        let params = Params::for_action(&project, "create_choice", &given).unwrap();
        let entries = params.entries("choices");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "choice_01");
        assert_eq!(entries[1].1["branch"], json!("Right"));

        let instances = params.instances("choices");
        assert_eq!(instances[0].1.string("key").unwrap(), "A");
        // 模板中的全局绑定同样生效
        assert_eq!(instances[0].1.int("text_size").unwrap(), 40);

        let dialogue = data(json!({ "dialogue_text": "hi" }));
        let params = Params::for_action(&project, "dialogue", &dialogue).unwrap();
        let speaker = params.child("speaker");
        assert_eq!(speaker.string("key").unwrap(), "SpeakerText");
        assert_eq!(speaker.int("z_order").unwrap(), 200);
        assert_eq!(speaker.int("text_size").unwrap(), 28);
    }

    #[test]
    fn test_event_forms() {
        let project = project();
        let given = data(json!({ "key": "k", "sprite": "s.png", "on_click": "quit_game" }));
        let params = Params::for_action(&project, "create_interactable", &given).unwrap();
        let event = params.event("on_click").unwrap().unwrap();
        assert_eq!(event["action"], json!("quit_game"));

        let full = data(json!({
            "key": "k",
            "sprite": "s.png",
            "on_click": { "action": "choose_branch", "branch": "Hall" }
        }));
        let params = Params::for_action(&project, "create_interactable", &full).unwrap();
        let event = params.event("on_click").unwrap().unwrap();
        assert_eq!(event["branch"], json!("Hall"));

        let none = data(json!({ "key": "k", "sprite": "s.png", "on_click": { "action": "" } }));
        let params = Params::for_action(&project, "create_interactable", &none).unwrap();
        assert_eq!(params.event("on_click").unwrap(), None);
    }

    #[test]
    fn test_unknown_action() {
        let project = project();
        let empty = ActionData::new();
        assert!(matches!(
            Params::for_action(&project, "fly", &empty),
            Err(ActionError::UnknownActionName { .. })
        ));
    }
}
