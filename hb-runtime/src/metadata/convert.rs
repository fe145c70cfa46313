//! # 形态转换
//!
//! 编辑器形态（每个参数带完整元数据）与引擎形态（紧凑的 `name: value` 映射）
//! 之间的双向转换。两个方向都是按描述符的递归遍历。
//!
//! ## 规则
//!
//! - `Container`：递归处理 `children`
//! - 带模板的 `Container`：引擎形态是以实例名为键的映射（`choice_01`、`choice_02`…）
//! - `Event`：值是 Action 名，子参数是被引用 Action 的参数，外加一个 `action` 子项
//! - `global.active == true` 的参数在引擎形态中省略，运行时再从项目级取值
//! - Dropdown 的 `options` 只存在于编辑器形态

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ActionCatalog, ActionData, ParamDescriptor, ParamKind};
use crate::error::ConvertError;
use crate::scene::PostWait;

/// 引擎形态中 Action 名所在的键
const ACTION_KEY: &str = "action";

/// 对话条目级别的键，不属于任何描述符
const ENTRY_KEYS: [&str; 3] = [ACTION_KEY, "post_wait", "wait"];

/// 编辑器形态的 Action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorAction {
    pub action_name: String,
    pub display_name: String,
    #[serde(default)]
    pub post_wait: PostWait,
    pub requirements: BTreeMap<String, ParamDescriptor>,
}

/// 模板实例名：`choices` 的第 1 个实例为 `choice_01`
pub fn instance_name(list_name: &str, index: usize) -> String {
    let stem = list_name.strip_suffix('s').unwrap_or(list_name);
    format!("{stem}_{:02}", index + 1)
}

/// 编辑器形态 → 引擎形态
pub fn editor_to_engine(action: &EditorAction) -> ActionData {
    let mut data = Map::new();
    data.insert(
        ACTION_KEY.to_string(),
        Value::from(action.action_name.as_str()),
    );
    data.extend(params_to_engine(&action.requirements));
    if action.post_wait != PostWait::NoWait {
        data.insert(
            "post_wait".to_string(),
            Value::from(action.post_wait.as_str()),
        );
    }
    data
}

fn params_to_engine(requirements: &BTreeMap<String, ParamDescriptor>) -> ActionData {
    requirements
        .iter()
        .filter_map(|(name, param)| param_to_engine(param).map(|v| (name.clone(), v)))
        .collect()
}

fn param_to_engine(param: &ParamDescriptor) -> Option<Value> {
    if param.global.as_ref().is_some_and(|g| g.active) {
        return None;
    }
    match param.kind {
        ParamKind::Container if param.is_template_list() => Some(Value::Object(
            param
                .children
                .iter()
                .filter_map(|(instance, child)| {
                    param_to_engine(child).map(|v| (instance.clone(), v))
                })
                .collect(),
        )),
        ParamKind::Container => Some(Value::Object(params_to_engine(&param.children))),
        ParamKind::Event => {
            let action = param.value.as_str().unwrap_or_default();
            if action.is_empty() {
                return None;
            }
            let mut data = params_to_engine(&param.children);
            data.insert(ACTION_KEY.to_string(), Value::from(action));
            Some(Value::Object(data))
        }
        _ => (!param.value.is_null()).then(|| param.value.clone()),
    }
}

/// 引擎形态 → 编辑器形态
///
/// 复制目录中的描述符，再按引擎数据逐项填值：
/// 给出的参数写入 `value` 并关闭全局绑定；省略的参数若支持全局绑定则打开，
/// 否则取 `default`。
pub fn engine_to_editor(
    catalog: &ActionCatalog,
    data: &ActionData,
) -> Result<EditorAction, ConvertError> {
    let name = data
        .get(ACTION_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| ConvertError::Malformed {
            param: ACTION_KEY.to_string(),
            message: "缺少 Action 名".to_string(),
        })?;
    let descriptor = catalog
        .get(name)
        .ok_or_else(|| ConvertError::UnknownAction {
            name: name.to_string(),
        })?;

    let mut requirements = descriptor.requirements.clone();
    apply_params(catalog, &mut requirements, data)?;

    Ok(EditorAction {
        action_name: descriptor.action_name.clone(),
        display_name: descriptor.display_name.clone(),
        post_wait: PostWait::from_entry(data),
        requirements,
    })
}

fn apply_params(
    catalog: &ActionCatalog,
    requirements: &mut BTreeMap<String, ParamDescriptor>,
    data: &ActionData,
) -> Result<(), ConvertError> {
    for key in data.keys() {
        if !requirements.contains_key(key) && !ENTRY_KEYS.contains(&key.as_str()) {
            debug!(param = %key, "忽略描述符之外的参数");
        }
    }
    for (name, param) in requirements.iter_mut() {
        apply_param(catalog, param, data.get(name))?;
    }
    Ok(())
}

fn apply_param(
    catalog: &ActionCatalog,
    param: &mut ParamDescriptor,
    value: Option<&Value>,
) -> Result<(), ConvertError> {
    let value = value.filter(|v| !v.is_null());
    match param.kind {
        ParamKind::Container if param.is_template_list() => {
            let instances = match value {
                None => Map::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(Value::Array(list)) => list
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (instance_name(&param.name, i), v.clone()))
                    .collect(),
                Some(_) => return Err(malformed(param, "期望以实例名为键的映射")),
            };
            let Some(template) = param.template.as_deref() else {
                return Ok(());
            };
            let template = template.clone();
            param.children.clear();
            for (instance, instance_value) in &instances {
                let mut child = template.clone();
                child.name = instance.clone();
                apply_param(catalog, &mut child, Some(instance_value))?;
                param.children.insert(instance.clone(), child);
            }
        }
        ParamKind::Container => {
            let empty = Map::new();
            let data = match value {
                None => &empty,
                Some(Value::Object(map)) => map,
                Some(_) => return Err(malformed(param, "期望映射")),
            };
            apply_params(catalog, &mut param.children, data)?;
        }
        ParamKind::Event => {
            let data = match value {
                None => None,
                Some(Value::String(action)) => {
                    let mut data = Map::new();
                    data.insert(ACTION_KEY.to_string(), Value::from(action.as_str()));
                    Some(data)
                }
                Some(Value::Object(map)) => Some(map.clone()),
                Some(_) => return Err(malformed(param, "期望 Action 映射")),
            };
            let action = data
                .as_ref()
                .and_then(|d| d.get(ACTION_KEY))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| param.default.as_str().map(str::to_string))
                .unwrap_or_default();
            param.value = Value::from(action.as_str());
            param.children = event_children(catalog, &action)?;
            if let Some(data) = &data {
                apply_params(catalog, &mut param.children, data)?;
            }
        }
        _ => match value {
            Some(v) => {
                param.value = v.clone();
                if let Some(global) = &mut param.global {
                    global.active = false;
                }
            }
            None => match &mut param.global {
                Some(global) => global.active = true,
                None => param.value = param.default.clone(),
            },
        },
    }
    Ok(())
}

/// Event 的子参数：被引用 Action 的参数，外加 `action` 子项
fn event_children(
    catalog: &ActionCatalog,
    action: &str,
) -> Result<BTreeMap<String, ParamDescriptor>, ConvertError> {
    if action.is_empty() {
        return Ok(BTreeMap::new());
    }
    let descriptor = catalog
        .get(action)
        .ok_or_else(|| ConvertError::UnknownAction {
            name: action.to_string(),
        })?;
    let mut children = descriptor.requirements.clone();
    children.insert(
        ACTION_KEY.to_string(),
        ParamDescriptor {
            name: ACTION_KEY.to_string(),
            kind: ParamKind::String,
            value: Value::from(action),
            default: Value::from(action),
            editable: false,
            preview: false,
            required: true,
            global: None,
            children: BTreeMap::new(),
            template: None,
            options: Vec::new(),
        },
    );
    Ok(children)
}

fn malformed(param: &ParamDescriptor, message: &str) -> ConvertError {
    ConvertError::Malformed {
        param: param.name.clone(),
        message: message.to_string(),
    }
}
