//! # 诊断模块
//!
//! 场景文件的静态检查，不依赖 IO 或窗口。
//!
//! ## 设计原则
//!
//! - 纯函数 API：输入已解析的 [`SceneData`] 与 Action 目录
//! - 诊断分级：Error（运行时会丢失内容）、Warn（建议修复）、Info（信息提示）
//! - 检查规则与运行时一致：必需参数、全局绑定、`post_wait` 解析都复用运行时的定义

use std::collections::BTreeSet;

use serde_json::Value;

use crate::metadata::{ActionCatalog, ActionData, ParamDescriptor, ParamKind};
use crate::scene::{MAIN_BRANCH, PostWait, SceneData, SceneKind};

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// 场景 ID / 文件路径
    pub scene_id: String,
    /// 场景内位置，如 `dialogue.Main[3]`、`sprites[0]`
    pub location: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, scene_id: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            scene_id: scene_id.to_string(),
            location: None,
            message: message.into(),
        }
    }

    pub fn error(scene_id: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, scene_id, message)
    }

    pub fn warn(scene_id: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, scene_id, message)
    }

    pub fn info(scene_id: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, scene_id, message)
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.scene_id)?;
        if let Some(location) = &self.location {
            write!(f, " {location}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 不低于 `min_level` 的条目
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }
}

/// 场景引用的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Image,
    Font,
    /// 场景文件或其他文件
    File,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "图片"),
            Self::Font => write!(f, "字体"),
            Self::File => write!(f, "文件"),
        }
    }
}

/// 资源引用
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssetReference {
    pub kind: AssetKind,
    /// 场景文件中的原始路径
    pub path: String,
    pub location: String,
}

/// 检查一个场景
pub fn analyze_scene(scene_id: &str, scene: &SceneData, catalog: &ActionCatalog) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();

    let kind = match SceneKind::parse(&scene.kind) {
        Ok(kind) => Some(kind),
        Err(_) if scene.kind.is_empty() => {
            result.push(Diagnostic::warn(scene_id, "缺少 type，需要由加载方指定场景类型"));
            None
        }
        Err(_) => {
            result.push(Diagnostic::error(
                scene_id,
                format!("未知场景类型 '{}'", scene.kind),
            ));
            None
        }
    };

    for (section, action, entries) in scene.sections() {
        for (i, entry) in entries.iter().enumerate() {
            check_entry(&mut result, scene_id, &format!("{section}[{i}]"), action, entry, catalog);
        }
    }

    let branches: BTreeSet<&str> = scene.dialogue.keys().map(String::as_str).collect();
    match kind {
        Some(SceneKind::Dialogue) if !branches.contains(MAIN_BRANCH) => {
            result.push(Diagnostic::error(scene_id, "对话场景缺少 Main 分支"));
        }
        Some(SceneKind::PointAndClick) if !branches.is_empty() => {
            result.push(Diagnostic::warn(scene_id, "非对话场景的 dialogue 段不会被执行"));
        }
        _ => {}
    }

    for (name, branch) in &scene.dialogue {
        if branch.entries.is_empty() {
            result.push(Diagnostic::info(scene_id, "分支没有条目").at(format!("dialogue.{name}")));
        }
        for (i, entry) in branch.entries.iter().enumerate() {
            let location = format!("dialogue.{name}[{i}]");
            check_post_wait(&mut result, scene_id, &location, entry);

            let action = entry.get("action").and_then(Value::as_str).unwrap_or_default();
            if action.is_empty() {
                result.push(Diagnostic::error(scene_id, "条目缺少 action").at(location));
                continue;
            }
            check_entry(&mut result, scene_id, &location, action, entry, catalog);
        }
    }

    // 分支引用只在有对话段时才有意义
    if !branches.is_empty() {
        for (location, branch) in branch_references(scene) {
            if !branches.contains(branch.as_str()) {
                result.push(
                    Diagnostic::warn(scene_id, format!("引用了不存在的分支 '{branch}'")).at(location),
                );
            }
        }
    }

    result
}

fn check_post_wait(result: &mut DiagnosticResult, scene_id: &str, location: &str, entry: &ActionData) {
    match entry.get("post_wait") {
        Some(Value::String(value)) if PostWait::parse(value).is_none() => {
            result.push(
                Diagnostic::warn(scene_id, format!("未知的 post_wait '{value}'，按 no_wait 执行"))
                    .at(location),
            );
        }
        Some(Value::String(_)) => {}
        Some(_) => {
            result.push(Diagnostic::warn(scene_id, "post_wait 应为字符串").at(location));
        }
        None if entry.contains_key("wait") => {
            result.push(
                Diagnostic::info(scene_id, "使用了旧版 wait 字段，建议改为 post_wait").at(location),
            );
        }
        None => {}
    }
}

/// 检查单个 Action 实例：名字已注册、必需参数齐全，递归检查 Container 子节点
fn check_entry(
    result: &mut DiagnosticResult,
    scene_id: &str,
    location: &str,
    action: &str,
    data: &ActionData,
    catalog: &ActionCatalog,
) {
    let Some(descriptor) = catalog.get(action) else {
        result.push(Diagnostic::error(scene_id, format!("未知 Action '{action}'")).at(location));
        return;
    };
    check_requirements(result, scene_id, location, action, &descriptor.requirements, data, catalog);
}

fn check_requirements(
    result: &mut DiagnosticResult,
    scene_id: &str,
    location: &str,
    action: &str,
    requirements: &std::collections::BTreeMap<String, ParamDescriptor>,
    data: &ActionData,
    catalog: &ActionCatalog,
) {
    for (name, param) in requirements {
        let value = data.get(name).filter(|v| !v.is_null());
        if param.required && param.global.is_none() && !is_given(value) {
            result.push(
                Diagnostic::warn(
                    scene_id,
                    format!("{action} 缺少必需参数 '{name}'，运行时不会创建内容"),
                )
                .at(location),
            );
        }

        if param.kind != ParamKind::Container {
            continue;
        }
        let Some(value) = value else {
            continue;
        };
        if let Some(template) = &param.template {
            let instances: Vec<(String, &ActionData)> = match value {
                Value::Object(map) => map
                    .iter()
                    .filter_map(|(k, v)| v.as_object().map(|o| (k.clone(), o)))
                    .collect(),
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_object)
                    .enumerate()
                    .map(|(i, o)| (i.to_string(), o))
                    .collect(),
                _ => Vec::new(),
            };
            for (instance, child) in instances {
                let child_location = format!("{location}.{name}.{instance}");
                if template.kind == ParamKind::Event {
                    let child_action = child
                        .get("action")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .or_else(|| template.default.as_str())
                        .unwrap_or_default();
                    check_entry(result, scene_id, &child_location, child_action, child, catalog);
                } else {
                    check_requirements(
                        result,
                        scene_id,
                        &child_location,
                        action,
                        &template.children,
                        child,
                        catalog,
                    );
                }
            }
        } else if let Some(child) = value.as_object() {
            check_requirements(
                result,
                scene_id,
                &format!("{location}.{name}"),
                action,
                &param.children,
                child,
                catalog,
            );
        }
    }
}

fn is_given(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// 场景中所有 `choose_branch` 与选项按钮引用的分支名
pub fn branch_references(scene: &SceneData) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (section, _, entries) in scene.sections() {
        for (i, entry) in entries.iter().enumerate() {
            collect_branches(&format!("{section}[{i}]"), entry, &mut out);
        }
    }
    for (name, branch) in &scene.dialogue {
        for (i, entry) in branch.entries.iter().enumerate() {
            collect_branches(&format!("dialogue.{name}[{i}]"), entry, &mut out);
        }
    }
    out
}

fn collect_branches(location: &str, data: &ActionData, out: &mut Vec<(String, String)>) {
    let action = data.get("action").and_then(Value::as_str).unwrap_or_default();
    let is_choice_entry = data.contains_key("branch") && !data.contains_key("scene_file");
    if (action == "choose_branch" || (action.is_empty() && is_choice_entry))
        && let Some(branch) = data.get("branch").and_then(Value::as_str)
        && !branch.is_empty()
    {
        out.push((location.to_string(), branch.to_string()));
    }
    for (key, value) in data {
        match value {
            Value::Object(map) => collect_branches(&format!("{location}.{key}"), map, out),
            Value::Array(list) => {
                for (i, item) in list.iter().enumerate() {
                    if let Some(map) = item.as_object() {
                        collect_branches(&format!("{location}.{key}[{i}]"), map, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// 收集场景引用的资源（按目录中的参数类型识别）
pub fn extract_asset_references(scene: &SceneData, catalog: &ActionCatalog) -> Vec<AssetReference> {
    let mut out = Vec::new();
    if let Some(background) = scene.background.as_deref().filter(|s| !s.is_empty()) {
        out.push(AssetReference {
            kind: AssetKind::Image,
            path: background.to_string(),
            location: "background".to_string(),
        });
    }
    for (section, action, entries) in scene.sections() {
        for (i, entry) in entries.iter().enumerate() {
            collect_assets(&format!("{section}[{i}]"), action, entry, catalog, &mut out);
        }
    }
    for (name, branch) in &scene.dialogue {
        for (i, entry) in branch.entries.iter().enumerate() {
            let action = entry.get("action").and_then(Value::as_str).unwrap_or_default();
            collect_assets(&format!("dialogue.{name}[{i}]"), action, entry, catalog, &mut out);
        }
    }
    out.sort();
    out.dedup_by(|a, b| a.kind == b.kind && a.path == b.path);
    out
}

fn collect_assets(
    location: &str,
    action: &str,
    data: &ActionData,
    catalog: &ActionCatalog,
    out: &mut Vec<AssetReference>,
) {
    if let Some(descriptor) = catalog.get(action) {
        walk_assets(location, &descriptor.requirements, data, catalog, out);
    }
}

fn walk_assets(
    location: &str,
    requirements: &std::collections::BTreeMap<String, ParamDescriptor>,
    data: &ActionData,
    catalog: &ActionCatalog,
    out: &mut Vec<AssetReference>,
) {
    for (name, param) in requirements {
        let Some(value) = data.get(name) else {
            continue;
        };
        let kind = match param.kind {
            ParamKind::FileImage => Some(AssetKind::Image),
            ParamKind::FileFont => Some(AssetKind::Font),
            ParamKind::File => Some(AssetKind::File),
            _ => None,
        };
        if let Some(kind) = kind {
            if let Some(path) = value.as_str().filter(|s| !s.is_empty() && *s != "None") {
                out.push(AssetReference {
                    kind,
                    path: path.to_string(),
                    location: format!("{location}.{name}"),
                });
            }
            continue;
        }

        match (&param.template, value) {
            (Some(template), Value::Object(map)) => {
                for (instance, child) in map {
                    let Some(child) = child.as_object() else {
                        continue;
                    };
                    let child_location = format!("{location}.{name}.{instance}");
                    if template.kind == ParamKind::Event {
                        let action = child
                            .get("action")
                            .and_then(Value::as_str)
                            .or_else(|| template.default.as_str())
                            .unwrap_or_default();
                        collect_assets(&child_location, action, child, catalog, out);
                    } else {
                        walk_assets(&child_location, &template.children, child, catalog, out);
                    }
                }
            }
            (None, Value::Object(child)) if param.kind == ParamKind::Event => {
                let action = child.get("action").and_then(Value::as_str).unwrap_or_default();
                collect_assets(&format!("{location}.{name}"), action, child, catalog, out);
            }
            (None, Value::Object(child)) => {
                walk_assets(&format!("{location}.{name}"), &param.children, child, catalog, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scene(value: serde_json::Value) -> SceneData {
        serde_json::from_value(value).unwrap()
    }

    fn catalog() -> ActionCatalog {
        ActionCatalog::builtin().unwrap()
    }

    #[test]
    fn test_clean_scene() {
        let data = scene(json!({
            "type": "Scene_Dialogue",
            "dialogue": {
                "Main": { "entries": [
                    { "action": "dialogue", "dialogue_text": "Hi", "post_wait": "wait_for_input" },
                    { "action": "create_choice", "choices": {
                        "choice_01": { "key": "A", "branch": "Side" }
                    } }
                ] },
                "Side": { "entries": [ { "action": "quit_game" } ] }
            }
        }));
        let result = analyze_scene("clean.json", &data, &catalog());
        assert!(result.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn test_reports_problems() {
        let data = scene(json!({
            "type": "Scene_Dialogue",
            "sprites": [ { "sprite": "hero.png" } ],
            "dialogue": {
                "Intro": { "entries": [
                    { "action": "teleport" },
                    { "dialogue_text": "no action" },
                    { "action": "wait", "wait": true },
                    { "action": "wait", "post_wait": "eventually" },
                    { "action": "choose_branch", "branch": "Nowhere" }
                ] }
            }
        }));
        let result = analyze_scene("bad.json", &data, &catalog());
        let messages: Vec<String> = result.diagnostics.iter().map(ToString::to_string).collect();

        assert!(result.has_errors());
        assert!(messages.iter().any(|m| m.contains("sprites[0]") && m.contains("'key'")));
        assert!(messages.iter().any(|m| m.contains("缺少 Main 分支")));
        assert!(messages.iter().any(|m| m.contains("'teleport'")));
        assert!(messages.iter().any(|m| m.contains("dialogue.Intro[1]") && m.contains("缺少 action")));
        assert!(messages.iter().any(|m| m.starts_with("[INFO]") && m.contains("旧版 wait")));
        assert!(messages.iter().any(|m| m.contains("'eventually'")));
        assert!(messages.iter().any(|m| m.contains("'Nowhere'")));
    }

    #[test]
    fn test_nested_container_requirements() {
        let data = scene(json!({
            "type": "Scene_Point_And_Click",
            "containers": [{
                "key": "Menu",
                "buttons": { "b": { "action": "create_button", "sprite": "b.png" } }
            }]
        }));
        let result = analyze_scene("menu.json", &data, &catalog());
        assert_eq!(result.warn_count(), 1);
        assert_eq!(
            result.diagnostics[0].location.as_deref(),
            Some("containers[0].buttons.b")
        );
    }

    #[test]
    fn test_unknown_kind() {
        let data = scene(json!({ "type": "Scene_Battle" }));
        let result = analyze_scene("x.json", &data, &catalog());
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn test_asset_references() {
        let data = scene(json!({
            "type": "Scene_Dialogue",
            "background": "bg.png",
            "interactables": [{
                "key": "Door",
                "sprite": "door.png",
                "on_click": { "action": "load_scene", "scene_file": "Scenes/Hall.json" }
            }],
            "dialogue": { "Main": { "entries": [
                { "action": "create_text", "key": "T", "font": "Fonts/Title.ttf" },
                { "action": "load_background", "sprite": "bg.png" }
            ] } }
        }));
        let refs = extract_asset_references(&data, &catalog());
        let paths: Vec<(AssetKind, &str)> = refs.iter().map(|r| (r.kind, r.path.as_str())).collect();
        assert_eq!(
            paths,
            vec![
                (AssetKind::Image, "bg.png"),
                (AssetKind::Image, "door.png"),
                (AssetKind::Font, "Fonts/Title.ttf"),
                (AssetKind::File, "Scenes/Hall.json"),
            ]
        );
    }
}
