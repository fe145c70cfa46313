//! `convert` 命令实现
//!
//! 编辑器形态的场景文件把每个条目展开为 [`EditorAction`]：
//!
//! ```json
//! {
//!   "type": "Scene_Dialogue",
//!   "background": "Sprites/bg.png",
//!   "sections": { "sprites": [ EditorAction, ... ] },
//!   "dialogue": { "Main": { "description": "", "entries": [ EditorAction, ... ] } }
//! }
//! ```

use std::collections::BTreeMap;

use anyhow::Context;
use hb_runtime::metadata::{ActionCatalog, ActionData, EditorAction, editor_to_engine, engine_to_editor};
use hb_runtime::scene::Branch;
use hb_runtime::SceneData;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 编辑器形态的分支
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorBranch {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entries: Vec<EditorAction>,
}

/// 编辑器形态的场景文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorScene {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sections: BTreeMap<String, Vec<EditorAction>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dialogue: BTreeMap<String, EditorBranch>,
}

/// 引擎形态 → 编辑器形态
pub fn scene_to_editor(catalog: &ActionCatalog, scene: &SceneData) -> anyhow::Result<EditorScene> {
    let mut sections = BTreeMap::new();
    for (section, action, entries) in scene.sections() {
        if entries.is_empty() {
            continue;
        }
        let converted = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let mut data = entry.clone();
                data.insert("action".to_string(), Value::from(action));
                engine_to_editor(catalog, &data).with_context(|| format!("{section}[{i}]"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        sections.insert(section.to_string(), converted);
    }

    let mut dialogue = BTreeMap::new();
    for (name, branch) in &scene.dialogue {
        let entries = branch
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                engine_to_editor(catalog, entry).with_context(|| format!("dialogue.{name}[{i}]"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        dialogue.insert(
            name.clone(),
            EditorBranch {
                description: branch.description.clone(),
                entries,
            },
        );
    }

    Ok(EditorScene {
        kind: scene.kind.clone(),
        background: scene.background.clone(),
        sections,
        dialogue,
    })
}

/// 编辑器形态 → 引擎形态
pub fn scene_to_engine(editor: &EditorScene) -> anyhow::Result<SceneData> {
    let mut scene = SceneData {
        kind: editor.kind.clone(),
        background: editor.background.clone(),
        ..SceneData::default()
    };

    for (section, actions) in &editor.sections {
        let entries: Vec<ActionData> = actions
            .iter()
            .map(|action| {
                let mut data = editor_to_engine(action);
                // 内容段的 Action 名由段名决定
                data.remove("action");
                data
            })
            .collect();
        let target = section_mut(&mut scene, section)
            .with_context(|| format!("未知的内容段 '{section}'"))?;
        *target = entries;
    }

    for (name, branch) in &editor.dialogue {
        scene.dialogue.insert(
            name.clone(),
            Branch {
                description: branch.description.clone(),
                entries: branch.entries.iter().map(editor_to_engine).collect(),
            },
        );
    }
    Ok(scene)
}

fn section_mut<'a>(scene: &'a mut SceneData, section: &str) -> Option<&'a mut Vec<ActionData>> {
    match section {
        "sprites" => Some(&mut scene.sprites),
        "interactables" => Some(&mut scene.interactables),
        "buttons" => Some(&mut scene.buttons),
        "text" => Some(&mut scene.text),
        "containers" => Some(&mut scene.containers),
        _ => None,
    }
}

pub fn engine_file_to_editor(content: &str) -> anyhow::Result<String> {
    let catalog = ActionCatalog::builtin()?;
    let scene: SceneData = serde_json::from_str(content).context("无法解析引擎形态的场景文件")?;
    let editor = scene_to_editor(&catalog, &scene)?;
    Ok(serde_json::to_string_pretty(&editor)?)
}

pub fn editor_file_to_engine(content: &str) -> anyhow::Result<String> {
    let editor: EditorScene = serde_json::from_str(content).context("无法解析编辑器形态的场景文件")?;
    let scene = scene_to_engine(&editor)?;
    Ok(serde_json::to_string_pretty(&scene)?)
}
