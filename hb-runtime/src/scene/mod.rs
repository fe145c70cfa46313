//! # Scene 模块
//!
//! 场景持有 RenderableGroup、ActionManager 与场景数据，每帧驱动更新与绘制。
//!
//! ## 单帧顺序
//!
//! 1. 指针输入 → Interactable 状态机（点击收集为待执行的 Action）
//! 2. 执行点击绑定的 Action
//! 3. 推进输入：有可跳过的 Action 时全部跳过，否则推进对话
//! 4. 上一帧未执行完的 `no_wait` 条目
//! 5. ActionManager 更新（Action 更新，然后触发完成回调）
//! 6. 处理本帧产生的场景信号（分支切换、场景切换……）
//!
//! 绘制在 `update` 之后单独调用，只在有 Renderable 变化时进行。
//!
//! ## 模块结构
//!
//! - [`dialogue`]：对话推进（分支、索引、`post_wait`）
//! - [`manager`]：SceneManager（场景切换、视口、画布）

pub mod dialogue;
pub mod manager;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::action::{ActionContext, ActionManager, ActionRegistry, FrameState, SceneSignal};
use crate::error::SceneError;
use crate::geometry::{Rgb, Viewport};
use crate::graphics::{Canvas, Graphics};
use crate::input::{InputEvent, PointerState};
use crate::metadata::ActionData;
use crate::project::Project;
use crate::renderable::RenderableGroup;

pub use dialogue::{Branch, DialogueDriver, MAIN_BRANCH, MAX_ENTRIES_PER_FRAME, PostWait};
pub use manager::SceneManager;

/// 一帧内信号处理的最大轮数（处理信号可能产生新的信号）
const MAX_SIGNAL_ROUNDS: usize = 16;

/// 场景类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Dialogue,
    PointAndClick,
}

impl SceneKind {
    pub const DIALOGUE_TAG: &'static str = "Scene_Dialogue";
    pub const POINT_AND_CLICK_TAG: &'static str = "Scene_Point_And_Click";

    pub fn parse(tag: &str) -> Result<Self, SceneError> {
        match tag {
            Self::DIALOGUE_TAG => Ok(SceneKind::Dialogue),
            Self::POINT_AND_CLICK_TAG => Ok(SceneKind::PointAndClick),
            other => Err(SceneError::UnknownSceneKind {
                kind: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneKind::Dialogue => Self::DIALOGUE_TAG,
            SceneKind::PointAndClick => Self::POINT_AND_CLICK_TAG,
        }
    }
}

/// 解析后的场景文件（引擎形态）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    /// 场景类型标签；缺省时由加载方指定
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sprites: Vec<ActionData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactables: Vec<ActionData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ActionData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<ActionData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ActionData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dialogue: BTreeMap<String, Branch>,
}

impl SceneData {
    /// 读取并解析场景文件
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content, path)
    }

    /// `path` 只用于错误信息
    pub fn from_json(content: &str, path: impl AsRef<Path>) -> Result<Self, SceneError> {
        serde_json::from_str(content).map_err(|e| SceneError::Parse {
            path: path.as_ref().to_path_buf(),
            message: e.to_string(),
        })
    }

    /// 内容段：`(段名, 对应的 Action 名, 条目)`，按加载顺序排列
    pub fn sections(&self) -> [(&'static str, &'static str, &[ActionData]); 5] {
        [
            ("sprites", "create_sprite", &self.sprites),
            ("interactables", "create_interactable", &self.interactables),
            ("buttons", "create_button", &self.buttons),
            ("text", "create_text", &self.text),
            ("containers", "create_container", &self.containers),
        ]
    }
}

/// 场景向 SceneManager 提出的请求
#[derive(Debug, Clone, PartialEq)]
pub enum SceneRequest {
    LoadScene { path: String, kind: Option<String> },
    Quit,
}

/// 场景运行所需的外部资源
pub struct SceneServices<'a> {
    pub project: &'a Project,
    pub registry: &'a ActionRegistry,
    pub graphics: &'a mut Graphics,
}

/// 活动场景
#[derive(Debug)]
pub struct Scene {
    path: String,
    kind: SceneKind,
    data: SceneData,
    renderables: RenderableGroup,
    actions: ActionManager,
    frame: FrameState,
    dialogue: Option<DialogueDriver>,
    viewport: Viewport,
    pointer: Option<(f32, f32)>,
    requests: Vec<SceneRequest>,
    draw_count: u64,
}

impl Scene {
    /// 构建场景：加载背景与各内容段，对话场景开始执行 `Main` 分支
    pub fn load(
        path: impl Into<String>,
        kind: SceneKind,
        data: SceneData,
        services: &mut SceneServices<'_>,
        viewport: Viewport,
    ) -> Self {
        let dialogue = (kind == SceneKind::Dialogue)
            .then(|| DialogueDriver::new(data.dialogue.clone()));
        let mut scene = Self {
            path: path.into(),
            kind,
            data,
            renderables: RenderableGroup::new(),
            actions: ActionManager::new(),
            frame: FrameState {
                redraw_requested: true,
                ..FrameState::default()
            },
            dialogue,
            viewport,
            pointer: None,
            requests: Vec::new(),
            draw_count: 0,
        };
        info!(path = %scene.path, kind = kind.as_str(), "加载场景");

        let mut initial = Vec::new();
        if let Some(background) = &scene.data.background {
            let mut data = ActionData::new();
            data.insert("sprite".to_string(), Value::from(background.as_str()));
            initial.push(("load_background", data));
        }
        for (_, action, entries) in scene.data.sections() {
            for entry in entries {
                initial.push((action, entry.clone()));
            }
        }

        {
            let (mut ctx, actions, dialogue) = scene.parts(services, 0.0);
            for (action, data) in initial {
                if let Err(e) = actions.perform_action(&mut ctx, action, data, None) {
                    error!(action, error = %e, "场景内容无法创建");
                }
            }
            if let Some(driver) = dialogue {
                driver.load_action(actions, &mut ctx);
            }
        }
        scene.process_signals(services);
        scene
    }

    /// 拆分出 Action 执行上下文
    fn parts<'s>(
        &'s mut self,
        services: &'s mut SceneServices<'_>,
        delta_time: f32,
    ) -> (
        ActionContext<'s>,
        &'s mut ActionManager,
        Option<&'s mut DialogueDriver>,
    ) {
        let Scene {
            renderables,
            actions,
            frame,
            dialogue,
            viewport,
            ..
        } = self;
        let ctx = ActionContext {
            renderables,
            frame,
            graphics: &mut *services.graphics,
            project: services.project,
            registry: services.registry,
            viewport: *viewport,
            delta_time,
        };
        (ctx, actions, dialogue.as_mut())
    }

    /// 推进一帧
    pub fn update(&mut self, events: &[InputEvent], delta_time: f32, services: &mut SceneServices<'_>) {
        let steps = PointerState::steps(self.pointer, events);
        let mut clicks = Vec::new();
        for step in &steps {
            self.pointer = step.position;
            let result = self.renderables.handle_pointer(step);
            if result.changed {
                self.frame.redraw_requested = true;
            }
            clicks.extend(result.clicks);
        }
        let advances = events
            .iter()
            .filter(|e| matches!(e, InputEvent::Advance))
            .count();

        {
            let (mut ctx, actions, mut dialogue) = self.parts(services, delta_time);

            for click in clicks {
                perform_event(actions, &mut ctx, click);
            }

            for _ in 0..advances {
                if actions.has_skippable() {
                    actions.skip_all(&mut ctx);
                } else if let Some(driver) = dialogue.as_deref_mut() {
                    driver.advance(actions, &mut ctx);
                }
            }

            if let Some(driver) = dialogue.as_deref_mut()
                && driver.has_pending()
            {
                driver.load_action(actions, &mut ctx);
            }

            actions.update(&mut ctx);
        }
        self.process_signals(services);
    }

    /// 处理本帧积累的信号
    fn process_signals(&mut self, services: &mut SceneServices<'_>) {
        for _ in 0..MAX_SIGNAL_ROUNDS {
            let signals = std::mem::take(&mut self.frame.signals);
            if signals.is_empty() {
                return;
            }
            let mut requests = Vec::new();
            {
                let (mut ctx, actions, mut dialogue) = self.parts(services, 0.0);
                for signal in signals {
                    match signal {
                        SceneSignal::LoadScene { path, kind } => {
                            requests.push(SceneRequest::LoadScene { path, kind });
                        }
                        SceneSignal::Quit => requests.push(SceneRequest::Quit),
                        SceneSignal::PerformAction(data) => perform_event(actions, &mut ctx, data),
                        SceneSignal::SwitchBranch(branch) => match dialogue.as_deref_mut() {
                            Some(driver) => driver.switch_branch(&branch, actions, &mut ctx),
                            None => warn!(branch = %branch, "非对话场景收到分支切换"),
                        },
                        SceneSignal::DialogueStepComplete { branch, index } => {
                            if let Some(driver) = dialogue.as_deref_mut() {
                                driver.on_step_complete(&branch, index, actions, &mut ctx);
                            }
                        }
                    }
                }
            }
            self.requests.extend(requests);
        }
        warn!(
            rounds = MAX_SIGNAL_ROUNDS,
            remaining = self.frame.signals.len(),
            "场景信号处理轮数达到上限，剩余信号下一帧处理"
        );
    }

    /// 取出待处理的场景请求
    pub fn take_requests(&mut self) -> Vec<SceneRequest> {
        std::mem::take(&mut self.requests)
    }

    /// 有变化时合成到画布，返回是否绘制
    pub fn draw(&mut self, canvas: &mut Canvas) -> bool {
        if !self.frame.redraw_requested {
            return false;
        }
        canvas.fill(Rgb::BLACK);
        self.renderables.draw(canvas);
        self.frame.redraw_requested = false;
        self.draw_count += 1;
        true
    }

    /// 视口变化
    pub fn resize(&mut self, viewport: Viewport) {
        debug!(size = ?viewport.size, "场景视口变化");
        self.viewport = viewport;
        self.renderables.recalculate_size(viewport);
        self.frame.redraw_requested = true;
    }

    /// 销毁：先丢弃 Action（连同其过渡效果），再清空 Renderable
    pub fn teardown(&mut self) {
        debug!(path = %self.path, actions = self.actions.len(), renderables = self.renderables.len(), "销毁场景");
        self.actions.clear();
        self.renderables.clear();
        self.dialogue = None;
        self.frame = FrameState::default();
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> SceneKind {
        self.kind
    }

    pub fn data(&self) -> &SceneData {
        &self.data
    }

    pub fn renderables(&self) -> &RenderableGroup {
        &self.renderables
    }

    pub fn actions(&self) -> &ActionManager {
        &self.actions
    }

    pub fn dialogue(&self) -> Option<&DialogueDriver> {
        self.dialogue.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn redraw_requested(&self) -> bool {
        self.frame.redraw_requested
    }

    /// 已绘制的帧数
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }
}

/// 执行 Interactable 绑定的 Action（引擎形态，带 `action` 键）
fn perform_event(actions: &mut ActionManager, ctx: &mut ActionContext<'_>, data: ActionData) {
    let name = data
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Err(e) = actions.perform_action(ctx, &name, data, None) {
        error!(action = %name, error = %e, "点击绑定的 Action 无法执行");
    }
}
