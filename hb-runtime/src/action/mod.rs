//! # Action 模块
//!
//! 场景的工作单元：按名字从注册表创建，生命周期为 `start` → `update`* → 完成。
//!
//! ## 架构概述
//!
//! ```text
//! Scene ──perform_action(name, data)──► ActionManager ──► ActionRegistry (name → factory)
//!                                            │
//!                                            │ start / update / skip
//!                                            ▼
//!                                      ActionContext
//!                       (RenderableGroup, Graphics, Project, FrameState)
//! ```
//!
//! Action 不直接修改场景流程：切换场景、切换分支、退出等通过
//! [`SceneSignal`] 发给所属场景，由场景在本帧内统一处理。
//!
//! ## 模块结构
//!
//! - [`manager`]：ActionManager（并发调度、完成回调）
//! - [`registry`]：名字 → 构造函数注册表
//! - [`scene_flow`]：`load_scene` / `quit_game` / `wait` / `pause` / `choose_branch`
//! - [`renderables`]：`load_background` / `create_*` / `unload_sprite`
//! - [`dialogue`]：`dialogue` / `load_dialogue_interface` / `create_choice`
//! - [`effects`]：`play_transition`

pub mod dialogue;
pub mod effects;
pub mod manager;
pub mod registry;
pub mod renderables;
pub mod scene_flow;

use crate::error::ActionError;
use crate::geometry::Viewport;
use crate::graphics::Graphics;
use crate::metadata::ActionData;
use crate::project::Project;
use crate::renderable::{Renderable, RenderableGroup};
use crate::transition::Transition;

pub use manager::ActionManager;
pub use registry::{ActionFactory, ActionRegistry};

/// Action 发给所属场景的信号
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSignal {
    /// 切换场景；`kind` 为空时使用场景文件自身的类型
    LoadScene { path: String, kind: Option<String> },
    /// 切换对话分支（从第 0 条开始）
    SwitchBranch(String),
    /// 退出游戏
    Quit,
    /// 执行一个 Action（Interactable 点击）
    PerformAction(ActionData),
    /// `wait_until_complete` 的对话条目完成
    DialogueStepComplete { branch: String, index: usize },
}

/// 单帧的共享状态
#[derive(Debug, Default)]
pub struct FrameState {
    pub signals: Vec<SceneSignal>,
    pub redraw_requested: bool,
}

/// Action 执行时可访问的场景资源
pub struct ActionContext<'a> {
    pub renderables: &'a mut RenderableGroup,
    pub frame: &'a mut FrameState,
    pub graphics: &'a mut Graphics,
    pub project: &'a Project,
    pub registry: &'a ActionRegistry,
    pub viewport: Viewport,
    /// 距上一帧的秒数
    pub delta_time: f32,
}

impl ActionContext<'_> {
    pub fn emit(&mut self, signal: SceneSignal) {
        self.frame.signals.push(signal);
    }

    pub fn request_redraw(&mut self) {
        self.frame.redraw_requested = true;
    }

    /// 按当前视口布局后加入场景，返回键
    pub fn add_renderable(&mut self, mut renderable: Renderable) -> Result<String, ActionError> {
        renderable.recalculate_size(self.viewport);
        let key = renderable.key.clone();
        self.renderables.add(renderable)?;
        self.request_redraw();
        Ok(key)
    }

    /// 按名字创建并启动过渡效果
    pub fn start_transition(
        &mut self,
        name: &str,
        target: &str,
        speed: Option<f32>,
    ) -> Result<Box<dyn Transition>, ActionError> {
        let mut transition = self.registry.create_transition(name, target, speed)?;
        transition.start(self)?;
        Ok(transition)
    }
}

/// `start` 的返回值
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionOutput {
    #[default]
    Nothing,
    /// 新建的 Renderable 的键
    Created(String),
}

/// 完成回调
pub type CompleteDelegate = Box<dyn FnOnce(&mut ActionContext<'_>)>;

/// Action 的公共状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionState {
    pub complete: bool,
    pub skippable: bool,
}

impl Default for ActionState {
    fn default() -> Self {
        Self {
            complete: false,
            skippable: true,
        }
    }
}

/// Action
pub trait Action {
    fn name(&self) -> &'static str;

    fn state(&self) -> &ActionState;

    fn state_mut(&mut self) -> &mut ActionState;

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutput, ActionError>;

    /// 每帧调用，直到完成
    fn update(&mut self, _ctx: &mut ActionContext<'_>) {}

    /// 强制完成（先把可见状态推到终值）
    fn skip(&mut self, _ctx: &mut ActionContext<'_>) {
        self.mark_complete();
    }

    /// 该 Action 的过渡效果所作用的 Renderable
    ///
    /// 新 Action 启动前，作用于同一目标的旧 Action 会被 `skip`。
    fn target_key(&self) -> Option<&str> {
        None
    }

    fn is_complete(&self) -> bool {
        self.state().complete
    }

    fn is_skippable(&self) -> bool {
        self.state().skippable
    }

    fn mark_complete(&mut self) {
        self.state_mut().complete = true;
    }
}

/// 驱动 Action 自带的过渡效果；过渡完成时返回 true
pub(crate) fn tick_transition(
    transition: &mut Option<Box<dyn Transition>>,
    ctx: &mut ActionContext<'_>,
) -> bool {
    match transition {
        Some(t) => {
            t.update(ctx);
            t.is_complete()
        }
        None => true,
    }
}

/// 跳过 Action 自带的过渡效果
pub(crate) fn skip_transition(
    transition: &mut Option<Box<dyn Transition>>,
    ctx: &mut ActionContext<'_>,
) {
    if let Some(t) = transition
        && !t.is_complete()
    {
        t.skip(ctx);
    }
}

/// 从数据中读取目标键（构造时调用，不经过描述符）
pub(crate) fn data_key(data: &ActionData, name: &str) -> Option<String> {
    data.get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod testing {
    //! 单元测试用的场景资源

    use super::*;
    use crate::assets::AssetResolver;
    use crate::graphics::FontCache;
    use crate::project::{ProjectSettings, ValueStore};

    pub struct Fixture {
        pub renderables: RenderableGroup,
        pub frame: FrameState,
        pub graphics: Graphics,
        pub project: Project,
        pub registry: ActionRegistry,
        pub viewport: Viewport,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                renderables: RenderableGroup::new(),
                frame: FrameState::default(),
                graphics: Graphics::new(AssetResolver::new("/nonexistent", "/nonexistent"))
                    .with_fonts(FontCache::with_system_dirs(Vec::new())),
                project: Project::from_parts(
                    "/nonexistent",
                    ProjectSettings::default(),
                    ValueStore::new(),
                )
                .unwrap(),
                registry: ActionRegistry::builtin(),
                viewport: Viewport::default(),
            }
        }

        pub fn add(&mut self, renderable: Renderable) {
            self.renderables.add(renderable).unwrap();
        }

        pub fn with_ctx<R>(&mut self, delta_time: f32, f: impl FnOnce(&mut ActionContext<'_>) -> R) -> R {
            let mut ctx = ActionContext {
                renderables: &mut self.renderables,
                frame: &mut self.frame,
                graphics: &mut self.graphics,
                project: &self.project,
                registry: &self.registry,
                viewport: self.viewport,
                delta_time,
            };
            f(&mut ctx)
        }

        /// 直接启动一个 Action（不经过 ActionManager）
        pub fn start(&mut self, name: &str, data: serde_json::Value) -> (Box<dyn Action>, Result<ActionOutput, ActionError>) {
            let data = data.as_object().cloned().unwrap_or_default();
            let mut action = self.registry.create_action(name, data).unwrap();
            let result = self.with_ctx(0.0, |ctx| action.start(ctx));
            (action, result)
        }
    }
}
