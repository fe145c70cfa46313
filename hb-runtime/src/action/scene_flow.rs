//! # 场景流程 Action
//!
//! `load_scene` / `quit_game` / `wait` / `pause` / `choose_branch`
//!
//! 这些 Action 不直接改动场景，只向所属场景发 [`SceneSignal`]。

use tracing::debug;

use super::{Action, ActionContext, ActionOutput, ActionState, SceneSignal};
use crate::error::ActionError;
use crate::metadata::{ActionData, Params};

/// 切换场景
#[derive(Debug)]
pub struct LoadScene {
    data: ActionData,
    state: ActionState,
}

impl LoadScene {
    pub const NAME: &'static str = "load_scene";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            data,
            state: ActionState::default(),
        })
    }
}

impl Action for LoadScene {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> &ActionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ActionState {
        &mut self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutput, ActionError> {
        let (path, kind) = {
            let params = Params::for_action(ctx.project, Self::NAME, &self.data)?;
            let path = params.string("scene_file")?;
            // 只有实例显式指定时才覆盖场景文件自身的类型
            let kind = if params.has("scene_type") {
                params.opt_string("scene_type")?
            } else {
                None
            };
            (path, kind)
        };
        ctx.emit(SceneSignal::LoadScene { path, kind });
        self.mark_complete();
        Ok(ActionOutput::Nothing)
    }
}

/// 退出游戏
#[derive(Debug)]
pub struct QuitGame {
    state: ActionState,
}

impl QuitGame {
    pub const NAME: &'static str = "quit_game";

    pub fn boxed(_data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            state: ActionState::default(),
        })
    }
}

impl Action for QuitGame {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> &ActionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ActionState {
        &mut self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutput, ActionError> {
        ctx.emit(SceneSignal::Quit);
        self.mark_complete();
        Ok(ActionOutput::Nothing)
    }
}

/// 等待指定秒数；`wait` 与 `pause` 行为相同
#[derive(Debug)]
pub struct Wait {
    name: &'static str,
    data: ActionData,
    seconds: f32,
    elapsed: f32,
    state: ActionState,
}

impl Wait {
    pub const WAIT: &'static str = "wait";
    pub const PAUSE: &'static str = "pause";

    fn new(name: &'static str, data: ActionData) -> Self {
        Self {
            name,
            data,
            seconds: 0.0,
            elapsed: 0.0,
            state: ActionState::default(),
        }
    }

    pub fn wait(data: ActionData) -> Box<dyn Action> {
        Box::new(Self::new(Self::WAIT, data))
    }

    pub fn pause(data: ActionData) -> Box<dyn Action> {
        Box::new(Self::new(Self::PAUSE, data))
    }
}

impl Action for Wait {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> &ActionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ActionState {
        &mut self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutput, ActionError> {
        self.seconds = Params::for_action(ctx.project, self.name, &self.data)?
            .float("seconds")?
            .max(0.0);
        self.elapsed = 0.0;
        if self.seconds == 0.0 {
            self.mark_complete();
        }
        Ok(ActionOutput::Nothing)
    }

    fn update(&mut self, ctx: &mut ActionContext<'_>) {
        self.elapsed += ctx.delta_time.max(0.0);
        if self.elapsed >= self.seconds {
            self.mark_complete();
        }
    }
}

/// 切换对话分支，并移除触发它的选项面板
#[derive(Debug)]
pub struct ChooseBranch {
    data: ActionData,
    state: ActionState,
}

impl ChooseBranch {
    pub const NAME: &'static str = "choose_branch";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            data,
            state: ActionState::default(),
        })
    }
}

impl Action for ChooseBranch {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> &ActionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ActionState {
        &mut self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutput, ActionError> {
        let (branch, choice_key) = {
            let params = Params::for_action(ctx.project, Self::NAME, &self.data)?;
            (params.string("branch")?, params.opt_string("choice_key")?)
        };

        if let Some(key) = choice_key
            && ctx.renderables.remove(&key).is_some()
        {
            debug!(key = %key, "移除选项面板");
            ctx.request_redraw();
        }
        ctx.emit(SceneSignal::SwitchBranch(branch));
        self.mark_complete();
        Ok(ActionOutput::Nothing)
    }
}
