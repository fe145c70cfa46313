//! # 效果 Action
//!
//! `play_transition`：在已有 Renderable 上播放过渡效果，效果完成时 Action 完成。

use super::{
    Action, ActionContext, ActionOutput, ActionState, data_key, skip_transition, tick_transition,
};
use crate::error::ActionError;
use crate::metadata::{ActionData, Params};
use crate::transition::Transition;

/// 播放过渡效果
pub struct PlayTransition {
    data: ActionData,
    target: Option<String>,
    transition: Option<Box<dyn Transition>>,
    state: ActionState,
}

impl PlayTransition {
    pub const NAME: &'static str = "play_transition";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            target: data_key(&data, "target_key"),
            data,
            transition: None,
            state: ActionState::default(),
        })
    }
}

impl Action for PlayTransition {
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
        let (target, effect, speed) = {
            let params = Params::for_action(ctx.project, Self::NAME, &self.data)?;
            (
                params.string("target_key")?,
                params.string("type")?,
                params.opt_float("speed")?,
            )
        };
        let transition = ctx.start_transition(&effect, &target, speed)?;
        if transition.is_complete() {
            self.state.complete = true;
        }
        self.target = Some(target);
        self.transition = Some(transition);
        Ok(ActionOutput::Nothing)
    }

    fn update(&mut self, ctx: &mut ActionContext<'_>) {
        if tick_transition(&mut self.transition, ctx) {
            self.mark_complete();
        }
    }

    fn skip(&mut self, ctx: &mut ActionContext<'_>) {
        skip_transition(&mut self.transition, ctx);
        self.mark_complete();
    }

    fn target_key(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

impl std::fmt::Debug for PlayTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayTransition")
            .field("target", &self.target)
            .field("transition", &self.transition.as_ref().map(|t| t.name()))
            .field("state", &self.state)
            .finish()
    }
}
