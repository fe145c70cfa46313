//! # Transition 模块
//!
//! 绑定在单个 Renderable 上的时间驱动效果。
//!
//! ## 支持的过渡效果
//!
//! - `fade_in`：不透明度 0 → 255
//! - `fade_out`：不透明度从当前值 → 0
//! - `text_loading`：逐字显示文字
//!
//! 每次 `update` 进度增加 `speed × delta_time`，到达目标值时完成。
//! `skip` 直接跳到终值并请求重绘。

use tracing::debug;

use crate::action::ActionContext;
use crate::error::ActionError;
use crate::renderable::{OPAQUE, RenderableKind};

/// 过渡效果的公共状态
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionState {
    /// 目标 Renderable 的键
    pub target: String,
    pub speed: f32,
    /// 单调递增
    pub progress: f32,
    pub goal: f32,
    pub complete: bool,
}

impl TransitionState {
    pub fn new(target: impl Into<String>, speed: f32) -> Self {
        Self {
            target: target.into(),
            speed: speed.max(0.0),
            progress: 0.0,
            goal: 0.0,
            complete: false,
        }
    }

    /// 推进一帧，返回新的进度（不超过目标值）
    fn advance(&mut self, delta_time: f32) -> f32 {
        self.progress = (self.progress + self.speed * delta_time.max(0.0)).min(self.goal);
        self.progress
    }

    fn reached_goal(&self) -> bool {
        self.progress >= self.goal
    }
}

/// 过渡效果
pub trait Transition {
    fn name(&self) -> &'static str;

    fn state(&self) -> &TransitionState;

    /// 开始；目标不存在时返回 `UnknownRenderableKey`
    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError>;

    fn update(&mut self, ctx: &mut ActionContext<'_>);

    /// 跳到终值并完成
    fn skip(&mut self, ctx: &mut ActionContext<'_>);

    fn is_complete(&self) -> bool {
        self.state().complete
    }

    fn target(&self) -> &str {
        &self.state().target
    }
}

/// 过渡效果构造函数：`(目标键, 速度)`，速度缺省时使用各自的默认值
pub type TransitionFactory = fn(String, Option<f32>) -> Box<dyn Transition>;

fn unknown_target(name: &str, state: &TransitionState) -> ActionError {
    ActionError::UnknownRenderableKey {
        action: name.to_string(),
        key: state.target.clone(),
    }
}

/// 淡入
#[derive(Debug)]
pub struct FadeIn {
    state: TransitionState,
}

impl FadeIn {
    pub const NAME: &'static str = "fade_in";
    pub const DEFAULT_SPEED: f32 = 255.0;

    pub fn new(target: String, speed: Option<f32>) -> Self {
        Self {
            state: TransitionState::new(target, speed.unwrap_or(Self::DEFAULT_SPEED)),
        }
    }

    pub fn boxed(target: String, speed: Option<f32>) -> Box<dyn Transition> {
        Box::new(Self::new(target, speed))
    }
}

impl Transition for FadeIn {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> &TransitionState {
        &self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let renderable = ctx
            .renderables
            .get_mut(&self.state.target)
            .ok_or_else(|| unknown_target(Self::NAME, &self.state))?;
        renderable.opacity = 0.0;
        self.state.progress = 0.0;
        self.state.goal = OPAQUE;
        ctx.request_redraw();
        Ok(())
    }

    fn update(&mut self, ctx: &mut ActionContext<'_>) {
        if self.state.complete {
            return;
        }
        let progress = self.state.advance(ctx.delta_time);
        let Some(renderable) = ctx.renderables.get_mut(&self.state.target) else {
            self.state.complete = true;
            return;
        };
        renderable.opacity = progress;
        ctx.request_redraw();
        if self.state.reached_goal() {
            self.state.complete = true;
        }
    }

    fn skip(&mut self, ctx: &mut ActionContext<'_>) {
        self.state.progress = self.state.goal;
        if let Some(renderable) = ctx.renderables.get_mut(&self.state.target) {
            renderable.opacity = OPAQUE;
        }
        ctx.request_redraw();
        self.state.complete = true;
    }
}

/// 淡出
#[derive(Debug)]
pub struct FadeOut {
    state: TransitionState,
}

impl FadeOut {
    pub const NAME: &'static str = "fade_out";
    pub const DEFAULT_SPEED: f32 = 255.0;

    pub fn new(target: String, speed: Option<f32>) -> Self {
        Self {
            state: TransitionState::new(target, speed.unwrap_or(Self::DEFAULT_SPEED)),
        }
    }

    pub fn boxed(target: String, speed: Option<f32>) -> Box<dyn Transition> {
        Box::new(Self::new(target, speed))
    }
}

impl Transition for FadeOut {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> &TransitionState {
        &self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let renderable = ctx
            .renderables
            .get(&self.state.target)
            .ok_or_else(|| unknown_target(Self::NAME, &self.state))?;
        // 进度表示已经减去的不透明度
        self.state.goal = renderable.opacity.clamp(0.0, OPAQUE);
        self.state.progress = 0.0;
        if self.state.reached_goal() {
            self.state.complete = true;
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut ActionContext<'_>) {
        if self.state.complete {
            return;
        }
        let progress = self.state.advance(ctx.delta_time);
        let Some(renderable) = ctx.renderables.get_mut(&self.state.target) else {
            self.state.complete = true;
            return;
        };
        renderable.opacity = self.state.goal - progress;
        ctx.request_redraw();
        if self.state.reached_goal() {
            self.state.complete = true;
        }
    }

    fn skip(&mut self, ctx: &mut ActionContext<'_>) {
        self.state.progress = self.state.goal;
        if let Some(renderable) = ctx.renderables.get_mut(&self.state.target) {
            renderable.opacity = 0.0;
        }
        ctx.request_redraw();
        self.state.complete = true;
    }
}

/// 逐字显示
#[derive(Debug)]
pub struct TextLoading {
    state: TransitionState,
    shown: usize,
}

impl TextLoading {
    pub const NAME: &'static str = "text_loading";
    pub const DEFAULT_SPEED: f32 = 40.0;

    pub fn new(target: String, speed: Option<f32>) -> Self {
        Self {
            state: TransitionState::new(target, speed.unwrap_or(Self::DEFAULT_SPEED)),
            shown: 0,
        }
    }

    pub fn boxed(target: String, speed: Option<f32>) -> Box<dyn Transition> {
        Box::new(Self::new(target, speed))
    }

    fn reveal(&mut self, ctx: &mut ActionContext<'_>, visible: Option<usize>) {
        let graphics = &mut *ctx.graphics;
        if let Some(renderable) = ctx.renderables.get_mut(&self.state.target) {
            renderable.update_text(graphics, |text| text.visible_chars = visible);
        }
        ctx.request_redraw();
    }
}

impl Transition for TextLoading {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> &TransitionState {
        &self.state
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let renderable = ctx
            .renderables
            .get(&self.state.target)
            .ok_or_else(|| unknown_target(Self::NAME, &self.state))?;
        let RenderableKind::Text(text) = renderable.kind() else {
            return Err(ActionError::InvalidParameter {
                action: Self::NAME.to_string(),
                param: "target_key".to_string(),
                expected: "Text Renderable".to_string(),
            });
        };

        self.state.goal = text.char_count() as f32;
        self.state.progress = 0.0;
        self.shown = 0;
        if self.state.reached_goal() {
            self.state.complete = true;
            self.reveal(ctx, None);
        } else {
            self.reveal(ctx, Some(0));
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut ActionContext<'_>) {
        if self.state.complete {
            return;
        }
        if !ctx.renderables.contains(&self.state.target) {
            self.state.complete = true;
            return;
        }
        let progress = self.state.advance(ctx.delta_time);
        if self.state.reached_goal() {
            self.state.complete = true;
            self.reveal(ctx, None);
            return;
        }
        let visible = progress.floor() as usize;
        if visible != self.shown {
            self.shown = visible;
            self.reveal(ctx, Some(visible));
        }
    }

    fn skip(&mut self, ctx: &mut ActionContext<'_>) {
        debug!(target = %self.state.target, "跳过逐字显示");
        self.state.progress = self.state.goal;
        self.reveal(ctx, None);
        self.state.complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::Fixture;
    use crate::geometry::Rgb;
    use crate::renderable::{Placement, Renderable, TextData};

    fn fixture_with_sprite() -> Fixture {
        let mut fixture = Fixture::new();
        fixture.add(Renderable::sprite(
            "Hero",
            Placement::default(),
            "hero.png",
            crate::graphics::Surface::blank(4, 4),
        ));
        fixture
    }

    #[test]
    fn test_fade_in_progress_is_monotonic() {
        let mut fixture = fixture_with_sprite();
        let mut fade = FadeIn::new("Hero".to_string(), Some(128.0));
        fixture.with_ctx(1.0 / 60.0, |ctx| fade.start(ctx)).unwrap();
        assert_eq!(fixture.renderables.get("Hero").unwrap().opacity, 0.0);

        let mut last = 0.0;
        let mut frames = 0;
        while !fade.is_complete() {
            fixture.with_ctx(1.0 / 60.0, |ctx| fade.update(ctx));
            let opacity = fixture.renderables.get("Hero").unwrap().opacity;
            assert!(opacity >= last);
            last = opacity;
            frames += 1;
            assert!(frames < 1000);
        }
        assert_eq!(last, 255.0);
        // 255 / 128 ≈ 2 秒
        assert!((119..=121).contains(&frames));
    }

    #[test]
    fn test_fade_in_skip_snaps() {
        let mut fixture = fixture_with_sprite();
        let mut fade = FadeIn::new("Hero".to_string(), None);
        fixture.with_ctx(0.0, |ctx| fade.start(ctx)).unwrap();
        fixture.frame.redraw_requested = false;

        fixture.with_ctx(0.0, |ctx| fade.skip(ctx));
        assert!(fade.is_complete());
        assert!(fixture.frame.redraw_requested);
        assert_eq!(fixture.renderables.get("Hero").unwrap().opacity, 255.0);
    }

    #[test]
    fn test_fade_out_from_current_opacity() {
        let mut fixture = fixture_with_sprite();
        fixture.renderables.get_mut("Hero").unwrap().opacity = 100.0;
        let mut fade = FadeOut::new("Hero".to_string(), Some(50.0));
        fixture.with_ctx(0.0, |ctx| fade.start(ctx)).unwrap();

        fixture.with_ctx(1.0, |ctx| fade.update(ctx));
        assert_eq!(fixture.renderables.get("Hero").unwrap().opacity, 50.0);
        fixture.with_ctx(1.5, |ctx| fade.update(ctx));
        assert_eq!(fixture.renderables.get("Hero").unwrap().opacity, 0.0);
        assert!(fade.is_complete());
    }

    #[test]
    fn test_missing_target() {
        let mut fixture = Fixture::new();
        let mut fade = FadeOut::new("Ghost".to_string(), None);
        let err = fixture.with_ctx(0.0, |ctx| fade.start(ctx)).unwrap_err();
        assert_eq!(
            err,
            ActionError::UnknownRenderableKey {
                action: "fade_out".to_string(),
                key: "Ghost".to_string()
            }
        );
    }

    #[test]
    fn test_text_loading_reveals_by_code_point() {
        let mut fixture = Fixture::new();
        let text = Renderable::text(
            "Line",
            Placement::default(),
            TextData::new("你好吗", "", 10, Rgb::WHITE),
            &mut fixture.graphics,
        );
        fixture.add(text);

        let mut loading = TextLoading::new("Line".to_string(), Some(2.0));
        fixture.with_ctx(0.0, |ctx| loading.start(ctx)).unwrap();
        let visible = |f: &Fixture| f.renderables.get("Line").unwrap().text_data().unwrap().visible_chars;
        assert_eq!(visible(&fixture), Some(0));

        fixture.with_ctx(0.5, |ctx| loading.update(ctx));
        assert_eq!(visible(&fixture), Some(1));

        fixture.with_ctx(1.0, |ctx| loading.update(ctx));
        assert_eq!(visible(&fixture), None);
        assert!(loading.is_complete());
    }

    #[test]
    fn test_text_loading_requires_text() {
        let mut fixture = fixture_with_sprite();
        let mut loading = TextLoading::new("Hero".to_string(), None);
        let err = fixture.with_ctx(0.0, |ctx| loading.start(ctx)).unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameter { .. }));
    }
}
