//! # Renderable Action
//!
//! `load_background` / `create_sprite` / `create_text` / `create_interactable` /
//! `create_button` / `create_container` / `unload_sprite`
//!
//! `create_*` 在 `start` 中构建 Renderable 并加入场景后立即完成，
//! 返回 [`ActionOutput::Created`]。Container 的子节点按同一套构建逻辑递归生成。

use tracing::{debug, warn};

use super::registry::ActionFactory;
use super::{
    Action, ActionContext, ActionOutput, ActionState, data_key, skip_transition, tick_transition,
};
use crate::error::ActionError;
use crate::geometry::Vec2;
use crate::graphics::Surface;
use crate::metadata::{ActionData, Params};
use crate::renderable::{InteractableData, Placement, Renderable, TextData};
use crate::transition::Transition;

/// 背景的固定键
pub const BACKGROUND_KEY: &str = "Background";

/// 背景的 z 序（始终在最底层）
pub const BACKGROUND_Z_ORDER: i32 = -9999;

/// Container 的模板列表：`(参数名, 缺省的 Action 名)`
const CONTAINER_LISTS: [(&str, &str); 5] = [
    ("objects", CreateRenderable::SPRITE),
    ("interactables", CreateRenderable::INTERACTABLE),
    ("buttons", CreateRenderable::BUTTON),
    ("text", CreateRenderable::TEXT),
    ("choices", CreateRenderable::CHOICE),
];

/// 加载背景（键固定为 `Background`，重复加载时替换）
///
/// 图片缩放到主分辨率，铺满画面。
#[derive(Debug)]
pub struct LoadBackground {
    data: ActionData,
    state: ActionState,
}

impl LoadBackground {
    pub const NAME: &'static str = "load_background";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            data,
            state: ActionState::default(),
        })
    }
}

impl Action for LoadBackground {
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
        let path = Params::for_action(ctx.project, Self::NAME, &self.data)?.string("sprite")?;
        let (width, height) = ctx.viewport.main;
        let surface = ctx.graphics.load_image(&path).resized_to(width, height);
        let placement = Placement {
            position: Vec2::new(0.0, 0.0),
            center_align: false,
            z_order: BACKGROUND_Z_ORDER,
        };
        let key = ctx.add_renderable(Renderable::sprite(BACKGROUND_KEY, placement, path, surface))?;
        self.mark_complete();
        Ok(ActionOutput::Created(key))
    }
}

/// 创建单个 Renderable 的 Action（`create_*` 共用）
#[derive(Debug)]
pub struct CreateRenderable {
    name: &'static str,
    data: ActionData,
    state: ActionState,
}

impl CreateRenderable {
    pub const SPRITE: &'static str = "create_sprite";
    pub const TEXT: &'static str = "create_text";
    pub const INTERACTABLE: &'static str = "create_interactable";
    pub const BUTTON: &'static str = "create_button";
    pub const CONTAINER: &'static str = "create_container";
    pub const CHOICE: &'static str = "create_choice";

    /// 注册表条目
    pub const FACTORIES: [(&'static str, ActionFactory); 6] = [
        (Self::SPRITE, |data| Self::boxed(Self::SPRITE, data)),
        (Self::TEXT, |data| Self::boxed(Self::TEXT, data)),
        (Self::INTERACTABLE, |data| Self::boxed(Self::INTERACTABLE, data)),
        (Self::BUTTON, |data| Self::boxed(Self::BUTTON, data)),
        (Self::CONTAINER, |data| Self::boxed(Self::CONTAINER, data)),
        (Self::CHOICE, |data| Self::boxed(Self::CHOICE, data)),
    ];

    pub fn boxed(name: &'static str, data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            name,
            data,
            state: ActionState::default(),
        })
    }
}

impl Action for CreateRenderable {
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
        let renderable = build_renderable(ctx, self.name, &self.data)?;
        let key = ctx.add_renderable(renderable)?;
        debug!(action = self.name, key = %key, "创建 Renderable");
        self.mark_complete();
        Ok(ActionOutput::Created(key))
    }
}

/// 按 `create_*` 的 Action 名和参数构建 Renderable（不加入场景）
pub fn build_renderable(
    ctx: &mut ActionContext<'_>,
    name: &str,
    data: &ActionData,
) -> Result<Renderable, ActionError> {
    let project = ctx.project;
    let params = Params::for_action(project, name, data)?;
    match name {
        CreateRenderable::SPRITE => {
            let path = params.string("sprite")?;
            let surface = ctx.graphics.load_image(&path);
            let mut sprite = Renderable::sprite(params.string("key")?, params.placement()?, path, surface);
            if params.bool("flip")? {
                sprite.flip();
            }
            Ok(sprite)
        }
        CreateRenderable::TEXT => {
            let text = text_data(&params, params.string("text")?)?;
            Ok(Renderable::text(
                params.string("key")?,
                params.placement()?,
                text,
                ctx.graphics,
            ))
        }
        CreateRenderable::INTERACTABLE => {
            let key = params.string("key")?;
            let placement = params.placement()?;
            let (normal, data) = interactable_parts(
                ctx,
                &params.string("sprite")?,
                params.opt_string("sprite_hover")?,
                params.opt_string("sprite_clicked")?,
                params.event("on_click")?,
            );
            Ok(Renderable::interactable(key, placement, normal, data))
        }
        CreateRenderable::BUTTON => {
            let spec = ButtonSpec::from_params(&params)?;
            Ok(build_button(ctx, spec))
        }
        CreateRenderable::CONTAINER => build_container(ctx, &params),
        CreateRenderable::CHOICE => super::dialogue::build_choice(ctx, &params),
        _ => Err(ActionError::InvalidParameter {
            action: name.to_string(),
            param: "action".to_string(),
            expected: "create_* Action".to_string(),
        }),
    }
}

/// 字体、字号、颜色
pub(crate) fn text_data(params: &Params<'_>, text: String) -> Result<TextData, ActionError> {
    Ok(TextData::new(
        text,
        params.string("font")?,
        params.int("text_size")?,
        params.color("text_color")?,
    ))
}

/// 加载常态/悬停/按下三张表面；缺少的状态沿用前一张
fn interactable_parts(
    ctx: &mut ActionContext<'_>,
    sprite: &str,
    hover: Option<String>,
    pressed: Option<String>,
    on_click: Option<ActionData>,
) -> (Surface, InteractableData) {
    let normal = ctx.graphics.load_image(sprite);
    let hover = match hover {
        Some(path) => ctx.graphics.load_image(&path),
        None => normal.clone(),
    };
    let pressed = match pressed {
        Some(path) => ctx.graphics.load_image(&path),
        None => hover.clone(),
    };
    (normal, InteractableData::new(hover, pressed, on_click))
}

/// 按钮的全部参数
#[derive(Debug, Clone)]
pub(crate) struct ButtonSpec {
    pub key: String,
    pub placement: Placement,
    pub sprite: String,
    pub sprite_hover: Option<String>,
    pub sprite_clicked: Option<String>,
    pub on_click: Option<ActionData>,
    pub label: TextData,
}

impl ButtonSpec {
    pub fn from_params(params: &Params<'_>) -> Result<Self, ActionError> {
        Ok(Self {
            key: params.string("key")?,
            placement: params.placement()?,
            sprite: params.string("sprite")?,
            sprite_hover: params.opt_string("sprite_hover")?,
            sprite_clicked: params.opt_string("sprite_clicked")?,
            on_click: params.event("on_click")?,
            label: text_data(params, params.string("button_text")?)?,
        })
    }
}

/// 按钮 + 居中的文字子节点（键为 `<key>_Text`，z 序与按钮相同）
pub(crate) fn build_button(ctx: &mut ActionContext<'_>, spec: ButtonSpec) -> Renderable {
    let (normal, data) = interactable_parts(
        ctx,
        &spec.sprite,
        spec.sprite_hover,
        spec.sprite_clicked,
        spec.on_click,
    );
    let mut button = Renderable::button(spec.key, spec.placement, normal, data);
    button.recalculate_size(ctx.viewport);

    let label_placement = Placement {
        position: button.center_position(),
        center_align: true,
        z_order: button.z_order,
    };
    let label = Renderable::text(
        Renderable::label_key(&button.key),
        label_placement,
        spec.label,
        ctx.graphics,
    );
    button.add_child(label);
    button
}

fn build_container(
    ctx: &mut ActionContext<'_>,
    params: &Params<'_>,
) -> Result<Renderable, ActionError> {
    let mut container = Renderable::container(params.string("key")?, params.placement()?);
    for (list, default_action) in CONTAINER_LISTS {
        for (instance, data) in params.entries(list) {
            let name = data
                .get("action")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(default_action);
            match build_renderable(ctx, name, data) {
                Ok(child) => container.add_child(child),
                Err(e) => warn!(
                    container = %container.key,
                    instance = %instance,
                    error = %e,
                    "Container 子节点创建失败，已跳过"
                ),
            }
        }
    }
    Ok(container)
}

/// 移除 Renderable，可选先淡出
pub struct UnloadSprite {
    data: ActionData,
    key: Option<String>,
    transition: Option<Box<dyn Transition>>,
    state: ActionState,
}

impl UnloadSprite {
    pub const NAME: &'static str = "unload_sprite";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            key: data_key(&data, "key"),
            data,
            transition: None,
            state: ActionState::default(),
        })
    }

    fn finish(&mut self, ctx: &mut ActionContext<'_>) {
        if let Some(key) = &self.key
            && ctx.renderables.remove(key).is_some()
        {
            debug!(key = %key, "卸载 Renderable");
            ctx.request_redraw();
        }
        self.mark_complete();
    }
}

impl Action for UnloadSprite {
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
        let (key, effect, speed) = {
            let params = Params::for_action(ctx.project, Self::NAME, &self.data)?;
            let transition = params.child("transition");
            (
                params.string("key")?,
                transition.opt_string("type")?,
                transition.opt_float("speed")?,
            )
        };
        if !ctx.renderables.contains(&key) {
            return Err(ActionError::UnknownRenderableKey {
                action: Self::NAME.to_string(),
                key,
            });
        }
        self.key = Some(key.clone());

        match effect.filter(|e| e != "None") {
            Some(effect) => match ctx.start_transition(&effect, &key, speed) {
                Ok(transition) => self.transition = Some(transition),
                Err(e) => {
                    warn!(key = %key, effect = %effect, error = %e, "卸载过渡无法创建，直接移除");
                    self.finish(ctx);
                }
            },
            None => self.finish(ctx),
        }
        Ok(ActionOutput::Nothing)
    }

    fn update(&mut self, ctx: &mut ActionContext<'_>) {
        if tick_transition(&mut self.transition, ctx) {
            self.finish(ctx);
        }
    }

    fn skip(&mut self, ctx: &mut ActionContext<'_>) {
        skip_transition(&mut self.transition, ctx);
        self.finish(ctx);
    }

    fn target_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl std::fmt::Debug for UnloadSprite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadSprite")
            .field("key", &self.key)
            .field("transition", &self.transition.as_ref().map(|t| t.name()))
            .field("state", &self.state)
            .finish()
    }
}
