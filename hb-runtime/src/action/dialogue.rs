//! # 对话 Action
//!
//! `dialogue` / `load_dialogue_interface` / `create_choice`
//!
//! 说话人与台词是两个固定键的文字 Renderable（默认 `SpeakerText` / `DialogueText`），
//! 每条台词替换上一条。台词默认逐字显示，显示完毕时 Action 完成。

use serde_json::Value;
use tracing::{debug, warn};

use super::renderables::{ButtonSpec, build_button, text_data};
use super::{
    Action, ActionContext, ActionOutput, ActionState, data_key, skip_transition, tick_transition,
};
use crate::error::ActionError;
use crate::geometry::Vec2;
use crate::metadata::{ActionData, Params};
use crate::renderable::{Placement, Renderable};
use crate::transition::Transition;

/// 台词文字的默认键
pub const DIALOGUE_TEXT_KEY: &str = "DialogueText";

/// 台词框的键与 z 序
pub const DIALOGUE_FRAME_KEY: &str = "DialogueFrame";
pub const DIALOGUE_FRAME_Z_ORDER: i32 = 100;

/// 说话人框的键与 z 序
pub const SPEAKER_FRAME_KEY: &str = "SpeakerFrame";
pub const SPEAKER_FRAME_Z_ORDER: i32 = 101;

/// 未指定位置的选项依次向下排列的间距（归一化）
const CHOICE_SPACING: f32 = 0.1;

/// 显示一条台词
pub struct Dialogue {
    data: ActionData,
    target: String,
    transition: Option<Box<dyn Transition>>,
    state: ActionState,
}

impl Dialogue {
    pub const NAME: &'static str = "dialogue";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        let target = data
            .get("body")
            .and_then(Value::as_object)
            .and_then(|body| data_key(body, "key"))
            .unwrap_or_else(|| DIALOGUE_TEXT_KEY.to_string());
        Box::new(Self {
            data,
            target,
            transition: None,
            state: ActionState::default(),
        })
    }
}

/// 创建或替换一个文字 Renderable
fn upsert_text(
    ctx: &mut ActionContext<'_>,
    params: &Params<'_>,
    text: String,
) -> Result<String, ActionError> {
    let key = params.string("key")?;
    let renderable = Renderable::text(key, params.placement()?, text_data(params, text)?, ctx.graphics);
    ctx.add_renderable(renderable)
}

impl Action for Dialogue {
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
        let (effect, speed) = {
            let params = Params::for_action(ctx.project, Self::NAME, &self.data)?;
            let speaker = params.child("speaker");
            let body = params.child("body");
            upsert_text(ctx, &speaker, params.string("speaker_text")?)?;
            self.target = upsert_text(ctx, &body, params.string("dialogue_text")?)?;

            let transition = params.child("transition");
            (transition.opt_string("type")?, transition.opt_float("speed")?)
        };

        match effect.filter(|e| e != "None") {
            Some(effect) => {
                let transition = ctx.start_transition(&effect, &self.target, speed)?;
                if transition.is_complete() {
                    self.mark_complete();
                }
                self.transition = Some(transition);
            }
            None => self.mark_complete(),
        }
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
        Some(&self.target)
    }
}

impl std::fmt::Debug for Dialogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialogue")
            .field("target", &self.target)
            .field("transition", &self.transition.as_ref().map(|t| t.name()))
            .field("state", &self.state)
            .finish()
    }
}

/// 加载台词框与说话人框
#[derive(Debug)]
pub struct LoadDialogueInterface {
    data: ActionData,
    state: ActionState,
}

impl LoadDialogueInterface {
    pub const NAME: &'static str = "load_dialogue_interface";

    pub fn boxed(data: ActionData) -> Box<dyn Action> {
        Box::new(Self {
            data,
            state: ActionState::default(),
        })
    }
}

fn add_frame(
    ctx: &mut ActionContext<'_>,
    params: &Params<'_>,
    key: &str,
    z_order: i32,
) -> Result<String, ActionError> {
    let path = params.string("sprite")?;
    let placement = Placement {
        position: params.vector2("position")?,
        center_align: params.bool("center_align")?,
        z_order,
    };
    let surface = ctx.graphics.load_image(&path);
    ctx.add_renderable(Renderable::sprite(key, placement, path, surface))
}

impl Action for LoadDialogueInterface {
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
        let params = Params::for_action(ctx.project, Self::NAME, &self.data)?;
        add_frame(
            ctx,
            &params.child("dialogue_frame"),
            DIALOGUE_FRAME_KEY,
            DIALOGUE_FRAME_Z_ORDER,
        )?;
        add_frame(
            ctx,
            &params.child("speaker_frame"),
            SPEAKER_FRAME_KEY,
            SPEAKER_FRAME_Z_ORDER,
        )?;
        self.state.complete = true;
        Ok(ActionOutput::Nothing)
    }
}

/// 构建选项面板：一个 Container，每个选项是一个按钮
///
/// 选项带 `scene_file` 时点击切换场景，否则切换到 `branch` 并移除面板。
/// 单个选项构建失败只记录警告。
pub(crate) fn build_choice(
    ctx: &mut ActionContext<'_>,
    params: &Params<'_>,
) -> Result<Renderable, ActionError> {
    let key = params.string("key")?;
    let placement = params.placement()?;
    let mut panel = Renderable::container(key.clone(), placement);

    for (index, (instance, choice)) in params.instances("choices").into_iter().enumerate() {
        match choice_button(ctx, &choice, &key, placement, index) {
            Ok(button) => panel.add_child(button),
            Err(e) => warn!(
                panel = %key,
                choice = %instance,
                error = %e,
                "选项创建失败，已跳过"
            ),
        }
    }
    debug!(panel = %key, count = panel.children().len(), "创建选项面板");
    Ok(panel)
}

fn choice_button(
    ctx: &mut ActionContext<'_>,
    choice: &Params<'_>,
    panel_key: &str,
    panel: Placement,
    index: usize,
) -> Result<Renderable, ActionError> {
    let mut on_click = ActionData::new();
    match choice.opt_string("scene_file")? {
        Some(scene_file) => {
            on_click.insert("action".into(), "load_scene".into());
            on_click.insert("scene_file".into(), scene_file.into());
            if choice.has("scene_type") {
                on_click.insert("scene_type".into(), choice.string("scene_type")?.into());
            }
        }
        None => {
            on_click.insert("action".into(), "choose_branch".into());
            on_click.insert("branch".into(), choice.string("branch")?.into());
            on_click.insert("choice_key".into(), panel_key.into());
        }
    }

    let position = choice.opt_vector2("position")?.unwrap_or(Vec2::new(
        panel.position.x,
        panel.position.y + CHOICE_SPACING * index as f32,
    ));
    let spec = ButtonSpec {
        key: choice.string("key")?,
        placement: Placement {
            position,
            center_align: panel.center_align,
            z_order: panel.z_order,
        },
        sprite: choice.string("sprite")?,
        sprite_hover: choice.opt_string("sprite_hover")?,
        sprite_clicked: choice.opt_string("sprite_clicked")?,
        on_click: Some(on_click),
        label: text_data(choice, choice.string("button_text")?)?,
    };
    Ok(build_button(ctx, spec))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::action::testing::Fixture;
    use crate::renderable::RenderableKind;

    #[test]
    fn test_dialogue_creates_texts_and_reveals() {
        let mut fixture = Fixture::new();
        let (mut action, result) = fixture.start(
            "dialogue",
            json!({ "speaker_text": "Hana", "dialogue_text": "早上好" }),
        );
        assert!(result.is_ok());
        assert_eq!(action.target_key(), Some("DialogueText"));

        let speaker = fixture.renderables.get("SpeakerText").unwrap();
        assert_eq!(speaker.z_order, 200);
        assert_eq!(speaker.text_data().unwrap().size, 28);
        let body = fixture.renderables.get("DialogueText").unwrap();
        assert_eq!(body.text_data().unwrap().visible_chars, Some(0));
        assert!(!action.is_complete());

        // 40 字/秒，三个字需要 0.075 秒
        fixture.with_ctx(0.05, |ctx| action.update(ctx));
        assert_eq!(
            fixture.renderables.get("DialogueText").unwrap().text_data().unwrap().visible_chars,
            Some(2)
        );
        fixture.with_ctx(0.05, |ctx| action.update(ctx));
        assert!(action.is_complete());
        assert_eq!(
            fixture.renderables.get("DialogueText").unwrap().text_data().unwrap().visible_chars,
            None
        );
    }

    #[test]
    fn test_dialogue_without_transition_completes() {
        let mut fixture = Fixture::new();
        let (action, _) = fixture.start(
            "dialogue",
            json!({ "dialogue_text": "Hi", "transition": { "type": "None" } }),
        );
        assert!(action.is_complete());
        let body = fixture.renderables.get("DialogueText").unwrap();
        assert_eq!(body.text_data().unwrap().visible_chars, None);
    }

    #[test]
    fn test_dialogue_skip_shows_full_text() {
        let mut fixture = Fixture::new();
        let (mut action, _) = fixture.start("dialogue", json!({ "dialogue_text": "A long line" }));
        fixture.with_ctx(0.0, |ctx| action.skip(ctx));
        assert!(action.is_complete());
        let body = fixture.renderables.get("DialogueText").unwrap();
        assert_eq!(body.text_data().unwrap().visible_text(), "A long line");
    }

    #[test]
    fn test_next_line_replaces_previous() {
        let mut fixture = Fixture::new();
        fixture.start("dialogue", json!({ "dialogue_text": "one" }));
        fixture.start("dialogue", json!({ "dialogue_text": "two" }));
        assert_eq!(fixture.renderables.len(), 2);
        assert_eq!(
            fixture.renderables.get("DialogueText").unwrap().text_data().unwrap().text,
            "two"
        );
    }

    #[test]
    fn test_dialogue_interface_frames() {
        let mut fixture = Fixture::new();
        let (action, _) = fixture.start("load_dialogue_interface", json!({}));
        assert!(action.is_complete());

        let frame = fixture.renderables.get(DIALOGUE_FRAME_KEY).unwrap();
        assert_eq!(frame.z_order, DIALOGUE_FRAME_Z_ORDER);
        assert_eq!(frame.position, Vec2::new(0.5, 0.85));
        assert!(matches!(
            frame.kind(),
            RenderableKind::Sprite { path, .. } if path.ends_with("dialogue_frame.png")
        ));
        assert_eq!(
            fixture.renderables.get(SPEAKER_FRAME_KEY).unwrap().z_order,
            SPEAKER_FRAME_Z_ORDER
        );
    }

    #[test]
    fn test_choice_panel() {
        let mut fixture = Fixture::new();
        let (_, result) = fixture.start(
            "create_choice",
            json!({
                "choices": {
                    "choice_01": { "key": "GoLeft", "branch": "Left", "button_text": "Left" },
                    "choice_02": { "key": "GoOut", "scene_file": "Scenes/Out.json" },
                    "choice_03": { "branch": "Nowhere" }
                }
            }),
        );
        assert_eq!(result, Ok(ActionOutput::Created("Choice".to_string())));

        let panel = fixture.renderables.get("Choice").unwrap();
        assert_eq!(panel.children().len(), 2);

        let left = fixture.renderables.get("GoLeft").unwrap();
        assert_eq!(left.position, Vec2::new(0.5, 0.4));
        assert_eq!(left.z_order, 300);
        let RenderableKind::Button(data) = left.kind() else {
            panic!("应为按钮");
        };
        assert_eq!(
            data.action.as_ref().unwrap(),
            json!({ "action": "choose_branch", "branch": "Left", "choice_key": "Choice" })
                .as_object()
                .unwrap()
        );
        assert!(fixture.renderables.contains("GoLeft_Text"));

        let out = fixture.renderables.get("GoOut").unwrap();
        assert!((out.position.y - 0.5).abs() < 1e-6);
        let RenderableKind::Button(data) = out.kind() else {
            panic!("应为按钮");
        };
        assert_eq!(data.action.as_ref().unwrap()["action"], json!("load_scene"));
        assert!(data.action.as_ref().unwrap().get("scene_type").is_none());
    }
}
