//! # ActionManager
//!
//! 单个场景内的 Action 调度器。
//!
//! ## 执行流程
//!
//! 1. `perform_action`：从注册表创建 Action，挂上完成回调，加入活动集合，调用 `start`
//! 2. `update`：对活动集合做快照；已完成的放入延迟列表，其余调用 `update`
//! 3. 遍历延迟列表：触发完成回调（至多一次），然后丢弃
//!
//! `start` 失败（缺少参数、目标不存在……）只记录警告，Action 立即完成；
//! 它仍然进入活动集合，所以完成回调会在下一次 `update` 照常触发。

use std::mem;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{Action, ActionContext, ActionOutput, CompleteDelegate};
use crate::error::ActionError;
use crate::metadata::ActionData;

struct ActiveAction {
    id: u64,
    action: Box<dyn Action>,
    on_complete: Option<CompleteDelegate>,
}

/// Action 调度器
#[derive(Default)]
pub struct ActionManager {
    active: Vec<ActiveAction>,
    next_id: u64,
}

impl ActionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并启动 Action
    ///
    /// 只有名字未注册时返回错误；其余失败在内部记录并让 Action 立即完成。
    pub fn perform_action(
        &mut self,
        ctx: &mut ActionContext<'_>,
        name: &str,
        data: ActionData,
        on_complete: Option<CompleteDelegate>,
    ) -> Result<ActionOutput, ActionError> {
        let skippable = data
            .get("skippable")
            .and_then(Value::as_bool)
            .or_else(|| ctx.project.catalog.get(name).map(|d| d.skippable))
            .unwrap_or(true);

        let mut action = ctx.registry.create_action(name, data)?;
        action.state_mut().skippable = skippable;

        if let Some(target) = action.target_key() {
            self.cancel_target(ctx, target);
        }

        let id = self.next_id;
        self.next_id += 1;
        debug!(action = name, id, "执行 Action");

        let output = match action.start(ctx) {
            Ok(output) => output,
            Err(e) => {
                warn!(action = name, error = %e, "Action 启动失败，立即完成");
                action.mark_complete();
                ActionOutput::Nothing
            }
        };

        self.active.push(ActiveAction {
            id,
            action,
            on_complete,
        });
        Ok(output)
    }

    /// 作用于同一目标的旧 Action 被新 Action 取代
    fn cancel_target(&mut self, ctx: &mut ActionContext<'_>, target: &str) {
        for entry in &mut self.active {
            if !entry.action.is_complete() && entry.action.target_key() == Some(target) {
                debug!(
                    action = entry.action.name(),
                    id = entry.id,
                    target,
                    "同一目标上的新过渡取代旧过渡"
                );
                entry.action.skip(ctx);
            }
        }
    }

    /// 每帧调用
    pub fn update(&mut self, ctx: &mut ActionContext<'_>) {
        let mut finished = Vec::new();
        for mut entry in mem::take(&mut self.active) {
            if entry.action.is_complete() {
                finished.push(entry);
                continue;
            }
            entry.action.update(ctx);
            self.active.push(entry);
        }

        for entry in finished {
            trace!(action = entry.action.name(), id = entry.id, "Action 完成");
            if let Some(on_complete) = entry.on_complete {
                on_complete(ctx);
            }
        }
    }

    /// 跳过所有可跳过的 Action，返回跳过的数量
    pub fn skip_all(&mut self, ctx: &mut ActionContext<'_>) -> usize {
        let mut skipped = 0;
        for entry in &mut self.active {
            if !entry.action.is_complete() && entry.action.is_skippable() {
                entry.action.skip(ctx);
                skipped += 1;
            }
        }
        if skipped > 0 {
            debug!(count = skipped, "跳过 Action");
        }
        skipped
    }

    /// 是否有尚未完成且可跳过的 Action
    pub fn has_skippable(&self) -> bool {
        self.active
            .iter()
            .any(|e| !e.action.is_complete() && e.action.is_skippable())
    }

    /// 活动集合中各 Action 的名字
    pub fn active_names(&self) -> Vec<&'static str> {
        self.active.iter().map(|e| e.action.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// 丢弃所有 Action（不触发完成回调）
    pub fn clear(&mut self) {
        if !self.active.is_empty() {
            debug!(count = self.active.len(), "清空 Action");
        }
        self.active.clear();
    }
}

impl std::fmt::Debug for ActionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionManager")
            .field("active", &self.active_names())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::action::testing::Fixture;
    use crate::geometry::Rgb;
    use crate::graphics::Surface;
    use crate::renderable::{Placement, Renderable};

    fn data(value: serde_json::Value) -> ActionData {
        value.as_object().cloned().unwrap()
    }

    fn counter_delegate(counter: &Rc<Cell<u32>>) -> CompleteDelegate {
        let counter = counter.clone();
        Box::new(move |_ctx| counter.set(counter.get() + 1))
    }

    #[test]
    fn test_delegate_fires_once_on_next_tick() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let fired = Rc::new(Cell::new(0));

        let output = fixture
            .with_ctx(0.0, |ctx| {
                manager.perform_action(
                    ctx,
                    "create_sprite",
                    data(json!({ "key": "Hero", "sprite": "hero.png" })),
                    Some(counter_delegate(&fired)),
                )
            })
            .unwrap();
        assert_eq!(output, ActionOutput::Created("Hero".to_string()));
        assert_eq!(fired.get(), 0);
        assert_eq!(manager.len(), 1);

        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(fired.get(), 1);
        assert!(manager.is_empty());

        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_unknown_action_name() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let result = fixture.with_ctx(0.0, |ctx| {
            manager.perform_action(ctx, "fly", ActionData::new(), None)
        });
        assert_eq!(
            result,
            Err(ActionError::UnknownActionName {
                name: "fly".to_string()
            })
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn test_start_failure_completes_immediately() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let fired = Rc::new(Cell::new(0));

        let output = fixture
            .with_ctx(0.0, |ctx| {
                manager.perform_action(
                    ctx,
                    "create_sprite",
                    data(json!({ "sprite": "hero.png" })),
                    Some(counter_delegate(&fired)),
                )
            })
            .unwrap();
        assert_eq!(output, ActionOutput::Nothing);
        assert!(fixture.renderables.is_empty());

        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_skip_all_respects_skippable() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        fixture.with_ctx(0.0, |ctx| {
            manager
                .perform_action(ctx, "wait", data(json!({ "seconds": 5.0 })), None)
                .unwrap();
            manager
                .perform_action(
                    ctx,
                    "wait",
                    data(json!({ "seconds": 5.0, "skippable": false })),
                    None,
                )
                .unwrap();
        });
        assert!(manager.has_skippable());

        let skipped = fixture.with_ctx(0.0, |ctx| manager.skip_all(ctx));
        assert_eq!(skipped, 1);
        assert!(!manager.has_skippable());

        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(manager.active_names(), vec!["wait"]);
    }

    #[test]
    fn test_second_transition_on_same_target_replaces_first() {
        let mut fixture = Fixture::new();
        fixture.add(Renderable::sprite(
            "Hero",
            Placement::default(),
            "hero.png",
            Surface::filled(2, 2, Rgb::WHITE, 255),
        ));
        let mut manager = ActionManager::new();

        fixture.with_ctx(0.0, |ctx| {
            manager
                .perform_action(
                    ctx,
                    "play_transition",
                    data(json!({ "target_key": "Hero", "type": "fade_in", "speed": 1.0 })),
                    None,
                )
                .unwrap();
        });
        assert_eq!(fixture.renderables.get("Hero").unwrap().opacity, 0.0);

        fixture.with_ctx(0.0, |ctx| {
            manager
                .perform_action(
                    ctx,
                    "play_transition",
                    data(json!({ "target_key": "Hero", "type": "fade_out", "speed": 1.0 })),
                    None,
                )
                .unwrap();
        });
        // 旧的淡入被跳到终点，淡出从 255 开始
        assert_eq!(fixture.renderables.get("Hero").unwrap().opacity, 255.0);

        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_clear_drops_without_callbacks() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let fired = Rc::new(Cell::new(0));
        fixture.with_ctx(0.0, |ctx| {
            manager
                .perform_action(
                    ctx,
                    "wait",
                    data(json!({ "seconds": 1.0 })),
                    Some(counter_delegate(&fired)),
                )
                .unwrap();
        });
        manager.clear();
        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(fired.get(), 0);
    }
}
