//! # 对话推进
//!
//! 对话场景按分支顺序执行条目，每条目的 `post_wait` 决定何时执行下一条：
//!
//! | post_wait             | 行为                                             |
//! |-----------------------|--------------------------------------------------|
//! | `wait_for_input`      | 执行，索引 +1，等待推进输入                      |
//! | `wait_until_complete` | 执行并挂完成回调；回调触发时索引 +1 并继续       |
//! | `no_wait`（缺省）     | 执行，索引 +1，立即继续                          |
//!
//! `no_wait` 链用循环展开，每帧最多执行 [`MAX_ENTRIES_PER_FRAME`] 条，剩余的下一帧继续。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::action::{ActionContext, ActionManager, CompleteDelegate, SceneSignal};
use crate::metadata::ActionData;

/// 默认分支
pub const MAIN_BRANCH: &str = "Main";

/// 每帧最多执行的对话条目数
pub const MAX_ENTRIES_PER_FRAME: usize = 128;

/// 条目执行后的等待方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostWait {
    WaitForInput,
    WaitUntilComplete,
    #[default]
    NoWait,
}

impl PostWait {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostWait::WaitForInput => "wait_for_input",
            PostWait::WaitUntilComplete => "wait_until_complete",
            PostWait::NoWait => "no_wait",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "wait_for_input" => Some(PostWait::WaitForInput),
            "wait_until_complete" => Some(PostWait::WaitUntilComplete),
            "no_wait" => Some(PostWait::NoWait),
            _ => None,
        }
    }

    /// 从对话条目读取
    ///
    /// 旧版文件用 `wait: true/false`，分别对应 `wait_until_complete` / `no_wait`。
    pub fn from_entry(entry: &ActionData) -> Self {
        if let Some(value) = entry.get("post_wait").and_then(Value::as_str) {
            return Self::parse(value).unwrap_or_else(|| {
                warn!(post_wait = value, "未知的 post_wait，按 no_wait 处理");
                PostWait::NoWait
            });
        }
        match entry.get("wait").and_then(Value::as_bool) {
            Some(true) => {
                debug!("旧版 wait: true，按 wait_until_complete 处理");
                PostWait::WaitUntilComplete
            }
            Some(false) => {
                debug!("旧版 wait: false，按 no_wait 处理");
                PostWait::NoWait
            }
            None => PostWait::NoWait,
        }
    }
}

/// 对话分支
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entries: Vec<ActionData>,
}

/// 当前阻塞推进的原因
#[derive(Debug, Clone, PartialEq, Eq)]
enum Blocked {
    Input,
    Completion { branch: String, index: usize },
}

/// 对话推进器
#[derive(Debug, Clone)]
pub struct DialogueDriver {
    branches: BTreeMap<String, Branch>,
    active_branch: String,
    index: usize,
    blocked: Option<Blocked>,
    /// 上一帧达到条目上限，本帧继续
    pending: bool,
    ended: bool,
}

impl DialogueDriver {
    pub fn new(branches: BTreeMap<String, Branch>) -> Self {
        if !branches.contains_key(MAIN_BRANCH) {
            warn!("对话场景缺少 Main 分支");
        }
        Self {
            branches,
            active_branch: MAIN_BRANCH.to_string(),
            index: 0,
            blocked: None,
            pending: false,
            ended: false,
        }
    }

    pub fn active_branch(&self) -> &str {
        &self.active_branch
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 是否在等待推进输入
    pub fn waiting_for_input(&self) -> bool {
        self.blocked == Some(Blocked::Input)
    }

    /// 是否在等待某条目完成
    pub fn waiting_for_completion(&self) -> bool {
        matches!(self.blocked, Some(Blocked::Completion { .. }))
    }

    /// 当前分支已经执行完
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// 执行条目直到需要等待、分支结束或达到本帧上限
    pub fn load_action(&mut self, manager: &mut ActionManager, ctx: &mut ActionContext<'_>) {
        self.pending = false;
        for _ in 0..MAX_ENTRIES_PER_FRAME {
            if self.blocked.is_some() {
                return;
            }
            let Some(entry) = self
                .branches
                .get(&self.active_branch)
                .and_then(|b| b.entries.get(self.index))
                .cloned()
            else {
                if !self.ended {
                    info!(branch = %self.active_branch, index = self.index, "已到达分支末尾");
                }
                self.ended = true;
                return;
            };

            let name = entry
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let post_wait = PostWait::from_entry(&entry);
            let index = self.index;

            let on_complete = (post_wait == PostWait::WaitUntilComplete).then(|| {
                let branch = self.active_branch.clone();
                let delegate: CompleteDelegate = Box::new(move |ctx: &mut ActionContext<'_>| {
                    ctx.emit(SceneSignal::DialogueStepComplete { branch, index });
                });
                delegate
            });

            debug!(
                branch = %self.active_branch,
                index,
                action = %name,
                post_wait = post_wait.as_str(),
                "执行对话条目"
            );
            if let Err(e) = manager.perform_action(ctx, &name, entry, on_complete) {
                // 未知 Action 按 no_wait 处理
                error!(branch = %self.active_branch, index, error = %e, "对话条目无法执行");
                self.index += 1;
                continue;
            }

            match post_wait {
                PostWait::WaitForInput => {
                    self.index += 1;
                    self.blocked = Some(Blocked::Input);
                    return;
                }
                PostWait::WaitUntilComplete => {
                    self.blocked = Some(Blocked::Completion {
                        branch: self.active_branch.clone(),
                        index,
                    });
                    return;
                }
                PostWait::NoWait => self.index += 1,
            }
        }
        debug!(limit = MAX_ENTRIES_PER_FRAME, "本帧对话条目达到上限，下一帧继续");
        self.pending = true;
    }

    /// 推进输入；只在等待输入时生效
    pub fn advance(&mut self, manager: &mut ActionManager, ctx: &mut ActionContext<'_>) {
        match self.blocked {
            Some(Blocked::Input) => {
                self.blocked = None;
                self.load_action(manager, ctx);
            }
            Some(Blocked::Completion { .. }) => {
                debug!("等待条目完成，忽略推进");
            }
            None => self.load_action(manager, ctx),
        }
    }

    /// `wait_until_complete` 条目的完成回调
    ///
    /// 分支已切换或不是当前等待的条目时忽略。
    pub fn on_step_complete(
        &mut self,
        branch: &str,
        index: usize,
        manager: &mut ActionManager,
        ctx: &mut ActionContext<'_>,
    ) {
        let expected = Blocked::Completion {
            branch: branch.to_string(),
            index,
        };
        if self.blocked.as_ref() != Some(&expected) {
            debug!(branch, index, "过期的条目完成回调");
            return;
        }
        self.blocked = None;
        self.index = index + 1;
        self.load_action(manager, ctx);
    }

    /// 切换分支（从第 0 条开始）并立即执行
    pub fn switch_branch(
        &mut self,
        branch: &str,
        manager: &mut ActionManager,
        ctx: &mut ActionContext<'_>,
    ) {
        if !self.branches.contains_key(branch) {
            warn!(branch, "切换到不存在的分支");
        }
        info!(from = %self.active_branch, to = branch, "切换对话分支");
        self.active_branch = branch.to_string();
        self.index = 0;
        self.blocked = None;
        self.ended = false;
        self.load_action(manager, ctx);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::action::testing::Fixture;

    fn entry(value: serde_json::Value) -> ActionData {
        value.as_object().cloned().unwrap()
    }

    fn branches(entries: Vec<ActionData>) -> BTreeMap<String, Branch> {
        BTreeMap::from([(
            MAIN_BRANCH.to_string(),
            Branch {
                description: String::new(),
                entries,
            },
        )])
    }

    #[test]
    fn test_post_wait_parsing() {
        assert_eq!(
            PostWait::from_entry(&entry(json!({ "post_wait": "wait_for_input" }))),
            PostWait::WaitForInput
        );
        assert_eq!(
            PostWait::from_entry(&entry(json!({ "wait": true }))),
            PostWait::WaitUntilComplete
        );
        assert_eq!(
            PostWait::from_entry(&entry(json!({ "wait": false }))),
            PostWait::NoWait
        );
        assert_eq!(
            PostWait::from_entry(&entry(json!({ "post_wait": "later" }))),
            PostWait::NoWait
        );
        assert_eq!(PostWait::from_entry(&entry(json!({}))), PostWait::NoWait);
    }

    #[test]
    fn test_wait_for_input_blocks_until_advance() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let mut driver = DialogueDriver::new(branches(vec![
            entry(json!({ "action": "wait", "seconds": 0.0, "post_wait": "wait_for_input" })),
            entry(json!({ "action": "wait", "seconds": 0.0, "post_wait": "wait_for_input" })),
        ]));

        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert_eq!(driver.index(), 1);
        assert!(driver.waiting_for_input());

        fixture.with_ctx(0.0, |ctx| driver.advance(&mut manager, ctx));
        assert_eq!(driver.index(), 2);

        fixture.with_ctx(0.0, |ctx| driver.advance(&mut manager, ctx));
        assert!(driver.is_ended());
        assert_eq!(driver.index(), 2);
    }

    #[test]
    fn test_wait_until_complete_increments_on_callback() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let mut driver = DialogueDriver::new(branches(vec![
            entry(json!({ "action": "wait", "seconds": 1.0, "post_wait": "wait_until_complete" })),
            entry(json!({ "action": "wait", "seconds": 0.0, "post_wait": "wait_for_input" })),
        ]));

        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert_eq!(driver.index(), 0);
        assert!(driver.waiting_for_completion());

        // 等待完成期间推进无效
        fixture.with_ctx(0.0, |ctx| driver.advance(&mut manager, ctx));
        assert_eq!(driver.index(), 0);

        fixture.with_ctx(1.0, |ctx| manager.update(ctx));
        assert!(fixture.frame.signals.is_empty());
        fixture.with_ctx(0.0, |ctx| manager.update(ctx));
        assert_eq!(
            fixture.frame.signals,
            vec![SceneSignal::DialogueStepComplete {
                branch: "Main".to_string(),
                index: 0
            }]
        );

        fixture.with_ctx(0.0, |ctx| driver.on_step_complete("Main", 0, &mut manager, ctx));
        assert_eq!(driver.index(), 2);
        assert!(driver.waiting_for_input());

        // 重复回调被忽略
        fixture.with_ctx(0.0, |ctx| driver.on_step_complete("Main", 0, &mut manager, ctx));
        assert_eq!(driver.index(), 2);
    }

    #[test]
    fn test_no_wait_chain_is_capped_per_frame() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let entries = (0..MAX_ENTRIES_PER_FRAME + 2)
            .map(|_| entry(json!({ "action": "wait", "seconds": 0.0 })))
            .collect();
        let mut driver = DialogueDriver::new(branches(entries));

        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert_eq!(driver.index(), MAX_ENTRIES_PER_FRAME);
        assert!(driver.has_pending());

        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert_eq!(driver.index(), MAX_ENTRIES_PER_FRAME + 2);
        assert!(driver.is_ended());
        assert!(!driver.has_pending());
    }

    #[test]
    fn test_unknown_action_treated_as_no_wait() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let mut driver = DialogueDriver::new(branches(vec![
            entry(json!({ "action": "teleport", "post_wait": "wait_for_input" })),
            entry(json!({ "action": "wait", "seconds": 0.0, "post_wait": "wait_for_input" })),
        ]));
        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert_eq!(driver.index(), 2);
        assert!(driver.waiting_for_input());
    }

    #[test]
    fn test_switch_branch_resets_index() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let mut all = branches(vec![entry(
            json!({ "action": "wait", "seconds": 0.0, "post_wait": "wait_for_input" }),
        )]);
        all.insert(
            "Side".to_string(),
            Branch {
                description: "side".to_string(),
                entries: vec![entry(
                    json!({ "action": "wait", "seconds": 5.0, "post_wait": "wait_until_complete" }),
                )],
            },
        );
        let mut driver = DialogueDriver::new(all);
        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert_eq!(driver.index(), 1);

        fixture.with_ctx(0.0, |ctx| driver.switch_branch("Side", &mut manager, ctx));
        assert_eq!(driver.active_branch(), "Side");
        assert_eq!(driver.index(), 0);
        assert!(driver.waiting_for_completion());
    }

    #[test]
    fn test_empty_and_missing_branch() {
        let mut fixture = Fixture::new();
        let mut manager = ActionManager::new();
        let mut driver = DialogueDriver::new(branches(Vec::new()));
        fixture.with_ctx(0.0, |ctx| driver.load_action(&mut manager, ctx));
        assert!(driver.is_ended());
        assert!(manager.is_empty());

        fixture.with_ctx(0.0, |ctx| driver.switch_branch("Nowhere", &mut manager, ctx));
        assert!(driver.is_ended());
    }
}
