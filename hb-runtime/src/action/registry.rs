//! # Action 注册表
//!
//! 名字 → 构造函数。启动时填充，之后只读。

use std::collections::BTreeMap;

use super::dialogue::{Dialogue, LoadDialogueInterface};
use super::effects::PlayTransition;
use super::renderables::{CreateRenderable, LoadBackground, UnloadSprite};
use super::scene_flow::{ChooseBranch, LoadScene, QuitGame, Wait};
use super::Action;
use crate::error::ActionError;
use crate::metadata::ActionData;
use crate::transition::{FadeIn, FadeOut, TextLoading, Transition, TransitionFactory};

/// Action 构造函数
pub type ActionFactory = fn(ActionData) -> Box<dyn Action>;

/// Action / 过渡效果注册表
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, ActionFactory>,
    transitions: BTreeMap<&'static str, TransitionFactory>,
}

impl ActionRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
            transitions: BTreeMap::new(),
        }
    }

    /// 内置的全部 Action 与过渡效果
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register_action(LoadScene::NAME, LoadScene::boxed);
        registry.register_action(QuitGame::NAME, QuitGame::boxed);
        registry.register_action(Wait::WAIT, Wait::wait);
        registry.register_action(Wait::PAUSE, Wait::pause);
        registry.register_action(ChooseBranch::NAME, ChooseBranch::boxed);

        registry.register_action(LoadBackground::NAME, LoadBackground::boxed);
        registry.register_action(UnloadSprite::NAME, UnloadSprite::boxed);
        for (name, factory) in CreateRenderable::FACTORIES {
            registry.register_action(name, factory);
        }

        registry.register_action(Dialogue::NAME, Dialogue::boxed);
        registry.register_action(LoadDialogueInterface::NAME, LoadDialogueInterface::boxed);
        registry.register_action(PlayTransition::NAME, PlayTransition::boxed);

        registry.register_transition(FadeIn::NAME, FadeIn::boxed);
        registry.register_transition(FadeOut::NAME, FadeOut::boxed);
        registry.register_transition(TextLoading::NAME, TextLoading::boxed);

        registry
    }

    pub fn register_action(&mut self, name: &'static str, factory: ActionFactory) {
        self.actions.insert(name, factory);
    }

    pub fn register_transition(&mut self, name: &'static str, factory: TransitionFactory) {
        self.transitions.insert(name, factory);
    }

    /// 按名字创建 Action
    pub fn create_action(&self, name: &str, data: ActionData) -> Result<Box<dyn Action>, ActionError> {
        let factory = self
            .actions
            .get(name)
            .ok_or_else(|| ActionError::UnknownActionName {
                name: name.to_string(),
            })?;
        Ok(factory(data))
    }

    /// 按名字创建过渡效果；`speed` 缺省时使用该效果的默认速度
    pub fn create_transition(
        &self,
        name: &str,
        target: &str,
        speed: Option<f32>,
    ) -> Result<Box<dyn Transition>, ActionError> {
        let factory = self
            .transitions
            .get(name)
            .ok_or_else(|| ActionError::UnknownTransitionName {
                name: name.to_string(),
            })?;
        Ok(factory(target.to_string(), speed))
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_transition(&self, name: &str) -> bool {
        self.transitions.contains_key(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.keys().copied()
    }

    pub fn transition_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.transitions.keys().copied()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("transitions", &self.transitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ActionCatalog;

    #[test]
    fn test_registry_matches_catalog() {
        let registry = ActionRegistry::builtin();
        let catalog = ActionCatalog::builtin().unwrap();

        for descriptor in catalog.descriptors() {
            assert!(
                registry.has_action(&descriptor.action_name),
                "目录中的 {} 没有实现",
                descriptor.action_name
            );
        }
        for name in registry.action_names() {
            assert!(catalog.get(name).is_some(), "{name} 不在目录中");
        }
    }

    #[test]
    fn test_transition_options_match_registry() {
        let registry = ActionRegistry::builtin();
        let catalog = ActionCatalog::builtin().unwrap();

        let options = &catalog.get("play_transition").unwrap().requirements["type"].options;
        let mut names: Vec<&str> = registry.transition_names().collect();
        names.sort_unstable();
        let mut listed: Vec<&str> = options.iter().map(String::as_str).collect();
        listed.sort_unstable();
        assert_eq!(names, listed);

        let unload = &catalog.get("unload_sprite").unwrap().requirements["transition"];
        let dialogue = &catalog.get("dialogue").unwrap().requirements["transition"];
        for container in [unload, dialogue] {
            for option in &container.children["type"].options {
                assert!(option == "None" || registry.has_transition(option));
            }
        }
    }

    #[test]
    fn test_unknown_names() {
        let registry = ActionRegistry::builtin();
        assert!(matches!(
            registry.create_action("fly", ActionData::new()),
            Err(ActionError::UnknownActionName { .. })
        ));
        assert!(matches!(
            registry.create_transition("spin", "x", None),
            Err(ActionError::UnknownTransitionName { .. })
        ));
    }
}
