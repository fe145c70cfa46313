//! # HB Runtime
//!
//! HBEngine 视觉小说引擎的核心运行时库。
//!
//! ## 架构概述
//!
//! `hb-runtime` 不依赖窗口或 GPU。宿主（`hb-engine`）每帧把输入事件交给
//! [`SceneManager`]，再取回合成好的 [`Canvas`] 上屏：
//!
//! ```text
//! Host                              Runtime
//!   │                                  │
//!   │──── &[InputEvent], delta ──────►│ SceneManager::update()
//!   │                                  │   Scene: pointer → click → advance
//!   │                                  │          → actions → signals
//!   │◄─── Option<&Canvas> ────────────│ SceneManager::draw()
//!   │                                  │
//! ```
//!
//! ## 核心类型
//!
//! - [`Renderable`] / [`RenderableGroup`]：可绘制对象与按 z 排序的集合
//! - [`Action`] / [`ActionManager`]：场景内容的唯一入口，由名字 + 参数构造
//! - [`Transition`]：逐帧修改目标透明度或文字进度的效果
//! - [`Scene`] / [`SceneManager`]：场景生命周期与切换
//! - [`ActionCatalog`]：Action 元数据目录，参数默认值与全局绑定的来源
//!
//! ## 模块结构
//!
//! - [`action`]：Action trait、内置 Action、注册表与 ActionManager
//! - [`assets`]：逻辑路径解析与图片缓存
//! - [`diagnostic`]：场景文件静态检查
//! - [`error`]：错误类型定义
//! - [`graphics`]：CPU 侧光栅操作、字体
//! - [`metadata`]：Action 元数据、参数解析、编辑器格式转换
//! - [`project`]：项目设置与全局值
//! - [`renderable`]：Renderable 与 RenderableGroup
//! - [`scene`]：Scene、对话驱动与 SceneManager
//! - [`transition`]：过渡效果

pub mod action;
pub mod assets;
pub mod diagnostic;
pub mod error;
pub mod geometry;
pub mod graphics;
pub mod input;
pub mod metadata;
pub mod project;
pub mod renderable;
pub mod scene;
pub mod transition;

// 重导出核心类型
pub use action::{
    Action, ActionContext, ActionManager, ActionOutput, ActionRegistry, ActionState, SceneSignal,
};
pub use assets::{AssetResolver, ImageCache};
pub use diagnostic::{
    AssetKind, AssetReference, Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_scene,
    branch_references, extract_asset_references,
};
pub use error::{ActionError, AssetError, ConvertError, HbError, HbResult, ProjectError, SceneError};
pub use geometry::{Rect, Rgb, Vec2, Viewport};
pub use graphics::{Canvas, FontCache, Graphics, Surface};
pub use input::{InputEvent, PointerState};
pub use metadata::{ActionCatalog, ActionData, ParamDescriptor, ParamKind, Params};
pub use project::{Project, ProjectSettings, ValueStore};
pub use renderable::{Renderable, RenderableGroup, RenderableKind};
pub use scene::{PostWait, Scene, SceneData, SceneKind, SceneManager, SceneRequest};
pub use transition::{FadeIn, FadeOut, TextLoading, Transition, TransitionState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let catalog = ActionCatalog::builtin().unwrap();
        let registry = ActionRegistry::builtin();
        assert!(catalog.get("dialogue").is_some());
        assert!(registry.has_action("dialogue"));

        let _group = RenderableGroup::default();
        let _kind = SceneKind::parse(SceneKind::DIALOGUE_TAG).unwrap();
        let _event = InputEvent::Quit;
    }
}
