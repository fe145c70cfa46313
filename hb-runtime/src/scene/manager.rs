//! # SceneManager
//!
//! 持有唯一的活动场景、视口与合成画布。
//!
//! 切换场景时先完整解析新场景文件，成功后才销毁旧场景；
//! 解析失败时保留当前场景并把错误返回给调用方。

use tracing::{debug, error, info, warn};

use super::{Scene, SceneData, SceneKind, SceneRequest, SceneServices};
use crate::action::ActionRegistry;
use crate::error::SceneError;
use crate::geometry::Viewport;
use crate::graphics::{Canvas, Graphics};
use crate::input::InputEvent;
use crate::project::Project;

/// 一帧内最多连续切换的场景数
const MAX_SCENE_SWITCHES_PER_FRAME: usize = 8;

/// 场景管理器
#[derive(Debug)]
pub struct SceneManager {
    project: Project,
    registry: ActionRegistry,
    graphics: Graphics,
    scene: Option<Scene>,
    viewport: Viewport,
    canvas: Canvas,
    quit: bool,
}

impl SceneManager {
    /// 窗口尺寸初始为项目主分辨率
    pub fn new(project: Project, graphics: Graphics) -> Self {
        Self::with_registry(project, graphics, ActionRegistry::builtin())
    }

    pub fn with_registry(project: Project, graphics: Graphics, registry: ActionRegistry) -> Self {
        let main = project.main_resolution();
        Self {
            project,
            registry,
            graphics,
            scene: None,
            viewport: Viewport::new(main),
            canvas: Canvas::new(main.0, main.1),
            quit: false,
        }
    }

    /// 加载项目的起始场景
    pub fn start(&mut self) -> Result<(), SceneError> {
        let path = self
            .project
            .settings
            .starting_scene()
            .ok_or(SceneError::StartingSceneUnset)?
            .to_string();
        let kind = self.project.settings.game.starting_scene_type.clone();
        let kind = (!kind.is_empty()).then_some(kind);
        self.load_scene(&path, kind.as_deref())
    }

    /// 切换场景；`kind` 给出时覆盖场景文件自身的类型
    pub fn load_scene(&mut self, path: &str, kind: Option<&str>) -> Result<(), SceneError> {
        self.switch_scene(path, kind)?;
        self.apply_requests();
        Ok(())
    }

    fn switch_scene(&mut self, path: &str, kind: Option<&str>) -> Result<(), SceneError> {
        let (data, kind) = self.read_scene(path, kind).inspect_err(|e| {
            error!(path, error = %e, "场景加载失败，保留当前场景");
        })?;

        if let Some(mut old) = self.scene.take() {
            old.teardown();
        }
        let mut services = SceneServices {
            project: &self.project,
            registry: &self.registry,
            graphics: &mut self.graphics,
        };
        self.scene = Some(Scene::load(path, kind, data, &mut services, self.viewport));
        Ok(())
    }

    fn read_scene(&self, path: &str, kind: Option<&str>) -> Result<(SceneData, SceneKind), SceneError> {
        let resolved = self.graphics.assets.resolve(path);
        let data = SceneData::load(&resolved)?;
        let tag = match kind {
            Some(kind) if !data.kind.is_empty() && kind != data.kind => {
                warn!(path, file = %data.kind, requested = kind, "场景类型与文件不一致，使用指定类型");
                kind.to_string()
            }
            Some(kind) => kind.to_string(),
            None => data.kind.clone(),
        };
        let kind = SceneKind::parse(&tag)?;
        Ok((data, kind))
    }

    /// 处理场景提出的请求（切换场景、退出）
    fn apply_requests(&mut self) {
        for _ in 0..MAX_SCENE_SWITCHES_PER_FRAME {
            let requests = match self.scene.as_mut() {
                Some(scene) => scene.take_requests(),
                None => return,
            };
            if requests.is_empty() {
                return;
            }
            // 切换场景后旧场景的其余请求作废
            for request in requests {
                match request {
                    SceneRequest::Quit => {
                        info!("收到退出请求");
                        self.quit = true;
                    }
                    SceneRequest::LoadScene { path, kind } => {
                        if self.switch_scene(&path, kind.as_deref()).is_ok() {
                            break;
                        }
                    }
                }
            }
        }
        warn!(limit = MAX_SCENE_SWITCHES_PER_FRAME, "一帧内场景切换次数达到上限");
    }

    /// 推进一帧
    pub fn update(&mut self, events: &[InputEvent], delta_time: f32) {
        for event in events {
            match event {
                InputEvent::Resized { width, height } => self.resize(*width, *height),
                InputEvent::Quit => self.quit = true,
                _ => {}
            }
        }
        if let Some(scene) = self.scene.as_mut() {
            let mut services = SceneServices {
                project: &self.project,
                registry: &self.registry,
                graphics: &mut self.graphics,
            };
            scene.update(events, delta_time, &mut services);
        }
        self.apply_requests();
    }

    /// 有变化时合成新的一帧
    pub fn draw(&mut self) -> Option<&Canvas> {
        let scene = self.scene.as_mut()?;
        scene.draw(&mut self.canvas).then_some(&self.canvas)
    }

    /// 窗口尺寸变化
    pub fn resize(&mut self, width: u32, height: u32) {
        let viewport = self.viewport.resized(width, height);
        if viewport == self.viewport {
            return;
        }
        debug!(width, height, "窗口尺寸变化");
        self.viewport = viewport;
        self.canvas.resize(viewport.size.0, viewport.size.1);
        if let Some(scene) = self.scene.as_mut() {
            scene.resize(viewport);
        }
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn graphics(&self) -> &Graphics {
        &self.graphics
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// 是否应退出主循环
    pub fn should_quit(&self) -> bool {
        self.quit
    }
}
