//! # App 模块
//!
//! winit 事件循环：把窗口事件翻译成 [`InputEvent`]，按帧率上限驱动 SceneManager。

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use hb_runtime::{InputEvent, SceneManager};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use crate::config::EngineConfig;
use crate::presenter::Presenter;

/// 单帧 delta 上限（窗口拖动等导致的长停顿不会让过渡效果一步跳完）
const MAX_DELTA: Duration = Duration::from_millis(250);

/// 应用状态
pub struct EngineApp {
    config: EngineConfig,
    manager: SceneManager,
    title: String,
    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,
    events: Vec<InputEvent>,
    last_frame: Instant,
    next_frame: Instant,
    fatal: Option<anyhow::Error>,
}

impl EngineApp {
    pub fn new(config: EngineConfig, manager: SceneManager, title: String) -> Self {
        let now = Instant::now();
        Self {
            config,
            manager,
            title,
            window: None,
            presenter: None,
            events: Vec::new(),
            last_frame: now,
            next_frame: now,
            fatal: None,
        }
    }

    /// 事件循环结束后的结果
    pub fn finish(self) -> anyhow::Result<()> {
        match self.fatal {
            Some(e) => Err(e),
            None => {
                info!("引擎正常退出");
                Ok(())
            }
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.config.fps_cap.max(1.0))
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!(error = format!("{e:#}"), "致命错误");
        self.fatal = Some(e);
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let (width, height) = self.manager.project().main_resolution();
        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(attributes)?);
        let presenter = Presenter::new(window.clone())?;

        // 实际尺寸可能与请求的不同（缩放、窗口管理器）
        let size = window.inner_size();
        if (size.width, size.height) != (width, height) {
            self.events.push(InputEvent::Resized {
                width: size.width,
                height: size.height,
            });
        }
        info!(width = size.width, height = size.height, "窗口已创建");

        self.window = Some(window);
        self.presenter = Some(presenter);
        self.last_frame = Instant::now();
        self.next_frame = self.last_frame;
        Ok(())
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).min(MAX_DELTA);
        self.last_frame = now;

        let events = std::mem::take(&mut self.events);
        self.manager.update(&events, delta.as_secs_f32());
        if self.manager.should_quit() {
            info!("场景请求退出");
            event_loop.exit();
            return;
        }

        let canvas = self.manager.draw();
        if let Some(presenter) = self.presenter.as_mut()
            && let Err(e) = presenter.present(canvas)
        {
            self.fail(event_loop, anyhow!(e));
        }
    }
}

/// 推进键判定；按键名是 winit `KeyCode` 的变体名
pub fn is_advance(config: &EngineConfig, event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed && !event.repeat && key_matches(config, event.physical_key)
}

fn key_matches(config: &EngineConfig, key: PhysicalKey) -> bool {
    match key {
        PhysicalKey::Code(code) => config.is_advance_key(&format!("{code:?}")),
        PhysicalKey::Unidentified(_) => false,
    }
}

fn pointer_button(state: ElementState) -> InputEvent {
    match state {
        ElementState::Pressed => InputEvent::PointerPressed,
        ElementState::Released => InputEvent::PointerReleased,
    }
}

impl ApplicationHandler for EngineApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e.context("无法创建窗口"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("窗口关闭");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.resize(size.width, size.height);
                }
                if size.width > 0 && size.height > 0 {
                    self.events.push(InputEvent::Resized {
                        width: size.width,
                        height: size.height,
                    });
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.events.push(InputEvent::PointerMoved {
                    x: position.x as f32,
                    y: position.y as f32,
                });
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.events.push(pointer_button(state)),
            WindowEvent::KeyboardInput { event, .. } => {
                if is_advance(&self.config, &event) {
                    debug!(key = ?event.physical_key, "推进");
                    self.events.push(InputEvent::Advance);
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame = now + self.frame_interval();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}
