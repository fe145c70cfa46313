//! # Input 模块
//!
//! 定义 Host 向 Runtime 传递的输入事件。
//!
//! ## 设计说明
//!
//! - Host 负责轮询窗口事件，并翻译成语义化的 `InputEvent`
//! - Runtime 不直接接触键码：哪些按键算作"推进"由 Host 配置决定
//! - 鼠标坐标使用窗口像素坐标，与 Renderable 的 `rect` 同一坐标系

use serde::{Deserialize, Serialize};

/// Host 向 Runtime 传递的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// 鼠标移动（窗口像素坐标）
    PointerMoved { x: f32, y: f32 },
    /// 鼠标左键按下
    PointerPressed,
    /// 鼠标左键释放
    PointerReleased,
    /// 推进输入（默认空格）：跳过可跳过的 Action，或推进对话
    Advance,
    /// 窗口尺寸变化
    Resized { width: u32, height: u32 },
    /// 请求退出
    Quit,
}

/// 单步指针状态
///
/// 一帧内的每个指针事件各对应一步，Interactable 的状态机按顺序逐步处理。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerState {
    /// 当前光标位置（没有收到过移动事件时为 None）
    pub position: Option<(f32, f32)>,
    /// 这一步是否按下
    pub pressed: bool,
    /// 这一步是否释放
    pub released: bool,
}

impl PointerState {
    /// 把一帧的事件拆成按顺序处理的步骤
    ///
    /// `previous` 是上一帧的光标位置；光标不动时不会有移动事件。
    /// 没有指针事件时返回一个只带位置的步骤，悬停状态照常更新。
    pub fn steps(previous: Option<(f32, f32)>, events: &[InputEvent]) -> Vec<Self> {
        let mut position = previous;
        let mut steps = Vec::new();
        for event in events {
            let step = match event {
                InputEvent::PointerMoved { x, y } => {
                    position = Some((*x, *y));
                    Self {
                        position,
                        ..Self::default()
                    }
                }
                InputEvent::PointerPressed => Self {
                    position,
                    pressed: true,
                    released: false,
                },
                InputEvent::PointerReleased => Self {
                    position,
                    pressed: false,
                    released: true,
                },
                _ => continue,
            };
            steps.push(step);
        }
        if steps.is_empty() {
            steps.push(Self {
                position,
                ..Self::default()
            });
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_steps_keep_previous_position() {
        let steps = PointerState::steps(Some((5.0, 6.0)), &[InputEvent::PointerPressed]);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].position, Some((5.0, 6.0)));
        assert!(steps[0].pressed);
        assert!(!steps[0].released);
    }

    #[test]
    fn test_pointer_steps_keep_event_order() {
        let events = [
            InputEvent::PointerReleased,
            InputEvent::Advance,
            InputEvent::PointerPressed,
            InputEvent::PointerMoved { x: 2.0, y: 3.0 },
        ];
        let steps = PointerState::steps(Some((1.0, 1.0)), &events);
        assert_eq!(steps.len(), 3);
        assert!(steps[0].released && !steps[0].pressed);
        assert!(steps[1].pressed && !steps[1].released);
        assert_eq!(steps[1].position, Some((1.0, 1.0)));
        assert_eq!(steps[2].position, Some((2.0, 3.0)));
        assert!(!steps[2].pressed && !steps[2].released);
    }

    #[test]
    fn test_pointer_steps_idle_frame() {
        let steps = PointerState::steps(Some((4.0, 4.0)), &[InputEvent::Advance]);
        assert_eq!(
            steps,
            [PointerState {
                position: Some((4.0, 4.0)),
                pressed: false,
                released: false,
            }]
        );
    }

    #[test]
    fn test_input_serialization() {
        let input = InputEvent::Resized {
            width: 640,
            height: 360,
        };
        let json = serde_json::to_string(&input).unwrap();
        let deserialized: InputEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(input, deserialized);
    }
}
