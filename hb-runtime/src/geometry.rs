//! # Geometry 模块
//!
//! 归一化坐标、像素矩形与视口换算。
//!
//! 所有 Renderable 的位置都以归一化坐标 `[0, 1]` 存储，
//! 像素矩形由当前视口尺寸实时推导，保证分辨率无关。

use serde::{Deserialize, Serialize};

/// 二维向量
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 是否为单位倍率（逐轴比较，容忍浮点误差）
    pub fn is_identity(&self) -> bool {
        (self.x - 1.0).abs() < f32::EPSILON && (self.y - 1.0).abs() < f32::EPSILON
    }
}

/// 像素矩形（左上角原点）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// 点是否落在矩形内（右/下边界不含）
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x as f32
            && py >= self.y as f32
            && px < self.x as f32 + self.w as f32
            && py < self.y as f32 + self.h as f32
    }

    /// 矩形中心点
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.w as f32 / 2.0,
            self.y as f32 + self.h as f32 / 2.0,
        )
    }
}

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// 视口
///
/// - `main`：项目主分辨率（内容按它设计）
/// - `size`：当前窗口尺寸
///
/// 倍率 = `size / main`，逐轴计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub main: (u32, u32),
    pub size: (u32, u32),
}

impl Viewport {
    /// 窗口尺寸等于主分辨率的视口
    pub fn new(main: (u32, u32)) -> Self {
        Self { main, size: main }
    }

    /// 调整窗口尺寸
    pub fn resized(self, width: u32, height: u32) -> Self {
        Self {
            main: self.main,
            size: (width.max(1), height.max(1)),
        }
    }

    /// 当前倍率
    pub fn multiplier(&self) -> Vec2 {
        Vec2::new(
            self.size.0 as f32 / self.main.0.max(1) as f32,
            self.size.1 as f32 / self.main.1.max(1) as f32,
        )
    }

    /// 归一化坐标 → 屏幕像素坐标
    pub fn norm_to_screen(&self, position: Vec2) -> (f32, f32) {
        (
            position.x * self.size.0 as f32,
            position.y * self.size.1 as f32,
        )
    }

    /// 主分辨率下的像素长度 → 归一化长度
    pub fn main_pixels_to_norm(&self, w: f32, h: f32) -> Vec2 {
        Vec2::new(w / self.main.0.max(1) as f32, h / self.main.1.max(1) as f32)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new((1280, 720))
    }
}
