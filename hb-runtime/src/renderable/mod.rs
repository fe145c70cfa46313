//! # Renderable 模块
//!
//! 场景图中的可绘制实体。
//!
//! ## 设计说明
//!
//! - 位置始终以归一化坐标存储，像素矩形由当前视口实时推导
//! - 倍率为 (1, 1) 时直接使用原始表面；否则生成缩放表面（缩放总是基于原始表面，
//!   翻转也作用在原始表面上，多次缩放不会累积变换）
//! - 父节点独占子节点；子节点只通过键回指父节点，不持有引用
//! - 子节点的位置同样是屏幕归一化坐标，不相对于父节点

pub mod group;

use crate::geometry::{Rect, Rgb, Vec2, Viewport};
use crate::graphics::{Graphics, Surface};
use crate::input::PointerState;
use crate::metadata::ActionData;

pub use group::{PointerResult, RenderableGroup};

/// 完全不透明
pub const OPAQUE: f32 = 255.0;

/// 位置、对齐与 z 序
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub position: Vec2,
    pub center_align: bool,
    pub z_order: i32,
}

/// Interactable 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractState {
    #[default]
    Normal,
    Hovered,
    Pressed,
}

/// 文字属性
#[derive(Debug, Clone, PartialEq)]
pub struct TextData {
    pub text: String,
    pub font: String,
    pub size: i64,
    pub color: Rgb,
    /// 逐字显示时可见的字符数；None 表示全部可见
    pub visible_chars: Option<usize>,
}

impl TextData {
    pub fn new(text: impl Into<String>, font: impl Into<String>, size: i64, color: Rgb) -> Self {
        Self {
            text: text.into(),
            font: font.into(),
            size,
            color,
            visible_chars: None,
        }
    }

    /// 字符（code point）数
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// 当前可见的文字
    pub fn visible_text(&self) -> String {
        match self.visible_chars {
            Some(n) => self.text.chars().take(n).collect(),
            None => self.text.clone(),
        }
    }
}

/// Interactable 的附加状态
///
/// 常态表面就是 Renderable 的 `surface`，这里只缓存悬停/按下两张。
#[derive(Debug, Clone)]
pub struct InteractableData {
    hover: Surface,
    pressed: Surface,
    scaled: Option<(Surface, Surface)>,
    state: InteractState,
    /// 点击时执行的 Action（引擎形态，带 `action` 键）
    pub action: Option<ActionData>,
}

impl InteractableData {
    pub fn new(hover: Surface, pressed: Surface, action: Option<ActionData>) -> Self {
        Self {
            hover,
            pressed,
            scaled: None,
            state: InteractState::Normal,
            action,
        }
    }

    pub fn state(&self) -> InteractState {
        self.state
    }
}

/// Renderable 种类
#[derive(Debug, Clone)]
pub enum RenderableKind {
    Sprite { path: String, flipped: bool },
    Text(TextData),
    Interactable(InteractableData),
    /// 带一个文字子节点（键为 `<key>_Text`）
    Button(InteractableData),
    /// 自身不绘制，只组合子节点
    Container,
}

/// 单个 Interactable 对一步指针输入的响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerOutcome {
    /// 状态是否变化（需要重绘）
    pub changed: bool,
    /// 是否触发了点击
    pub clicked: bool,
    /// 点击绑定的 Action
    pub action: Option<ActionData>,
}

/// 可绘制实体
#[derive(Debug, Clone)]
pub struct Renderable {
    pub key: String,
    pub position: Vec2,
    pub z_order: i32,
    pub center_align: bool,
    pub visible: bool,
    /// 0-255
    pub opacity: f32,
    /// 父节点的键
    pub parent: Option<String>,
    children: Vec<Renderable>,
    surface: Surface,
    scaled_surface: Option<Surface>,
    rect: Rect,
    viewport: Viewport,
    kind: RenderableKind,
}

impl Renderable {
    pub fn new(
        key: impl Into<String>,
        placement: Placement,
        surface: Surface,
        kind: RenderableKind,
    ) -> Self {
        let visible = !matches!(kind, RenderableKind::Container);
        let mut renderable = Self {
            key: key.into(),
            position: placement.position,
            z_order: placement.z_order,
            center_align: placement.center_align,
            visible,
            opacity: OPAQUE,
            parent: None,
            children: Vec::new(),
            surface,
            scaled_surface: None,
            rect: Rect::default(),
            viewport: Viewport::default(),
            kind,
        };
        renderable.layout();
        renderable
    }

    pub fn sprite(
        key: impl Into<String>,
        placement: Placement,
        path: impl Into<String>,
        surface: Surface,
    ) -> Self {
        Self::new(
            key,
            placement,
            surface,
            RenderableKind::Sprite {
                path: path.into(),
                flipped: false,
            },
        )
    }

    pub fn text(
        key: impl Into<String>,
        placement: Placement,
        data: TextData,
        graphics: &mut Graphics,
    ) -> Self {
        let surface = rasterize(&data, graphics);
        Self::new(key, placement, surface, RenderableKind::Text(data))
    }

    pub fn interactable(
        key: impl Into<String>,
        placement: Placement,
        normal: Surface,
        data: InteractableData,
    ) -> Self {
        Self::new(key, placement, normal, RenderableKind::Interactable(data))
    }

    /// 按钮；文字子节点由调用方通过 [`Renderable::add_child`] 挂上
    pub fn button(
        key: impl Into<String>,
        placement: Placement,
        normal: Surface,
        data: InteractableData,
    ) -> Self {
        Self::new(key, placement, normal, RenderableKind::Button(data))
    }

    pub fn container(key: impl Into<String>, placement: Placement) -> Self {
        Self::new(
            key,
            placement,
            Surface::blank(1, 1),
            RenderableKind::Container,
        )
    }

    /// 按钮文字子节点的键
    pub fn label_key(key: &str) -> String {
        format!("{key}_Text")
    }

    pub fn kind(&self) -> &RenderableKind {
        &self.kind
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn children(&self) -> &[Renderable] {
        &self.children
    }

    /// 原始表面
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// 当前应绘制的表面
    pub fn active_surface(&self) -> &Surface {
        if let RenderableKind::Interactable(data) | RenderableKind::Button(data) = &self.kind {
            match (data.state, &data.scaled) {
                (InteractState::Hovered, Some((hover, _))) => return hover,
                (InteractState::Hovered, None) => return &data.hover,
                (InteractState::Pressed, Some((_, pressed))) => return pressed,
                (InteractState::Pressed, None) => return &data.pressed,
                (InteractState::Normal, _) => {}
            }
        }
        self.scaled_surface.as_ref().unwrap_or(&self.surface)
    }

    pub fn text_data(&self) -> Option<&TextData> {
        match &self.kind {
            RenderableKind::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn interact_state(&self) -> Option<InteractState> {
        match &self.kind {
            RenderableKind::Interactable(data) | RenderableKind::Button(data) => Some(data.state),
            _ => None,
        }
    }

    /// 归一化坐标下的中心点（按主分辨率下的原始尺寸计算）
    pub fn center_position(&self) -> Vec2 {
        if self.center_align {
            return self.position;
        }
        let (w, h) = self.surface.size();
        let half = self.viewport.main_pixels_to_norm(w as f32 / 2.0, h as f32 / 2.0);
        Vec2::new(self.position.x + half.x, self.position.y + half.y)
    }

    /// 挂载子节点
    pub fn add_child(&mut self, mut child: Renderable) {
        child.parent = Some(self.key.clone());
        child.recalculate_size(self.viewport);
        self.children.push(child);
    }

    /// 按视口重新计算缩放表面与像素矩形（递归）
    pub fn recalculate_size(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let multiplier = viewport.multiplier();
        if multiplier.is_identity() {
            self.scaled_surface = None;
            if let RenderableKind::Interactable(data) | RenderableKind::Button(data) = &mut self.kind
            {
                data.scaled = None;
            }
        } else {
            self.scaled_surface = Some(self.surface.scaled(multiplier));
            if let RenderableKind::Interactable(data) | RenderableKind::Button(data) = &mut self.kind
            {
                data.scaled = Some((data.hover.scaled(multiplier), data.pressed.scaled(multiplier)));
            }
        }
        self.layout();
        for child in &mut self.children {
            child.recalculate_size(viewport);
        }
    }

    fn layout(&mut self) {
        let (w, h) = self
            .scaled_surface
            .as_ref()
            .unwrap_or(&self.surface)
            .size();
        let (sx, sy) = self.viewport.norm_to_screen(self.position);
        let (x, y) = if self.center_align {
            (sx - w as f32 / 2.0, sy - h as f32 / 2.0)
        } else {
            (sx, sy)
        };
        self.rect = Rect::new(x.round() as i32, y.round() as i32, w, h);
    }

    /// 水平翻转（作用于原始表面）
    pub fn flip(&mut self) {
        self.surface = self.surface.flipped_horizontal();
        match &mut self.kind {
            RenderableKind::Sprite { flipped, .. } => *flipped = !*flipped,
            RenderableKind::Interactable(data) | RenderableKind::Button(data) => {
                data.hover = data.hover.flipped_horizontal();
                data.pressed = data.pressed.flipped_horizontal();
            }
            _ => {}
        }
        self.recalculate_size(self.viewport);
    }

    /// 修改文字属性并重新光栅化；不是文字时返回 false
    pub fn update_text(
        &mut self,
        graphics: &mut Graphics,
        update: impl FnOnce(&mut TextData),
    ) -> bool {
        let RenderableKind::Text(data) = &mut self.kind else {
            return false;
        };
        let before = data.clone();
        update(data);
        if *data != before {
            self.surface = rasterize(data, graphics);
            self.recalculate_size(self.viewport);
        }
        true
    }

    /// 处理一步指针输入（只处理自身，不递归）
    pub fn handle_pointer(&mut self, pointer: &PointerState) -> PointerOutcome {
        let rect = self.rect;
        let visible = self.visible;
        let (RenderableKind::Interactable(data) | RenderableKind::Button(data)) = &mut self.kind
        else {
            return PointerOutcome::default();
        };
        if !visible {
            return PointerOutcome::default();
        }

        let inside = pointer.position.is_some_and(|(x, y)| rect.contains(x, y));
        let mut clicked = false;
        let next = match data.state {
            InteractState::Normal | InteractState::Hovered if inside => {
                if pointer.pressed {
                    InteractState::Pressed
                } else {
                    InteractState::Hovered
                }
            }
            InteractState::Normal | InteractState::Hovered => InteractState::Normal,
            InteractState::Pressed if pointer.released && inside => {
                clicked = true;
                InteractState::Hovered
            }
            // 释放在外面或拖出范围都视为取消
            InteractState::Pressed if pointer.released || !inside => InteractState::Normal,
            InteractState::Pressed => InteractState::Pressed,
        };

        let changed = next != data.state;
        data.state = next;
        PointerOutcome {
            changed,
            clicked,
            action: if clicked { data.action.clone() } else { None },
        }
    }

    /// 递归查找
    pub fn find(&self, key: &str) -> Option<&Renderable> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(key))
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut Renderable> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(key))
    }

    /// 移除某个后代节点
    pub fn remove_descendant(&mut self, key: &str) -> Option<Renderable> {
        if let Some(index) = self.children.iter().position(|c| c.key == key) {
            return Some(self.children.remove(index));
        }
        self.children
            .iter_mut()
            .find_map(|c| c.remove_descendant(key))
    }

    /// 自身及所有后代的键（深度优先）
    pub fn collect_keys(&self, out: &mut Vec<String>) {
        out.push(self.key.clone());
        for child in &self.children {
            child.collect_keys(out);
        }
    }

    /// 自身及所有后代（深度优先，父节点在前）
    pub fn collect_all<'a>(&'a self, out: &mut Vec<&'a Renderable>) {
        out.push(self);
        for child in &self.children {
            child.collect_all(out);
        }
    }

    pub(crate) fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Renderable)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }
}

fn rasterize(data: &TextData, graphics: &mut Graphics) -> Surface {
    graphics.render_text(&data.font, &data.visible_text(), data.size, data.color)
}
