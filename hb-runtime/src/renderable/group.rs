//! # RenderableGroup
//!
//! 场景持有的根节点集合，按键唯一。
//!
//! 保持插入顺序；绘制时按 `z_order` 做稳定排序，同 z 序按插入顺序（父节点先于子节点）。

use tracing::{debug, warn};

use super::{PointerOutcome, Renderable};
use crate::error::ActionError;
use crate::geometry::Viewport;
use crate::graphics::Canvas;
use crate::input::PointerState;
use crate::metadata::ActionData;

/// 一步指针处理的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerResult {
    /// 是否有 Interactable 状态变化
    pub changed: bool,
    /// 触发的点击所绑定的 Action（按遍历顺序）
    pub clicks: Vec<ActionData>,
}

/// Renderable 集合
#[derive(Debug, Default)]
pub struct RenderableGroup {
    roots: Vec<Renderable>,
}

impl RenderableGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加根节点
    ///
    /// 同键的根节点原位替换，保持插入顺序；新树中任何键与其他已有节点冲突时拒绝添加。
    pub fn add(&mut self, renderable: Renderable) -> Result<(), ActionError> {
        let mut incoming = Vec::new();
        renderable.collect_keys(&mut incoming);

        let existing: Vec<String> = self
            .roots
            .iter()
            .filter(|r| r.key != renderable.key)
            .flat_map(|r| {
                let mut keys = Vec::new();
                r.collect_keys(&mut keys);
                keys
            })
            .collect();
        if let Some(dup) = incoming.iter().find(|k| existing.contains(k)) {
            warn!(key = %dup, "Renderable 键冲突，拒绝添加");
            return Err(ActionError::DuplicateRenderableKey { key: dup.clone() });
        }
        // 树内部自身重复
        for (i, key) in incoming.iter().enumerate() {
            if incoming[..i].contains(key) {
                warn!(key = %key, "Renderable 树内部键重复，拒绝添加");
                return Err(ActionError::DuplicateRenderableKey { key: key.clone() });
            }
        }

        match self.roots.iter().position(|r| r.key == renderable.key) {
            Some(index) => {
                debug!(key = %renderable.key, "替换同键 Renderable");
                self.roots[index] = renderable;
            }
            None => self.roots.push(renderable),
        }
        Ok(())
    }

    /// 按键移除（根节点或任意后代）
    pub fn remove(&mut self, key: &str) -> Option<Renderable> {
        if let Some(index) = self.roots.iter().position(|r| r.key == key) {
            return Some(self.roots.remove(index));
        }
        self.roots.iter_mut().find_map(|r| r.remove_descendant(key))
    }

    pub fn get(&self, key: &str) -> Option<&Renderable> {
        self.roots.iter().find_map(|r| r.find(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Renderable> {
        self.roots.iter_mut().find_map(|r| r.find_mut(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 根节点（插入顺序）
    pub fn roots(&self) -> &[Renderable] {
        &self.roots
    }

    /// 当前根节点键的快照
    pub fn keys(&self) -> Vec<String> {
        self.roots.iter().map(|r| r.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    /// 视口变化后重新计算所有节点
    pub fn recalculate_size(&mut self, viewport: Viewport) {
        for root in &mut self.roots {
            root.recalculate_size(viewport);
        }
    }

    /// 处理一步指针输入
    ///
    /// 先对根节点键做快照再逐个处理。
    pub fn handle_pointer(&mut self, pointer: &PointerState) -> PointerResult {
        let mut result = PointerResult::default();
        for key in self.keys() {
            let Some(root) = self.roots.iter_mut().find(|r| r.key == key) else {
                continue;
            };
            root.for_each_mut(&mut |node| {
                let PointerOutcome {
                    changed,
                    clicked,
                    action,
                } = node.handle_pointer(pointer);
                result.changed |= changed;
                if clicked {
                    debug!(key = %node.key, "Interactable 点击");
                }
                if let Some(action) = action {
                    result.clicks.push(action);
                }
            });
        }
        result
    }

    /// 按绘制顺序返回所有可见节点
    pub fn draw_order(&self) -> Vec<&Renderable> {
        let mut all = Vec::new();
        for root in &self.roots {
            root.collect_all(&mut all);
        }
        all.retain(|r| r.visible);
        // sort_by_key 是稳定排序
        all.sort_by_key(|r| r.z_order);
        all
    }

    /// 合成到画布
    pub fn draw(&self, canvas: &mut Canvas) {
        for renderable in self.draw_order() {
            let rect = renderable.rect();
            let opacity = renderable.opacity.clamp(0.0, 255.0).round() as u8;
            canvas.blit(renderable.active_surface(), rect.x, rect.y, opacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rgb, Vec2};
    use crate::graphics::Surface;
    use crate::renderable::Placement;

    fn sprite(key: &str, z_order: i32) -> Renderable {
        Renderable::sprite(
            key,
            Placement {
                position: Vec2::new(0.0, 0.0),
                center_align: false,
                z_order,
            },
            "x.png",
            Surface::filled(2, 2, Rgb::WHITE, 255),
        )
    }

    #[test]
    fn test_add_replace_and_remove() {
        let mut group = RenderableGroup::new();
        group.add(sprite("a", 0)).unwrap();
        group.add(sprite("b", 0)).unwrap();
        group.add(sprite("a", 5)).unwrap();

        assert_eq!(group.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(group.get("a").unwrap().z_order, 5);

        assert!(group.remove("a").is_some());
        assert!(!group.contains("a"));
        assert!(group.remove("a").is_none());
    }

    #[test]
    fn test_rejects_key_used_by_descendant() {
        let mut group = RenderableGroup::new();
        let mut container = Renderable::container("menu", Placement::default());
        container.add_child(sprite("logo", 0));
        group.add(container).unwrap();

        let err = group.add(sprite("logo", 0)).unwrap_err();
        assert_eq!(
            err,
            ActionError::DuplicateRenderableKey {
                key: "logo".to_string()
            }
        );
        assert!(group.get("logo").unwrap().parent.is_some());

        assert!(group.remove("logo").is_some());
        assert!(group.get("menu").unwrap().children().is_empty());
    }

    #[test]
    fn test_draw_order_stable_by_z() {
        let mut group = RenderableGroup::new();
        group.add(sprite("first", 1)).unwrap();
        group.add(sprite("back", -9999)).unwrap();
        group.add(sprite("second", 1)).unwrap();
        group.add(sprite("front", 10)).unwrap();

        let order: Vec<&str> = group.draw_order().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(order, vec!["back", "first", "second", "front"]);
    }

    #[test]
    fn test_replace_keeps_tie_order() {
        let mut group = RenderableGroup::new();
        group.add(sprite("line", 100)).unwrap();
        group.add(sprite("portrait", 100)).unwrap();
        group.add(sprite("line", 100)).unwrap();

        let order: Vec<&str> = group.draw_order().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(order, vec!["line", "portrait"]);
    }

    #[test]
    fn test_container_draws_only_children() {
        let mut group = RenderableGroup::new();
        let mut container = Renderable::container("menu", Placement::default());
        container.add_child(sprite("item", 0));
        group.add(container).unwrap();

        let order: Vec<&str> = group.draw_order().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(order, vec!["item"]);

        let mut canvas = Canvas::new(4, 4);
        group.draw(&mut canvas);
        assert_eq!(canvas.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(3, 3), Some([0, 0, 0, 255]));
    }
}
