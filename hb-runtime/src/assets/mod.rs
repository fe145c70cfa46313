//! # Assets 模块
//!
//! 资源路径解析与图片缓存。
//!
//! ## 路径解析的三种模式
//!
//! 1. 绝对路径：原样使用
//! 2. `HBEngine/...`：解析到引擎安装目录
//! 3. 其他：相对项目内容根目录
//!
//! 找不到或解码失败的图片替换为内置占位图并记录警告，不会中断场景。

pub mod path;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::AssetError;
use crate::graphics::Surface;

pub use path::{ENGINE_PREFIX, normalize_logical_path, strip_engine_prefix};

/// 资源路径解析器
#[derive(Debug, Clone)]
pub struct AssetResolver {
    project_root: PathBuf,
    engine_root: PathBuf,
}

impl AssetResolver {
    pub fn new(project_root: impl Into<PathBuf>, engine_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            engine_root: engine_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn engine_root(&self) -> &Path {
        &self.engine_root
    }

    /// 解析资源路径到文件系统路径
    pub fn resolve(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            return PathBuf::from(path);
        }
        if let Some(rest) = strip_engine_prefix(path) {
            return self.engine_root.join(rest);
        }
        self.project_root.join(normalize_logical_path(path))
    }
}

/// 图片缓存
///
/// 以解析后的路径为键；同一路径只解码一次，失败时缓存占位图。
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<PathBuf, Surface>,
    placeholder: Option<Surface>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载图片（容错）
    pub fn load(&mut self, resolver: &AssetResolver, path: &str) -> Surface {
        let full_path = resolver.resolve(path);
        if let Some(surface) = self.entries.get(&full_path) {
            return surface.clone();
        }

        let surface = match decode(&full_path) {
            Ok(surface) => {
                debug!(path = ?full_path, "图片加载成功");
                surface
            }
            Err(e) => {
                warn!(error = %e, "图片加载失败，使用占位图");
                self.placeholder().clone()
            }
        };
        self.entries.insert(full_path, surface.clone());
        surface
    }

    /// 已缓存的图片数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn placeholder(&mut self) -> &Surface {
        self.placeholder.get_or_insert_with(Surface::placeholder)
    }
}

fn decode(path: &Path) -> Result<Surface, AssetError> {
    if !path.is_file() {
        return Err(AssetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|_| AssetError::NotFound {
        path: path.to_path_buf(),
    })?;
    let image = image::load_from_memory(&bytes).map_err(|e| AssetError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Surface::from_image(image.to_rgba8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::PLACEHOLDER_SIZE;

    #[test]
    fn test_resolve_modes() {
        let resolver = AssetResolver::new("/project", "/engine");
        assert_eq!(
            resolver.resolve("Content/Sprites/a.png"),
            PathBuf::from("/project/Content/Sprites/a.png")
        );
        assert_eq!(
            resolver.resolve("HBEngine/Content/Fonts/Default.ttf"),
            PathBuf::from("/engine/Content/Fonts/Default.ttf")
        );
        assert_eq!(resolver.resolve("/abs/a.png"), PathBuf::from("/abs/a.png"));
    }

    #[test]
    fn test_missing_image_uses_placeholder() {
        let resolver = AssetResolver::new("/nonexistent", "/nonexistent");
        let mut cache = ImageCache::new();
        let surface = cache.load(&resolver, "missing.png");
        assert_eq!(surface.size(), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
        assert_eq!(cache.len(), 1);

        // 再次加载命中缓存
        cache.load(&resolver, "./missing.png");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_load_real_image() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(12, 8)
            .save(dir.path().join("a.png"))
            .unwrap();

        let resolver = AssetResolver::new(dir.path(), "/nonexistent");
        let mut cache = ImageCache::new();
        assert_eq!(cache.load(&resolver, "a.png").size(), (12, 8));
    }
}
