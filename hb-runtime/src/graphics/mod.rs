//! # Graphics 模块
//!
//! CPU 侧的光栅操作：位图表面、缩放、翻转、透明度混合与整帧合成。
//!
//! ## 设计说明
//!
//! - `Surface` 是不可变位图的共享句柄，克隆廉价；需要修改时写时复制
//! - `Canvas` 是整帧合成目标，Host 每帧把它上传到 GPU 呈现
//! - 缩放使用三角（双线性）滤波，倍率为 1 时不做任何缩放

pub mod font;

use std::rc::Rc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::assets::{AssetResolver, ImageCache};
use crate::geometry::{Rgb, Vec2};

pub use font::{FontCache, FontSource};

/// 占位图边长（像素）
pub const PLACEHOLDER_SIZE: u32 = 64;

/// 占位图棋盘格边长
const PLACEHOLDER_CELL: u32 = 16;

/// 位图表面
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    image: Rc<RgbaImage>,
}

impl Surface {
    /// 从已解码的位图创建
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image: Rc::new(image),
        }
    }

    /// 全透明表面（宽高至少为 1）
    pub fn blank(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width.max(1), height.max(1)))
    }

    /// 纯色表面
    pub fn filled(width: u32, height: u32, color: Rgb, alpha: u8) -> Self {
        Self::from_image(RgbaImage::from_pixel(
            width.max(1),
            height.max(1),
            Rgba([color.0, color.1, color.2, alpha]),
        ))
    }

    /// 内置占位图（品红/黑棋盘格）
    pub fn placeholder() -> Self {
        let image = RgbaImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
            if (x / PLACEHOLDER_CELL + y / PLACEHOLDER_CELL) % 2 == 0 {
                Rgba([255, 0, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        Self::from_image(image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// 按倍率平滑缩放，返回新表面
    ///
    /// 目标尺寸逐轴四舍五入，至少 1 像素。
    pub fn scaled(&self, multiplier: Vec2) -> Surface {
        let (w, h) = self.size();
        let target_w = ((w as f32 * multiplier.x).round() as u32).max(1);
        let target_h = ((h as f32 * multiplier.y).round() as u32).max(1);
        Surface::from_image(imageops::resize(
            self.image.as_ref(),
            target_w,
            target_h,
            FilterType::Triangle,
        ))
    }

    /// 平滑缩放到指定尺寸（至少 1 像素），尺寸相同时直接共享
    pub fn resized_to(&self, width: u32, height: u32) -> Surface {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == (width, height) {
            return self.clone();
        }
        Surface::from_image(imageops::resize(
            self.image.as_ref(),
            width,
            height,
            FilterType::Triangle,
        ))
    }

    /// 水平镜像，返回新表面
    pub fn flipped_horizontal(&self) -> Surface {
        Surface::from_image(imageops::flip_horizontal(self.image.as_ref()))
    }

    /// 在 (x, y) 处写入一块带覆盖率的单色像素
    ///
    /// 用于字形光栅化：`coverage` 为 0..=255 的覆盖率，直接作为 alpha。
    pub(crate) fn write_coverage(&mut self, x: i32, y: i32, color: Rgb, coverage: u8) {
        let image = Rc::make_mut(&mut self.image);
        if x < 0 || y < 0 || x as u32 >= image.width() || y as u32 >= image.height() {
            return;
        }
        let pixel = image.get_pixel_mut(x as u32, y as u32);
        if coverage > pixel[3] {
            *pixel = Rgba([color.0, color.1, color.2, coverage]);
        }
    }
}

/// 进程级图形服务
///
/// 路径解析、图片缓存和字体缓存的组合，由 `SceneManager` 持有，
/// 场景切换时不清空，保证同一路径只加载一次。
#[derive(Debug)]
pub struct Graphics {
    pub assets: AssetResolver,
    pub images: ImageCache,
    pub fonts: FontCache,
}

impl Graphics {
    pub fn new(assets: AssetResolver) -> Self {
        Self {
            assets,
            images: ImageCache::new(),
            fonts: FontCache::new(),
        }
    }

    /// 替换字体缓存（测试中用于屏蔽系统字体）
    pub fn with_fonts(mut self, fonts: FontCache) -> Self {
        self.fonts = fonts;
        self
    }

    /// 加载图片（容错，失败时返回占位图）
    pub fn load_image(&mut self, path: &str) -> Surface {
        self.images.load(&self.assets, path)
    }

    /// 光栅化文字
    pub fn render_text(&mut self, font: &str, text: &str, size: i64, color: Rgb) -> Surface {
        self.fonts.render_text(&self.assets, font, text, size, color)
    }
}

/// 整帧合成目标
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([0, 0, 0, 255])),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// 调整尺寸（内容清空为黑色）
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.size() != (width.max(1), height.max(1)) {
            *self = Self::new(width, height);
        }
    }

    /// 整帧填充
    pub fn fill(&mut self, color: Rgb) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([color.0, color.1, color.2, 255]);
        }
    }

    /// 以 `opacity`（0-255）混合绘制表面，超出画布的部分被裁剪
    pub fn blit(&mut self, surface: &Surface, x: i32, y: i32, opacity: u8) {
        if opacity == 0 {
            return;
        }
        let src = surface.image();
        let (cw, ch) = self.image.dimensions();
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + src.width() as i32).min(cw as i32);
        let y1 = (y + src.height() as i32).min(ch as i32);

        for dy in y0..y1 {
            for dx in x0..x1 {
                let s = src.get_pixel((dx - x) as u32, (dy - y) as u32);
                let alpha = s[3] as u32 * opacity as u32 / 255;
                if alpha == 0 {
                    continue;
                }
                let d = self.image.get_pixel_mut(dx as u32, dy as u32);
                for c in 0..3 {
                    d[c] = ((s[c] as u32 * alpha + d[c] as u32 * (255 - alpha)) / 255) as u8;
                }
                d[3] = (alpha + d[3] as u32 * (255 - alpha) / 255).min(255) as u8;
            }
        }
    }

    /// 读取像素（测试与截图用）
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.image.width() && y < self.image.height()).then(|| self.image.get_pixel(x, y).0)
    }

    /// RGBA8 原始数据，按行排列
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_dimensions() {
        let surface = Surface::blank(100, 100);
        let scaled = surface.scaled(Vec2::new(0.5, 0.5));
        assert_eq!(scaled.size(), (50, 50));

        let odd = Surface::blank(33, 7).scaled(Vec2::new(1.5, 0.1));
        assert_eq!(odd.size(), (50, 1));
    }

    #[test]
    fn test_resized_to() {
        let surface = Surface::blank(64, 64);
        assert_eq!(surface.resized_to(1280, 720).size(), (1280, 720));
        assert_eq!(surface.resized_to(0, 0).size(), (1, 1));
        assert_eq!(surface.resized_to(64, 64).size(), (64, 64));
    }

    #[test]
    fn test_flip_keeps_original() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let surface = Surface::from_image(image);
        let flipped = surface.flipped_horizontal();
        assert_eq!(flipped.image().get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(surface.image().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_blit_with_opacity() {
        let mut canvas = Canvas::new(4, 4);
        let surface = Surface::filled(2, 2, Rgb::WHITE, 255);

        canvas.blit(&surface, 1, 1, 255);
        assert_eq!(canvas.pixel(1, 1), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 255]));

        canvas.fill(Rgb::BLACK);
        canvas.blit(&surface, 0, 0, 0);
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 255]));

        canvas.blit(&surface, 0, 0, 128);
        let [r, _, _, _] = canvas.pixel(0, 0).unwrap();
        assert!((127..=129).contains(&r));
    }

    #[test]
    fn test_blit_clips_outside() {
        let mut canvas = Canvas::new(4, 4);
        let surface = Surface::filled(4, 4, Rgb::WHITE, 255);
        canvas.blit(&surface, -2, 3, 255);
        assert_eq!(canvas.pixel(1, 3), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(2, 3), Some([0, 0, 0, 255]));
    }
}
