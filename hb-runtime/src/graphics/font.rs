//! # Font 模块
//!
//! 字体加载、缓存与文字光栅化。
//!
//! ## 字体值的写法
//!
//! - `""` / `"None"`：引擎默认字体
//! - `HBEngine/...`：引擎内容目录下的字体文件
//! - `family|style`：系统字体（如 `Arial|Bold`）
//! - 其他：相对项目内容目录（或绝对路径）的字体文件
//!
//! 找不到任何可用字体时，文字以占位字块光栅化，尺寸规则固定
//! （每个字符宽 `0.5 × size`，每行高 `size`），保证排版结果确定。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fontdue::{Font, FontSettings};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::Surface;
use crate::assets::AssetResolver;
use crate::geometry::Rgb;

/// 引擎默认字体
pub const DEFAULT_FONT: &str = "HBEngine/Content/Fonts/Default.ttf";

/// 系统字体值中 family 与 style 的分隔符
pub const FONT_STYLE_SEPARATOR: char = '|';

/// 字号上限
pub const MAX_TEXT_SIZE: i64 = 1024;

/// 文字表面单边的像素上限
const MAX_TEXT_EDGE: u64 = 16384;

/// 文字表面的总像素上限
const MAX_TEXT_PIXELS: u64 = 4096 * 4096;

/// 字体来源
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontSource {
    /// 引擎默认字体
    Default,
    /// 字体文件（引擎前缀/项目相对/绝对路径）
    File(String),
    /// 系统字体
    System { family: String, style: String },
}

impl FontSource {
    /// 解析字体值
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == "None" {
            return Self::Default;
        }
        if let Some((family, style)) = value.split_once(FONT_STYLE_SEPARATOR) {
            return Self::System {
                family: family.trim().to_string(),
                style: style.trim().to_string(),
            };
        }
        Self::File(value.to_string())
    }
}

/// 字体缓存
///
/// 以 (来源, 样式) 为键缓存已解析的字体；fontdue 的字体与字号无关，
/// 字号在光栅化时传入。加载失败也会被缓存，避免每帧重复告警。
#[derive(Default)]
pub struct FontCache {
    fonts: HashMap<FontSource, Option<Rc<Font>>>,
    system_dirs: Option<Vec<PathBuf>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定系统字体搜索目录（测试或特殊平台使用）
    pub fn with_system_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            fonts: HashMap::new(),
            system_dirs: Some(dirs),
        }
    }

    /// 光栅化文字
    ///
    /// `size` 限制在 `1..=MAX_TEXT_SIZE`；表面超出像素上限时返回占位图。
    pub fn render_text(
        &mut self,
        assets: &AssetResolver,
        font: &str,
        text: &str,
        size: i64,
        color: Rgb,
    ) -> Surface {
        if size > MAX_TEXT_SIZE {
            warn!(size, max = MAX_TEXT_SIZE, "字号过大，按上限处理");
        }
        let px = size.clamp(1, MAX_TEXT_SIZE) as f32;
        match self.load(assets, &FontSource::parse(font)) {
            Some(font) => rasterize(&font, text, px, color),
            None => rasterize_placeholder(text, px, color),
        }
    }

    /// 加载字体（失败时回退到默认字体）
    fn load(&mut self, assets: &AssetResolver, source: &FontSource) -> Option<Rc<Font>> {
        if let Some(font) = self.load_exact(assets, source) {
            return Some(font);
        }
        if *source != FontSource::Default {
            warn!(font = ?source, "字体加载失败，回退到默认字体");
            return self.load_exact(assets, &FontSource::Default);
        }
        None
    }

    fn load_exact(&mut self, assets: &AssetResolver, source: &FontSource) -> Option<Rc<Font>> {
        if let Some(cached) = self.fonts.get(source) {
            return cached.clone();
        }

        let path = match source {
            FontSource::Default => Some(assets.resolve(DEFAULT_FONT)),
            FontSource::File(path) => Some(assets.resolve(path)),
            FontSource::System { family, style } => self.find_system_font(family, style),
        };
        let font = path.and_then(|p| read_font(&p)).map(Rc::new);
        if font.is_none() {
            debug!(font = ?source, "字体不可用");
        }
        self.fonts.insert(source.clone(), font.clone());
        font
    }

    fn find_system_font(&mut self, family: &str, style: &str) -> Option<PathBuf> {
        let dirs = self.system_dirs.get_or_insert_with(default_system_font_dirs);
        let family = normalize_font_name(family);
        let style = normalize_font_name(style);

        let mut fuzzy = None;
        for dir in dirs.iter() {
            for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
                let path = entry.path();
                let is_font = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
                if !is_font {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let stem = normalize_font_name(stem);
                let exact = if style.is_empty() || style == "regular" {
                    stem == family || stem == format!("{family}regular")
                } else {
                    stem == format!("{family}{style}")
                };
                if exact {
                    return Some(path.to_path_buf());
                }
                if fuzzy.is_none() && stem.starts_with(&family) && stem.contains(&style) {
                    fuzzy = Some(path.to_path_buf());
                }
            }
        }
        fuzzy
    }
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCache")
            .field("cached", &self.fonts.len())
            .finish()
    }
}

fn read_font(path: &Path) -> Option<Font> {
    let bytes = std::fs::read(path).ok()?;
    match Font::from_bytes(bytes, FontSettings::default()) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = ?path, error = e, "字体解析失败");
            None
        }
    }
}

fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn default_system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        dirs.push(PathBuf::from("C:\\Windows\\Fonts"));
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

fn rasterize(font: &Font, text: &str, px: f32, color: Rgb) -> Surface {
    let (ascent, line_height) = match font.horizontal_line_metrics(px) {
        Some(m) => (m.ascent, m.new_line_size.max(1.0)),
        None => (px * 0.8, px),
    };

    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines
        .iter()
        .map(|line| {
            line.chars()
                .map(|c| font.metrics(c, px).advance_width)
                .sum::<f32>()
        })
        .fold(0.0f32, f32::max);
    let height = line_height * lines.len() as f32;

    let Some(mut surface) = text_surface(width.ceil() as u64, height.ceil() as u64) else {
        return Surface::placeholder();
    };
    for (row, line) in lines.iter().enumerate() {
        let baseline = row as f32 * line_height + ascent;
        let mut pen_x = 0.0f32;
        for c in line.chars() {
            let (metrics, bitmap) = font.rasterize(c, px);
            let gx = pen_x.round() as i32 + metrics.xmin;
            let gy = (baseline - metrics.ymin as f32 - metrics.height as f32).round() as i32;
            for y in 0..metrics.height {
                for x in 0..metrics.width {
                    let coverage = bitmap[y * metrics.width + x];
                    if coverage > 0 {
                        surface.write_coverage(gx + x as i32, gy + y as i32, color, coverage);
                    }
                }
            }
            pen_x += metrics.advance_width;
        }
    }
    surface
}

/// 无字体可用时的占位光栅化：每个非空白字符画一个实心字块
fn rasterize_placeholder(text: &str, px: f32, color: Rgb) -> Surface {
    let cell_w = ((px * 0.5).round() as u32).max(1);
    let cell_h = (px.round() as u32).max(1);
    let lines: Vec<&str> = text.split('\n').collect();
    let columns = lines
        .iter()
        .map(|line| line.chars().count() as u64)
        .max()
        .unwrap_or(0);

    let width = columns.saturating_mul(u64::from(cell_w));
    let height = (lines.len() as u64).saturating_mul(u64::from(cell_h));
    let Some(mut surface) = text_surface(width, height) else {
        return Surface::placeholder();
    };
    for (row, line) in lines.iter().enumerate() {
        for (col, c) in line.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            let x0 = col as i32 * cell_w as i32;
            let y0 = row as i32 * cell_h as i32;
            for y in 1..cell_h.saturating_sub(1) as i32 {
                for x in 0..cell_w.saturating_sub(1) as i32 {
                    surface.write_coverage(x0 + x, y0 + y, color, 255);
                }
            }
        }
    }
    surface
}

/// 按像素上限分配文字表面
fn text_surface(width: u64, height: u64) -> Option<Surface> {
    if width > MAX_TEXT_EDGE || height > MAX_TEXT_EDGE || width * height > MAX_TEXT_PIXELS {
        warn!(width, height, "文字表面超出像素上限，使用占位图");
        return None;
    }
    Some(Surface::blank(width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AssetResolver {
        AssetResolver::new("/nonexistent/project", "/nonexistent/engine")
    }

    #[test]
    fn test_parse_font_source() {
        assert_eq!(FontSource::parse(""), FontSource::Default);
        assert_eq!(FontSource::parse("None"), FontSource::Default);
        assert_eq!(
            FontSource::parse("Arial|Bold"),
            FontSource::System {
                family: "Arial".to_string(),
                style: "Bold".to_string()
            }
        );
        assert_eq!(
            FontSource::parse("HBEngine/Content/Fonts/a.ttf"),
            FontSource::File("HBEngine/Content/Fonts/a.ttf".to_string())
        );
    }

    #[test]
    fn test_placeholder_metrics() {
        let mut cache = FontCache::with_system_dirs(Vec::new());
        let surface = cache.render_text(&resolver(), "", "Hello", 20, Rgb::WHITE);
        assert_eq!(surface.size(), (50, 20));

        let two_lines = cache.render_text(&resolver(), "", "ab\nc", 10, Rgb::WHITE);
        assert_eq!(two_lines.size(), (10, 20));
    }

    #[test]
    fn test_size_clamped_to_one() {
        let mut cache = FontCache::with_system_dirs(Vec::new());
        let zero = cache.render_text(&resolver(), "", "ab", 0, Rgb::WHITE);
        let negative = cache.render_text(&resolver(), "", "ab", -5, Rgb::WHITE);
        assert_eq!(zero.size(), (2, 1));
        assert_eq!(negative.size(), zero.size());
    }

    #[test]
    fn test_huge_size_clamped() {
        let mut cache = FontCache::with_system_dirs(Vec::new());
        let huge = cache.render_text(&resolver(), "", "abcde", 2_000_000_000, Rgb::WHITE);
        let max = cache.render_text(&resolver(), "", "abcde", MAX_TEXT_SIZE, Rgb::WHITE);
        assert_eq!(huge.size(), (2560, 1024));
        assert_eq!(huge.size(), max.size());
    }

    #[test]
    fn test_oversized_surface_uses_placeholder() {
        let mut cache = FontCache::with_system_dirs(Vec::new());
        let long = "a".repeat(100);
        let surface = cache.render_text(&resolver(), "", &long, MAX_TEXT_SIZE, Rgb::WHITE);
        assert_eq!(surface.size(), Surface::placeholder().size());
    }

    #[test]
    fn test_missing_system_font_falls_back() {
        let mut cache = FontCache::with_system_dirs(Vec::new());
        let surface = cache.render_text(&resolver(), "Nope|Bold", "x", 10, Rgb::WHITE);
        assert_eq!(surface.size(), (5, 10));
    }

    #[test]
    fn test_normalize_font_name() {
        assert_eq!(normalize_font_name("Open Sans-Bold"), "opensansbold");
    }
}
