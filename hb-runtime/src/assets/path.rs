//! # 路径规范化模块
//!
//! 所有资源路径在解析前都经过这里，保证缓存键稳定。
//!
//! ## 规则
//!
//! - 统一使用 `/` 作为分隔符
//! - 移除开头的 `./`，跳过空组件与 `.`
//! - `..` 只在逻辑路径内部回退，不会越过内容根目录

/// 引擎内容前缀
pub const ENGINE_PREFIX: &str = "HBEngine/";

/// 规范化逻辑路径
///
/// ```text
/// "Content/../Sprites/a.png"  -> "Sprites/a.png"
/// "./Sprites\\a.png"          -> "Sprites/a.png"
/// "../a.png"                  -> "a.png"
/// ```
pub fn normalize_logical_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");

    let mut components = Vec::new();
    for component in normalized.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    components.join("/")
}

/// 去掉引擎前缀，返回引擎内容目录下的逻辑路径
///
/// 不带前缀时返回 None。
pub fn strip_engine_prefix(path: &str) -> Option<String> {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./");
    trimmed
        .strip_prefix(ENGINE_PREFIX)
        .map(normalize_logical_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_logical_path("Sprites/a.png"), "Sprites/a.png");
        assert_eq!(normalize_logical_path("./Sprites/a.png"), "Sprites/a.png");
        assert_eq!(normalize_logical_path("Sprites\\a.png"), "Sprites/a.png");
    }

    #[test]
    fn test_normalize_with_dotdot() {
        assert_eq!(
            normalize_logical_path("Content/../Sprites/a.png"),
            "Sprites/a.png"
        );
        assert_eq!(normalize_logical_path("a/b/../../c/d.png"), "c/d.png");
        assert_eq!(normalize_logical_path("../a.png"), "a.png");
    }

    #[test]
    fn test_strip_engine_prefix() {
        assert_eq!(
            strip_engine_prefix("HBEngine/Content/Fonts/Default.ttf"),
            Some("Content/Fonts/Default.ttf".to_string())
        );
        assert_eq!(
            strip_engine_prefix("HBEngine\\Content\\x.png"),
            Some("Content/x.png".to_string())
        );
        assert_eq!(strip_engine_prefix("Content/x.png"), None);
    }
}
