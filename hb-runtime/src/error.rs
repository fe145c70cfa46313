//! # Error 模块
//!
//! 定义 hb-runtime 中使用的错误类型。
//!
//! 内容错误（场景/对话数据写错）在帧内只记录日志，不向外传播；
//! 只有加载阶段的错误通过 `Result` 返回给调用方。

use std::path::PathBuf;

use thiserror::Error;

/// Action 执行错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// 注册表中没有这个 Action
    #[error("未知 Action '{name}'")]
    UnknownActionName { name: String },

    /// 注册表中没有这个过渡效果
    #[error("未知过渡效果 '{name}'")]
    UnknownTransitionName { name: String },

    /// 引用了不存在的 Renderable
    #[error("Action '{action}' 引用了不存在的 Renderable '{key}'")]
    UnknownRenderableKey { action: String, key: String },

    /// Renderable 键与场景中已有的键冲突
    #[error("Renderable 键 '{key}' 已存在")]
    DuplicateRenderableKey { key: String },

    /// 缺少必需参数且没有可用的全局绑定
    #[error("Action '{action}' 缺少必需参数 '{param}'")]
    MissingRequiredParameter { action: String, param: String },

    /// 参数值类型不符
    #[error("Action '{action}' 的参数 '{param}' 无效：期望 {expected}")]
    InvalidParameter {
        action: String,
        param: String,
        expected: String,
    },
}

/// 场景加载/切换错误
#[derive(Error, Debug)]
pub enum SceneError {
    /// 场景文件读取失败
    #[error("无法读取场景文件 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 场景文件解析失败
    #[error("场景文件 {path:?} 解析失败: {message}")]
    Parse { path: PathBuf, message: String },

    /// 未知场景类型
    #[error("未知场景类型 '{kind}'")]
    UnknownSceneKind { kind: String },

    /// 项目未配置起始场景
    #[error("项目未配置 Game.starting_scene")]
    StartingSceneUnset,

    /// 场景加载时执行 Action 失败
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// 项目文件错误
#[derive(Error, Debug)]
pub enum ProjectError {
    /// 项目设置文件读取失败
    #[error("无法读取项目设置 {path:?}: {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 项目设置文件解析失败
    #[error("项目设置 {path:?} 解析失败: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 值文件解析失败
    #[error("值文件 {path:?} 解析失败: {message}")]
    ValuesParse { path: PathBuf, message: String },

    /// Action 元数据目录解析失败
    #[error("Action 元数据解析失败: {0}")]
    Catalog(String),
}

/// 资源错误
///
/// 运行时遇到资源错误会就地替换为占位图，不会中断场景。
#[derive(Error, Debug)]
pub enum AssetError {
    /// 资源未找到
    #[error("资源未找到: {path:?}")]
    NotFound { path: PathBuf },

    /// 资源解码失败
    #[error("资源解码失败: {path:?} - {message}")]
    Decode { path: PathBuf, message: String },
}

/// 编辑器形态 ⇄ 引擎形态转换错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// 元数据目录中没有这个 Action
    #[error("元数据目录中没有 Action '{name}'")]
    UnknownAction { name: String },

    /// 引擎数据结构不符合描述符
    #[error("参数 '{param}' 的数据格式错误: {message}")]
    Malformed { param: String, message: String },
}

/// hb-runtime 统一错误类型
#[derive(Error, Debug)]
pub enum HbError {
    #[error("场景错误: {0}")]
    Scene(#[from] SceneError),

    #[error("项目错误: {0}")]
    Project(#[from] ProjectError),

    #[error("Action 错误: {0}")]
    Action(#[from] ActionError),

    #[error("转换错误: {0}")]
    Convert(#[from] ConvertError),
}

/// Result 类型别名
pub type HbResult<T> = Result<T, HbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_into_scene_error() {
        let err: SceneError = ActionError::UnknownActionName {
            name: "fly".to_string(),
        }
        .into();
        assert!(matches!(err, SceneError::Action(_)));
        assert!(err.to_string().contains("fly"));
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: HbError = SceneError::StartingSceneUnset.into();
        assert!(matches!(err, HbError::Scene(SceneError::StartingSceneUnset)));
    }
}
