//! `scene-check` 命令实现

use std::path::{Path, PathBuf};

use hb_runtime::assets::AssetResolver;
use hb_runtime::metadata::ActionCatalog;
use hb_runtime::{AssetKind, DiagnosticResult, SceneData, analyze_scene, extract_asset_references};
use serde_json::Value;
use walkdir::WalkDir;

/// 项目目录下不是场景的 JSON 文件
const NON_SCENE_FILES: [&str; 2] = ["project_settings.json", "values.json"];

/// 场景文件至少包含其中一个顶层键
const SCENE_KEYS: [&str; 8] = [
    "type",
    "background",
    "sprites",
    "interactables",
    "buttons",
    "text",
    "containers",
    "dialogue",
];

/// 场景检查配置
pub struct SceneCheckConfig {
    pub project_root: PathBuf,
    pub engine_root: PathBuf,
}

/// 场景检查结果
#[derive(Default)]
pub struct SceneCheckResult {
    /// 检查的场景数量
    pub scenes_checked: usize,
    /// 读取或解析失败的文件数量
    pub parse_errors: usize,
    pub diagnostics: DiagnosticResult,
    pub missing_assets: Vec<MissingAsset>,
}

/// 缺失的资源
pub struct MissingAsset {
    pub scene_id: String,
    pub kind: AssetKind,
    pub path: String,
    pub location: String,
}

impl SceneCheckResult {
    pub fn error_count(&self) -> usize {
        self.parse_errors + self.diagnostics.error_count()
    }

    pub fn warn_count(&self) -> usize {
        self.diagnostics.warn_count() + self.missing_assets.len()
    }
}

/// 执行场景检查
pub fn scene_check(config: &SceneCheckConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let files = match path {
        Some(p) if p.is_file() => vec![p.to_path_buf()],
        Some(p) if p.is_dir() => collect_scene_files(p),
        Some(p) => anyhow::bail!("路径不存在: {}", p.display()),
        None => {
            if !config.project_root.is_dir() {
                anyhow::bail!("项目目录不存在: {}", config.project_root.display());
            }
            collect_scene_files(&config.project_root)
        }
    };

    if files.is_empty() {
        eprintln!("未找到场景文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个场景文件...\n", files.len());

    let catalog = ActionCatalog::builtin()?;
    let resolver = AssetResolver::new(&config.project_root, &config.engine_root);
    let mut result = SceneCheckResult::default();
    for file in &files {
        check_scene_file(file, &catalog, &resolver, &mut result);
    }

    print_check_result(&result);

    if result.error_count() > 0 {
        anyhow::bail!("场景检查发现错误");
    }
    Ok(())
}

/// 收集目录下的场景文件（按路径排序）
pub fn collect_scene_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_none_or(|n| !NON_SCENE_FILES.contains(&n))
        })
        .filter(|p| looks_like_scene(p))
        .collect();
    files.sort();
    files
}

/// 顶层是对象且带场景键；无法解析的 JSON 也算，交给检查阶段报错
fn looks_like_scene(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return true;
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => SCENE_KEYS.iter().any(|k| map.contains_key(*k)),
        Ok(_) => false,
        Err(_) => true,
    }
}

/// 检查单个场景文件
pub fn check_scene_file(
    file: &Path,
    catalog: &ActionCatalog,
    resolver: &AssetResolver,
    result: &mut SceneCheckResult,
) {
    let scene_id = file.display().to_string();
    result.scenes_checked += 1;

    let scene = match SceneData::load(file) {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("[ERROR] {scene_id}: {e}");
            result.parse_errors += 1;
            return;
        }
    };

    result.diagnostics.merge(analyze_scene(&scene_id, &scene, catalog));

    for reference in extract_asset_references(&scene, catalog) {
        if !needs_file(reference.kind, &reference.path) {
            continue;
        }
        if !resolver.resolve(&reference.path).exists() {
            result.missing_assets.push(MissingAsset {
                scene_id: scene_id.clone(),
                kind: reference.kind,
                path: reference.path,
                location: reference.location,
            });
        }
    }
}

/// 字体的 `family|style` 形式走系统字体查找，不对应项目文件
fn needs_file(kind: AssetKind, path: &str) -> bool {
    !(kind == AssetKind::Font && path.contains('|'))
}

/// 输出检查结果
fn print_check_result(result: &SceneCheckResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个场景", result.scenes_checked);
    eprintln!();

    for diag in &result.diagnostics.diagnostics {
        eprintln!("{diag}");
    }

    for missing in &result.missing_assets {
        eprintln!(
            "[WARN] {} {}: {}不存在 {}",
            missing.scene_id, missing.location, missing.kind, missing.path
        );
    }

    let error_count = result.error_count();
    let warn_count = result.warn_count();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {error_count} 个错误, {warn_count} 个警告");
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {warn_count} 个警告");
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
