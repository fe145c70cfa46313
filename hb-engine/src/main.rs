//! HBEngine - 宿主程序
//!
//! 加载项目，打开窗口，每帧驱动 `hb-runtime` 的 SceneManager 并把画布上屏。
//!
//! ```text
//! hb-engine -p <project_dir> [--config config.json] [--fps-cap 60] [--engine-root <dir>]
//! ```

mod app;
mod config;
mod presenter;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use hb_runtime::{AssetResolver, Graphics, Project, SceneManager};
use tracing::error;
use winit::event_loop::EventLoop;

use crate::app::EngineApp;
use crate::config::{DEFAULT_CONFIG_PATH, EngineConfig};

/// HBEngine 视觉小说引擎
#[derive(Parser, Debug)]
#[command(name = "hb-engine", version, about)]
struct Cli {
    /// 项目目录（包含 project_settings.json）
    #[arg(short = 'p', long = "project")]
    project: PathBuf,

    /// 引擎配置文件
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 覆盖配置文件中的帧率上限
    #[arg(long)]
    fps_cap: Option<f32>,

    /// 覆盖配置文件中的引擎目录
    #[arg(long)]
    engine_root: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "引擎异常退出");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig::load(&cli.config);
    if let Some(fps_cap) = cli.fps_cap {
        config.fps_cap = fps_cap;
    }
    if let Some(engine_root) = cli.engine_root {
        config.engine_root = engine_root;
    }
    config.validate()?;

    let project = Project::load(&cli.project)
        .with_context(|| format!("无法加载项目 {}", cli.project.display()))?;
    let title = config
        .window_title
        .clone()
        .unwrap_or_else(|| project.settings.game.title.clone());
    let graphics = Graphics::new(AssetResolver::new(
        project.root.clone(),
        config.engine_root.clone(),
    ));

    let mut manager = SceneManager::new(project, graphics);
    manager.start().context("起始场景加载失败")?;

    let event_loop = EventLoop::new().context("无法创建事件循环")?;
    let mut app = EngineApp::new(config, manager, title);
    event_loop.run_app(&mut app).context("事件循环异常退出")?;
    app.finish()
}
