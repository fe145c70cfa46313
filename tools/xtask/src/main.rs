//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与场景文件工具。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `scene-check`: 检查场景文件（Action 名、必需参数、分支引用、资源是否存在）
//! - `convert`: 场景文件在引擎形态与编辑器形态之间转换

mod convert;
mod scene_check;

use std::path::PathBuf;
use std::process::{Command, ExitCode};

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "HBEngine 开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 检查场景文件
    ///
    /// 不带路径时检查项目目录下所有场景文件。
    SceneCheck {
        /// 场景文件或目录（默认：项目目录）
        path: Option<PathBuf>,

        /// 项目目录（资源路径相对它解析）
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// 引擎目录（`HBEngine/` 前缀的路径相对它解析）
        #[arg(long, default_value = ".")]
        engine_root: PathBuf,
    },

    /// 转换场景文件形态
    Convert {
        /// 输入文件
        input: PathBuf,

        /// 目标形态
        #[arg(long, value_enum)]
        to: Shape,

        /// 输出文件（默认：标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// 场景文件形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Shape {
    /// 紧凑的运行时形态
    Engine,
    /// 带完整参数元数据的编辑器形态
    Editor,
}

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckAll => {
            let mut fmt = Command::new("cargo");
            fmt.args(["fmt", "--all", "--", "--check"]);
            run("cargo fmt --all -- --check", &mut fmt)?;

            let mut clippy = Command::new("cargo");
            clippy.args(["clippy", "--workspace", "--all-targets"]);
            run("cargo clippy --workspace --all-targets", &mut clippy)?;

            let mut test = Command::new("cargo");
            test.args(["test", "--workspace"]);
            run("cargo test --workspace", &mut test)?;
        }
        Commands::SceneCheck {
            path,
            project,
            engine_root,
        } => {
            let config = scene_check::SceneCheckConfig {
                project_root: project,
                engine_root,
            };
            scene_check::scene_check(&config, path.as_deref())?;
        }
        Commands::Convert { input, to, output } => {
            let content = std::fs::read_to_string(&input)?;
            let converted = match to {
                Shape::Editor => convert::engine_file_to_editor(&content)?,
                Shape::Engine => convert::editor_file_to_engine(&content)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, converted)?;
                    eprintln!("已写入 {}", path.display());
                }
                None => println!("{converted}"),
            }
        }
    }

    Ok(())
}
