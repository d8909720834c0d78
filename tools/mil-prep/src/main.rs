//! 切片切块与 MIL 数据集清单生成工具.

mod result;
mod runner;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wsi_berry::consts::{DEFAULT_PATCH_SIZE, DEFAULT_TISSUE_THRESHOLD};
use wsi_berry::TilingConfig;

/// 将全视野切片切块, 过滤背景, 并生成多示例学习数据集清单
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 日志级别: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 处理数据根目录下的全部切片并写出清单
    Prepare(PrepareArgs),

    /// 只对一张切片切块, 输出详细信息
    Tile(TileArgs),
}

/// 切块参数
#[derive(Args, Debug, Clone)]
pub struct TilingArgs {
    /// 切块边长 (像素)
    #[arg(short, long, default_value_t = DEFAULT_PATCH_SIZE)]
    patch_size: u32,

    /// 步长, 缺省时等于切块边长
    #[arg(short, long)]
    stride: Option<u32>,

    /// 读取的金字塔层级
    #[arg(short, long, default_value_t = 0)]
    level: u32,

    /// 阈值算法: otsu 或 triangle
    #[arg(long, default_value = "otsu")]
    tissue_method: String,

    /// 最低组织占比, 取值 [0, 1]
    #[arg(long, default_value_t = DEFAULT_TISSUE_THRESHOLD)]
    tissue_threshold: f64,

    /// 存储格式: npy 或 png
    #[arg(short, long, default_value = "npy")]
    format: String,
}

impl From<TilingArgs> for TilingConfig {
    fn from(a: TilingArgs) -> Self {
        Self {
            patch_size: a.patch_size,
            stride: a.stride,
            level: a.level,
            tissue_method: a.tissue_method,
            tissue_threshold: a.tissue_threshold,
            save_format: a.format,
        }
    }
}

/// `prepare` 子命令参数
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// 数据根目录. 缺省时取 `$WSI_DATA_DIR`, 再缺省取 `$HOME/dataset/camelyon17`
    #[arg(short, long)]
    data_root: Option<PathBuf>,

    /// 覆盖切片目录 (默认 `{root}/images`)
    #[arg(long)]
    slide_root: Option<PathBuf>,

    /// 覆盖切块输出目录 (默认 `{root}/patches`)
    #[arg(long)]
    patches_root: Option<PathBuf>,

    /// 覆盖标签表路径 (默认 `{root}/stages.csv`)
    #[arg(long)]
    label_table: Option<PathBuf>,

    /// 覆盖清单路径 (默认 `{root}/mil_dataset.json`)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// 多个切片并行处理
    #[arg(long)]
    parallel: bool,

    /// 输出每张切片的属性与进度
    #[arg(short, long)]
    verbose: bool,

    /// 只列出待处理的切片
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    tiling: TilingArgs,
}

/// `tile` 子命令参数
#[derive(Args, Debug)]
pub struct TileArgs {
    /// 切片路径
    slide: PathBuf,

    /// 切块输出目录
    output_dir: PathBuf,

    #[command(flatten)]
    tiling: TilingArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: log::LevelFilter = cli
        .log_level
        .parse()
        .map_err(|_| anyhow!("无效的日志级别 `{}`", cli.log_level))?;
    simple_logger::SimpleLogger::new().with_level(level).init()?;
    log::debug!("切片后端: {}", wsi_berry::slide::backend_name());

    match cli.command {
        Command::Prepare(args) => {
            if let Some(result) = runner::prepare(args)? {
                result.analyze();
            }
        }
        Command::Tile(args) => runner::tile(args)?.analyze(),
    }
    Ok(())
}
