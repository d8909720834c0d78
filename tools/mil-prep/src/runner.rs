//! 程序运行函数.

use crate::result::{PrepResult, TileSummary};
use crate::{PrepareArgs, TileArgs};
use anyhow::{Context, Result};
use utils::loader;
use wsi_berry::dataset::{self, PrepConfig};
use wsi_berry::{Tiler, TilingConfig};

/// 由命令行参数组装配置.
fn prep_config(args: PrepareArgs) -> Result<(PrepConfig, bool)> {
    let root = match args.data_root {
        Some(root) => root,
        None => loader::data_root_from_env_or_home().context(format!(
            "无法确定数据根目录, 请设置 `${}` 或使用 --data-root",
            loader::DATA_DIR_ENV
        ))?,
    };

    let mut config = loader::prep_config(root);
    if let Some(p) = args.slide_root {
        config.slide_root = p;
    }
    if let Some(p) = args.patches_root {
        config.patches_root = p;
    }
    if let Some(p) = args.label_table {
        config.label_table = Some(p);
    }
    if let Some(p) = args.manifest {
        config.manifest_path = p;
    }
    config.tiling = args.tiling.into();
    config.parallel = args.parallel;
    config.verbose = args.verbose;
    Ok((config, args.dry_run))
}

/// 运行 `prepare`. 只列出切片时返回 `None`.
pub fn prepare(args: PrepareArgs) -> Result<Option<PrepResult>> {
    let (config, dry_run) = prep_config(args)?;
    // 提前暴露配置错误, 不必等到扫描目录.
    config.tiling.validate()?;

    if dry_run {
        let slides = dataset::slide_loader(&config.slide_root)?;
        println!("{} 张待处理切片:", slides.len());
        for s in slides {
            println!("  {}", s.path.display());
        }
        return Ok(None);
    }

    if config.parallel {
        log::info!("并行处理, 可用核心数 {}", utils::cpus());
    }

    let report = dataset::run(&config)
        .with_context(|| format!("处理 `{}` 失败", config.slide_root.display()))?;
    Ok(Some(PrepResult::new(report)))
}

/// 运行 `tile`.
pub fn tile(args: TileArgs) -> Result<TileSummary> {
    let config: TilingConfig = args.tiling.into();
    let options = config.validate()?;

    let outcome = Tiler::new(options)
        .verbose(true)
        .tile(&args.slide, &args.output_dir)
        .with_context(|| format!("切块 `{}` 失败", args.slide.display()))?;
    Ok(TileSummary::new(args.slide, outcome))
}
