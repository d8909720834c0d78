//! 网格切块.
//!
//! 对一张切片按固定步长做行优先扫描, 每个候选块经组织分类器过滤后,
//! 将保留的块写入输出目录, 文件名为 `{slide}_x{x}_y{y}.{ext}`.

mod grid;
mod options;
mod profile;
mod save;

use crate::slide::{self, Slide, SlideError};
use crate::tissue::TissueClassifier;
use crate::Pos2d;
use itertools::Itertools;
use log::Level;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use grid::{grid_len, GridIter};
pub use options::{ConfigError, SaveFormat, TilingConfig, TilingOptions};
pub use profile::TileProfile;
pub use save::PatchWrite;

/// 切块运行时错误.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// 配置非法. 总在打开切片之前报告.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 切片打开或读取失败.
    #[error(transparent)]
    Slide(#[from] SlideError),

    /// 输出目录操作失败.
    #[error("无法创建输出目录 `{path}`: {source}")]
    Io {
        /// 目录路径.
        path: PathBuf,
        /// 底层错误.
        source: io::Error,
    },

    /// 写 `npy` 失败.
    #[error("写入 npy 失败: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    /// 写 `png` 失败.
    #[error("写入图像失败: {0}")]
    Image(#[from] image::ImageError),

    /// 扫描被取消.
    #[error("切块被取消")]
    Cancelled,
}

/// 切块结果.
pub type TileResult<T> = Result<T, TileError>;

/// 一次切块的产出.
#[derive(Clone, Debug)]
pub struct TilingOutcome {
    /// 按扫描顺序排列的已保存切块路径. 没有任何组织块时为空, 而不是错误.
    pub patch_paths: Vec<PathBuf>,

    /// 统计信息.
    pub profile: TileProfile,
}

/// 切片文件的基础名: 去掉目录和扩展名.
///
/// 例如 `images/patient_000_node_0.tif` -> `patient_000_node_0`.
pub fn slide_base_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 切块文件名: `{base}_x{x}_y{y}.{ext}`.
#[inline]
pub fn patch_filename(base: &str, (x, y): Pos2d, format: SaveFormat) -> String {
    format!("{base}_x{x}_y{y}.{}", format.extension())
}

/// 网格切块器.
///
/// 持有已校验的参数, 因此扫描中不会再出现配置错误.
#[derive(Clone, Debug)]
pub struct Tiler {
    options: TilingOptions,
    classifier: TissueClassifier,
    cancel: Option<Arc<AtomicBool>>,
    verbose: bool,
}

impl Tiler {
    /// 初始化.
    pub fn new(options: TilingOptions) -> Self {
        Self {
            options,
            classifier: options.classifier(),
            cancel: None,
            verbose: false,
        }
    }

    /// 设置取消标志. 每个候选块开始前检查一次, 置位后返回 [`TileError::Cancelled`].
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// 详细模式: 以 `info` 级别输出切片属性与进度, 否则为 `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// 参数.
    #[inline]
    pub fn options(&self) -> &TilingOptions {
        &self.options
    }

    /// 一个切块在 level 0 上覆盖的边长: `patch_size * downsample(level)`, 向上取整.
    pub fn footprint(&self, slide: &dyn Slide) -> u32 {
        let ds = slide
            .level_downsamples()
            .get(self.options.level() as usize)
            .copied()
            .unwrap_or(1.0)
            .max(1.0);
        (self.options.patch_size() as f64 * ds).ceil() as u32
    }

    /// `slide` 上的候选块迭代器. 坐标为 level 0 坐标, 每个候选块的
    /// level 0 覆盖范围都完整地落在切片内.
    #[inline]
    pub fn origins(&self, slide: &dyn Slide) -> GridIter {
        GridIter::new(slide.dimensions(), self.footprint(slide), self.options.stride())
    }

    #[inline]
    fn log_level(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// 打开 `slide_path` 并切块到 `output_dir`.
    ///
    /// 切片句柄在本函数返回前 (包括出错提前返回) 被释放.
    pub fn tile<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        slide_path: P,
        output_dir: Q,
    ) -> TileResult<TilingOutcome> {
        let slide_path = slide_path.as_ref();
        let slide = slide::open(slide_path)?;
        self.tile_slide(
            slide.as_ref(),
            &slide_base_name(slide_path),
            output_dir.as_ref(),
        )
    }

    /// 对已打开的切片切块. `base` 为文件名前缀.
    ///
    /// 返回错误时, 本次已写入的切块会被删除.
    pub fn tile_slide(
        &self,
        slide: &dyn Slide,
        base: &str,
        output_dir: &Path,
    ) -> TileResult<TilingOutcome> {
        let opt = &self.options;
        let lv = self.log_level();
        slide.check_level(opt.level())?;

        let dims = slide.dimensions();
        log::log!(
            lv,
            "切片 `{base}`: 尺寸 {}x{}, 各层尺寸 [{}], 下采样倍数 [{}]",
            dims.0,
            dims.1,
            slide
                .all_level_dimensions()
                .iter()
                .map(|(w, h)| format!("{w}x{h}"))
                .join(", "),
            slide.level_downsamples().iter().join(", "),
        );
        log::log!(
            lv,
            "以 {0}x{0} 切块, 层级 {1}, 步长 {2}, 阈值算法 {3}, 最低组织占比 {4}, 格式 {5}",
            opt.patch_size(),
            opt.level(),
            opt.stride(),
            opt.method(),
            opt.tissue_threshold(),
            opt.save_format(),
        );

        std::fs::create_dir_all(output_dir).map_err(|source| TileError::Io {
            path: output_dir.to_owned(),
            source,
        })?;

        let origins = self.origins(slide);
        let mut profile = TileProfile::new(origins.total());
        let mut saved = Vec::new();

        if let Err(e) = self.scan(slide, base, output_dir, origins, &mut profile, &mut saved) {
            discard_partial(base, &saved);
            return Err(e);
        }

        let profile = profile.finish();
        log::log!(
            lv,
            "保存了 {} 个切块到 {}",
            saved.len(),
            output_dir.display()
        );

        Ok(TilingOutcome {
            patch_paths: saved,
            profile,
        })
    }

    /// 扫描所有候选块, 保存的路径依次追加到 `saved`.
    fn scan(
        &self,
        slide: &dyn Slide,
        base: &str,
        output_dir: &Path,
        origins: GridIter,
        profile: &mut TileProfile,
        saved: &mut Vec<PathBuf>,
    ) -> TileResult<()> {
        let opt = &self.options;
        let lv = self.log_level();
        let total = origins.total();
        let log_interval = (total / 100).max(1);
        let size = (opt.patch_size(), opt.patch_size());

        for pos in origins {
            if self.is_cancelled() {
                log::warn!("切片 `{base}` 在 {pos:?} 处被取消");
                return Err(TileError::Cancelled);
            }

            profile.visit_start();
            let tile = slide.read_rgb(pos, opt.level(), size)?;
            let keep = self.classifier.is_tissue(&tile);
            profile.visit_elapsed();

            if keep {
                profile.write_start();
                let path = output_dir.join(patch_filename(base, pos, opt.save_format()));
                tile.save_as(&path, opt.save_format())?;
                saved.push(path);
                profile.write_elapsed();
            }

            let visited = profile.get_visited();
            if visited % log_interval == 0 {
                log::log!(
                    lv,
                    "`{base}` 进度: {visited}/{total} ({:.2}%), 已保存 {}",
                    visited as f64 * 100.0 / total as f64,
                    saved.len()
                );
            }
        }
        Ok(())
    }
}

/// 扫描中途失败时删除本次已写入的切块, 失败或取消的切片不留下部分产出.
fn discard_partial(base: &str, saved: &[PathBuf]) {
    if saved.is_empty() {
        return;
    }
    let mut removed = 0;
    for p in saved {
        match std::fs::remove_file(p) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("无法删除 `{}`: {e}", p.display()),
        }
    }
    log::warn!("`{base}` 未完成, 删除了 {removed}/{} 个已写入的切块", saved.len());
}

/// 先校验 `config` 再切块. 配置非法时不会打开切片.
pub fn tile<P: AsRef<Path>, Q: AsRef<Path>>(
    slide_path: P,
    output_dir: Q,
    config: &TilingConfig,
) -> TileResult<Vec<PathBuf>> {
    let options = config.validate()?;
    Ok(Tiler::new(options)
        .tile(slide_path, output_dir)?
        .patch_paths)
}
