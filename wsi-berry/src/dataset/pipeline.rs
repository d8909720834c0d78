//! 端到端数据集构建: 枚举切片, 逐个切块, 汇总为清单.

use super::labels::SlideLabelMap;
use super::loader::{slide_loader, SlideEntry};
use super::manifest::Manifest;
use super::{DatasetError, DatasetResult};
use crate::consts::{IMAGES_DIR_NAME, LABEL_TABLE_FILENAME, MANIFEST_FILENAME, PATCHES_DIR_NAME};
use crate::tiling::{TileError, TileProfile, Tiler, TilingConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 数据集构建配置.
#[derive(Clone, Debug, PartialEq)]
pub struct PrepConfig {
    /// 切片目录, 其下的 `*.tif` 会被处理.
    pub slide_root: PathBuf,

    /// 切块根目录. 每个切片写入 `{patches_root}/{slide}/`.
    pub patches_root: PathBuf,

    /// 标签表. `None` 或文件不存在时所有标签为 `-1`.
    pub label_table: Option<PathBuf>,

    /// 清单输出路径. 父目录必须已存在.
    pub manifest_path: PathBuf,

    /// 切块参数.
    pub tiling: TilingConfig,

    /// 多个切片并行处理. 需要 `rayon` feature, 否则退化为顺序处理.
    pub parallel: bool,

    /// 以 `info` 级别输出每个切片的属性与进度.
    pub verbose: bool,
}

impl PrepConfig {
    /// 按默认目录约定, 以 `root` 为数据根目录生成配置.
    pub fn from_data_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            slide_root: root.join(IMAGES_DIR_NAME),
            patches_root: root.join(PATCHES_DIR_NAME),
            label_table: Some(root.join(LABEL_TABLE_FILENAME)),
            manifest_path: root.join(MANIFEST_FILENAME),
            tiling: TilingConfig::default(),
            parallel: false,
            verbose: false,
        }
    }
}

/// 单个切片的处理状态.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlideStatus {
    /// 处理完成. `count` 可以为 0, 此时切片不进入清单.
    Processed {
        /// 保存的切块数.
        count: usize,
    },

    /// 切片无法处理, 已跳过.
    Skipped {
        /// 原因.
        reason: String,
    },
}

/// 单个切片的处理结果.
#[derive(Clone, Debug)]
pub struct SlideOutcome {
    /// 切片名.
    pub name: String,

    /// 切片文件名.
    pub filename: String,

    /// 状态.
    pub status: SlideStatus,

    /// 保存的切块路径.
    pub patch_paths: Vec<PathBuf>,

    /// 切块统计. 被跳过的切片没有统计.
    pub profile: Option<TileProfile>,
}

impl SlideOutcome {
    /// 是否进入清单.
    #[inline]
    pub fn is_in_manifest(&self) -> bool {
        !self.patch_paths.is_empty()
    }
}

/// 一次运行的汇总.
#[derive(Clone, Debug)]
pub struct PrepReport {
    /// 按切片顺序排列的处理结果.
    pub outcomes: Vec<SlideOutcome>,

    /// 已写盘的清单.
    pub manifest: Manifest,

    /// 清单路径.
    pub manifest_path: PathBuf,
}

impl PrepReport {
    /// 成功处理且至少有一个切块的切片数.
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_in_manifest()).count()
    }

    /// 成功处理但没有任何组织块的切片数.
    pub fn empty(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == SlideStatus::Processed { count: 0 })
            .count()
    }

    /// 被跳过的切片数.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SlideStatus::Skipped { .. }))
            .count()
    }
}

/// 处理单个切片. 切片自身的错误被记录并转为 [`SlideStatus::Skipped`],
/// 只有取消会向上传播.
fn process_slide(tiler: &Tiler, entry: SlideEntry, patches_root: &Path) -> DatasetResult<SlideOutcome> {
    let SlideEntry {
        name,
        filename,
        path,
    } = entry;
    let output_dir = patches_root.join(&name);

    let (status, patch_paths, profile) = match tiler.tile(&path, &output_dir) {
        Ok(out) => {
            let count = out.patch_paths.len();
            if count == 0 {
                log::warn!("`{filename}` 没有提取到任何组织切块");
            } else {
                log::info!("`{filename}`: 保存了 {count} 个切块");
            }
            (SlideStatus::Processed { count }, out.patch_paths, Some(out.profile))
        }
        Err(TileError::Cancelled) => return Err(DatasetError::Cancelled),
        Err(TileError::Config(e)) => return Err(e.into()),
        Err(e) => {
            log::error!("跳过 `{filename}`: {e}");
            let reason = e.to_string();
            (SlideStatus::Skipped { reason }, vec![], None)
        }
    };

    Ok(SlideOutcome {
        name,
        filename,
        status,
        patch_paths,
        profile,
    })
}

fn process_seq(
    tiler: &Tiler,
    entries: Vec<SlideEntry>,
    patches_root: &Path,
) -> DatasetResult<Vec<SlideOutcome>> {
    entries
        .into_iter()
        .map(|e| process_slide(tiler, e, patches_root))
        .collect()
}

/// 并行时每个 worker 独立打开并释放自己的切片. 结果按切片顺序收集.
#[cfg(feature = "rayon")]
fn process_all(
    tiler: &Tiler,
    entries: Vec<SlideEntry>,
    patches_root: &Path,
    parallel: bool,
) -> DatasetResult<Vec<SlideOutcome>> {
    if !parallel {
        return process_seq(tiler, entries, patches_root);
    }
    entries
        .into_par_iter()
        .map(|e| process_slide(tiler, e, patches_root))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn process_all(
    tiler: &Tiler,
    entries: Vec<SlideEntry>,
    patches_root: &Path,
    parallel: bool,
) -> DatasetResult<Vec<SlideOutcome>> {
    if parallel {
        log::warn!("未启用 `rayon` feature, 按顺序处理切片");
    }
    process_seq(tiler, entries, patches_root)
}

/// 运行整个流程, 不可取消.
#[inline]
pub fn run(config: &PrepConfig) -> DatasetResult<PrepReport> {
    run_with_cancel(config, None)
}

/// 运行整个流程.
///
/// 1. 校验切块配置 (非法时立即返回, 不读取任何切片);
/// 2. 载入标签表 (可选);
/// 3. 枚举并逐个处理切片, 单个切片失败只会被跳过;
/// 4. 汇总所有切块为清单并写盘.
///
/// `cancel` 置位后, 正在处理的切片在下一个候选块前停止,
/// 整个运行返回 [`DatasetError::Cancelled`], 不写清单.
pub fn run_with_cancel(
    config: &PrepConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> DatasetResult<PrepReport> {
    let options = config.tiling.validate()?;

    let labels = match &config.label_table {
        Some(path) => SlideLabelMap::load_optional(path)?,
        None => {
            log::warn!("未指定标签表, 所有标签记为 {}", super::UNKNOWN_LABEL);
            None
        }
    };

    let entries: Vec<_> = slide_loader(&config.slide_root)?.collect();
    log::info!(
        "在 `{}` 下找到 {} 张切片",
        config.slide_root.display(),
        entries.len()
    );

    let root = &config.patches_root;
    std::fs::create_dir_all(root).map_err(DatasetError::io(root))?;

    let mut tiler = Tiler::new(options).verbose(config.verbose);
    if let Some(flag) = cancel {
        tiler = tiler.with_cancel(flag);
    }

    let outcomes = process_all(&tiler, entries, root, config.parallel)?;

    let manifest = Manifest::from_patch_paths(
        root,
        outcomes.iter().flat_map(|o| o.patch_paths.iter()),
        labels.as_ref(),
    )?;
    manifest.write_json(&config.manifest_path)?;
    log::info!(
        "清单 ({} 个切片, {} 个切块) 已保存到 `{}`",
        manifest.len(),
        manifest.total_patches(),
        config.manifest_path.display()
    );

    Ok(PrepReport {
        outcomes,
        manifest,
        manifest_path: config.manifest_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_data_root() {
        let c = PrepConfig::from_data_root("/data/c17");
        assert_eq!(c.slide_root, Path::new("/data/c17/images"));
        assert_eq!(c.patches_root, Path::new("/data/c17/patches"));
        assert_eq!(c.label_table.as_deref(), Some(Path::new("/data/c17/stages.csv")));
        assert_eq!(c.manifest_path, Path::new("/data/c17/mil_dataset.json"));
        assert!(!c.parallel);
    }

    #[test]
    fn test_bad_method_fails_before_enumeration() {
        let mut c = PrepConfig::from_data_root("/definitely/not/here");
        c.tiling.tissue_method = "kmeans".into();
        let err = run(&c).unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)));
    }

    #[test]
    fn test_missing_slide_root() {
        let dir = tempfile::tempdir().unwrap();
        let c = PrepConfig::from_data_root(dir.path());
        let err = run(&c).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_empty_slide_root_writes_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let c = PrepConfig::from_data_root(dir.path());
        std::fs::create_dir(&c.slide_root).unwrap();

        let report = run(&c).unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.manifest.is_empty());
        assert_eq!(std::fs::read_to_string(&c.manifest_path).unwrap(), "[]");
    }
}
