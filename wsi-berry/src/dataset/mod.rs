//! 数据集操作.
//!
//! 目录约定 (`{root}` 为数据根目录):
//!
//! ```text
//! {root}/images/*.tif              切片
//! {root}/stages.csv                标签表 (可选)
//! {root}/patches/{slide}/*.npy     切块
//! {root}/mil_dataset.json          数据集清单
//! ```

use crate::tiling::ConfigError;
use std::io;
use std::path::{Path, PathBuf};

mod labels;
mod loader;
mod manifest;
mod pipeline;

pub use labels::{label_value, SlideLabel, SlideLabelMap, UNKNOWN_LABEL};
pub use loader::{slide_loader, SlideEntry, SlideLoader};
pub use manifest::{group_by_slide, DatasetRecord, Manifest};
pub use pipeline::{run, run_with_cancel, PrepConfig, PrepReport, SlideOutcome, SlideStatus};

/// 数据集构建错误. 出现即终止整个运行.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// 切块配置非法.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 标签表格式错误.
    #[error("标签表解析失败: {0}")]
    LabelTable(#[from] csv::Error),

    /// 文件系统错误.
    #[error("`{path}`: {source}")]
    Io {
        /// 出错的路径.
        path: PathBuf,
        /// 底层错误.
        source: io::Error,
    },

    /// 清单序列化失败.
    #[error("清单序列化失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 切块路径不在切块根目录下.
    #[error("切块 `{path}` 不在根目录 `{root}` 下")]
    PatchOutsideRoot {
        /// 切块路径.
        path: PathBuf,
        /// 切块根目录.
        root: PathBuf,
    },

    /// 切块路径缺少切片子目录.
    #[error("切块 `{0}` 缺少切片子目录")]
    MalformedPatchPath(PathBuf),

    /// 运行被取消.
    #[error("运行被取消")]
    Cancelled,
}

/// 数据集构建结果.
pub type DatasetResult<T> = Result<T, DatasetError>;

impl DatasetError {
    /// 将 `io::Error` 与出错路径绑定.
    #[inline]
    pub(crate) fn io<P: AsRef<Path>>(path: P) -> impl FnOnce(io::Error) -> Self {
        let path = path.as_ref().to_owned();
        move |source| Self::Io { path, source }
    }
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
