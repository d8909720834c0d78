//! 切片目录加载器.
//!
//! 提供迭代器风格的切片枚举模式.

use super::{DatasetError, DatasetResult};
use crate::consts::SLIDE_EXTENSION;
use crate::tiling::slide_base_name;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// 一张待处理的切片.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideEntry {
    /// 去掉扩展名的切片名, 同时也是切块子目录名.
    pub name: String,

    /// 切片文件名, 用于查询标签表.
    pub filename: String,

    /// 切片完整路径.
    pub path: PathBuf,
}

impl SlideEntry {
    /// 由切片路径构建.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_owned();
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name: slide_base_name(&path),
            filename,
            path,
        }
    }
}

/// 列出 `dir` 下所有 `.tif` 切片 (不递归), 按文件名排序.
///
/// `dir` 不存在或不可读时返回 `Err`.
pub fn slide_loader<P: AsRef<Path>>(dir: P) -> DatasetResult<SlideLoader> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(DatasetError::io(dir))? {
        let path = entry.map_err(DatasetError::io(dir))?.path();
        if path.is_file() && path.extension() == Some(OsStr::new(SLIDE_EXTENSION)) {
            paths.push(path);
        }
    }
    paths.sort();
    paths.reverse();

    Ok(SlideLoader { paths_rev: paths })
}

/// 切片加载器. 只负责枚举, 不打开切片.
#[derive(Debug)]
pub struct SlideLoader {
    paths_rev: Vec<PathBuf>,
}

impl Iterator for SlideLoader {
    type Item = SlideEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths_rev.pop()?;
        Some(SlideEntry::from_path(path))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.paths_rev.len(), Some(self.paths_rev.len()))
    }
}

impl ExactSizeIterator for SlideLoader {
    #[inline]
    fn len(&self) -> usize {
        self.paths_rev.len()
    }
}
