//! 对 `wsi-berry::dataset` 的更一层封装. 提供数据目录定位.

use std::env;
use std::path::{Path, PathBuf};
use wsi_berry::dataset::{self, PrepConfig};

/// 数据根目录的环境变量名.
pub const DATA_DIR_ENV: &str = "WSI_DATA_DIR";

/// 获取数据根目录.
///
/// 1. 若环境变量 `$WSI_DATA_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/camelyon17`;
/// 3. 无法确定主目录时返回 `None`.
pub fn data_root_from_env_or_home() -> Option<PathBuf> {
    match env::var(DATA_DIR_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["camelyon17"]),
    }
}

/// 以 `root` 为数据根目录的默认配置.
#[inline]
pub fn prep_config<P: AsRef<Path>>(root: P) -> PrepConfig {
    PrepConfig::from_data_root(root)
}
