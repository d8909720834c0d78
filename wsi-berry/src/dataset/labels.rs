//! 切片标签表.

use super::{DatasetError, DatasetResult};
use crate::consts::{NEGATIVE_STAGE, SLIDE_EXTENSION};
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// 清单中代表 "标签未知" 的值.
pub const UNKNOWN_LABEL: i32 = -1;

/// 切片级二分类标签.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SlideLabel {
    /// 阴性, 记为 0.
    Negative,

    /// 阳性 (任何非 `negative` 的分期), 记为 1.
    Positive,
}

impl SlideLabel {
    /// 由标签表 `stage` 列求标签. 只有字面量 `negative` 是阴性.
    #[inline]
    pub fn from_stage(stage: &str) -> Self {
        if stage == NEGATIVE_STAGE {
            Self::Negative
        } else {
            Self::Positive
        }
    }

    /// 清单中的整数值.
    #[inline]
    pub const fn value(&self) -> i32 {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }
}

/// 清单中的整数标签; `None` 为 [`UNKNOWN_LABEL`].
#[inline]
pub fn label_value(label: Option<SlideLabel>) -> i32 {
    label.map_or(UNKNOWN_LABEL, |l| l.value())
}

/// 标签表中的一行. 其它列被忽略.
#[derive(Debug, Deserialize)]
struct StageRow {
    patient: String,
    stage: String,
}

/// 切片文件名 -> 标签.
///
/// 只收录文件名以 `.tif` 结尾的行; 同名行以最后一行为准.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlideLabelMap {
    labels: HashMap<String, SlideLabel>,
}

impl SlideLabelMap {
    /// 从 CSV 读取. 表头至少包含 `patient` 与 `stage`.
    pub fn from_reader<R: io::Read>(reader: R) -> DatasetResult<Self> {
        let suffix = format!(".{SLIDE_EXTENSION}");
        csv::Reader::from_reader(reader)
            .deserialize::<StageRow>()
            .filter_map(|row| match row {
                Ok(StageRow { patient, stage }) if patient.ends_with(&suffix) => {
                    Some(Ok((patient, SlideLabel::from_stage(&stage))))
                }
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            })
            .collect()
    }

    /// 从 CSV 文件读取.
    pub fn from_path<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(DatasetError::io(path))?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// 标签表可选: 文件不存在时返回 `Ok(None)`, 所有切片标签将视为未知.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> DatasetResult<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            log::warn!("标签表 `{}` 不存在, 所有标签记为 {UNKNOWN_LABEL}", path.display());
            return Ok(None);
        }
        let map = Self::from_path(path)?;
        log::info!("从 `{}` 载入了 {} 个切片标签", path.display(), map.len());
        Ok(Some(map))
    }

    /// 查询切片文件名 (如 `patient_000_node_0.tif`) 的标签.
    #[inline]
    pub fn get(&self, filename: &str) -> Option<SlideLabel> {
        self.labels.get(filename).copied()
    }

    /// 标签个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, SlideLabel)> for SlideLabelMap {
    fn from_iter<I: IntoIterator<Item = (S, SlideLabel)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
