//! MIL 数据集清单.

use super::labels::{label_value, SlideLabelMap};
use super::{DatasetError, DatasetResult};
use crate::consts::SLIDE_EXTENSION;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// 清单中的一个切片 (一个 "包").
///
/// 不变量: `num_patches == patch_paths.len()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// 切片名, 即切块子目录名.
    pub slide_name: String,

    /// 切片文件名 `{slide_name}.tif`.
    pub filename: String,

    /// `0` 阴性, `1` 阳性, `-1` 未知.
    pub label: i32,

    /// 切块个数.
    pub num_patches: usize,

    /// 切块路径, 保持切块时的顺序.
    pub patch_paths: Vec<String>,
}

impl DatasetRecord {
    fn new(slide_name: String, label: i32, patch_paths: Vec<String>) -> Self {
        Self {
            filename: format!("{slide_name}.{SLIDE_EXTENSION}"),
            slide_name,
            label,
            num_patches: patch_paths.len(),
            patch_paths,
        }
    }
}

/// 按切片子目录对切块路径分组.
///
/// 组的顺序为各切片第一次出现的顺序, 组内保持输入顺序.
/// 路径不在 `root` 下, 或者 `root` 下没有子目录层级时返回错误.
pub fn group_by_slide<P, I>(root: &Path, paths: I) -> DatasetResult<Vec<(String, Vec<PathBuf>)>>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = P>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<PathBuf>)> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let rel = path
            .strip_prefix(root)
            .map_err(|_| DatasetError::PatchOutsideRoot {
                path: path.to_owned(),
                root: root.to_owned(),
            })?;

        let mut comps = rel.components();
        let slide = match (comps.next(), comps.next()) {
            (Some(Component::Normal(slide)), Some(_)) => slide.to_string_lossy().into_owned(),
            _ => return Err(DatasetError::MalformedPatchPath(path.to_owned())),
        };

        let i = *index.entry(slide).or_insert_with_key(|k| {
            groups.push((k.clone(), vec![]));
            groups.len() - 1
        });
        groups[i].1.push(path.to_owned());
    }
    Ok(groups)
}

/// 数据集清单. 序列化为 JSON 数组, 每个元素对应一个至少有一个切块的切片.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    records: Vec<DatasetRecord>,
}

impl Manifest {
    /// 由切块路径构建. `labels` 为 `None` 时所有标签未知.
    pub fn from_patch_paths<P, I>(
        root: &Path,
        paths: I,
        labels: Option<&SlideLabelMap>,
    ) -> DatasetResult<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        let records = group_by_slide(root, paths)?
            .into_iter()
            .map(|(slide, paths)| {
                let filename = format!("{slide}.{SLIDE_EXTENSION}");
                let label = label_value(labels.and_then(|m| m.get(&filename)));
                let paths = paths
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect();
                DatasetRecord::new(slide, label, paths)
            })
            .collect();
        Ok(Self { records })
    }

    /// 所有记录.
    #[inline]
    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    /// 记录个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 所有切片的切块总数.
    pub fn total_patches(&self) -> usize {
        self.records.iter().map(|r| r.num_patches).sum()
    }

    /// 2 空格缩进的 JSON.
    pub fn to_json_string(&self) -> DatasetResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 写入 `path`. 父目录必须已存在.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> DatasetResult<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        let mut file = std::fs::File::create(path).map_err(DatasetError::io(path))?;
        file.write_all(json.as_bytes())
            .map_err(DatasetError::io(path))?;
        Ok(())
    }

    /// 从 `path` 读取.
    pub fn read_json<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(DatasetError::io(path))?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{SlideLabel, UNKNOWN_LABEL};

    fn paths(root: &Path, rel: &[&str]) -> Vec<PathBuf> {
        rel.iter().map(|r| root.join(r)).collect()
    }

    #[test]
    fn test_group_first_seen_order() {
        let root = Path::new("/data/patches");
        let input = paths(
            root,
            &["b/b_x0_y0.npy", "a/a_x0_y0.npy", "b/b_x256_y0.npy", "a/a_x0_y256.npy"],
        );
        let groups = group_by_slide(root, &input).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b");
        assert_eq!(groups[0].1, vec![input[0].clone(), input[2].clone()]);
        assert_eq!(groups[1].0, "a");
        assert_eq!(groups[1].1, vec![input[1].clone(), input[3].clone()]);
    }

    #[test]
    fn test_group_bad_paths() {
        let root = Path::new("/data/patches");
        let err = group_by_slide(root, ["/elsewhere/a/a_x0_y0.npy"]).unwrap_err();
        assert!(matches!(err, DatasetError::PatchOutsideRoot { .. }));

        let err = group_by_slide(root, ["/data/patches/a_x0_y0.npy"]).unwrap_err();
        assert!(matches!(err, DatasetError::MalformedPatchPath(_)));
    }

    #[test]
    fn test_labels_and_fallback() {
        let root = Path::new("/p");
        let input = paths(root, &["neg/neg_x0_y0.npy", "pos/pos_x0_y0.npy", "x/x_x0_y0.npy"]);
        let labels: SlideLabelMap = [
            ("neg.tif", SlideLabel::Negative),
            ("pos.tif", SlideLabel::Positive),
        ]
        .into_iter()
        .collect();

        let m = Manifest::from_patch_paths(root, &input, Some(&labels)).unwrap();
        let got: Vec<_> = m.records().iter().map(|r| r.label).collect();
        assert_eq!(got, [0, 1, UNKNOWN_LABEL]);
        assert_eq!(m.records()[0].filename, "neg.tif");

        let m = Manifest::from_patch_paths(root, &input, None).unwrap();
        assert!(m.records().iter().all(|r| r.label == UNKNOWN_LABEL));
    }

    #[test]
    fn test_empty_input() {
        let m = Manifest::from_patch_paths(Path::new("/p"), Vec::<PathBuf>::new(), None).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.to_json_string().unwrap(), "[]");
    }

    #[test]
    fn test_json_layout_and_file_round_trip() {
        let root = Path::new("/p");
        let input = paths(root, &["s/s_x0_y0.png", "s/s_x0_y256.png"]);
        let m = Manifest::from_patch_paths(root, &input, None).unwrap();
        assert_eq!(m.total_patches(), 2);

        let json = m.to_json_string().unwrap();
        assert!(json.starts_with("[\n  {\n    \"slide_name\": \"s\","));
        assert!(json.contains("\"num_patches\": 2"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mil_dataset.json");
        m.write_json(&path).unwrap();
        let back = Manifest::read_json(&path).unwrap();
        assert_eq!(back, m);
        let r = &back.records()[0];
        assert_eq!(r.num_patches, r.patch_paths.len());
    }

    #[test]
    fn test_write_json_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::default()
            .write_json(dir.path().join("no").join("such").join("m.json"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
