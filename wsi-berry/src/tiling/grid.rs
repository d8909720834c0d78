use crate::{Pos2d, Size2d};

/// 一条轴上能完整放下的切块个数: `(dim - patch) / stride + 1`, 放不下时为 0.
#[inline]
pub fn grid_len(dim: u32, patch: u32, stride: u32) -> u32 {
    if dim < patch || stride == 0 {
        0
    } else {
        (dim - patch) / stride + 1
    }
}

/// 行优先切块左上角迭代器.
///
/// 产生 `{(x, y) : x = k·stride, x + patch <= width; y = j·stride, y + patch <= height}`,
/// 先固定 `y` 扫描整行 `x`. 越界的边缘块直接丢弃, 不做填充.
#[derive(Debug, Clone)]
pub struct GridIter {
    cur_row: u32,
    cur_col: u32,
    rows: u32,
    cols: u32,
    stride: u32,
}

impl GridIter {
    /// 在 `(width, height)` 上以 `patch` 边长和 `stride` 步长构建网格.
    pub fn new((width, height): Size2d, patch: u32, stride: u32) -> Self {
        Self {
            cur_row: 0,
            cur_col: 0,
            rows: grid_len(height, patch, stride),
            cols: grid_len(width, patch, stride),
            stride,
        }
    }

    /// 网格形状 `(cols, rows)`.
    #[inline]
    pub fn shape(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    /// 候选块总数.
    #[inline]
    pub fn total(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }
}

impl Iterator for GridIter {
    type Item = Pos2d;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rows == 0 || self.cols == 0 || self.cur_row == self.rows {
            return None;
        }
        let ret = (self.cur_col * self.stride, self.cur_row * self.stride);
        if self.cur_col + 1 == self.cols {
            self.cur_col = 0;
            self.cur_row += 1;
        } else {
            self.cur_col += 1;
        }
        Some(ret)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let done = self.cur_row as u64 * self.cols as u64 + self.cur_col as u64;
        let left = (self.total() - done.min(self.total())) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for GridIter {}

#[cfg(test)]
mod completeness_tests {
    use super::*;
    use std::collections::HashSet;

    /// 按定义直接枚举.
    fn grid_builtin((w, h): Size2d, p: u32, s: u32) -> Vec<Pos2d> {
        let mut v = vec![];
        let mut y = 0;
        while y + p <= h {
            let mut x = 0;
            while x + p <= w {
                v.push((x, y));
                x += s;
            }
            y += s;
        }
        v
    }

    #[test]
    fn test_grid_len() {
        assert_eq!(grid_len(600, 256, 256), 2);
        assert_eq!(grid_len(512, 256, 256), 2);
        assert_eq!(grid_len(255, 256, 256), 0);
        assert_eq!(grid_len(256, 256, 256), 1);
        assert_eq!(grid_len(600, 256, 128), 3);
    }

    #[test]
    fn test_scenario_600() {
        let v: Vec<_> = GridIter::new((600, 600), 256, 256).collect();
        assert_eq!(v, vec![(0, 0), (256, 0), (0, 256), (256, 256)]);
    }

    #[test]
    fn test_grid_matches_definition() {
        for w in [0, 1, 7, 8, 9, 16, 33] {
            for h in [0, 5, 8, 17] {
                for p in [1, 4, 8] {
                    for s in [1, 3, 4, 8] {
                        let it = GridIter::new((w, h), p, s);
                        assert_eq!(it.len() as u64, it.total());
                        let got: Vec<_> = it.collect();
                        assert_eq!(got, grid_builtin((w, h), p, s), "{w}x{h} p={p} s={s}");
                        assert!(got.iter().all(|&(x, y)| x + p <= w && y + p <= h));
                    }
                }
            }
        }
    }

    #[test]
    fn test_default_stride_never_overlaps() {
        let p = 8;
        let got: Vec<_> = GridIter::new((50, 30), p, p).collect();
        let mut covered = HashSet::new();
        for (x, y) in got {
            for dy in 0..p {
                for dx in 0..p {
                    assert!(covered.insert((x + dx, y + dy)));
                }
            }
        }
    }

    #[test]
    fn test_size_hint_decreases() {
        let mut it = GridIter::new((600, 600), 256, 256);
        assert_eq!(it.len(), 4);
        it.next();
        assert_eq!(it.len(), 3);
        it.by_ref().for_each(drop);
        assert_eq!(it.len(), 0);
    }
}
