//! 基于 OpenSlide 的金字塔切片后端.

use super::{Slide, SlideError, SlideResult};
use crate::{Pos2d, Size2d};
use image::RgbaImage;
use openslide_rs::traits::Slide as _;
use openslide_rs::{Address, OpenSlide, Region, Size};
use std::path::Path;

/// OpenSlide 切片句柄. 在 `Drop` 时由 `openslide-rs` 关闭底层文件.
pub struct OpenSlideBackend {
    inner: OpenSlide,
    dims: Vec<Size2d>,
    downsamples: Vec<f64>,
}

impl OpenSlideBackend {
    /// 打开切片并缓存各层尺寸与下采样倍数.
    pub fn open<P: AsRef<Path>>(path: P) -> SlideResult<Self> {
        let path = path.as_ref();
        let open_err = |reason: String| SlideError::Open {
            path: path.to_owned(),
            reason,
        };

        let inner = OpenSlide::new(path).map_err(|e| open_err(e.to_string()))?;
        let count = inner.get_level_count().map_err(|e| open_err(e.to_string()))?;
        let mut dims = Vec::with_capacity(count as usize);
        for level in 0..count {
            let Size { w, h } = inner
                .get_level_dimensions(level)
                .map_err(|e| open_err(e.to_string()))?;
            dims.push((w, h));
        }
        let downsamples = inner
            .get_all_level_downsample()
            .map_err(|e| open_err(e.to_string()))?;
        if dims.is_empty() {
            return Err(open_err("切片不含任何层级".to_string()));
        }

        Ok(Self {
            inner,
            dims,
            downsamples,
        })
    }
}

impl Slide for OpenSlideBackend {
    #[inline]
    fn dimensions(&self) -> Size2d {
        self.dims[0]
    }

    #[inline]
    fn level_count(&self) -> u32 {
        self.dims.len() as u32
    }

    #[inline]
    fn level_dimensions(&self, level: u32) -> Option<Size2d> {
        self.dims.get(level as usize).copied()
    }

    fn level_downsamples(&self) -> Vec<f64> {
        self.downsamples.clone()
    }

    fn read_region(&self, (x, y): Pos2d, level: u32, (w, h): Size2d) -> SlideResult<RgbaImage> {
        self.check_level(level)?;
        let buf = self
            .inner
            .read_region(&Region {
                address: Address { x, y },
                level,
                size: Size { w, h },
            })
            .map_err(|e| SlideError::Region(e.to_string()))?;
        RgbaImage::from_raw(w, h, buf)
            .ok_or_else(|| SlideError::Region(format!("区域缓冲区大小与 {w}x{h} 不符")))
    }
}
