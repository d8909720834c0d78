//! 基于 `image` 的栅格切片后端.

use super::{Slide, SlideError, SlideResult};
use crate::{Pos2d, Size2d};
use image::imageops::{self, FilterType};
use image::io::{Limits, Reader};
use image::{GenericImage, RgbaImage};
use std::path::Path;

/// 栅格后端解码一张切片允许分配的最大内存 (字节), 与 `image` 的默认上限一致.
///
/// 栅格后端把整个 level 0 以 RGBA 保存在内存中, 只适合不超过约 11k x 11k 的图像.
pub const RASTER_MAX_ALLOC: u64 = 512 * 1024 * 1024;

/// 合成金字塔时, 一层的短边不小于该值才会被保留.
const MIN_LEVEL_SIDE: u32 = 256;

/// 将一张普通栅格图像 (PNG, 平铺 TIFF 等) 视为切片.
///
/// 只在内存中保存 level 0; 更高层级按 2 的幂下采样, 读取时现场合成.
#[derive(Debug, Clone)]
pub struct RasterSlide {
    base: RgbaImage,
    levels: u32,
}

impl RasterSlide {
    /// 从磁盘打开栅格图像. 文件不存在或无法解码时返回 [`SlideError::Open`],
    /// 解码所需内存超过 [`RASTER_MAX_ALLOC`] 时返回 [`SlideError::TooLarge`].
    #[inline]
    pub fn open<P: AsRef<Path>>(path: P) -> SlideResult<Self> {
        Self::open_with_limit(path, RASTER_MAX_ALLOC)
    }

    /// 同 [`RasterSlide::open`], 但使用自定义的解码内存上限 (字节).
    pub fn open_with_limit<P: AsRef<Path>>(path: P, max_alloc: u64) -> SlideResult<Self> {
        let path = path.as_ref();
        let open_err = |reason: String| SlideError::Open {
            path: path.to_owned(),
            reason,
        };

        // 只读文件头, 在分配像素内存之前拒绝过大的图像.
        let (w, h) = image::image_dimensions(path).map_err(|e| open_err(e.to_string()))?;
        let needed = w as u64 * h as u64 * 4;
        if needed > max_alloc {
            return Err(SlideError::TooLarge {
                path: path.to_owned(),
                needed,
                limit: max_alloc,
            });
        }

        let mut limits = Limits::default();
        limits.max_alloc = Some(max_alloc);
        let mut reader = Reader::open(path)
            .and_then(Reader::with_guessed_format)
            .map_err(|e| open_err(e.to_string()))?;
        reader.limits(limits);
        let img = reader.decode().map_err(|e| open_err(e.to_string()))?;
        Ok(Self::from_image(img.to_rgba8()))
    }

    /// 从内存图像构建. 层数按 [`MIN_LEVEL_SIDE`] 自动决定.
    pub fn from_image(base: RgbaImage) -> Self {
        let short = base.width().min(base.height());
        let mut levels = 1;
        while levels < 32 && (short >> levels) >= MIN_LEVEL_SIDE {
            levels += 1;
        }
        Self { base, levels }
    }

    /// 从内存图像构建, 并指定层数 (至少为 1).
    pub fn with_levels(base: RgbaImage, levels: u32) -> Self {
        Self {
            base,
            levels: levels.clamp(1, 32),
        }
    }

    /// level `level` 相对 level 0 的下采样倍数.
    #[inline]
    fn downsample(level: u32) -> u32 {
        1 << level
    }

    /// 在 level 0 上截取 `size` 大小的区域. 越界部分保持全透明黑色.
    fn crop_padded(&self, (x, y): Pos2d, (sw, sh): Size2d) -> SlideResult<RgbaImage> {
        let mut canvas = RgbaImage::new(sw, sh);
        let (w, h) = self.base.dimensions();
        if x < w && y < h {
            let cw = sw.min(w - x);
            let ch = sh.min(h - y);
            let sub = imageops::crop_imm(&self.base, x, y, cw, ch).to_image();
            canvas
                .copy_from(&sub, 0, 0)
                .map_err(|e| SlideError::Region(e.to_string()))?;
        }
        Ok(canvas)
    }
}

impl Slide for RasterSlide {
    #[inline]
    fn dimensions(&self) -> Size2d {
        self.base.dimensions()
    }

    #[inline]
    fn level_count(&self) -> u32 {
        self.levels
    }

    fn level_dimensions(&self, level: u32) -> Option<Size2d> {
        if level >= self.levels {
            return None;
        }
        let (w, h) = self.base.dimensions();
        Some(((w >> level).max(1), (h >> level).max(1)))
    }

    fn level_downsamples(&self) -> Vec<f64> {
        (0..self.levels)
            .map(|l| Self::downsample(l) as f64)
            .collect()
    }

    fn read_region(&self, pos: Pos2d, level: u32, (w, h): Size2d) -> SlideResult<RgbaImage> {
        self.check_level(level)?;
        if level == 0 {
            return self.crop_padded(pos, (w, h));
        }
        let ds = Self::downsample(level);
        let src = self.crop_padded(pos, (w.saturating_mul(ds), h.saturating_mul(ds)))?;
        Ok(imageops::resize(&src, w, h, FilterType::Triangle))
    }
}
