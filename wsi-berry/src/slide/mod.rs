//! 切片访问.
//!
//! [`Slide`] 只描述 "如何从切片中读出一块区域", 不关心底层格式.
//! 切片句柄在 `Drop` 时释放, 因此持有 `Box<dyn Slide>` 的作用域结束即关闭文件,
//! 无论该作用域是正常返回还是经由 `?` 提前退出.

mod raster;

#[cfg(feature = "openslide")]
mod openslide;

use crate::{Pos2d, Size2d};
use image::{RgbImage, RgbaImage};
use std::path::{Path, PathBuf};

pub use raster::{RasterSlide, RASTER_MAX_ALLOC};

#[cfg(feature = "openslide")]
pub use self::openslide::OpenSlideBackend;

/// 切片访问错误.
#[derive(Debug, thiserror::Error)]
pub enum SlideError {
    /// 切片文件不存在, 不可读或已损坏.
    #[error("无法打开切片 `{path}`: {reason}")]
    Open {
        /// 切片路径.
        path: PathBuf,
        /// 底层原因.
        reason: String,
    },

    /// 请求的金字塔层级不存在.
    #[error("层级 {level} 越界 (共 {count} 层)")]
    LevelOutOfRange {
        /// 请求的层级.
        level: u32,
        /// 实际层数.
        count: u32,
    },

    /// 切片解码后超出栅格后端的内存上限.
    #[error("切片 `{path}` 解码需要 {needed} 字节, 超出栅格后端上限 {limit} 字节; 金字塔切片请启用 `openslide` feature")]
    TooLarge {
        /// 切片路径.
        path: PathBuf,
        /// 解码 level 0 所需字节数.
        needed: u64,
        /// 上限.
        limit: u64,
    },

    /// 读取区域失败.
    #[error("读取区域失败: {0}")]
    Region(String),
}

/// 切片访问结果.
pub type SlideResult<T> = Result<T, SlideError>;

/// 金字塔切片的共用属性和区域读取操作.
pub trait Slide {
    /// level 0 尺寸 `(width, height)`.
    fn dimensions(&self) -> Size2d;

    /// 金字塔层数. 至少为 1.
    fn level_count(&self) -> u32;

    /// 给定层级的尺寸. 层级越界时返回 `None`.
    fn level_dimensions(&self, level: u32) -> Option<Size2d>;

    /// 每一层相对 level 0 的下采样倍数. `level_downsamples()[0]` 总是 1.0.
    fn level_downsamples(&self) -> Vec<f64>;

    /// 读取一块 RGBA 区域.
    ///
    /// `pos` 为 level 0 坐标系下的左上角, `size` 为 `level` 层上的像素尺寸.
    /// 超出切片范围的像素为全透明黑色 `[0, 0, 0, 0]`.
    fn read_region(&self, pos: Pos2d, level: u32, size: Size2d) -> SlideResult<RgbaImage>;

    /// level 0 宽度.
    #[inline]
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    /// level 0 高度.
    #[inline]
    fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// 所有层级的尺寸, 按层级升序.
    fn all_level_dimensions(&self) -> Vec<Size2d> {
        (0..self.level_count())
            .filter_map(|l| self.level_dimensions(l))
            .collect()
    }

    /// 检查层级是否合法.
    #[inline]
    fn check_level(&self, level: u32) -> SlideResult<()> {
        let count = self.level_count();
        if level < count {
            Ok(())
        } else {
            Err(SlideError::LevelOutOfRange { level, count })
        }
    }

    /// 读取一块区域并丢弃 alpha 通道.
    fn read_rgb(&self, pos: Pos2d, level: u32, size: Size2d) -> SlideResult<RgbImage> {
        let rgba = self.read_region(pos, level, size)?;
        Ok(drop_alpha(&rgba))
    }
}

/// 丢弃 alpha 通道, 保留原 RGB 值.
pub fn drop_alpha(rgba: &RgbaImage) -> RgbImage {
    let (w, h) = rgba.dimensions();
    let raw: Vec<u8> = rgba
        .as_raw()
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    // 长度恒为 w * h * 3.
    RgbImage::from_raw(w, h, raw).unwrap_or_else(|| RgbImage::new(w, h))
}

/// 按当前启用的后端打开切片.
///
/// 启用 `openslide` feature 时优先使用 OpenSlide; OpenSlide 不识别的文件
/// (例如普通 PNG) 再交给 [`RasterSlide`]. 未启用时只有 [`RasterSlide`],
/// 它会把整个 level 0 解码进内存, 因此受 [`RASTER_MAX_ALLOC`] 限制.
pub fn open<P: AsRef<Path>>(path: P) -> SlideResult<Box<dyn Slide>> {
    let path = path.as_ref();
    cfg_if::cfg_if! {
        if #[cfg(feature = "openslide")] {
            match OpenSlideBackend::open(path) {
                Ok(s) => Ok(Box::new(s)),
                Err(e) => {
                    log::debug!("OpenSlide 无法打开 `{}` ({e}), 改用栅格后端", path.display());
                    Ok(Box::new(RasterSlide::open(path)?))
                }
            }
        } else {
            Ok(Box::new(RasterSlide::open(path)?))
        }
    }
}

/// 当前构建可用的切片后端名.
pub const fn backend_name() -> &'static str {
    if cfg!(feature = "openslide") {
        "openslide+raster"
    } else {
        "raster"
    }
}
