//! 组织/背景二分类.
//!
//! 染色后的组织比玻片背景暗. 将灰度图取反后, 组织成为亮前景,
//! 再以自动阈值二值化, 统计二值图中前景像素占比作为组织覆盖率.

pub mod threshold;

use crate::consts::gray::{is_foreground, BLACK, WHITE};
use crate::tiling::ConfigError;
use image::{imageops, GrayImage, Luma, RgbImage};
use std::fmt;
use std::str::FromStr;
use threshold::Histogram;

/// 二值化阈值算法.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ThresholdMethod {
    /// 类间方差最大化.
    #[default]
    Otsu,

    /// 三角法, 适合单峰长尾直方图.
    Triangle,
}

impl ThresholdMethod {
    /// 配置文件/命令行中使用的名字.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Otsu => "otsu",
            Self::Triangle => "triangle",
        }
    }

    /// 在直方图上求阈值.
    #[inline]
    pub fn threshold(&self, hist: &Histogram) -> i32 {
        match self {
            Self::Otsu => threshold::otsu(hist),
            Self::Triangle => threshold::triangle(hist),
        }
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThresholdMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "otsu" => Ok(Self::Otsu),
            "triangle" => Ok(Self::Triangle),
            _ => Err(ConfigError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// BT.601 亮度, 14 位定点实现, 结果四舍五入.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    const R2Y: u32 = 4899;
    const G2Y: u32 = 9617;
    const B2Y: u32 = 1868;
    ((r as u32 * R2Y + g as u32 * G2Y + b as u32 * B2Y + (1 << 13)) >> 14) as u8
}

/// RGB 转灰度.
pub fn grayscale(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let raw = rgb
        .as_raw()
        .chunks_exact(3)
        .map(|p| luma(p[0], p[1], p[2]))
        .collect();
    GrayImage::from_raw(w, h, raw).unwrap_or_else(|| GrayImage::new(w, h))
}

/// 灰度取反: `255 - v`.
pub fn complement(gray: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    imageops::invert(&mut out);
    out
}

/// 以 `thresh` 二值化: `value > thresh` 为 [`WHITE`], 否则为 [`BLACK`].
pub fn binarize(gray: &GrayImage, thresh: i32) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        *p = if p.0[0] as i32 > thresh {
            Luma([WHITE])
        } else {
            Luma([BLACK])
        };
    }
    out
}

/// 二值图中前景像素占比. 空图像为 0.
pub fn coverage(binary: &GrayImage) -> f64 {
    let total = binary.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let fg = binary.as_raw().iter().filter(|&&p| is_foreground(p)).count();
    fg as f64 / total as f64
}

/// 一次分类的中间量.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TissueReport {
    /// 取反灰度图上的二值化阈值.
    pub threshold: i32,

    /// 二值图中前景占比, 即组织覆盖率.
    pub coverage: f64,
}

/// 组织/背景分类器.
///
/// 该结构是只读的纯函数封装: 相同的输入切块总得到相同的结果.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TissueClassifier {
    method: ThresholdMethod,
    min_coverage: f64,
}

impl TissueClassifier {
    /// 构建分类器. `min_coverage` 为判定为组织所需的最低覆盖率.
    #[inline]
    pub const fn new(method: ThresholdMethod, min_coverage: f64) -> Self {
        Self {
            method,
            min_coverage,
        }
    }

    /// 阈值算法.
    #[inline]
    pub fn method(&self) -> ThresholdMethod {
        self.method
    }

    /// 最低覆盖率.
    #[inline]
    pub fn min_coverage(&self) -> f64 {
        self.min_coverage
    }

    /// 计算阈值与覆盖率.
    pub fn assess(&self, tile: &RgbImage) -> TissueReport {
        let inverted = complement(&grayscale(tile));
        let threshold = self.method.threshold(&Histogram::from_gray(&inverted));
        let coverage = coverage(&binarize(&inverted, threshold));
        TissueReport {
            threshold,
            coverage,
        }
    }

    /// 切块是否含有足够的组织.
    #[inline]
    pub fn is_tissue(&self, tile: &RgbImage) -> bool {
        self.assess(tile).coverage >= self.min_coverage
    }
}

/// [`TissueClassifier::is_tissue`] 的函数形式.
#[inline]
pub fn is_tissue(tile: &RgbImage, method: ThresholdMethod, min_coverage: f64) -> bool {
    TissueClassifier::new(method, min_coverage).is_tissue(tile)
}
