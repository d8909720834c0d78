//! 基于 256 桶灰度直方图的自动阈值算法.
//!
//! 两个算法返回的阈值 `t` 均按 "`value > t` 为前景" 解释, 且允许落在
//! `[0, 255]` 之外 (例如三角法在极端直方图下可能返回 `-1`, 此时所有像素都是前景).

use crate::consts::HIST_BINS;
use image::GrayImage;

/// 单通道 8-bit 图像的灰度直方图.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    bins: [u64; HIST_BINS],
    total: u64,
}

impl Histogram {
    /// 统计 `img` 的直方图.
    pub fn from_gray(img: &GrayImage) -> Self {
        let mut bins = [0u64; HIST_BINS];
        for &v in img.as_raw() {
            bins[v as usize] += 1;
        }
        Self {
            bins,
            total: img.as_raw().len() as u64,
        }
    }

    /// 直接从桶计数构建.
    pub fn from_bins(bins: [u64; HIST_BINS]) -> Self {
        let total = bins.iter().sum();
        Self { bins, total }
    }

    /// 像素总数.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// 底层桶计数.
    #[inline]
    pub fn bins(&self) -> &[u64; HIST_BINS] {
        &self.bins
    }
}

/// Otsu 阈值: 取使类间方差最大的分割点. 方差相同时取最小的分割点.
///
/// 空直方图或单值直方图返回 0.
pub fn otsu(hist: &Histogram) -> i32 {
    if hist.total() == 0 {
        return 0;
    }
    let eps = f32::EPSILON as f64;
    let scale = 1.0 / hist.total() as f64;
    let mu: f64 = hist
        .bins()
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum::<f64>()
        * scale;

    let (mut mu1, mut q1) = (0.0f64, 0.0f64);
    let (mut max_sigma, mut max_val) = (0.0f64, 0i32);

    for (i, &c) in hist.bins().iter().enumerate() {
        let p_i = c as f64 * scale;
        mu1 *= q1;
        q1 += p_i;
        let q2 = 1.0 - q1;

        if q1.min(q2) < eps || q1.max(q2) > 1.0 - eps {
            continue;
        }

        mu1 = (mu1 + i as f64 * p_i) / q1;
        let mu2 = (mu - q1 * mu1) / q2;
        let sigma = q1 * q2 * (mu1 - mu2) * (mu1 - mu2);
        if sigma > max_sigma {
            max_sigma = sigma;
            max_val = i as i32;
        }
    }
    max_val
}

/// 三角法阈值.
///
/// 从直方图峰值向较长一侧拖尾的末端连线, 取直方图上离该直线最远的点,
/// 再向峰值方向回退一格. 适合 "大片背景 + 少量组织" 的单峰长尾直方图.
pub fn triangle(hist: &Histogram) -> i32 {
    const N: usize = HIST_BINS;
    if hist.total() == 0 {
        return 0;
    }
    let mut h = *hist.bins();

    let mut left = h.iter().position(|&c| c > 0).unwrap_or(0);
    if left > 0 {
        left -= 1;
    }
    let mut right = (1..N).rev().find(|&i| h[i] > 0).unwrap_or(0);
    if right < N - 1 {
        right += 1;
    }

    // 第一个最大值.
    let (mut max_ind, mut max) = (0usize, 0u64);
    for (i, &c) in h.iter().enumerate() {
        if c > max {
            max = c;
            max_ind = i;
        }
    }

    // 保证拖尾总在峰值左侧.
    let flipped = (max_ind as i64 - left as i64) < (right as i64 - max_ind as i64);
    if flipped {
        h.reverse();
        left = N - 1 - right;
        max_ind = N - 1 - max_ind;
    }

    let a = max as f64;
    let b = left as f64 - max_ind as f64;
    let mut thresh = left as i32;
    let mut dist = 0.0f64;
    for i in left + 1..=max_ind {
        let d = a * i as f64 + b * h[i] as f64;
        if d > dist {
            dist = d;
            thresh = i as i32;
        }
    }
    thresh -= 1;

    if flipped {
        (N as i32 - 1) - thresh
    } else {
        thresh
    }
}
