//! 切块参数及其校验.

use crate::consts::{DEFAULT_PATCH_SIZE, DEFAULT_TISSUE_THRESHOLD};
use crate::tissue::{ThresholdMethod, TissueClassifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 配置错误. 总是在扫描开始之前一次性报告.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// 不支持的阈值算法.
    #[error("不支持的组织阈值算法 `{0}`, 可选: otsu, triangle")]
    UnsupportedMethod(String),

    /// 不支持的存储格式.
    #[error("不支持的存储格式 `{0}`, 可选: npy, png")]
    UnsupportedFormat(String),

    /// 切块边长为 0.
    #[error("切块边长必须大于 0")]
    ZeroPatchSize,

    /// 步长为 0.
    #[error("步长必须大于 0")]
    ZeroStride,

    /// 组织占比阈值不在 `[0, 1]` 内.
    #[error("组织占比阈值 {0} 不在 [0, 1] 内")]
    ThresholdOutOfRange(f64),
}

/// 切块存储格式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum SaveFormat {
    /// NumPy `.npy` 数组, 形状 `(h, w, 3)`, 元素 `u8`.
    #[default]
    Npy,

    /// 无损 PNG (RGB).
    Png,
}

impl SaveFormat {
    /// 文件扩展名 (不含 `.`).
    #[inline]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Npy => "npy",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for SaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SaveFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npy" => Ok(Self::Npy),
            "png" => Ok(Self::Png),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// 未经校验的切块配置. 字段与命令行/配置文件一一对应.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// 切块边长.
    pub patch_size: u32,

    /// 步长. `None` 时等于 `patch_size`, 即互不重叠.
    pub stride: Option<u32>,

    /// 读取的金字塔层级.
    pub level: u32,

    /// 阈值算法名.
    pub tissue_method: String,

    /// 最低组织占比.
    pub tissue_threshold: f64,

    /// 存储格式名.
    pub save_format: String,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            patch_size: DEFAULT_PATCH_SIZE,
            stride: None,
            level: 0,
            tissue_method: ThresholdMethod::default().name().to_string(),
            tissue_threshold: DEFAULT_TISSUE_THRESHOLD,
            save_format: SaveFormat::default().extension().to_string(),
        }
    }
}

impl TilingConfig {
    /// 校验并转换为 [`TilingOptions`].
    pub fn validate(&self) -> Result<TilingOptions, ConfigError> {
        TilingOptions::new(
            self.patch_size,
            self.stride,
            self.level,
            self.tissue_method.parse()?,
            self.tissue_threshold,
            self.save_format.parse()?,
        )
    }
}

/// 已校验的切块参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TilingOptions {
    patch_size: u32,
    stride: u32,
    level: u32,
    method: ThresholdMethod,
    tissue_threshold: f64,
    save_format: SaveFormat,
}

impl TilingOptions {
    /// 构建参数. `stride` 为 `None` 时等于 `patch_size`.
    pub fn new(
        patch_size: u32,
        stride: Option<u32>,
        level: u32,
        method: ThresholdMethod,
        tissue_threshold: f64,
        save_format: SaveFormat,
    ) -> Result<Self, ConfigError> {
        if patch_size == 0 {
            return Err(ConfigError::ZeroPatchSize);
        }
        let stride = stride.unwrap_or(patch_size);
        if stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        if !(0.0..=1.0).contains(&tissue_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(tissue_threshold));
        }
        Ok(Self {
            patch_size,
            stride,
            level,
            method,
            tissue_threshold,
            save_format,
        })
    }

    /// 切块边长.
    #[inline]
    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }

    /// 步长.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// 金字塔层级.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// 阈值算法.
    #[inline]
    pub fn method(&self) -> ThresholdMethod {
        self.method
    }

    /// 最低组织占比.
    #[inline]
    pub fn tissue_threshold(&self) -> f64 {
        self.tissue_threshold
    }

    /// 存储格式.
    #[inline]
    pub fn save_format(&self) -> SaveFormat {
        self.save_format
    }

    /// 对应的组织分类器.
    #[inline]
    pub fn classifier(&self) -> TissueClassifier {
        TissueClassifier::new(self.method, self.tissue_threshold)
    }
}

impl Default for TilingOptions {
    fn default() -> Self {
        Self {
            patch_size: DEFAULT_PATCH_SIZE,
            stride: DEFAULT_PATCH_SIZE,
            level: 0,
            method: ThresholdMethod::default(),
            tissue_threshold: DEFAULT_TISSUE_THRESHOLD,
            save_format: SaveFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let opt = TilingConfig::default().validate().unwrap();
        assert_eq!(opt, TilingOptions::default());
        assert_eq!(opt.stride(), opt.patch_size());
    }

    #[test]
    fn test_stride_defaults_to_patch_size() {
        let cfg = TilingConfig {
            patch_size: 224,
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap().stride(), 224);

        let cfg = TilingConfig {
            patch_size: 224,
            stride: Some(112),
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap().stride(), 112);
    }

    #[test]
    fn test_invalid_config() {
        let bad = |f: fn(&mut TilingConfig)| {
            let mut cfg = TilingConfig::default();
            f(&mut cfg);
            cfg.validate().unwrap_err()
        };
        assert_eq!(
            bad(|c| c.save_format = "bmp".into()),
            ConfigError::UnsupportedFormat("bmp".into())
        );
        assert_eq!(
            bad(|c| c.tissue_method = "li".into()),
            ConfigError::UnsupportedMethod("li".into())
        );
        assert_eq!(bad(|c| c.patch_size = 0), ConfigError::ZeroPatchSize);
        assert_eq!(bad(|c| c.stride = Some(0)), ConfigError::ZeroStride);
        assert_eq!(
            bad(|c| c.tissue_threshold = 1.5),
            ConfigError::ThresholdOutOfRange(1.5)
        );
        assert!(matches!(
            bad(|c| c.tissue_threshold = f64::NAN),
            ConfigError::ThresholdOutOfRange(_)
        ));
    }

    #[test]
    fn test_config_from_json() {
        let cfg: TilingConfig =
            serde_json::from_str(r#"{"patch_size": 512, "save_format": "png"}"#).unwrap();
        let opt = cfg.validate().unwrap();
        assert_eq!(opt.patch_size(), 512);
        assert_eq!(opt.stride(), 512);
        assert_eq!(opt.save_format(), SaveFormat::Png);
        assert_eq!(opt.method(), ThresholdMethod::Otsu);
    }
}
