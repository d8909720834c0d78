//! 切块的持久化存储.

use super::{SaveFormat, TileResult};
use image::{ImageFormat, ImageResult, RgbImage};
use ndarray::Array3;
use ndarray_npy::WriteNpyError;
use std::path::Path;

/// 表明一个可以按原样持久化存储的 RGB 切块.
///
/// 两种格式都不做任何像素变换: `npy` 保存 `(h, w, 3)` 的 `u8` 数组,
/// `png` 保存无损 RGB 图像.
pub trait PatchWrite {
    /// 转换为 `(h, w, 3)` 数组.
    fn to_array(&self) -> Array3<u8>;

    /// 以 `npy` 格式保存到 `path`.
    fn save_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError>;

    /// 以 `png` 格式保存到 `path`.
    fn save_png<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;

    /// 按 `format` 保存.
    fn save_as<P: AsRef<Path>>(&self, path: P, format: SaveFormat) -> TileResult<()> {
        match format {
            SaveFormat::Npy => self.save_npy(path)?,
            SaveFormat::Png => self.save_png(path)?,
        }
        Ok(())
    }
}

impl PatchWrite for RgbImage {
    fn to_array(&self) -> Array3<u8> {
        let (w, h) = self.dimensions();
        // `RgbImage` 本身就是行优先的 HWC 布局, 形状必然匹配.
        Array3::from_shape_vec((h as usize, w as usize, 3), self.as_raw().clone())
            .unwrap_or_else(|_| Array3::zeros((h as usize, w as usize, 3)))
    }

    fn save_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
        ndarray_npy::write_npy(path, &self.to_array())
    }

    fn save_png<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.save_with_format(path, ImageFormat::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray_npy::read_npy;

    fn sample() -> RgbImage {
        RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, (x * 10 + y) as u8]))
    }

    #[test]
    fn test_to_array_layout() {
        let a = sample().to_array();
        assert_eq!(a.shape(), &[2, 3, 3]);
        // [y, x, c]
        assert_eq!(a[[1, 2, 0]], 2);
        assert_eq!(a[[1, 2, 1]], 1);
        assert_eq!(a[[1, 2, 2]], 21);
    }

    #[test]
    fn test_save_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_x0_y0.npy");
        sample().save_as(&path, SaveFormat::Npy).unwrap();
        let back: Array3<u8> = read_npy(&path).unwrap();
        assert_eq!(back, sample().to_array());
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_x0_y0.png");
        sample().save_as(&path, SaveFormat::Png).unwrap();
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back, sample());
    }
}
