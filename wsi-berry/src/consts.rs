//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色. 二值图中代表背景.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色. 二值图中代表前景 (组织).
    pub const WHITE: u8 = 0b_1111_1111;

    /// 二值图像素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        matches!(p, WHITE)
    }
}

/// 切片文件扩展名 (不含 `.`).
pub const SLIDE_EXTENSION: &str = "tif";

/// 标签表中代表阴性样本的 `stage` 取值.
pub const NEGATIVE_STAGE: &str = "negative";

/// 数据集清单默认文件名.
pub const MANIFEST_FILENAME: &str = "mil_dataset.json";

/// 数据根目录下切片所在的子目录名.
pub const IMAGES_DIR_NAME: &str = "images";

/// 数据根目录下切块输出的子目录名.
pub const PATCHES_DIR_NAME: &str = "patches";

/// 数据根目录下标签表文件名.
pub const LABEL_TABLE_FILENAME: &str = "stages.csv";

/// 默认切块边长.
pub const DEFAULT_PATCH_SIZE: u32 = 256;

/// 默认组织占比阈值.
pub const DEFAULT_TISSUE_THRESHOLD: f64 = 0.01;

/// 灰度直方图的桶数.
pub const HIST_BINS: usize = 256;
