#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将全视野数字病理切片 (whole-slide image, WSI) 按网格切块,
//! 过滤不含组织的背景块, 并为多示例学习 (MIL) 训练生成 JSON 数据集清单.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 金字塔切片格式本身的解码不在本 crate 内完成. 默认后端借助 `image`
//!   读取普通栅格图像并自行合成金字塔层级; 打开 `openslide` feature 后,
//!   可通过 OpenSlide 读取真正的金字塔 TIFF.
//!   默认后端会把整个 level 0 解码进内存 (上限 [`slide::RASTER_MAX_ALLOC`]),
//!   处理真实尺寸的切片必须启用 `openslide`.
//! 2. 切片坐标一律采用 `(x, y)` (先宽后高), 且总是 level 0 坐标系,
//!   与 OpenSlide 的约定一致.
//!
//! # 开发计划
//!
//! ### 组织/背景二分类 ✅
//!
//! 灰度取反后以 Otsu 或三角法二值化, 统计前景占比.
//!
//! 实现位于 `wsi-berry/src/tissue`.
//!
//! ### 网格切块与持久化 ✅
//!
//! 行优先扫描, 丢弃越界的边缘块, 支持 `npy` 与 `png` 两种存储格式.
//!
//! 实现位于 `wsi-berry/src/tiling`.
//!
//! ### 数据集清单 ✅
//!
//! 按切片分组, 关联标签表, 输出 `mil_dataset.json`.
//!
//! 实现位于 `wsi-berry/src/dataset`.
//!
//! ### 多切片并行 ✅
//!
//! `rayon` feature 下每个切片由独立 worker 处理, 单个切片失败不影响其它切片.
//!
//! ### 切片内协作式取消 ✅
//!
//! 每处理完一个候选块检查一次取消标志.

/// 二维位置 `(x, y)`, level 0 坐标系.
pub type Pos2d = (u32, u32);

/// 二维尺寸 `(width, height)`.
pub type Size2d = (u32, u32);

pub mod consts;
pub mod dataset;
pub mod prelude;
pub mod slide;
pub mod tiling;
pub mod tissue;

pub use dataset::{DatasetError, DatasetRecord, Manifest, PrepConfig, SlideLabel, SlideLabelMap};
pub use slide::{RasterSlide, Slide, SlideError};
pub use tiling::{ConfigError, SaveFormat, TileError, Tiler, TilingConfig, TilingOptions};
pub use tissue::{ThresholdMethod, TissueClassifier};
