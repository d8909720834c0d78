//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Pos2d, Size2d};

pub use crate::slide::{RasterSlide, Slide, SlideError};
pub use crate::tissue::{ThresholdMethod, TissueClassifier};

pub use crate::tiling::{PatchWrite, SaveFormat, TileProfile, Tiler, TilingConfig, TilingOptions};

pub use crate::consts::gray::{BLACK, WHITE};
pub use crate::consts::{DEFAULT_PATCH_SIZE, DEFAULT_TISSUE_THRESHOLD};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, Manifest, PrepConfig, SlideLabelMap};

#[cfg(feature = "openslide")]
pub use crate::slide::OpenSlideBackend;
