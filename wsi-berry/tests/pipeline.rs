use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use wsi_berry::dataset::{self, DatasetError, PrepConfig, SlideStatus, UNKNOWN_LABEL};
use wsi_berry::{ConfigError, Manifest};

const TISSUE: Rgba<u8> = Rgba([180, 60, 140, 255]);
const GLASS: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

/// 在 `{root}/images` 下准备切片, 返回配置.
fn layout(root: &Path, slides: &[(&str, Option<RgbaImage>)]) -> PrepConfig {
    let config = PrepConfig::from_data_root(root);
    std::fs::create_dir_all(&config.slide_root).unwrap();
    for (name, img) in slides {
        let path = config.slide_root.join(format!("{name}.tif"));
        match img {
            Some(img) => img.save(&path).unwrap(),
            None => std::fs::write(&path, b"not a tiff at all").unwrap(),
        }
    }
    config
}

fn tissue(w: u32, h: u32) -> Option<RgbaImage> {
    Some(RgbaImage::from_pixel(w, h, TISSUE))
}

#[test]
fn test_fault_isolation() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = layout(
        dir.path(),
        &[("s1", tissue(512, 256)), ("s2", None), ("s3", tissue(256, 256))],
    );
    std::fs::write(
        config.label_table.as_ref().unwrap(),
        "patient,stage\ns1.tif,negative\ns2.tif,macro\n",
    )
    .unwrap();

    let report = dataset::run(&config).unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.processed(), 2);
    assert_eq!(report.skipped(), 1);
    assert!(matches!(
        report.outcomes[1].status,
        SlideStatus::Skipped { .. }
    ));
    assert!(!config.patches_root.join("s2").exists());

    let names: Vec<_> = report
        .manifest
        .records()
        .iter()
        .map(|r| r.slide_name.as_str())
        .collect();
    assert_eq!(names, ["s1", "s3"]);

    let labels: Vec<_> = report.manifest.records().iter().map(|r| r.label).collect();
    assert_eq!(labels, [0, UNKNOWN_LABEL]);

    assert_eq!(report.manifest.records()[0].num_patches, 2);
    assert_eq!(report.manifest.records()[1].num_patches, 1);

    let on_disk = Manifest::read_json(&config.manifest_path).unwrap();
    assert_eq!(on_disk, report.manifest);
}

#[test]
fn test_manifest_invariants() {
    let dir = tempfile::tempdir().unwrap();
    let config = layout(dir.path(), &[("b", tissue(600, 600)), ("a", tissue(300, 520))]);

    let report = dataset::run(&config).unwrap();
    // 枚举按文件名排序.
    assert_eq!(report.manifest.records()[0].slide_name, "a");

    for r in report.manifest.records() {
        assert_eq!(r.num_patches, r.patch_paths.len());
        assert_eq!(r.filename, format!("{}.tif", r.slide_name));
        let slide_dir = config.patches_root.join(&r.slide_name);
        for p in &r.patch_paths {
            let p = Path::new(p);
            assert_eq!(p.parent(), Some(slide_dir.as_path()));
            assert!(p.is_file());
        }
    }
    assert_eq!(report.manifest.total_patches(), 2 + 4);
}

#[test]
fn test_label_table_absent() {
    let dir = tempfile::tempdir().unwrap();
    let config = layout(dir.path(), &[("x", tissue(256, 256))]);
    let report = dataset::run(&config).unwrap();
    assert_eq!(report.manifest.records()[0].label, UNKNOWN_LABEL);
}

#[test]
fn test_zero_patch_slide_not_in_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let config = layout(
        dir.path(),
        &[
            ("glass", Some(RgbaImage::from_pixel(512, 512, GLASS))),
            ("tiny", tissue(100, 100)),
            ("t", tissue(256, 256)),
        ],
    );
    let report = dataset::run(&config).unwrap();
    assert_eq!(report.empty(), 2);
    assert_eq!(report.processed(), 1);
    assert_eq!(report.manifest.len(), 1);
    assert_eq!(report.manifest.records()[0].slide_name, "t");
}

#[test]
fn test_bad_format_fails_eagerly() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = layout(dir.path(), &[("x", tissue(256, 256))]);
    config.tiling.save_format = "bmp".into();

    let err = dataset::run(&config).unwrap_err();
    assert!(matches!(
        err,
        DatasetError::Config(ConfigError::UnsupportedFormat(ref f)) if f == "bmp"
    ));
    assert!(!config.patches_root.exists());
    assert!(!config.manifest_path.exists());
}

#[test]
fn test_cancelled_run_writes_no_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let config = layout(dir.path(), &[("x", tissue(512, 512))]);
    let flag = Arc::new(AtomicBool::new(true));

    let err = dataset::run_with_cancel(&config, Some(flag)).unwrap_err();
    assert!(matches!(err, DatasetError::Cancelled));
    assert!(!config.manifest_path.exists());
}

#[cfg(feature = "rayon")]
#[test]
fn test_parallel_matches_sequential() {
    let seq_dir = tempfile::tempdir().unwrap();
    let par_dir = tempfile::tempdir().unwrap();
    let slides = [
        ("p1", tissue(512, 256)),
        ("p2", None),
        ("p3", tissue(256, 768)),
        ("p4", Some(RgbaImage::from_pixel(256, 256, GLASS))),
    ];

    let seq = layout(seq_dir.path(), &slides);
    let mut par = layout(par_dir.path(), &slides);
    par.parallel = true;

    let a = dataset::run(&seq).unwrap();
    let b = dataset::run(&par).unwrap();

    let strip = |m: &Manifest, root: &Path| -> Vec<(String, Vec<String>)> {
        m.records()
            .iter()
            .map(|r| {
                let rel = r
                    .patch_paths
                    .iter()
                    .map(|p| {
                        Path::new(p)
                            .strip_prefix(root)
                            .unwrap()
                            .to_string_lossy()
                            .into_owned()
                    })
                    .collect();
                (r.slide_name.clone(), rel)
            })
            .collect()
    };
    assert_eq!(
        strip(&a.manifest, &seq.patches_root),
        strip(&b.manifest, &par.patches_root)
    );
    assert_eq!(b.skipped(), 1);
}
