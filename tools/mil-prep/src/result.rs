//! 运行结果.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use wsi_berry::dataset::{PrepReport, SlideOutcome, SlideStatus};
use wsi_berry::tiling::{TileProfile, TilingOutcome};

const S4: &str = "    ";

#[inline]
fn f64_to_display(f: Option<f64>) -> String {
    match f {
        Some(f) => format!("{f:.4}"),
        None => "/".to_string(),
    }
}

#[inline]
fn ms(d: Duration) -> u128 {
    d.as_millis()
}

/// 将 `p` 的统计写进 `w` 中.
fn profile_into<W: Write>(p: &TileProfile, w: &mut W) -> io::Result<()> {
    writeln!(
        w,
        "{S4}Candidates: {} visited / {} expected",
        p.get_visited(),
        p.get_expected()
    )?;
    writeln!(
        w,
        "{S4}Accepted: {}, rejected: {}, ratio {}",
        p.get_accepted(),
        p.get_rejected(),
        f64_to_display(p.get_accept_ratio())
    )?;
    write!(
        w,
        "{S4}Read {} ms, write {} ms, total {} ms",
        ms(p.get_read_time()),
        ms(p.get_write_time()),
        ms(p.get_real_time())
    )
}

/// 将单个切片的结果写进 `w` 中.
fn describe_into<W: Write>(o: &SlideOutcome, w: &mut W) -> io::Result<()> {
    match &o.status {
        SlideStatus::Processed { count } => writeln!(w, "Slide `{}`: {count} patches", o.filename)?,
        SlideStatus::Skipped { reason } => {
            return write!(w, "Slide `{}`: skipped ({reason})", o.filename)
        }
    }
    match &o.profile {
        Some(p) => profile_into(p, w),
        None => Ok(()),
    }
}

fn flush_block(buf: &mut Vec<u8>) {
    println!("{}", String::from_utf8_lossy(buf));
    buf.clear();
    utils::sep();
}

/// `prepare` 的最终结果.
pub struct PrepResult {
    report: PrepReport,
}

impl PrepResult {
    pub fn new(report: PrepReport) -> Self {
        Self { report }
    }

    /// 输出每张切片的状态与汇总.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for o in self.report.outcomes.iter() {
            if describe_into(o, &mut buf).is_ok() {
                flush_block(&mut buf);
            }
        }

        let r = &self.report;
        println!(
            "{} slides: {} in manifest, {} without tissue, {} skipped",
            r.outcomes.len(),
            r.processed(),
            r.empty(),
            r.skipped()
        );
        println!(
            "{} patches in total, manifest saved to `{}`",
            r.manifest.total_patches(),
            r.manifest_path.display()
        );
    }
}

/// `tile` 的最终结果.
pub struct TileSummary {
    slide: PathBuf,
    outcome: TilingOutcome,
}

impl TileSummary {
    pub fn new(slide: PathBuf, outcome: TilingOutcome) -> Self {
        Self { slide, outcome }
    }

    /// 输出统计.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(256);
        let head = writeln!(
            &mut buf,
            "Slide `{}`: {} patches",
            self.slide.display(),
            self.outcome.patch_paths.len()
        );
        if head.and_then(|_| profile_into(&self.outcome.profile, &mut buf)).is_ok() {
            flush_block(&mut buf);
        }
    }
}
