//! 单个切片的切块统计.

use std::time::{Duration, Instant};

/// 可累计的计时器.
///
/// 支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    #[inline]
    fn total(&self) -> Duration {
        self.consumed
    }
}

/// 切块统计.
#[derive(Clone, Debug)]
pub struct TileProfile {
    /// 网格候选块总数 (预估值, 仅用于进度).
    expected: u64,

    /// 实际检查过的候选块.
    visited: u64,

    /// 判定为组织并已保存的块.
    accepted: u64,

    /// 读取区域 + 分类花费的时间.
    read_time: AccTimer,

    /// 写盘花费的时间.
    write_time: AccTimer,

    /// 整个切片花费的时间.
    real_time: AccTimer,
}

impl TileProfile {
    /// 初始化. `expected` 为预估候选块数.
    #[inline]
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            visited: 0,
            accepted: 0,
            read_time: AccTimer::new(),
            write_time: AccTimer::new(),
            real_time: AccTimer::new(),
        }
    }

    /// 开始处理一个候选块.
    #[inline]
    pub fn visit_start(&mut self) {
        self.visited += 1;
        self.read_time.start();
    }

    /// 候选块读取与分类结束.
    #[inline]
    pub fn visit_elapsed(&mut self) {
        self.read_time.elapsed();
    }

    /// 开始写盘.
    #[inline]
    pub fn write_start(&mut self) {
        self.write_time.start();
    }

    /// 写盘结束, 记录一个被接受的块.
    #[inline]
    pub fn write_elapsed(&mut self) {
        self.write_time.elapsed();
        self.accepted += 1;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 预估候选块数.
    #[inline]
    pub fn get_expected(&self) -> u64 {
        self.expected
    }

    /// 已检查的候选块数.
    #[inline]
    pub fn get_visited(&self) -> u64 {
        self.visited
    }

    /// 已保存的块数.
    #[inline]
    pub fn get_accepted(&self) -> u64 {
        self.accepted
    }

    /// 被判为背景的块数.
    #[inline]
    pub fn get_rejected(&self) -> u64 {
        self.visited - self.accepted
    }

    /// 读取与分类的总时间.
    #[inline]
    pub fn get_read_time(&self) -> Duration {
        self.read_time.total()
    }

    /// 写盘总时间.
    #[inline]
    pub fn get_write_time(&self) -> Duration {
        self.write_time.total()
    }

    /// 整个切片花费的总时间. 只有在 `finish` 之后才有意义.
    #[inline]
    pub fn get_real_time(&self) -> Duration {
        self.real_time.total()
    }

    /// 接受率. 没有检查任何块时为 `None`.
    #[inline]
    pub fn get_accept_ratio(&self) -> Option<f64> {
        match self.visited {
            0 => None,
            v => Some(self.accepted as f64 / v as f64),
        }
    }
}

impl Default for TileProfile {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::TileProfile;

    #[test]
    fn test_counts() {
        let mut p = TileProfile::new(4);
        assert_eq!(p.get_accept_ratio(), None);
        for keep in [true, false, true, false] {
            p.visit_start();
            p.visit_elapsed();
            if keep {
                p.write_start();
                p.write_elapsed();
            }
        }
        let p = p.finish();
        assert_eq!(p.get_expected(), 4);
        assert_eq!(p.get_visited(), 4);
        assert_eq!(p.get_accepted(), 2);
        assert_eq!(p.get_rejected(), 2);
        assert_eq!(p.get_accept_ratio(), Some(0.5));
        assert!(p.get_real_time() >= p.get_read_time());
    }
}
