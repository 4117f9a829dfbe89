//! 监控目标定义
//!
//! 提供目标身份标识、抖动偏移计算与最近一次探测状态的记录

use crate::error::ScrapeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

/// FNV-1a 64位哈希的初始偏移量
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64位哈希的素数
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 计算字节序列的FNV-1a 64位摘要
///
/// 结果在进程之间保持稳定，可安全用作持久化的身份键。
fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// 目标健康状态
///
/// `Unknown` 仅出现在首次探测完成之前，之后严格为 `Good` 或 `Bad`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    /// 尚未探测
    Unknown,
    /// 最近一次探测成功
    Good,
    /// 最近一次探测失败
    Bad,
}

impl TargetHealth {
    /// 对外暴露的指标数值：Unknown=-1，Good=1，Bad=0
    pub fn value(&self) -> f64 {
        match self {
            TargetHealth::Unknown => -1.0,
            TargetHealth::Good => 1.0,
            TargetHealth::Bad => 0.0,
        }
    }

    /// 状态的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetHealth::Unknown => "unknown",
            TargetHealth::Good => "good",
            TargetHealth::Bad => "bad",
        }
    }
}

impl fmt::Display for TargetHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 目标的可变探测状态
#[derive(Debug, Clone)]
struct TargetState {
    /// 最近一次已知健康状态
    health: TargetHealth,
    /// 最近一次探测的开始时间
    last_scrape: Option<DateTime<Utc>>,
    /// 最近一次探测耗时
    last_scrape_duration: Option<Duration>,
    /// 最近一次探测的错误信息
    last_error: Option<String>,
}

/// 目标状态快照，用于对外展示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSnapshot {
    /// 目标URL（规范化字符串形式）
    pub url: String,
    /// 最近一次已知健康状态
    pub health: TargetHealth,
    /// 最近一次探测的开始时间
    pub last_scrape: Option<DateTime<Utc>>,
    /// 最近一次探测耗时（毫秒）
    pub last_scrape_duration_ms: Option<u64>,
    /// 最近一次探测的错误信息
    pub last_error: Option<String>,
}

/// 一个被监控的端点
///
/// 身份由URL的规范化字符串决定：相同URL的两个目标哈希值必然相同，
/// 采集池据此去重与建立索引。探测结果由 [`Target::report`] 原地更新。
#[derive(Debug)]
pub struct Target {
    /// 解析后的目标URL
    url: Url,
    /// URL规范化字符串的FNV-1a摘要，构造时计算一次
    hash: u64,
    /// 最近一次探测状态
    state: RwLock<TargetState>,
}

impl Target {
    /// 创建新的监控目标，初始健康状态为 `Unknown`
    pub fn new(url: Url) -> Self {
        let hash = fnv1a64(url.as_str().as_bytes());
        Self {
            url,
            hash,
            state: RwLock::new(TargetState {
                health: TargetHealth::Unknown,
                last_scrape: None,
                last_scrape_duration: None,
                last_error: None,
            }),
        }
    }

    /// 目标URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 目标身份哈希
    ///
    /// URL规范化字符串的纯函数，跨调用与跨进程稳定。
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// 计算首次探测前需要等待的抖动偏移
    ///
    /// 所有目标的调度都对齐到同一条以纪元为原点的间隔边界网格，
    /// 再按目标哈希与种子的异或值散开，保证同间隔的目标不会同时发起请求，
    /// 且相同种子与目标集合的偏移可复现。返回值始终落在 `[0, interval)`。
    ///
    /// # 参数
    /// * `interval` - 采集间隔，必须大于0（由池配置校验保证）
    /// * `jitter_seed` - 抖动种子
    ///
    /// # 返回
    /// * `Duration` - 首次探测前的等待时长
    pub fn offset(&self, interval: Duration, jitter_seed: u64) -> Duration {
        let interval_ns = interval.as_nanos() as u64;
        if interval_ns == 0 {
            return Duration::ZERO;
        }

        let now_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        // 距离下一个对齐到纪元的间隔边界还有多久
        let base = interval_ns - now_ns % interval_ns;
        // 目标自身的确定性散布量
        let per_target = (self.hash ^ jitter_seed) % interval_ns;

        let mut next = base + per_target;
        if next >= interval_ns {
            next -= interval_ns;
        }

        Duration::from_nanos(next)
    }

    /// 记录一次探测结果
    ///
    /// # 参数
    /// * `start` - 探测开始时间
    /// * `duration` - 探测耗时
    /// * `err` - 探测错误，`None` 表示成功
    pub fn report(&self, start: DateTime<Utc>, duration: Duration, err: Option<&ScrapeError>) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            // 锁中毒时继续使用内部数据
            Err(poisoned) => poisoned.into_inner(),
        };

        state.last_scrape = Some(start);
        state.last_scrape_duration = Some(duration);
        match err {
            None => {
                state.health = TargetHealth::Good;
                state.last_error = None;
            }
            Some(e) => {
                state.health = TargetHealth::Bad;
                state.last_error = Some(e.to_string());
            }
        }
    }

    /// 最近一次已知健康状态
    pub fn health(&self) -> TargetHealth {
        match self.state.read() {
            Ok(state) => state.health,
            Err(poisoned) => poisoned.into_inner().health,
        }
    }

    /// 获取当前状态快照
    pub fn snapshot(&self) -> TargetSnapshot {
        let state = match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        TargetSnapshot {
            url: self.url.as_str().to_string(),
            health: state.health,
            last_scrape: state.last_scrape,
            last_scrape_duration_ms: state
                .last_scrape_duration
                .map(|d| d.as_millis() as u64),
            last_error: state.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_target(url: &str) -> Target {
        Target::new(Url::parse(url).unwrap())
    }

    #[test]
    fn test_fnv1a64_known_vectors() {
        // 公开的FNV-1a参考向量，保证摘要函数跨进程稳定
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_hash_deterministic_for_same_url() {
        let a = make_target("http://foo.com/");
        let b = make_target("http://foo.com/");

        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.hash());
    }

    #[test]
    fn test_hash_differs_for_distinct_urls() {
        let a = make_target("http://foo.com/");
        let b = make_target("http://bar.com/");

        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_offset_within_interval() {
        let target = make_target("https://example.com/health");
        let intervals = [
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(60),
            Duration::from_millis(1500),
        ];
        let seeds = [0u64, 1, 12345, u64::MAX];

        for interval in intervals {
            for seed in seeds {
                let offset = target.offset(interval, seed);
                assert!(
                    offset < interval,
                    "offset {:?} 应小于间隔 {:?}（种子 {}）",
                    offset,
                    interval,
                    seed
                );
            }
        }
    }

    #[test]
    fn test_offset_zero_interval_degrades() {
        let target = make_target("https://example.com/");
        assert_eq!(target.offset(Duration::ZERO, 7), Duration::ZERO);
    }

    #[test]
    fn test_offset_schedule_is_stable() {
        // 偏移随当前时间流逝而缩短，但"当前时间+偏移"指向的绝对时刻保持不变
        let target = make_target("http://foo.com/");
        let interval = Duration::from_secs(3600);
        let seed = 42u64;

        let t1 = SystemTime::now();
        let o1 = target.offset(interval, seed);
        let t2 = SystemTime::now();
        let o2 = target.offset(interval, seed);

        let fire1 = t1 + o1;
        let fire2 = t2 + o2;
        let delta = match fire1.duration_since(fire2) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };

        assert!(
            delta < Duration::from_millis(50),
            "两次计算的首次触发时刻相差 {:?}",
            delta
        );
    }

    #[test]
    fn test_same_target_same_seed_same_schedule() {
        // 相同种子与相同URL的两个目标实例产生一致的首次触发时刻
        let a = make_target("http://foo.com/");
        let b = make_target("http://foo.com/");
        let interval = Duration::from_secs(3600);

        let t1 = SystemTime::now();
        let o1 = a.offset(interval, 99);
        let t2 = SystemTime::now();
        let o2 = b.offset(interval, 99);

        let fire1 = t1 + o1;
        let fire2 = t2 + o2;
        let delta = match fire1.duration_since(fire2) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };

        assert!(delta < Duration::from_millis(50));
    }

    #[test]
    fn test_health_starts_unknown() {
        let target = make_target("https://example.com/");
        assert_eq!(target.health(), TargetHealth::Unknown);

        let snapshot = target.snapshot();
        assert_eq!(snapshot.health, TargetHealth::Unknown);
        assert!(snapshot.last_scrape.is_none());
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_report_success_sets_good() {
        let target = make_target("https://example.com/");
        target.report(Utc::now(), Duration::from_millis(120), None);

        assert_eq!(target.health(), TargetHealth::Good);

        let snapshot = target.snapshot();
        assert_eq!(snapshot.last_scrape_duration_ms, Some(120));
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_report_failure_sets_bad_with_error() {
        let target = make_target("https://example.com/");
        let err = ScrapeError::Timeout {
            timeout: Duration::from_secs(5),
        };
        target.report(Utc::now(), Duration::from_secs(5), Some(&err));

        assert_eq!(target.health(), TargetHealth::Bad);

        let snapshot = target.snapshot();
        assert!(snapshot.last_error.is_some());
        assert!(snapshot.last_error.unwrap().contains("超时"));
    }

    #[test]
    fn test_report_recovery_clears_error() {
        let target = make_target("https://example.com/");
        let err = ScrapeError::Timeout {
            timeout: Duration::from_secs(5),
        };
        target.report(Utc::now(), Duration::from_secs(5), Some(&err));
        target.report(Utc::now(), Duration::from_millis(80), None);

        assert_eq!(target.health(), TargetHealth::Good);
        assert!(target.snapshot().last_error.is_none());
    }

    #[test]
    fn test_health_values() {
        assert_eq!(TargetHealth::Unknown.value(), -1.0);
        assert_eq!(TargetHealth::Good.value(), 1.0);
        assert_eq!(TargetHealth::Bad.value(), 0.0);
    }
}
