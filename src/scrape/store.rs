//! 采集结果缓冲区
//!
//! 所有采集循环共享一个累积缓冲区，由池级定时器周期性地原子提取

use crate::error::StoreError;
use crate::scrape::target::TargetHealth;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// 一次探测产生的结果条目
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutcome {
    /// 目标URL
    pub url: Url,
    /// 本次探测得到的健康状态
    pub health: TargetHealth,
    /// 本次探测耗时
    pub response_time: Duration,
}

/// 结果存储接口
///
/// `add` 会被多个循环并发调用，`commit` 由池级定时器独占调用，
/// 实现必须保证每个条目恰好被一次 `commit` 返回。
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 追加一条探测结果
    ///
    /// 内存实现永不失败，错误返回值为可能失败的后备存储保留。
    ///
    /// # 参数
    /// * `url` - 目标URL
    /// * `health` - 健康状态
    /// * `response_time` - 探测耗时
    async fn add(
        &self,
        url: Url,
        health: TargetHealth,
        response_time: Duration,
    ) -> Result<(), StoreError>;

    /// 原子提取全部待处理条目并清空缓冲区
    ///
    /// 交换点之前追加的条目全部返回且仅返回一次，
    /// 交换点之后追加的条目留待下一次提取。
    ///
    /// # 返回
    /// * `Vec<ScrapeOutcome>` - 按追加顺序排列的待处理条目
    async fn commit(&self) -> Vec<ScrapeOutcome>;
}

/// 基于内存的结果存储
///
/// 用互斥锁保护单个缓冲序列，提取时整体换出并换入一个
/// 按容量提示预分配的新序列。容量提示只影响预分配，不限制条目数量。
pub struct MemoryStore {
    /// 预分配容量提示
    capacity: usize,
    /// 待处理条目
    entries: Mutex<Vec<ScrapeOutcome>>,
}

impl MemoryStore {
    /// 创建新的内存存储
    ///
    /// # 参数
    /// * `capacity` - 预分配容量提示
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn add(
        &self,
        url: Url,
        health: TargetHealth,
        response_time: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.push(ScrapeOutcome {
            url,
            health,
            response_time,
        });
        Ok(())
    }

    async fn commit(&self) -> Vec<ScrapeOutcome> {
        let mut entries = self.entries.lock().await;
        std::mem::replace(&mut *entries, Vec::with_capacity(self.capacity))
    }
}
