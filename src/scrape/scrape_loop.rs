//! 单目标采集循环
//!
//! 每个目标由一个独立的循环驱动：先等待抖动偏移，随后立即探测一次，
//! 再按固定间隔持续探测，直到取消令牌触发。循环之间互不影响，
//! 单个目标的失败或迟缓不会波及其他目标

use crate::error::ScrapeError;
use crate::scrape::scraper::Scraper;
use crate::scrape::store::ResultStore;
use crate::scrape::target::TargetHealth;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 可运行并可停止的采集单元
///
/// 每个实例的 `run` 只会被调用一次，由采集池在启动时派发。
#[async_trait]
pub trait Loop: Send + Sync {
    /// 运行采集循环直到被取消
    ///
    /// # 参数
    /// * `interval` - 采集间隔
    /// * `timeout` - 单次探测的超时预算
    /// * `errs` - 可选的错误转发通道，探测错误以非阻塞方式发送
    async fn run(
        &self,
        interval: Duration,
        timeout: Duration,
        errs: Option<mpsc::Sender<ScrapeError>>,
    );

    /// 触发取消并等待循环完全退出
    async fn stop(&self);
}

/// 单目标采集循环实现
pub struct ScrapeLoop {
    /// 目标的探测能力
    scraper: Arc<dyn Scraper>,
    /// 共享结果存储
    store: Arc<dyn ResultStore>,
    /// 抖动种子
    jitter_seed: u64,
    /// 取消令牌，由池级令牌派生
    cancel: CancellationToken,
    /// 完全退出信号，`run` 的所有出口都会触发
    stopped: CancellationToken,
}

impl ScrapeLoop {
    /// 创建新的采集循环
    ///
    /// # 参数
    /// * `scraper` - 目标的探测能力
    /// * `store` - 共享结果存储
    /// * `jitter_seed` - 抖动种子
    /// * `cancel` - 取消令牌，应为池级令牌的子令牌
    pub fn new(
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn ResultStore>,
        jitter_seed: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            scraper,
            store,
            jitter_seed,
            cancel,
            stopped: CancellationToken::new(),
        }
    }

    /// 循环主体，返回即表示采集彻底结束
    async fn run_inner(
        &self,
        interval: Duration,
        timeout: Duration,
        errs: Option<&mpsc::Sender<ScrapeError>>,
    ) {
        let offset = self.scraper.offset(interval, self.jitter_seed);
        log::debug!(
            "采集循环启动: url={}, 首次偏移={:?}, 间隔={:?}",
            self.scraper.url(),
            offset,
            interval
        );

        // 等待抖动偏移，期间收到取消则直接退出，不执行任何探测
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(offset) => {}
        }

        // 节拍器锚定在偏移到期时刻，首次探测不额外等待
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        // 探测超过间隔时丢弃积压节拍，保持与绝对时间网格对齐
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.scrape_and_report(timeout, errs).await;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    self.scrape_and_report(timeout, errs).await;
                }
            }
        }
    }

    /// 执行一次限时探测并记录结果
    ///
    /// 探测完成后无论成败都会更新目标状态并追加到存储；
    /// 探测被关停信号打断时静默返回，不产生任何记录。
    async fn scrape_and_report(&self, timeout: Duration, errs: Option<&mpsc::Sender<ScrapeError>>) {
        let start = Utc::now();
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            outcome = tokio::time::timeout(timeout, self.scraper.scrape()) => outcome,
        };

        let elapsed = started.elapsed();
        let err = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(ScrapeError::Timeout { timeout }),
        };

        self.scraper.report(start, elapsed, err.as_ref());

        let health = if err.is_none() {
            TargetHealth::Good
        } else {
            TargetHealth::Bad
        };
        if let Err(store_err) = self
            .store
            .add(self.scraper.url().clone(), health, elapsed)
            .await
        {
            log::warn!(
                "采集结果写入失败: url={}, 错误={}",
                self.scraper.url(),
                store_err
            );
        }

        if let Some(e) = err {
            log::debug!("探测失败: url={}, 错误={}", self.scraper.url(), e);
            if let Some(sender) = errs {
                // 非阻塞转发，通道已满或接收端缺席时丢弃
                if sender.try_send(e).is_err() {
                    log::trace!("错误通道不可用，丢弃本次探测错误: url={}", self.scraper.url());
                }
            }
        }
    }
}

#[async_trait]
impl Loop for ScrapeLoop {
    async fn run(
        &self,
        interval: Duration,
        timeout: Duration,
        errs: Option<mpsc::Sender<ScrapeError>>,
    ) {
        self.run_inner(interval, timeout, errs.as_ref()).await;

        // 所有退出路径都从这里发出完成信号
        self.stopped.cancel();
        log::debug!("采集循环已退出: url={}", self.scraper.url());
    }

    async fn stop(&self) {
        self.cancel.cancel();
        self.stopped.cancelled().await;
    }
}
