//! 探测器抽象与HTTP实现
//!
//! 采集循环只依赖 [`Scraper`] trait，调度逻辑与具体探测手段解耦，
//! 生产实现基于reqwest发起HTTP请求，测试中可替换为任意桩实现

use crate::error::ScrapeError;
use crate::scrape::target::Target;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// 向目标端传递本次探测超时预算的请求头
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Scrape-Timeout-Seconds";

/// 将超时时长格式化为固定六位小数的秒数
///
/// 该格式是探测请求头的对外约定，例如1500毫秒表示为 `1.500000`。
pub fn format_timeout_header(timeout: Duration) -> String {
    format!("{:.6}", timeout.as_secs_f64())
}

/// 采集循环所需的探测能力集合
///
/// 四个操作共同覆盖一次完整的探测周期：发起探测、记录结果、
/// 计算首次调度偏移、提供结果归属的URL。
#[async_trait]
pub trait Scraper: Send + Sync {
    /// 执行一次探测
    ///
    /// 调用方负责施加超时与取消边界，实现必须在Future被丢弃时立即放弃探测。
    ///
    /// # 返回
    /// * `Result<(), ScrapeError>` - 成功为 `Ok(())`，失败时携带具体原因
    async fn scrape(&self) -> Result<(), ScrapeError>;

    /// 将一次探测结果记录到目标状态上
    ///
    /// # 参数
    /// * `start` - 探测开始时间
    /// * `duration` - 探测耗时
    /// * `err` - 探测错误，`None` 表示成功
    fn report(&self, start: DateTime<Utc>, duration: Duration, err: Option<&ScrapeError>);

    /// 计算首次探测前的抖动偏移
    ///
    /// # 参数
    /// * `interval` - 采集间隔
    /// * `jitter_seed` - 抖动种子
    ///
    /// # 返回
    /// * `Duration` - 首次探测前的等待时长，落在 `[0, interval)`
    fn offset(&self, interval: Duration, jitter_seed: u64) -> Duration;

    /// 探测结果归属的目标URL
    fn url(&self) -> &Url;
}

/// 基于reqwest的HTTP探测器
///
/// 每次探测发起一个GET请求，携带超时预算请求头，
/// 非成功状态码视为探测失败。
pub struct HttpScraper {
    /// 被探测的目标
    target: Arc<Target>,
    /// 共享的HTTP客户端
    client: Client,
    /// 本目标的探测超时预算，仅作为请求头提示传给对端
    timeout: Duration,
}

impl HttpScraper {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `target` - 被探测的目标
    /// * `client` - 共享的HTTP客户端
    /// * `timeout` - 探测超时预算
    pub fn new(target: Arc<Target>, client: Client, timeout: Duration) -> Self {
        Self {
            target,
            client,
            timeout,
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self) -> Result<(), ScrapeError> {
        let response = self
            .client
            .get(self.target.url().clone())
            .header(SCRAPE_TIMEOUT_HEADER, format_timeout_header(self.timeout))
            .send()
            .await?;

        let status = response.status();
        // 无论状态码如何都读完响应体，释放底层连接
        let _ = response.bytes().await;

        if !status.is_success() {
            return Err(ScrapeError::BadStatus { status });
        }

        Ok(())
    }

    fn report(&self, start: DateTime<Utc>, duration: Duration, err: Option<&ScrapeError>) {
        self.target.report(start, duration, err);
    }

    fn offset(&self, interval: Duration, jitter_seed: u64) -> Duration {
        self.target.offset(interval, jitter_seed)
    }

    fn url(&self) -> &Url {
        self.target.url()
    }
}
