//! Prometheus指标发布器
//!
//! 消费采集池周期性提取的结果批次，折算为两个按URL打标签的外部指标：
//! 最近健康状态仪表与响应时间直方图

use crate::scrape::store::ScrapeOutcome;
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Mutex;

/// 指标命名空间
const METRICS_NAMESPACE: &str = "uptime_vitals";
/// 指标子系统
const METRICS_SUBSYSTEM: &str = "external";

/// 采集结果的Prometheus发布器
///
/// 每个批次在 [`MetricsPublisher::publish`] 时恰好观测一次，
/// 之后的渲染只读取已注册指标的当前值，不会重复累计样本。
pub struct MetricsPublisher {
    /// 私有注册表
    registry: Registry,
    /// 最近健康状态仪表（Unknown=-1，Good=1，Bad=0）
    url_up: GaugeVec,
    /// 响应时间直方图（毫秒）
    url_response_time: HistogramVec,
    /// 最近一次发布的批次，供状态接口查阅
    last_batch: Mutex<Vec<ScrapeOutcome>>,
}

impl MetricsPublisher {
    /// 创建新的指标发布器
    ///
    /// # 参数
    /// * `capacity` - 批次缓冲的预分配容量提示
    ///
    /// # 返回
    /// * `Result<Self, prometheus::Error>` - 发布器实例
    pub fn new(capacity: usize) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // 最近健康状态仪表
        let url_up = GaugeVec::new(
            Opts::new("url_up", "URL status")
                .namespace(METRICS_NAMESPACE)
                .subsystem(METRICS_SUBSYSTEM),
            &["url"],
        )?;

        // 响应时间直方图，桶按毫秒刻度划分
        let url_response_time = HistogramVec::new(
            HistogramOpts::new("url_response_time_ms", "URL response time in milliseconds")
                .namespace(METRICS_NAMESPACE)
                .subsystem(METRICS_SUBSYSTEM)
                .buckets(vec![
                    5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
                ]),
            &["url"],
        )?;

        // 注册所有指标
        registry.register(Box::new(url_up.clone()))?;
        registry.register(Box::new(url_response_time.clone()))?;

        Ok(Self {
            registry,
            url_up,
            url_response_time,
            last_batch: Mutex::new(Vec::with_capacity(capacity)),
        })
    }

    /// 发布一个结果批次
    ///
    /// 批次中的每个条目把仪表设置为该URL的最新健康值，
    /// 并向直方图观测一次响应耗时。空批次同样会覆盖最近批次缓冲。
    ///
    /// # 参数
    /// * `batch` - 一次提取得到的全部结果条目
    pub fn publish(&self, batch: Vec<ScrapeOutcome>) {
        for outcome in &batch {
            self.url_up
                .with_label_values(&[outcome.url.as_str()])
                .set(outcome.health.value());

            self.url_response_time
                .with_label_values(&[outcome.url.as_str()])
                .observe(outcome.response_time.as_millis() as f64);
        }

        let mut last = match self.last_batch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *last = batch;
    }

    /// 最近一次发布的批次
    pub fn last_batch(&self) -> Vec<ScrapeOutcome> {
        match self.last_batch.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 以Prometheus文本格式渲染全部指标
    ///
    /// # 返回
    /// * `Result<String, prometheus::Error>` - 文本格式的指标内容
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
