//! 指标导出模块
//!
//! 将采集结果转换为Prometheus指标

pub mod publisher;

pub use publisher::MetricsPublisher;
