//! Uptime Vitals - 轻量级URL可用性与延迟监控工具
//!
//! 这是一个用Rust编写的HTTP(S)目标健康采集调度器，支持：
//! - 每个目标独立的采集循环，互不影响
//! - 确定性抖动偏移，同间隔的目标错峰探测
//! - 超时受限的探测与干净的级联取消
//! - 并发安全的结果缓冲与原子批量提取
//! - Prometheus指标导出与可选的Web状态接口
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod scrape;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig, TargetConfig};
pub use error::UptimeVitalsError;
pub use scrape::{ScrapeConfig, ScrapePool, Target, TargetHealth};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
