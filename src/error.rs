//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use std::time::Duration;
use thiserror::Error;

/// Uptime Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum UptimeVitalsError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Scrape(#[from] ScrapeError),

    /// 采集池相关错误
    #[error("采集池错误: {0}")]
    Pool(#[from] PoolError),

    /// 结果存储相关错误
    #[error("结果存储错误: {0}")]
    Store(#[from] StoreError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 单次探测错误类型
///
/// 超时与普通探测失败在存储层表现一致（均记为 Bad），
/// 但通过错误通道转发时可按变体区分。
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// HTTP请求错误（连接失败、TLS错误等传输层问题）
    #[error("HTTP请求失败: {0}")]
    Request(#[from] reqwest::Error),

    /// 单次探测超出时限
    #[error("探测超时（时限 {timeout:?}）")]
    Timeout { timeout: Duration },

    /// 服务器返回非成功状态码
    #[error("服务器返回非成功状态码: {status}")]
    BadStatus { status: reqwest::StatusCode },
}

/// 结果存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 后端拒绝写入
    #[error("结果写入被拒绝: {0}")]
    Rejected(String),
}

/// 采集池错误类型
#[derive(Error, Debug)]
pub enum PoolError {
    /// 池配置无效
    #[error("采集池配置无效: {0}")]
    InvalidConfig(String),

    /// 池已启动，拒绝重复启动
    #[error("采集池已经启动，每个池只允许启动一次")]
    AlreadyStarted,

    /// HTTP客户端构建失败
    #[error("创建HTTP客户端失败: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// 指标注册失败
    #[error("注册指标失败: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, UptimeVitalsError>;
