//! Web接口模块
//!
//! 提供健康检查、Prometheus指标与目标状态查询的HTTP端点

use crate::scrape::{ScrapePool, TargetHealth, TargetSnapshot};
use serde::Serialize;
use std::sync::Arc;

pub mod server;

pub use server::WebServer;

/// Web服务器共享状态
#[derive(Clone)]
pub struct WebServerState {
    /// 采集池
    pub pool: Arc<ScrapePool>,
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl WebServerState {
    /// 创建新的Web服务器状态
    pub fn new(pool: Arc<ScrapePool>) -> Self {
        Self {
            pool,
            start_time: chrono::Utc::now(),
        }
    }
}

/// API响应包装器
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 是否成功
    pub success: bool,
    /// 响应数据
    pub data: Option<T>,
    /// 错误信息
    pub error: Option<String>,
    /// 时间戳
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// 创建错误响应
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 版本信息
    pub version: String,
    /// 运行时间
    pub uptime_seconds: u64,
}

/// 目标状态汇总
#[derive(Debug, Serialize)]
pub struct StatusSummary {
    /// 采集池是否在运行
    pub running: bool,
    /// 目标总数
    pub targets_total: usize,
    /// 健康目标数
    pub targets_good: usize,
    /// 异常目标数
    pub targets_bad: usize,
    /// 尚未探测的目标数
    pub targets_unknown: usize,
    /// 各目标的状态快照
    pub targets: Vec<TargetSnapshot>,
}

impl StatusSummary {
    /// 从目标快照集合构建汇总
    pub fn from_snapshots(running: bool, targets: Vec<TargetSnapshot>) -> Self {
        let targets_good = targets
            .iter()
            .filter(|t| t.health == TargetHealth::Good)
            .count();
        let targets_bad = targets
            .iter()
            .filter(|t| t.health == TargetHealth::Bad)
            .count();
        let targets_unknown = targets
            .iter()
            .filter(|t| t.health == TargetHealth::Unknown)
            .count();

        Self {
            running,
            targets_total: targets.len(),
            targets_good,
            targets_bad,
            targets_unknown,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let response: ApiResponse<()> = ApiResponse::error("出错了".to_string());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("出错了"));
    }

    #[test]
    fn test_status_summary_counts() {
        let targets = vec![
            TargetSnapshot {
                url: "http://a.com/".to_string(),
                health: TargetHealth::Good,
                last_scrape: None,
                last_scrape_duration_ms: None,
                last_error: None,
            },
            TargetSnapshot {
                url: "http://b.com/".to_string(),
                health: TargetHealth::Bad,
                last_scrape: None,
                last_scrape_duration_ms: None,
                last_error: Some("探测超时".to_string()),
            },
            TargetSnapshot {
                url: "http://c.com/".to_string(),
                health: TargetHealth::Unknown,
                last_scrape: None,
                last_scrape_duration_ms: None,
                last_error: None,
            },
        ];

        let summary = StatusSummary::from_snapshots(true, targets);
        assert!(summary.running);
        assert_eq!(summary.targets_total, 3);
        assert_eq!(summary.targets_good, 1);
        assert_eq!(summary.targets_bad, 1);
        assert_eq!(summary.targets_unknown, 1);
    }
}
