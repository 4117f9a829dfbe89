//! Web服务器实现
//!
//! 基于axum提供健康检查、指标与状态查询路由，支持优雅关闭

use crate::config::WebConfig;
use crate::error::{ConfigError, Result};
use crate::web::{ApiResponse, HealthResponse, StatusSummary, WebServerState};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Prometheus文本格式的Content-Type
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Web服务器
pub struct WebServer {
    /// Web配置
    config: WebConfig,
    /// 路由共享状态
    state: WebServerState,
    /// 关闭令牌，启动后填入
    shutdown: Mutex<Option<CancellationToken>>,
}

impl WebServer {
    /// 创建新的Web服务器
    ///
    /// # 参数
    /// * `config` - Web配置
    /// * `state` - 路由共享状态
    pub fn new(config: WebConfig, state: WebServerState) -> Self {
        Self {
            config,
            state,
            shutdown: Mutex::new(None),
        }
    }

    /// 启动Web服务器
    ///
    /// 绑定监听地址并在后台任务中服务请求，立即返回实际绑定的地址。
    ///
    /// # 返回
    /// * `Result<SocketAddr>` - 实际监听的地址
    pub async fn start(&self) -> Result<SocketAddr> {
        let addr = self.config.socket_addr().map_err(ConfigError::ValidationError)?;

        let router = build_router(self.state.clone());

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        {
            let mut shutdown = match self.shutdown.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *shutdown = Some(cancel.clone());
        }

        log::info!("Web服务器启动: 监听地址={}", local_addr);

        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel.cancelled().await;
                })
                .await;

            if let Err(e) = result {
                log::error!("Web服务器异常退出: {}", e);
            }
        });

        Ok(local_addr)
    }

    /// 发出优雅关闭信号
    ///
    /// 未启动或已停止时调用是无害的空操作。
    pub fn stop(&self) {
        let token = match self.shutdown.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(cancel) = token {
            cancel.cancel();
            log::info!("Web服务器停止信号已发出");
        }
    }
}

/// 构建路由表
fn build_router(state: WebServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/status", get(status_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// GET /healthz - 进程存活检查
async fn healthz_handler(State(state): State<WebServerState>) -> impl IntoResponse {
    let uptime_seconds = (chrono::Utc::now() - state.start_time).num_seconds().max(0) as u64;

    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        uptime_seconds,
    }))
}

/// GET /metrics - Prometheus文本格式指标
async fn metrics_handler(State(state): State<WebServerState>) -> impl IntoResponse {
    match state.pool.publisher().render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
            text,
        )
            .into_response(),
        Err(e) => {
            log::error!("渲染指标失败: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(format!("渲染指标失败: {}", e))),
            )
                .into_response()
        }
    }
}

/// GET /api/v1/status - 全部目标的状态汇总
async fn status_handler(State(state): State<WebServerState>) -> impl IntoResponse {
    let running = state.pool.loop_count().await > 0;
    let snapshots = state.pool.target_snapshots().await;

    Json(ApiResponse::success(StatusSummary::from_snapshots(
        running, snapshots,
    )))
}
