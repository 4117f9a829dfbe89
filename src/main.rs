//! Uptime Vitals 主程序入口
//!
//! 轻量级URL可用性与延迟监控工具

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uptime_vitals::cli::args::{Args, Commands};
use uptime_vitals::cli::commands::{
    CheckCommand, Command, InitCommand, ValidateCommand, VersionCommand,
};
use uptime_vitals::config::{self, ConfigLoader, TomlConfigLoader};
use uptime_vitals::error::ScrapeError;
use uptime_vitals::logging::{LogConfig, LoggingSystem};
use uptime_vitals::scrape::{ScrapeConfig, ScrapePool, Target};
use uptime_vitals::web::{WebServer, WebServerState};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.clone().into(),
        console: true,
        json_format: false,
        ..Default::default()
    };

    let _logging_system =
        LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("{} v{} 启动", uptime_vitals::APP_NAME, uptime_vitals::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    match &args.command {
        Commands::Start {
            interval,
            timeout,
            jitter_seed,
        } => execute_start_command(args, *interval, *timeout, *jitter_seed).await,
        Commands::Check { .. } => {
            let command = CheckCommand;
            command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
        }
        Commands::Init { .. } => {
            let command = InitCommand;
            command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
        }
        Commands::Validate { .. } => {
            let command = ValidateCommand;
            command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
        }
        Commands::Version { .. } => {
            let command = VersionCommand;
            command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
        }
    }
}

/// 执行启动命令
///
/// 在前台运行采集服务，Ctrl+C触发优雅关闭。
async fn execute_start_command(
    args: &Args,
    interval: Option<u64>,
    timeout: Option<u64>,
    jitter_seed: Option<u64>,
) -> Result<()> {
    info!("启动采集服务...");

    let shutdown = CancellationToken::new();

    // 设置Ctrl+C信号处理
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("收到中断信号，正在停止服务...");
                shutdown_for_signal.cancel();
            }
            Err(err) => {
                error!("监听中断信号失败: {}", err);
            }
        }
    });

    start_service_main(args, interval, timeout, jitter_seed, shutdown).await
}

/// 服务主逻辑
async fn start_service_main(
    args: &Args,
    interval: Option<u64>,
    timeout: Option<u64>,
    jitter_seed: Option<u64>,
    shutdown: CancellationToken,
) -> Result<()> {
    // 1. 加载和验证配置
    let config = load_and_validate_config(args, interval, timeout, jitter_seed).await?;

    // 2. 初始化核心组件
    let components = initialize_service_components(&config)?;

    // 3. 启动Web服务器（如果启用）
    let web_server = start_web_server_if_enabled(&config, components.pool.clone()).await?;

    // 4. 启动错误通道消费者
    let error_tx = spawn_error_consumer();

    // 5. 启动采集池
    components
        .pool
        .start(components.targets.clone(), Some(error_tx))
        .await
        .context("启动采集池失败")?;

    info!("采集服务已启动: 目标数={}", components.targets.len());

    // 6. 等待关闭信号并清理资源
    handle_shutdown_and_cleanup(shutdown, web_server, &components.pool).await
}

/// 加载和验证配置文件
///
/// 从指定路径加载配置文件，并应用命令行参数覆盖。
///
/// # 参数
///
/// * `args` - 命令行参数，包含配置文件路径
/// * `interval` - 可选的采集间隔覆盖值（秒）
/// * `timeout` - 可选的探测超时覆盖值（秒）
/// * `jitter_seed` - 可选的抖动种子覆盖值
///
/// # 返回值
///
/// 返回加载并验证后的配置对象，如果配置文件不存在或格式错误则返回错误。
async fn load_and_validate_config(
    args: &Args,
    interval: Option<u64>,
    timeout: Option<u64>,
    jitter_seed: Option<u64>,
) -> Result<config::Config> {
    let config_path = args.get_config_path();
    let loader = TomlConfigLoader::new(true);

    // 检查配置文件是否存在
    if !config_path.exists() {
        return Err(anyhow::anyhow!(
            "配置文件不存在: {}\n提示：请运行 'uptime-vitals init' 创建默认配置文件",
            config_path.display()
        ));
    }

    let mut config = loader
        .load_from_file(&config_path)
        .await
        .with_context(|| format!("加载配置文件失败: {}", config_path.display()))?;

    // 应用命令行参数覆盖
    if let Some(interval_secs) = interval {
        config.global.scrape_interval_seconds = interval_secs;
    }
    if let Some(timeout_secs) = timeout {
        config.global.scrape_timeout_seconds = timeout_secs;
    }
    if let Some(seed) = jitter_seed {
        config.global.jitter_seed = seed;
    }

    info!("配置加载完成，目标数量: {}", config.targets.len());
    Ok(config)
}

/// 服务组件集合
struct ServiceComponents {
    /// 采集池，持有全部循环与共享结果存储
    pool: Arc<ScrapePool>,
    /// 启用的监控目标
    targets: Vec<Arc<Target>>,
}

/// 初始化核心服务组件
///
/// 根据配置构建采集池与启用的目标集合，禁用的目标在这里被跳过。
fn initialize_service_components(config: &config::Config) -> Result<ServiceComponents> {
    let pool = Arc::new(
        ScrapePool::new(ScrapeConfig::from(&config.global)).context("创建采集池失败")?,
    );

    let mut targets = Vec::with_capacity(config.targets.len());
    for target_config in &config.targets {
        if !target_config.enabled {
            info!("跳过禁用的目标: {}", target_config.url);
            continue;
        }

        // 配置验证已保证URL可解析
        let url = url::Url::parse(&target_config.url)
            .with_context(|| format!("解析目标URL失败: {}", target_config.url))?;
        targets.push(Arc::new(Target::new(url)));
    }

    Ok(ServiceComponents { pool, targets })
}

/// 启动Web服务器（如果启用）
///
/// 根据配置决定是否启动Web状态接口，返回已启动的服务器实例供关停时使用。
async fn start_web_server_if_enabled(
    config: &config::Config,
    pool: Arc<ScrapePool>,
) -> Result<Option<WebServer>> {
    let web_server = if let Some(ref web_config) = config.global.web {
        if web_config.enabled {
            let server = WebServer::new(web_config.clone(), WebServerState::new(pool));
            let addr = server.start().await.context("启动Web服务器失败")?;
            info!("Web状态接口已启动: http://{}", addr);
            Some(server)
        } else {
            info!("Web状态接口已禁用");
            None
        }
    } else {
        info!("Web状态接口未配置");
        None
    };

    Ok(web_server)
}

/// 启动错误通道消费者
///
/// 采集循环把探测错误非阻塞地转发到这里，消费任务按错误类型分级记录。
/// 通道关闭（池停止且所有循环退出）后任务自然结束。
fn spawn_error_consumer() -> mpsc::Sender<ScrapeError> {
    let (tx, mut rx) = mpsc::channel::<ScrapeError>(64);

    tokio::spawn(async move {
        while let Some(err) = rx.recv().await {
            match &err {
                ScrapeError::Timeout { timeout } => {
                    warn!("探测超时: 时限={:?}", timeout);
                }
                other => {
                    warn!("探测失败: {}", other);
                }
            }
        }
    });

    tx
}

/// 处理关闭信号并清理资源
///
/// 等待关闭信号，然后按顺序停止采集池与Web服务器。
async fn handle_shutdown_and_cleanup(
    shutdown: CancellationToken,
    web_server: Option<WebServer>,
    pool: &Arc<ScrapePool>,
) -> Result<()> {
    // 等待关闭信号
    shutdown.cancelled().await;
    info!("收到关闭信号，正在停止服务...");

    // 级联停止全部采集循环，等待确认退出
    pool.stop().await;

    // 停止Web服务器（如果启动了）
    if let Some(server) = web_server {
        server.stop();
        info!("Web服务器已停止");
    }

    info!("服务已停止");
    Ok(())
}
