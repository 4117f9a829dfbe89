//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, ConfigTemplate, OutputFormat};
use crate::config::{ConfigLoader, TomlConfigLoader};
use crate::error::Result;
use crate::scrape::{HttpScraper, Scraper, Target};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// 最小配置模板
const MINIMAL_CONFIG_TEMPLATE: &str = r#"# Uptime Vitals 最小配置
# 仅包含必填项，其余配置使用默认值

[global]
# 采集间隔（秒）
scrape_interval_seconds = 30

[[targets]]
url = "https://example.com/health"
"#;

/// 完整配置模板
const FULL_CONFIG_TEMPLATE: &str = r#"# Uptime Vitals 完整配置
# 列出全部可配置项及其默认值

[global]
# 采集间隔（秒），所有目标共享同一间隔
scrape_interval_seconds = 30
# 单次探测超时（秒），建议不超过采集间隔
scrape_timeout_seconds = 10
# 结果缓冲区预分配容量（仅分配提示，不是硬上限）
store_capacity = 10000
# 抖动种子，相同种子与目标集合产生可复现的起始偏移
jitter_seed = 0
# 日志级别：trace/debug/info/warn/error
log_level = "info"

# Web状态接口（可选），提供 /healthz、/metrics 与 /api/v1/status
[global.web]
enabled = false
bind_address = "0.0.0.0"
port = 8080

[[targets]]
url = "https://example.com/health"
enabled = true
description = "示例目标"

[[targets]]
url = "https://api.example.com/ping"
enabled = false
"#;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init {
            config_path,
            force,
            template,
        } = &args.command
        {
            self.create_config_file(config_path, *force, template).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(
        &self,
        config_path: &Path,
        force: bool,
        template: &ConfigTemplate,
    ) -> Result<()> {
        // 检查文件是否已存在
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        // 创建目录（如果不存在）
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let config_content = match template {
            ConfigTemplate::Minimal => MINIMAL_CONFIG_TEMPLATE,
            ConfigTemplate::Full => FULL_CONFIG_TEMPLATE,
        };

        tokio::fs::write(config_path, config_content).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以添加您的监控目标");

        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        // 加载即验证，失败时带具体原因返回
        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        if verbose {
            println!("配置验证通过！");
            println!("全局配置:");
            println!("  采集间隔: {}秒", config.global.scrape_interval_seconds);
            println!("  探测超时: {}秒", config.global.scrape_timeout_seconds);
            println!("  缓冲容量: {}", config.global.store_capacity);
            println!("  抖动种子: {}", config.global.jitter_seed);
            println!("  日志级别: {}", config.global.log_level);

            println!("目标配置:");
            for (i, target) in config.targets.iter().enumerate() {
                println!(
                    "  {}. {} ({})",
                    i + 1,
                    target.url,
                    if target.enabled { "启用" } else { "禁用" }
                );
                if let Some(ref description) = target.description {
                    println!("     描述: {description}");
                }
            }
        } else {
            println!("✓ 配置文件验证通过");
            println!("✓ 找到 {} 个监控目标", config.targets.len());
        }

        Ok(())
    }
}

/// 一次性探测的结果行
#[derive(Debug, serde::Serialize)]
struct CheckOutcome {
    /// 目标URL
    url: String,
    /// 是否探测成功
    ok: bool,
    /// 探测耗时（毫秒）
    response_time_ms: u64,
    /// 失败原因
    error: Option<String>,
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check {
            target,
            format,
            timeout,
        } = &args.command
        {
            self.perform_check(args, target.as_deref(), format, *timeout)
                .await
        } else {
            Ok(())
        }
    }
}

impl CheckCommand {
    /// 执行一次性探测
    ///
    /// 指定URL时只探测该URL，否则探测配置文件中所有启用的目标。
    async fn perform_check(
        &self,
        args: &Args,
        target_url: Option<&str>,
        format: &OutputFormat,
        timeout: u64,
    ) -> Result<()> {
        let timeout = Duration::from_secs(timeout);

        // 收集要探测的URL
        let urls: Vec<Url> = if let Some(raw) = target_url {
            vec![Url::parse(raw).map_err(|e| {
                crate::error::ConfigError::ValidationError(format!(
                    "目标 {raw} 的URL格式无效: {e}"
                ))
            })?]
        } else {
            let loader = TomlConfigLoader::new(true);
            let config = loader.load_from_file(args.get_config_path()).await?;

            config
                .targets
                .iter()
                .filter(|t| t.enabled)
                .filter_map(|t| Url::parse(&t.url).ok())
                .collect()
        };

        if urls.is_empty() {
            eprintln!("未找到任何启用的监控目标");
            return Ok(());
        }

        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(crate::error::ScrapeError::Request)?;

        println!("开始探测...");

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let target = Arc::new(Target::new(url.clone()));
            let scraper = HttpScraper::new(target, client.clone(), timeout);

            let started = Instant::now();
            let result = tokio::time::timeout(timeout, scraper.scrape()).await;
            let elapsed = started.elapsed();

            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(
                    crate::error::ScrapeError::Timeout { timeout }.to_string(),
                ),
            };

            outcomes.push(CheckOutcome {
                url: url.to_string(),
                ok: error.is_none(),
                response_time_ms: elapsed.as_millis() as u64,
                error,
            });
        }

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            }
            OutputFormat::Text => {
                self.print_text_outcomes(&outcomes);
            }
        }

        Ok(())
    }

    /// 打印文本格式结果
    fn print_text_outcomes(&self, outcomes: &[CheckOutcome]) {
        for outcome in outcomes {
            let icon = if outcome.ok { "✓" } else { "✗" };
            println!("{} {} - {}ms", icon, outcome.url, outcome.response_time_ms);

            if let Some(ref error) = outcome.error {
                println!("  错误: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn make_args(argv: &[&str]) -> Args {
        Args::parse_from(argv)
    }

    #[tokio::test]
    async fn test_init_creates_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let args = make_args(&[
            "uptime-vitals",
            "init",
            config_path.to_str().unwrap(),
        ]);
        InitCommand.execute(&args).await.unwrap();

        let content = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(content.contains("scrape_interval_seconds"));

        // 生成的模板本身必须能通过加载验证
        let loader = TomlConfigLoader::new(false);
        assert!(loader.load_from_string(&content).await.is_ok());
    }

    #[tokio::test]
    async fn test_init_full_template_is_valid() {
        let loader = TomlConfigLoader::new(false);
        let config = loader
            .load_from_string(FULL_CONFIG_TEMPLATE)
            .await
            .unwrap();

        assert_eq!(config.targets.len(), 2);
        assert!(config.global.web.is_some());
        assert!(!config.targets[1].enabled);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        tokio::fs::write(&config_path, "原有内容").await.unwrap();

        let args = make_args(&[
            "uptime-vitals",
            "init",
            config_path.to_str().unwrap(),
        ]);
        InitCommand.execute(&args).await.unwrap();

        let content = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert_eq!(content, "原有内容");
    }

    #[tokio::test]
    async fn test_init_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        tokio::fs::write(&config_path, "原有内容").await.unwrap();

        let args = make_args(&[
            "uptime-vitals",
            "init",
            "--force",
            "--template",
            "full",
            config_path.to_str().unwrap(),
        ]);
        InitCommand.execute(&args).await.unwrap();

        let content = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(content.contains("[global.web]"));
    }

    #[tokio::test]
    async fn test_validate_rejects_broken_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        tokio::fs::write(&config_path, "[global]\nscrape_interval_seconds = 0\n")
            .await
            .unwrap();

        let args = make_args(&[
            "uptime-vitals",
            "validate",
            config_path.to_str().unwrap(),
        ]);
        assert!(ValidateCommand.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_check_rejects_malformed_url() {
        let args = make_args(&["uptime-vitals", "check", "not a url"]);
        let result = CheckCommand.execute(&args).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("URL格式无效"));
    }

    #[tokio::test]
    async fn test_check_single_url_against_mock() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let url = format!("{}/health", server.url());
        let args = make_args(&["uptime-vitals", "check", &url]);
        CheckCommand.execute(&args).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_version_command() {
        let args = make_args(&["uptime-vitals", "version"]);
        assert!(VersionCommand.execute(&args).await.is_ok());

        let args = make_args(&["uptime-vitals", "version", "--format", "json"]);
        assert!(VersionCommand.execute(&args).await.is_ok());
    }
}
