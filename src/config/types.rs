//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// 主配置结构，包含全局配置和监控目标列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 全局配置项
    pub global: GlobalConfig,
    /// 监控目标列表
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 采集间隔（秒）
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_seconds: u64,
    /// 单次探测超时时间（秒）
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_seconds: u64,
    /// 结果缓冲区预分配容量（仅用于分配提示，不是硬上限）
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
    /// 抖动种子，相同种子与目标集合产生可复现的起始偏移
    #[serde(default)]
    pub jitter_seed: u64,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Web 服务器配置
    pub web: Option<WebConfig>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scrape_interval_seconds: default_scrape_interval(),
            scrape_timeout_seconds: default_scrape_timeout(),
            store_capacity: default_store_capacity(),
            jitter_seed: 0,
            log_level: default_log_level(),
            web: None,
        }
    }
}

/// 监控目标配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// 目标URL
    pub url: String,
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 目标描述
    pub description: Option<String>,
}

// 默认值函数
fn default_scrape_interval() -> u64 {
    30
}
fn default_scrape_timeout() -> u64 {
    10
}
fn default_store_capacity() -> usize {
    10000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_enabled() -> bool {
    true
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证全局配置
    if config.global.scrape_interval_seconds == 0 {
        return Err("采集间隔不能为0".to_string());
    }

    if config.global.scrape_timeout_seconds == 0 {
        return Err("探测超时时间不能为0".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    // 验证Web配置（如果启用）
    if let Some(ref web_config) = config.global.web {
        if web_config.enabled {
            if web_config.port == 0 {
                return Err(format!(
                    "无效的Web服务器端口: {}，端口不能为0",
                    web_config.port
                ));
            }

            if web_config.bind_address.is_empty() {
                return Err("Web服务器绑定地址不能为空".to_string());
            }
        }
    }

    // 验证目标配置
    if config.targets.is_empty() {
        return Err("至少需要配置一个监控目标".to_string());
    }

    for target in &config.targets {
        if target.url.trim().is_empty() {
            return Err("目标URL不能为空".to_string());
        }

        // URL必须可解析且使用http/https协议
        match url::Url::parse(&target.url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(format!(
                        "目标 {} 的协议 {} 无效，仅支持 http/https",
                        target.url,
                        parsed.scheme()
                    ));
                }
            }
            Err(e) => {
                return Err(format!("目标 {} 的URL格式无效: {}", target.url, e));
            }
        }
    }

    Ok(())
}

/// Web 服务器配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 是否启用 Web 功能
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// 绑定地址
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            bind_address: default_web_bind_address(),
            port: default_web_port(),
        }
    }
}

impl WebConfig {
    /// 解析为套接字地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

/// 默认 Web 功能启用状态
fn default_web_enabled() -> bool {
    false
}

/// 默认 Web 服务器绑定地址
fn default_web_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// 默认 Web 服务器端口
fn default_web_port() -> u16 {
    8080
}
