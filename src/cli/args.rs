//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Uptime Vitals - 轻量级URL可用性与延迟监控工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uptime-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "UPTIME_VITALS_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "UPTIME_VITALS_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 是否启用详细输出
    #[arg(short, long, help = "启用详细输出")]
    pub verbose: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动采集服务
    Start {
        /// 采集间隔（秒），覆盖配置文件中的值
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            help = "采集间隔（秒）",
            env = "UPTIME_VITALS_INTERVAL"
        )]
        interval: Option<u64>,

        /// 探测超时（秒），覆盖配置文件中的值
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            help = "探测超时（秒）",
            env = "UPTIME_VITALS_TIMEOUT"
        )]
        timeout: Option<u64>,

        /// 抖动种子，覆盖配置文件中的值
        #[arg(
            long,
            value_name = "SEED",
            help = "抖动种子",
            env = "UPTIME_VITALS_JITTER_SEED"
        )]
        jitter_seed: Option<u64>,
    },

    /// 执行一次性探测
    Check {
        /// 目标URL（可选，不指定则探测所有启用的目标）
        #[arg(value_name = "URL", help = "目标URL")]
        target: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,

        /// 超时时间（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "10",
            help = "超时时间（秒）"
        )]
        timeout: u64,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,

        /// 配置模板类型
        #[arg(short, long, value_enum, default_value = "minimal", help = "配置模板类型")]
        template: ConfigTemplate,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

/// 配置模板类型枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum ConfigTemplate {
    /// 最小配置模板
    Minimal,
    /// 完整配置模板
    Full,
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 获取配置文件路径
    ///
    /// 命令行或环境变量指定的路径优先，否则回退到默认查找顺序。
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::loader::get_default_config_path)
    }

    /// 是否启用详细输出
    pub fn is_verbose(&self) -> bool {
        self.verbose || matches!(self.log_level, LogLevel::Debug)
    }
}
