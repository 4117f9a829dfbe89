//! 采集调度模块
//!
//! 提供目标管理、探测执行、结果存储和循环调度功能

pub mod pool;
pub mod scrape_loop;
pub mod scraper;
pub mod store;
pub mod target;

// 重新导出主要类型
pub use pool::{ScrapeConfig, ScrapePool};
pub use scrape_loop::{Loop, ScrapeLoop};
pub use scraper::{HttpScraper, Scraper, SCRAPE_TIMEOUT_HEADER};
pub use store::{MemoryStore, ResultStore, ScrapeOutcome};
pub use target::{Target, TargetHealth, TargetSnapshot};
