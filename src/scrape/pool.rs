//! 采集池
//!
//! 持有全部活动循环、共享结果存储与指标发布器，
//! 负责批量启动、周期性提取以及级联关停

use crate::config::GlobalConfig;
use crate::error::{PoolError, ScrapeError};
use crate::export::MetricsPublisher;
use crate::scrape::scrape_loop::{Loop, ScrapeLoop};
use crate::scrape::scraper::{HttpScraper, Scraper};
use crate::scrape::store::{MemoryStore, ResultStore};
use crate::scrape::target::{Target, TargetSnapshot};
use futures::future::join_all;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 采集池配置
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// 采集间隔
    pub scrape_interval: Duration,
    /// 单次探测的超时预算
    pub scrape_timeout: Duration,
    /// 结果存储的预分配容量提示
    pub store_capacity: usize,
    /// 抖动种子
    pub jitter_seed: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            scrape_interval: Duration::from_secs(30),
            scrape_timeout: Duration::from_secs(10),
            store_capacity: 10000,
            jitter_seed: 0,
        }
    }
}

impl From<&GlobalConfig> for ScrapeConfig {
    fn from(global: &GlobalConfig) -> Self {
        Self {
            scrape_interval: Duration::from_secs(global.scrape_interval_seconds),
            scrape_timeout: Duration::from_secs(global.scrape_timeout_seconds),
            store_capacity: global.store_capacity,
            jitter_seed: global.jitter_seed,
        }
    }
}

/// 构造一个采集循环所需的参数
struct ScrapeLoopOptions {
    /// 目标的探测能力
    scraper: Arc<dyn Scraper>,
}

/// 采集循环构造函数，闭包捕获共享存储与池级取消令牌
type NewLoopFn = Box<dyn Fn(ScrapeLoopOptions) -> Arc<dyn Loop> + Send + Sync>;

/// 目标集合的采集调度器
///
/// 每个目标对应一个以身份哈希为键的独立循环，循环的取消令牌
/// 全部派生自池级令牌，关停从池向下级联。结果存储由所有循环共享，
/// 池级定时任务周期性提取并交给指标发布器。
pub struct ScrapePool {
    /// 池配置，构造后不再变化
    config: ScrapeConfig,
    /// 共享HTTP客户端
    client: Client,
    /// 共享结果存储
    store: Arc<dyn ResultStore>,
    /// 指标发布器
    publisher: Arc<MetricsPublisher>,
    /// 活动循环注册表，键为目标身份哈希
    loops: Mutex<HashMap<u64, Arc<dyn Loop>>>,
    /// 当前受管目标，供状态接口查阅
    targets: RwLock<Vec<Arc<Target>>>,
    /// 池级取消令牌，所有循环令牌的根
    cancel: CancellationToken,
    /// 提取任务的独立退出信号
    drain_quit: CancellationToken,
    /// 防止重复启动
    started: AtomicBool,
    /// 循环构造函数
    new_loop: NewLoopFn,
}

impl ScrapePool {
    /// 创建新的采集池
    ///
    /// 校验配置并构建共享存储、HTTP客户端与指标发布器。
    ///
    /// # 参数
    /// * `config` - 池配置
    ///
    /// # 返回
    /// * `Result<Self, PoolError>` - 采集池实例
    pub fn new(config: ScrapeConfig) -> Result<Self, PoolError> {
        if config.scrape_interval.is_zero() {
            return Err(PoolError::InvalidConfig("采集间隔必须大于0".to_string()));
        }
        if config.scrape_timeout.is_zero() {
            return Err(PoolError::InvalidConfig("探测超时必须大于0".to_string()));
        }
        if config.scrape_timeout > config.scrape_interval {
            log::warn!(
                "探测超时 {:?} 大于采集间隔 {:?}，超时的探测会挤占下一个节拍",
                config.scrape_timeout,
                config.scrape_interval
            );
        }

        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()?;

        let store: Arc<dyn ResultStore> = Arc::new(MemoryStore::new(config.store_capacity));
        let publisher = Arc::new(MetricsPublisher::new(config.store_capacity)?);

        let cancel = CancellationToken::new();

        let new_loop: NewLoopFn = {
            let store = store.clone();
            let cancel = cancel.clone();
            let jitter_seed = config.jitter_seed;
            Box::new(move |opts: ScrapeLoopOptions| {
                Arc::new(ScrapeLoop::new(
                    opts.scraper,
                    store.clone(),
                    jitter_seed,
                    cancel.child_token(),
                )) as Arc<dyn Loop>
            })
        };

        Ok(Self {
            config,
            client,
            store,
            publisher,
            loops: Mutex::new(HashMap::new()),
            targets: RwLock::new(Vec::new()),
            cancel,
            drain_quit: CancellationToken::new(),
            started: AtomicBool::new(false),
            new_loop,
        })
    }

    /// 为目标集合启动采集
    ///
    /// 注册表更新在锁内完成，循环随后并发派发。每个池只允许启动一次，
    /// 重复调用返回 [`PoolError::AlreadyStarted`]。URL相同的目标只保留
    /// 第一个，后续重复项被跳过。
    ///
    /// # 参数
    /// * `targets` - 目标集合
    /// * `errs` - 可选的错误转发通道，分发给每个循环
    ///
    /// # 返回
    /// * `Result<(), PoolError>` - 启动结果
    pub async fn start(
        &self,
        targets: Vec<Arc<Target>>,
        errs: Option<mpsc::Sender<ScrapeError>>,
    ) -> Result<(), PoolError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PoolError::AlreadyStarted);
        }

        let interval = self.config.scrape_interval;
        let timeout = self.config.scrape_timeout;

        let mut spawned = Vec::with_capacity(targets.len());
        {
            let mut loops = self.loops.lock().await;
            let mut registry = self.targets.write().await;

            for target in targets {
                let hash = target.hash();
                if loops.contains_key(&hash) {
                    log::debug!("跳过重复目标: url={}", target.url());
                    continue;
                }

                let scraper: Arc<dyn Scraper> = Arc::new(HttpScraper::new(
                    target.clone(),
                    self.client.clone(),
                    timeout,
                ));
                let sl = (self.new_loop)(ScrapeLoopOptions { scraper });

                loops.insert(hash, sl.clone());
                registry.push(target);
                spawned.push(sl);
            }
        }

        log::info!(
            "采集池启动: 目标数={}, 间隔={:?}, 超时={:?}",
            spawned.len(),
            interval,
            timeout
        );

        for sl in spawned {
            let errs = errs.clone();
            tokio::spawn(async move {
                sl.run(interval, timeout, errs).await;
            });
        }

        self.spawn_drain_task(interval);

        Ok(())
    }

    /// 级联关停全部采集
    ///
    /// 触发池级取消令牌与提取任务退出信号，并发等待每个循环确认退出，
    /// 最后清空注册表。重复调用是无害的空操作。
    pub async fn stop(&self) {
        let stopping: Vec<Arc<dyn Loop>> = {
            let mut loops = self.loops.lock().await;

            // 先级联取消，再逐个等待确认
            self.cancel.cancel();
            self.drain_quit.cancel();

            let stopping = loops.values().cloned().collect();
            loops.clear();
            stopping
        };

        join_all(stopping.iter().map(|sl| sl.stop())).await;

        self.targets.write().await.clear();

        log::info!("采集池已停止: 已终止循环数={}", stopping.len());
    }

    /// 派发周期性提取任务
    ///
    /// 每个间隔把存储中累积的结果批次交给指标发布器，
    /// 由独立的退出信号控制生命周期。
    fn spawn_drain_task(&self, interval: Duration) {
        let store = self.store.clone();
        let publisher = self.publisher.clone();
        let quit = self.drain_quit.clone();

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = quit.cancelled() => return,
                    _ = ticker.tick() => {
                        let batch = store.commit().await;
                        if !batch.is_empty() {
                            log::debug!("提取结果批次: 条目数={}", batch.len());
                        }
                        publisher.publish(batch);
                    }
                }
            }
        });
    }

    /// 池配置
    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// 指标发布器
    pub fn publisher(&self) -> Arc<MetricsPublisher> {
        self.publisher.clone()
    }

    /// 池是否已经启动过
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// 当前活动循环数量
    pub async fn loop_count(&self) -> usize {
        self.loops.lock().await.len()
    }

    /// 全部受管目标的状态快照
    pub async fn target_snapshots(&self) -> Vec<TargetSnapshot> {
        self.targets.read().await.iter().map(|t| t.snapshot()).collect()
    }

    #[cfg(test)]
    fn set_new_loop(&mut self, new_loop: NewLoopFn) {
        self.new_loop = new_loop;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use url::Url;

    /// 记录运行与停止次数的循环桩
    struct TestLoop {
        ran: AtomicUsize,
        stopped: AtomicUsize,
        cancel: CancellationToken,
    }

    impl TestLoop {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                ran: AtomicUsize::new(0),
                stopped: AtomicUsize::new(0),
                cancel: CancellationToken::new(),
            })
        }
    }

    #[async_trait::async_trait]
    impl Loop for TestLoop {
        async fn run(
            &self,
            _interval: Duration,
            _timeout: Duration,
            _errs: Option<mpsc::Sender<ScrapeError>>,
        ) {
            let prior = self.ran.fetch_add(1, Ordering::SeqCst);
            assert_eq!(prior, 0, "每个循环只应运行一次");
            self.cancel.cancelled().await;
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
        }
    }

    fn make_target(url: &str) -> Arc<Target> {
        Arc::new(Target::new(Url::parse(url).unwrap()))
    }

    /// 构造一个把真实循环替换为桩的池，返回池与桩的登记表
    fn pool_with_test_loops(
        config: ScrapeConfig,
    ) -> (ScrapePool, Arc<std::sync::Mutex<Vec<Arc<TestLoop>>>>) {
        let created: Arc<std::sync::Mutex<Vec<Arc<TestLoop>>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut pool = ScrapePool::new(config).unwrap();
        let registry = created.clone();
        pool.set_new_loop(Box::new(move |_opts| {
            let tl = TestLoop::new();
            registry.lock().unwrap().push(tl.clone());
            tl as Arc<dyn Loop>
        }));

        (pool, created)
    }

    #[test]
    fn test_pool_rejects_zero_interval() {
        let result = ScrapePool::new(ScrapeConfig {
            scrape_interval: Duration::ZERO,
            ..Default::default()
        });
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_pool_rejects_zero_timeout() {
        let result = ScrapePool::new(ScrapeConfig {
            scrape_timeout: Duration::ZERO,
            ..Default::default()
        });
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_from_global() {
        let global = GlobalConfig::default();
        let config = ScrapeConfig::from(&global);

        assert_eq!(config.scrape_interval, Duration::from_secs(30));
        assert_eq!(config.scrape_timeout, Duration::from_secs(10));
        assert_eq!(config.store_capacity, 10000);
        assert_eq!(config.jitter_seed, 0);
    }

    #[tokio::test]
    async fn test_start_creates_one_loop_per_target() {
        let (pool, created) = pool_with_test_loops(ScrapeConfig {
            scrape_interval: Duration::from_secs(3),
            scrape_timeout: Duration::from_secs(2),
            ..Default::default()
        });

        pool.start(
            vec![make_target("http://foo.com/"), make_target("http://bar.com/")],
            None,
        )
        .await
        .unwrap();

        assert_eq!(pool.loop_count().await, 2);

        // 等待派发的任务真正开始运行
        tokio::time::sleep(Duration::from_millis(100)).await;
        {
            let loops = created.lock().unwrap();
            assert_eq!(loops.len(), 2);
            for tl in loops.iter() {
                assert_eq!(tl.ran.load(Ordering::SeqCst), 1, "循环应已运行");
            }
        }

        pool.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_urls_share_one_loop() {
        let (pool, created) = pool_with_test_loops(ScrapeConfig::default());

        pool.start(
            vec![
                make_target("http://foo.com/"),
                make_target("http://foo.com/"),
                make_target("http://bar.com/"),
            ],
            None,
        )
        .await
        .unwrap();

        assert_eq!(pool.loop_count().await, 2);
        assert_eq!(created.lock().unwrap().len(), 2);
        assert_eq!(pool.target_snapshots().await.len(), 2);

        pool.stop().await;
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (pool, _created) = pool_with_test_loops(ScrapeConfig::default());

        pool.start(vec![make_target("http://foo.com/")], None)
            .await
            .unwrap();

        let second = pool
            .start(vec![make_target("http://bar.com/")], None)
            .await;
        assert!(matches!(second, Err(PoolError::AlreadyStarted)));

        // 被拒绝的调用不应登记任何新循环
        assert_eq!(pool.loop_count().await, 1);

        pool.stop().await;
    }

    #[tokio::test]
    async fn test_stop_terminates_every_loop() {
        let (pool, created) = pool_with_test_loops(ScrapeConfig::default());

        pool.start(
            vec![make_target("http://foo.com/"), make_target("http://bar.com/")],
            None,
        )
        .await
        .unwrap();
        assert_eq!(pool.loop_count().await, 2);

        pool.stop().await;

        assert_eq!(pool.loop_count().await, 0);
        assert!(pool.target_snapshots().await.is_empty());
        for tl in created.lock().unwrap().iter() {
            assert_eq!(tl.stopped.load(Ordering::SeqCst), 1, "每个循环都应被停止");
        }
    }

    #[tokio::test]
    async fn test_stop_twice_is_harmless() {
        let (pool, _created) = pool_with_test_loops(ScrapeConfig::default());

        pool.start(vec![make_target("http://foo.com/")], None)
            .await
            .unwrap();

        pool.stop().await;
        pool.stop().await;

        assert_eq!(pool.loop_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_harmless() {
        let (pool, _created) = pool_with_test_loops(ScrapeConfig::default());
        pool.stop().await;
        assert_eq!(pool.loop_count().await, 0);
    }
}
