//! Application state shared across API handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sui_rpc_client::{ReadApi, RpcClient};
use thiserror::Error;
use tokio::sync::RwLock;
use yume::{
    fetch_order_book, fetch_pool, fetch_positions, LoanPosition, OrderBookSnapshot, PollingReader,
    PoolState, Refetch,
};
use yume_core::{AppConfig, MarketDescriptor, RpcError};

/// Errors that can occur while setting up the API state
#[derive(Debug, Error)]
pub enum StateError {
    #[error("RPC client error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Unknown market: {id}")]
    UnknownMarket { id: String },
}

pub type PositionReader = PollingReader<Vec<LoanPosition>>;

/// Background readers for one market
pub struct MarketReaders {
    pub order_book: Arc<PollingReader<OrderBookSnapshot>>,
    pub pool: Option<Arc<PollingReader<PoolState>>>,
    /// Per-owner position readers, created on first request
    positions: RwLock<HashMap<String, Arc<PositionReader>>>,
}

impl MarketReaders {
    fn new(
        order_book: PollingReader<OrderBookSnapshot>,
        pool: Option<PollingReader<PoolState>>,
    ) -> Self {
        Self {
            order_book: Arc::new(order_book),
            pool: pool.map(Arc::new),
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// Every reader of the market, position readers included
    pub async fn refetchers(&self) -> Vec<Arc<dyn Refetch>> {
        let mut readers: Vec<Arc<dyn Refetch>> = vec![self.order_book.clone() as Arc<dyn Refetch>];
        if let Some(pool) = &self.pool {
            readers.push(pool.clone());
        }
        for reader in self.positions.read().await.values() {
            readers.push(reader.clone());
        }
        readers
    }

    pub async fn positions(&self, owner: &str) -> Option<Arc<PositionReader>> {
        self.positions.read().await.get(owner).cloned()
    }

    pub async fn position_owners(&self) -> usize {
        self.positions.read().await.len()
    }

    async fn shutdown(self) {
        for reader in self.positions.into_inner().into_values() {
            stop_reader(reader).await;
        }
        stop_reader(self.order_book).await;
        if let Some(pool) = self.pool {
            stop_reader(pool).await;
        }
    }

    async fn cancel(&self) {
        for reader in self.positions.write().await.drain().map(|(_, reader)| reader) {
            reader.cancel();
        }
        self.order_book.cancel();
        if let Some(pool) = &self.pool {
            pool.cancel();
        }
    }
}

/// Wait for the task when this is the last handle, otherwise cancel it
async fn stop_reader<T>(reader: Arc<PollingReader<T>>)
where
    T: Clone + Send + Sync + 'static,
{
    match Arc::try_unwrap(reader) {
        Ok(reader) => reader.shutdown().await,
        Err(shared) => shared.cancel(),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RwLock<AppConfig>,
    read_api: Arc<dyn ReadApi>,
    rpc_client: Option<RpcClient>,
    readers: RwLock<HashMap<String, Arc<MarketReaders>>>,
}

impl AppState {
    /// Create with an explicit read API (used by tests and embedders)
    pub fn new(config: AppConfig, read_api: Arc<dyn ReadApi>) -> Self {
        Self::build(config, read_api, None)
    }

    /// Create a JSON-RPC client from the config
    pub fn connect(config: AppConfig) -> Result<Self, StateError> {
        let client = RpcClient::new(config.rpc.clone())?;
        tracing::info!(url = %config.rpc.url, "Created RPC client");
        let read_api: Arc<dyn ReadApi> = Arc::new(client.clone());
        Ok(Self::build(config, read_api, Some(client)))
    }

    fn build(config: AppConfig, read_api: Arc<dyn ReadApi>, rpc_client: Option<RpcClient>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config: RwLock::new(config),
                read_api,
                rpc_client,
                readers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get current config
    pub async fn config(&self) -> AppConfig {
        self.inner.config.read().await.clone()
    }

    pub fn read_api(&self) -> Arc<dyn ReadApi> {
        self.inner.read_api.clone()
    }

    pub fn rpc_client(&self) -> Option<&RpcClient> {
        self.inner.rpc_client.as_ref()
    }

    pub async fn market(&self, id: &str) -> Result<MarketDescriptor, StateError> {
        self.inner
            .config
            .read()
            .await
            .market(id)
            .cloned()
            .ok_or_else(|| StateError::UnknownMarket { id: id.to_string() })
    }

    pub async fn page_size(&self) -> usize {
        self.inner.config.read().await.polling.page_size
    }

    pub async fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.inner.config.read().await.polling.settle_delay_ms)
    }

    pub async fn readers(&self, market_id: &str) -> Option<Arc<MarketReaders>> {
        self.inner.readers.read().await.get(market_id).cloned()
    }

    /// Start order book and pool pollers for every deployed market.
    ///
    /// Markets that already have readers are left alone.
    pub async fn start_pollers(&self) {
        let config = self.config().await;
        let page_size = config.polling.page_size;
        let book_interval = Duration::from_secs(config.polling.orderbook_interval_secs);
        let pool_interval = Duration::from_secs(config.polling.pool_interval_secs);

        let mut readers = self.inner.readers.write().await;
        for market in config.markets.iter() {
            if !market.is_deployed() {
                tracing::info!(market = %market.id, "Market not deployed, skipping readers");
                continue;
            }
            if readers.contains_key(&market.id) {
                continue;
            }

            let order_book = {
                let api = self.inner.read_api.clone();
                let market = market.clone();
                PollingReader::spawn(format!("{}/orderbook", market.id), book_interval, move || {
                    let api = api.clone();
                    let market = market.clone();
                    async move { fetch_order_book(api.as_ref(), &market, page_size).await }
                })
            };

            let pool = market.pool().map(|pool_id| {
                let api = self.inner.read_api.clone();
                let pool_id = pool_id.as_str().to_string();
                PollingReader::spawn(format!("{}/pool", market.id), pool_interval, move || {
                    let api = api.clone();
                    let pool_id = pool_id.clone();
                    async move { fetch_pool(api.as_ref(), &pool_id, page_size).await }
                })
            });

            tracing::info!(
                market = %market.id,
                with_pool = pool.is_some(),
                "Started market readers"
            );
            readers.insert(market.id.clone(), Arc::new(MarketReaders::new(order_book, pool)));
        }
    }

    /// Position reader for `owner` on a running market, created on first use.
    ///
    /// Returns `None` when the market has no background readers.
    pub async fn position_reader(
        &self,
        market: &MarketDescriptor,
        owner: &str,
    ) -> Option<Arc<PositionReader>> {
        let readers = self.readers(&market.id).await?;
        if let Some(reader) = readers.positions(owner).await {
            return Some(reader);
        }

        let (page_size, interval) = {
            let config = self.inner.config.read().await;
            (
                config.polling.page_size,
                Duration::from_secs(config.polling.account_interval_secs),
            )
        };
        let mut positions = readers.positions.write().await;
        let reader = positions.entry(owner.to_string()).or_insert_with(|| {
            let api = self.inner.read_api.clone();
            let market = market.clone();
            let owner = owner.to_string();
            tracing::debug!(market = %market.id, owner = %owner, "Starting position reader");
            Arc::new(PollingReader::spawn(
                format!("{}/positions/{}", market.id, owner),
                interval,
                move || {
                    let api = api.clone();
                    let market = market.clone();
                    let owner = owner.clone();
                    async move { fetch_positions(api.as_ref(), &market, &owner, None, page_size).await }
                },
            ))
        });
        Some(reader.clone())
    }

    /// Stop every poller and wait for the tasks to exit.
    pub async fn stop_pollers(&self) {
        let drained: Vec<(String, Arc<MarketReaders>)> =
            self.inner.readers.write().await.drain().collect();
        for (market_id, readers) in drained {
            match Arc::try_unwrap(readers) {
                Ok(readers) => readers.shutdown().await,
                Err(shared) => shared.cancel().await,
            }
            tracing::info!(market = %market_id, "Stopped market readers");
        }
    }
}
