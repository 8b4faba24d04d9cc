//! Client Facades
//!
//! `PublicApiClient` wires the blocking REST adapter into the threaded
//! subscription engine; `AsyncPublicApiClient` wires the async adapter into
//! the pull-based price stream. Both expose the direct request/response calls
//! the engine is built on and hand out order tracking handles.

use std::sync::Arc;

use crate::application::orders::{AsyncNewOrder, NewOrder};
use crate::application::polling::{
    OrderSubscriptionManager, PriceSubscriptionManager, SchedulerOptions,
};
use crate::application::ports::{AsyncOrderGateway, AsyncQuoteFetcher, OrderGateway, QuoteFetcher};
use crate::application::stream::AsyncPriceStream;
use crate::domain::instrument::InstrumentRef;
use crate::domain::order::Order;
use crate::domain::quote::Quote;
use crate::error::SdkError;
use crate::infrastructure::config::SdkConfig;
use crate::infrastructure::http::{BlockingHttpClient, HttpClient};
use crate::infrastructure::metrics;

// =============================================================================
// Blocking client
// =============================================================================

/// Blocking client with threaded price and order subscriptions.
///
/// Dropping the client stops both schedulers.
pub struct PublicApiClient {
    account_id: String,
    http: Arc<BlockingHttpClient>,
    prices: PriceSubscriptionManager,
    orders: Arc<OrderSubscriptionManager>,
}

impl PublicApiClient {
    /// Create a client from explicit configuration.
    pub fn new(config: &SdkConfig) -> Result<Self, SdkError> {
        metrics::register_metrics();

        let http = Arc::new(BlockingHttpClient::new(config)?);
        let options = SchedulerOptions::from_settings(&config.scheduler);
        let prices = PriceSubscriptionManager::with_fetcher(
            Arc::clone(&http) as Arc<dyn QuoteFetcher>,
            options,
        );
        let orders = Arc::new(OrderSubscriptionManager::with_gateway(
            Arc::clone(&http) as Arc<dyn OrderGateway>,
            options,
        ));

        tracing::info!(
            account_id = %config.account_id,
            base_url = %config.api.base_url,
            "Public API client created"
        );

        Ok(Self {
            account_id: config.account_id.clone(),
            http,
            prices,
            orders,
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, SdkError> {
        Self::new(&SdkConfig::from_env()?)
    }

    /// Default account.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Fetch the latest quotes.
    pub fn get_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, SdkError> {
        Ok(self.http.fetch_quotes(instruments)?)
    }

    /// Fetch an order from `account_id` (default account when `None`).
    pub fn get_order(&self, order_id: &str, account_id: Option<&str>) -> Result<Order, SdkError> {
        Ok(self
            .http
            .fetch_order(order_id, account_id.unwrap_or(&self.account_id))?)
    }

    /// Request cancellation of an order.
    pub fn cancel_order(&self, order_id: &str, account_id: Option<&str>) -> Result<(), SdkError> {
        Ok(self
            .http
            .cancel_order(order_id, account_id.unwrap_or(&self.account_id))?)
    }

    /// Quote subscription manager.
    #[must_use]
    pub const fn prices(&self) -> &PriceSubscriptionManager {
        &self.prices
    }

    /// Order subscription manager.
    #[must_use]
    pub fn orders(&self) -> &OrderSubscriptionManager {
        &self.orders
    }

    /// Handle on an existing order, with update subscriptions enabled.
    #[must_use]
    pub fn track_order(&self, order_id: &str, account_id: Option<&str>) -> NewOrder {
        NewOrder::new(
            order_id,
            account_id.unwrap_or(&self.account_id),
            Arc::clone(&self.http) as Arc<dyn OrderGateway>,
        )
        .with_subscriptions(Arc::clone(&self.orders))
    }

    /// Stop both schedulers. Subscriptions are kept.
    pub fn close(&self) {
        self.prices.stop();
        self.orders.stop();
        tracing::info!(account_id = %self.account_id, "Public API client closed");
    }
}

impl std::fmt::Debug for PublicApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicApiClient")
            .field("account_id", &self.account_id)
            .field("prices_running", &self.prices.is_running())
            .field("orders_running", &self.orders.is_running())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Async client
// =============================================================================

/// Async client with a pull-based price stream.
#[derive(Debug)]
pub struct AsyncPublicApiClient {
    account_id: String,
    http: Arc<HttpClient>,
    price_stream: AsyncPriceStream,
}

impl AsyncPublicApiClient {
    /// Create a client from explicit configuration.
    pub fn new(config: &SdkConfig) -> Result<Self, SdkError> {
        metrics::register_metrics();

        let http = Arc::new(HttpClient::new(config)?);
        let price_stream = AsyncPriceStream::new(
            Arc::clone(&http) as Arc<dyn AsyncQuoteFetcher>,
            config.stream.interval,
        );

        Ok(Self {
            account_id: config.account_id.clone(),
            http,
            price_stream,
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, SdkError> {
        Self::new(&SdkConfig::from_env()?)
    }

    /// Default account.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Fetch the latest quotes.
    pub async fn get_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, SdkError> {
        Ok(self.http.fetch_quotes(instruments).await?)
    }

    /// Fetch an order from `account_id` (default account when `None`).
    pub async fn get_order(
        &self,
        order_id: &str,
        account_id: Option<&str>,
    ) -> Result<Order, SdkError> {
        Ok(self
            .http
            .fetch_order(order_id, account_id.unwrap_or(&self.account_id))
            .await?)
    }

    /// Request cancellation of an order.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        account_id: Option<&str>,
    ) -> Result<(), SdkError> {
        Ok(self
            .http
            .cancel_order(order_id, account_id.unwrap_or(&self.account_id))
            .await?)
    }

    /// Pull-based price stream.
    #[must_use]
    pub const fn price_stream(&self) -> &AsyncPriceStream {
        &self.price_stream
    }

    /// Handle on an existing order.
    #[must_use]
    pub fn track_order(&self, order_id: &str, account_id: Option<&str>) -> AsyncNewOrder {
        AsyncNewOrder::new(
            order_id,
            account_id.unwrap_or(&self.account_id),
            Arc::clone(&self.http) as Arc<dyn AsyncOrderGateway>,
        )
    }

    /// Drop every stream subscription; open streams end at their next step.
    pub async fn close(&self) {
        self.price_stream.unsubscribe_all().await;
        tracing::info!(account_id = %self.account_id, "Async Public API client closed");
    }
}
