//! Async REST adapter.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::{QuotesRequest, QuotesResponse};
use super::{USER_AGENT, check_status, decode_body, map_reqwest_error, order_path, quotes_path};
use crate::application::ports::{AsyncOrderGateway, AsyncQuoteFetcher, FetchError};
use crate::domain::instrument::InstrumentRef;
use crate::domain::order::Order;
use crate::domain::quote::Quote;
use crate::infrastructure::config::SdkConfig;

/// Async HTTP client for the REST API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    access_token: String,
    base_url: String,
    account_id: String,
}

impl HttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &SdkConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.api.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            access_token: config.credentials.access_token().to_string(),
            base_url: config.api.base_url.clone(),
            account_id: config.account_id.clone(),
        })
    }

    /// Default account used for quotes.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let request = self.client.get(format!("{}{path}", self.base_url));
        let (status, body) = self.send(request, "GET", path).await?;
        decode_body(status, &body)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        let request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body);
        let (status, body) = self.send(request, "POST", path).await?;
        decode_body(status, &body)
    }

    async fn delete(&self, path: &str) -> Result<(), FetchError> {
        let request = self.client.delete(format!("{}{path}", self.base_url));
        let (status, body) = self.send(request, "DELETE", path).await?;
        check_status(status, &body)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        method: &'static str,
        path: &str,
    ) -> Result<(StatusCode, String), FetchError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| map_reqwest_error(&e))?;
        tracing::debug!(method, path, status = status.as_u16(), "REST call completed");
        Ok((status, body))
    }
}

#[async_trait]
impl AsyncQuoteFetcher for HttpClient {
    async fn fetch_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, FetchError> {
        let response: QuotesResponse = self
            .post(&quotes_path(&self.account_id), &QuotesRequest { instruments })
            .await?;
        Ok(response.quotes)
    }
}

#[async_trait]
impl AsyncOrderGateway for HttpClient {
    async fn fetch_order(&self, order_id: &str, account_id: &str) -> Result<Order, FetchError> {
        self.get(&order_path(account_id, order_id)).await
    }

    async fn cancel_order(&self, order_id: &str, account_id: &str) -> Result<(), FetchError> {
        self.delete(&order_path(account_id, order_id)).await
    }
}
