//! Bank Data Provider Adapter
//!
//! Reads accounts and booked transactions from a bank aggregation API over
//! REST. [`HttpBankDataProvider`] implements [`BankDataProvider`] with a
//! reqwest client, a bearer API key, a request timeout and a circuit breaker
//! that stops calling the provider after repeated failures.
//!
//! # Error Handling
//!
//! Provider responses are mapped to `PortError` variants:
//! - 404 -> `PortError::NotFound`
//! - 401/403 -> `PortError::Unauthorized`
//! - 429 -> `PortError::RateLimited`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - Timeouts -> `PortError::Timeout`
//! - Other -> `PortError::Internal`
//!
//! Retries are the caller's concern; the adapter makes exactly one request
//! per call.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use core_kernel::{
    AdapterHealth, BuildingId, CircuitBreakerConfig, DomainPort, HealthCheckResult,
    HealthCheckable, PortError,
};

/// A bank account the provider exposes for a building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub iban: Option<String>,
    pub name: Option<String>,
}

/// A booked transaction as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTransaction {
    pub id: String,
    /// Signed amount in minor units; credits are positive
    pub amount_cents: i64,
    /// ISO 4217 code
    pub currency: String,
    pub counterpart_iban: Option<String>,
    pub counterpart_name: Option<String>,
    pub booking_date: NaiveDate,
    pub description: Option<String>,
}

/// Port for the bank aggregation service
#[async_trait]
pub trait BankDataProvider: DomainPort + HealthCheckable {
    /// Accounts linked to a building
    async fn list_accounts(&self, building_id: BuildingId) -> Result<Vec<BankAccount>, PortError>;

    /// Transactions booked on an account between `from` and `to`, inclusive
    async fn list_transactions(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderTransaction>, PortError>;
}

/// Configuration for the HTTP provider adapter
#[derive(Debug, Clone)]
pub struct BankApiConfig {
    /// Base URL of the provider API (e.g., "https://bank-data.example.com/v1")
    pub base_url: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for BankApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: 30,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Circuit breaker state for fault tolerance
#[derive(Debug)]
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    is_open: AtomicBool,
    last_failure_time: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            last_failure_time: RwLock::new(None),
        }
    }

    async fn is_available(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        // Half-open once the reset timeout has elapsed
        let last_failure = self.last_failure_time.read().await;
        if let Some(time) = *last_failure {
            if time.elapsed() > Duration::from_secs(self.config.reset_timeout_secs) {
                return true;
            }
        }

        false
    }

    fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        let success = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
        if success >= self.config.success_threshold as u64 {
            self.is_open.store(false, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    async fn record_failure(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.failure_threshold as u64 {
            self.is_open.store(true, Ordering::Relaxed);
            *self.last_failure_time.write().await = Some(Instant::now());
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<BankAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<ProviderTransaction>,
}

const ADAPTER_ID: &str = "http-bank-data-provider";

/// REST adapter for the bank aggregation API
#[derive(Debug)]
pub struct HttpBankDataProvider {
    config: BankApiConfig,
    client: Client,
    circuit_breaker: Option<CircuitBreaker>,
}

impl HttpBankDataProvider {
    pub fn new(config: BankApiConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortError::Internal {
                message: "failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        let circuit_breaker = config.circuit_breaker.clone().map(CircuitBreaker::new);

        Ok(Self {
            config,
            client,
            circuit_breaker,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Checks if the circuit breaker is open (blocking requests)
    pub async fn is_circuit_open(&self) -> bool {
        match &self.circuit_breaker {
            Some(cb) => !cb.is_available().await,
            None => false,
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PortError> {
        if self.is_circuit_open().await {
            return Err(PortError::ServiceUnavailable {
                service: "bank data provider (circuit open)".to_string(),
            });
        }

        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let result = self.send(&url, query).await;

        if let Some(cb) = &self.circuit_breaker {
            match &result {
                Ok(_) => cb.record_success(),
                Err(e) if e.is_transient() => cb.record_failure().await,
                Err(_) => {}
            }
        }
        result
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, PortError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e, self.config.timeout_secs * 1000))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!(url = %url, status = status.as_u16(), "bank provider request failed");
            return Err(map_status(status, url, retry_after));
        }

        response.json::<T>().await.map_err(|e| PortError::Internal {
            message: format!("invalid response body from {}", url),
            source: Some(Box::new(e)),
        })
    }
}

/// Maps a non-success HTTP status to a port error
pub fn map_status(status: StatusCode, resource: &str, retry_after_secs: Option<u64>) -> PortError {
    match status {
        StatusCode::NOT_FOUND => PortError::not_found("BankResource", resource),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized {
            message: format!("provider rejected credentials for {}", resource),
        },
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: retry_after_secs.unwrap_or(60),
        },
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: format!("bank data provider ({})", s.as_u16()),
        },
        s => PortError::internal(format!("unexpected status {} from {}", s.as_u16(), resource)),
    }
}

fn map_transport_error(url: &str, err: reqwest::Error, timeout_ms: u64) -> PortError {
    if err.is_timeout() {
        PortError::Timeout {
            operation: format!("GET {}", url),
            duration_ms: timeout_ms,
        }
    } else if err.is_connect() {
        PortError::Connection {
            message: format!("cannot reach {}", url),
            source: Some(Box::new(err)),
        }
    } else {
        PortError::Internal {
            message: format!("request to {} failed", url),
            source: Some(Box::new(err)),
        }
    }
}

impl DomainPort for HttpBankDataProvider {}

#[async_trait]
impl HealthCheckable for HttpBankDataProvider {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        if self.is_circuit_open().await {
            return HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Degraded,
                latency_ms: 0,
                message: Some("Circuit breaker is open".to_string()),
                checked_at: Utc::now(),
            };
        }

        let result = self.get::<serde_json::Value>("health", &[]).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(e.to_string())),
        };
        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl BankDataProvider for HttpBankDataProvider {
    #[instrument(skip(self))]
    async fn list_accounts(&self, building_id: BuildingId) -> Result<Vec<BankAccount>, PortError> {
        let response: AccountsResponse = self
            .get("accounts", &[("reference", building_id.as_uuid().to_string())])
            .await?;
        debug!(count = response.accounts.len(), "accounts listed");
        Ok(response.accounts)
    }

    #[instrument(skip(self))]
    async fn list_transactions(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderTransaction>, PortError> {
        let response: TransactionsResponse = self
            .get(
                &format!("accounts/{}/transactions", account_id),
                &[
                    ("date_from", from.format("%Y-%m-%d").to_string()),
                    ("date_to", to.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;
        debug!(count = response.transactions.len(), "transactions listed");
        Ok(response.transactions)
    }
}

/// Mock implementation of BankDataProvider for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Feed {
        accounts: HashMap<BuildingId, Vec<BankAccount>>,
        transactions: HashMap<String, Vec<ProviderTransaction>>,
        /// Remaining injected failures per account; `None` fails forever
        failures: HashMap<String, Option<u32>>,
        calls: HashMap<String, u32>,
        fail_accounts_listing: bool,
    }

    /// In-memory provider with failure injection
    #[derive(Debug, Default, Clone)]
    pub struct MockBankDataProvider {
        feed: Arc<RwLock<Feed>>,
    }

    impl MockBankDataProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_account(
            &self,
            building_id: BuildingId,
            account: BankAccount,
            transactions: Vec<ProviderTransaction>,
        ) {
            let mut feed = self.feed.write().await;
            feed.transactions
                .entry(account.id.clone())
                .or_default()
                .extend(transactions);
            feed.accounts.entry(building_id).or_default().push(account);
        }

        pub async fn push_transactions(&self, account_id: &str, transactions: Vec<ProviderTransaction>) {
            self.feed
                .write()
                .await
                .transactions
                .entry(account_id.to_string())
                .or_default()
                .extend(transactions);
        }

        /// Fails the next `times` transaction listings of an account with a
        /// transient error, or every listing when `times` is `None`
        pub async fn fail_account(&self, account_id: &str, times: Option<u32>) {
            self.feed
                .write()
                .await
                .failures
                .insert(account_id.to_string(), times);
        }

        /// Makes account listing fail with a non-transient error
        pub async fn fail_accounts_listing(&self) {
            self.feed.write().await.fail_accounts_listing = true;
        }

        /// Number of transaction listings attempted for an account
        pub async fn calls(&self, account_id: &str) -> u32 {
            self.feed.read().await.calls.get(account_id).copied().unwrap_or(0)
        }
    }

    impl DomainPort for MockBankDataProvider {}

    #[async_trait]
    impl HealthCheckable for MockBankDataProvider {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-bank-data-provider".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BankDataProvider for MockBankDataProvider {
        async fn list_accounts(&self, building_id: BuildingId) -> Result<Vec<BankAccount>, PortError> {
            let feed = self.feed.read().await;
            if feed.fail_accounts_listing {
                return Err(PortError::Unauthorized {
                    message: "mock provider rejects credentials".to_string(),
                });
            }
            Ok(feed.accounts.get(&building_id).cloned().unwrap_or_default())
        }

        async fn list_transactions(
            &self,
            account_id: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<ProviderTransaction>, PortError> {
            let mut feed = self.feed.write().await;
            *feed.calls.entry(account_id.to_string()).or_default() += 1;

            if let Some(remaining) = feed.failures.get_mut(account_id) {
                match remaining {
                    None => {
                        return Err(PortError::ServiceUnavailable {
                            service: "mock bank".to_string(),
                        })
                    }
                    Some(0) => {}
                    Some(n) => {
                        *n -= 1;
                        return Err(PortError::ServiceUnavailable {
                            service: "mock bank".to_string(),
                        });
                    }
                }
            }

            Ok(feed
                .transactions
                .get(account_id)
                .map(|txs| {
                    txs.iter()
                        .filter(|t| t.booking_date >= from && t.booking_date <= to)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }
}
