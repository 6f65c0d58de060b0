//! Scriptable collaborators for testing.
//!
//! Every mock counts its calls so tests can assert that a stage was (or was
//! not) reached. Do not use in production.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::clients::{
    BarcodeDatabase, Completion, CompletionClient, CompletionRequest, LivenessProbe,
    ProductRecord, ScrapeEnvelope, ScrapeRequest, Scraper,
};
use crate::error::ClientError;
use crate::store::{ProductStore, ScoredProduct, StoreError, StoreResult};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Barcode database answering from a fixed table. Unknown codes miss.
#[derive(Default)]
pub struct MockBarcodeDatabase {
    answers: HashMap<String, Result<Option<ProductRecord>, ClientError>>,
    calls: AtomicUsize,
    looked_up: Mutex<Vec<String>>,
}

impl MockBarcodeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `code` with a record built from `product`.
    #[must_use]
    pub fn with_record(mut self, code: &str, product: serde_json::Value) -> Self {
        self.answers
            .insert(code.to_string(), Ok(Some(ProductRecord::new(product))));
        self
    }

    /// Fail lookups of `code`.
    #[must_use]
    pub fn with_failure(mut self, code: &str, error: ClientError) -> Self {
        self.answers.insert(code.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Codes looked up so far, in call order.
    pub fn looked_up(&self) -> Vec<String> {
        lock(&self.looked_up).clone()
    }
}

#[async_trait]
impl BarcodeDatabase for MockBarcodeDatabase {
    async fn lookup(&self, code: &str) -> Result<Option<ProductRecord>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.looked_up).push(code.to_string());
        self.answers.get(code).cloned().unwrap_or(Ok(None))
    }
}

/// Completion client returning one canned answer for every request.
pub struct MockCompletionClient {
    answer: Result<Completion, ClientError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    fn with_answer(answer: Result<Completion, ClientError>) -> Self {
        Self {
            answer,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` as the first choice.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_answer(Ok(Completion::text(text)))
    }

    /// Reply with an envelope that carries no content.
    pub fn empty() -> Self {
        Self::with_answer(Ok(Completion::default()))
    }

    pub fn failing(error: ClientError) -> Self {
        Self::with_answer(Err(error))
    }

    /// Sleep before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    /// User prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.requests)
            .last()
            .and_then(|r| r.user_prompt().map(str::to_string))
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);
        pause(self.delay).await;
        self.answer.clone()
    }
}

/// Scraper returning one canned envelope.
pub struct MockScraper {
    answer: Result<ScrapeEnvelope, ClientError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl MockScraper {
    /// Answer with the raw envelope `raw`.
    pub fn returning(raw: serde_json::Value) -> Self {
        Self {
            answer: Ok(ScrapeEnvelope::new(raw)),
            delay: None,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Successful envelope with an `html` payload.
    pub fn html(body: &str) -> Self {
        Self::returning(serde_json::json!({ "success": true, "data": { "html": body } }))
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            answer: Err(error),
            ..Self::returning(serde_json::Value::Null)
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion (not cancelled mid-flight).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape(&self, _request: &ScrapeRequest) -> Result<ScrapeEnvelope, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Liveness probe answering every URL the same way.
pub struct MockLivenessProbe {
    answer: Result<u16, ClientError>,
    calls: AtomicUsize,
}

impl MockLivenessProbe {
    pub fn status(status: u16) -> Self {
        Self {
            answer: Ok(status),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            answer: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProbe for MockLivenessProbe {
    async fn probe(&self, _url: &Url) -> Result<u16, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Product store whose writes always fail.
#[derive(Default)]
pub struct FailingProductStore {
    calls: AtomicUsize,
}

impl FailingProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductStore for FailingProductStore {
    async fn upsert(&self, _product: &ScoredProduct) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn find(&self, _upc: &str) -> StoreResult<Option<ScoredProduct>> {
        Err(StoreError::Connection("connection refused".into()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
