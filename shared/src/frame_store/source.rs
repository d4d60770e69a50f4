//! Remote page and image sources.
//!
//! Every request made through an [`HttpSource`] is charged to its
//! [`RequestBudget`]; once the budget is spent all further requests fail
//! with [`FrameStoreError::BudgetExhausted`]. Each request is followed by a
//! fixed delay to keep the load on the remote server low.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::FrameStoreError;

/// Something that can fetch index pages and image bytes by URL.
pub trait PageSource {
    /// Fetch a URL as text.
    fn fetch_text(&mut self, url: &str) -> Result<String, FrameStoreError>;

    /// Fetch a URL as raw bytes.
    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, FrameStoreError>;
}

/// Settings for a [`RequestBudget`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of HTTP requests per session.
    /// Default: 1000
    pub max_requests: usize,

    /// Pause after every request, in seconds.
    /// Default: 1.0
    pub delay_secs: f64,

    /// Per-request timeout, in seconds.
    /// Default: 30.0
    pub timeout_secs: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            delay_secs: 1.0,
            timeout_secs: 30.0,
        }
    }
}

impl FetchConfig {
    /// Pause after every request; negative values mean no pause.
    pub fn delay(&self) -> Result<Duration, FrameStoreError> {
        seconds("delay_secs", self.delay_secs, 0.0)
    }

    /// Per-request timeout, at least one second.
    pub fn timeout(&self) -> Result<Duration, FrameStoreError> {
        seconds("timeout_secs", self.timeout_secs, 1.0)
    }
}

fn seconds(field: &'static str, value: f64, min: f64) -> Result<Duration, FrameStoreError> {
    Duration::try_from_secs_f64(value.max(min))
        .map_err(|_| FrameStoreError::InvalidDuration { field, value })
}

/// Caps the number of requests a session may make.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    max_requests: usize,
    delay: Duration,
    used: usize,
}

impl RequestBudget {
    pub fn new(max_requests: usize, delay: Duration) -> Self {
        Self {
            max_requests,
            delay,
            used: 0,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, FrameStoreError> {
        Ok(Self::new(config.max_requests, config.delay()?))
    }

    /// Account for one request, failing once `max_requests` have been made.
    pub fn charge(&mut self) -> Result<(), FrameStoreError> {
        if self.used >= self.max_requests {
            return Err(FrameStoreError::BudgetExhausted {
                max_requests: self.max_requests,
            });
        }
        self.used += 1;
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.max_requests - self.used
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Blocking HTTP source backed by `reqwest`.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    budget: RequestBudget,
}

impl HttpSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FrameStoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout()?)
            .build()
            .map_err(|e| FrameStoreError::Http {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            budget: RequestBudget::from_config(config)?,
        })
    }

    pub fn budget(&self) -> &RequestBudget {
        &self.budget
    }

    fn get(&mut self, url: &str) -> Result<reqwest::blocking::Response, FrameStoreError> {
        self.budget.charge()?;
        debug!("GET {} ({} requests used)", url, self.budget.used());

        let response = self.client.get(url).send().map_err(|e| FrameStoreError::Http {
            url: url.to_string(),
            message: e.to_string(),
        });
        thread::sleep(self.budget.delay());
        let response = response?;

        if !response.status().is_success() {
            return Err(FrameStoreError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl PageSource for HttpSource {
    fn fetch_text(&mut self, url: &str) -> Result<String, FrameStoreError> {
        self.get(url)?.text().map_err(|e| FrameStoreError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, FrameStoreError> {
        let bytes = self.get(url)?.bytes().map_err(|e| FrameStoreError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Serves pre-loaded responses from memory, charging the same budget as
/// [`HttpSource`]. Unknown URLs fail with a 404 status.
#[derive(Debug, Default)]
pub struct MemorySource {
    responses: HashMap<String, Vec<u8>>,
    budget: Option<RequestBudget>,
    requests: Vec<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: RequestBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.responses.insert(url.into(), body.into());
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    fn get(&mut self, url: &str) -> Result<&[u8], FrameStoreError> {
        if let Some(budget) = self.budget.as_mut() {
            budget.charge()?;
        }
        trace!("memory GET {}", url);
        self.requests.push(url.to_string());
        self.responses
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| FrameStoreError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

impl PageSource for MemorySource {
    fn fetch_text(&mut self, url: &str) -> Result<String, FrameStoreError> {
        Ok(String::from_utf8_lossy(self.get(url)?).into_owned())
    }

    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, FrameStoreError> {
        Ok(self.get(url)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allows_exactly_max_requests() {
        let mut budget = RequestBudget::new(2, Duration::ZERO);
        assert!(budget.charge().is_ok());
        assert!(budget.charge().is_ok());
        assert_eq!(budget.remaining(), 0);
        assert!(matches!(
            budget.charge(),
            Err(FrameStoreError::BudgetExhausted { max_requests: 2 })
        ));
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn test_memory_source_serves_and_records() {
        let mut source = MemorySource::new();
        source.insert("http://a/1", "hello");

        assert_eq!(source.fetch_text("http://a/1").unwrap(), "hello");
        assert!(matches!(
            source.fetch_bytes("http://a/2"),
            Err(FrameStoreError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(source.requests(), ["http://a/1", "http://a/2"]);
    }

    #[test]
    fn test_memory_source_respects_budget() {
        let mut source = MemorySource::new().with_budget(RequestBudget::new(1, Duration::ZERO));
        source.insert("http://a/1", "x");

        assert!(source.fetch_text("http://a/1").is_ok());
        assert!(matches!(
            source.fetch_text("http://a/1"),
            Err(FrameStoreError::BudgetExhausted { .. })
        ));
    }

    #[test]
    fn test_default_fetch_config() {
        let config = FetchConfig::default();
        let budget = RequestBudget::from_config(&config).unwrap();
        assert_eq!(budget.remaining(), 1000);
        assert_eq!(budget.delay(), Duration::from_secs(1));
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_out_of_range_durations_are_errors() {
        let config = FetchConfig {
            delay_secs: f64::INFINITY,
            timeout_secs: 1e300,
            ..Default::default()
        };

        assert!(matches!(
            RequestBudget::from_config(&config),
            Err(FrameStoreError::InvalidDuration { field: "delay_secs", .. })
        ));
        assert!(matches!(
            HttpSource::new(&config),
            Err(FrameStoreError::InvalidDuration { field: "timeout_secs", .. })
        ));

        let clamped = FetchConfig {
            delay_secs: -5.0,
            timeout_secs: 0.0,
            ..Default::default()
        };
        assert_eq!(clamped.delay().unwrap(), Duration::ZERO);
        assert_eq!(clamped.timeout().unwrap(), Duration::from_secs(1));
    }
}
