//! Per-profile usage caps.
//!
//! Tracks requests over a sliding one-minute window and tokens per UTC day.
//! A cap of 0 means uncapped.

use crate::agent::ModelProfile;
use crate::core::{Address, Error, Result};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

const REQUEST_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct ProfileUsage {
    requests: VecDeque<Instant>,
    day: NaiveDate,
    tokens_today: u64,
}

impl ProfileUsage {
    fn new(day: NaiveDate) -> Self {
        Self {
            requests: VecDeque::new(),
            day,
            tokens_today: 0,
        }
    }

    fn roll(&mut self, now: Instant, today: NaiveDate) {
        while let Some(oldest) = self.requests.front() {
            if now.duration_since(*oldest) < REQUEST_WINDOW {
                break;
            }
            self.requests.pop_front();
        }
        if self.day != today {
            self.day = today;
            self.tokens_today = 0;
        }
    }
}

/// Usage counters for every profile seen by a coordinator.
#[derive(Debug, Default)]
pub struct UsageMeter {
    profiles: Mutex<HashMap<Address, ProfileUsage>>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `profile`, or fail with `RateLimited`.
    ///
    /// Nothing is recorded when the request is refused.
    pub async fn admit(&self, profile: &ModelProfile) -> Result<()> {
        let now = Instant::now();
        let today = today();
        let mut profiles = self.profiles.lock().await;
        let usage = profiles
            .entry(profile.address)
            .or_insert_with(|| ProfileUsage::new(today));
        usage.roll(now, today);

        let per_min = profile.max_requests_per_min;
        if per_min > 0 && usage.requests.len() as u64 >= per_min {
            return Err(Error::RateLimited {
                address: profile.address,
                reason: format!("{per_min} requests per minute reached"),
            });
        }
        let per_day = profile.max_tokens_per_day;
        if per_day > 0 && usage.tokens_today >= per_day {
            return Err(Error::RateLimited {
                address: profile.address,
                reason: format!("{per_day} tokens per day reached"),
            });
        }
        usage.requests.push_back(now);
        Ok(())
    }

    /// Add tokens consumed by a completed request.
    pub async fn record_tokens(&self, profile: &Address, tokens: u64) {
        let today = today();
        let mut profiles = self.profiles.lock().await;
        let usage = profiles
            .entry(*profile)
            .or_insert_with(|| ProfileUsage::new(today));
        usage.roll(Instant::now(), today);
        usage.tokens_today = usage.tokens_today.saturating_add(tokens);
    }

    /// Requests in the current window and tokens used today.
    pub async fn usage(&self, profile: &Address) -> (usize, u64) {
        let mut profiles = self.profiles.lock().await;
        match profiles.get_mut(profile) {
            Some(usage) => {
                usage.roll(Instant::now(), today());
                (usage.requests.len(), usage.tokens_today)
            }
            None => (0, 0),
        }
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
