//! One-time passcodes for phone verification
//!
//! Entries are keyed by phone number and expire after a fixed lifetime. The store sits behind a
//! trait so several instances can share an external one.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpState {
    /// Code sent, not yet confirmed. `failures` counts wrong guesses so far.
    Sent { code: String, failures: u32 },
    Verified,
}

impl OtpState {
    pub fn sent(code: impl Into<String>) -> Self { Self::Sent { code: code.into(), failures: 0 } }
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Stores `state` with a fresh lifetime.
    async fn put(&self, phone: &str, state: OtpState);
    /// Replaces the state of a live entry without extending its lifetime. No-op if there is none.
    async fn replace(&self, phone: &str, state: OtpState);
    /// Live entry for `phone`; expired entries read as absent.
    async fn get(&self, phone: &str) -> Option<OtpState>;
    async fn remove(&self, phone: &str);
}

pub fn generate_code() -> String { rand::thread_rng().gen_range(100_000..1_000_000).to_string() }

pub struct MemoryOtpStore {
    entries: DashMap<String, (OtpState, Instant)>,
    ttl: Duration,
}

impl MemoryOtpStore {
    pub fn new(ttl: Duration) -> Self { Self { entries: DashMap::new(), ttl } }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, (_, expires)| *expires > now);
        before - self.entries.len()
    }

    /// Drops expired entries every `every` until the process exits.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                let purged = self.purge_expired();
                if purged > 0 { tracing::debug!(purged, "expired otp entries removed"); }
            }
        });
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, phone: &str, state: OtpState) {
        self.entries.insert(phone.to_string(), (state, Instant::now() + self.ttl));
    }

    async fn replace(&self, phone: &str, state: OtpState) {
        if let Some(mut entry) = self.entries.get_mut(phone) { entry.0 = state; }
    }

    async fn get(&self, phone: &str) -> Option<OtpState> {
        let live = self.entries.get(phone).and_then(|e| (e.1 > Instant::now()).then(|| e.0.clone()));
        if live.is_none() { self.entries.remove(phone); }
        live
    }

    async fn remove(&self, phone: &str) { self.entries.remove(phone); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire() {
        let store = MemoryOtpStore::new(Duration::from_millis(20));
        store.put("+911111111111", OtpState::sent("123456")).await;
        assert_eq!(store.get("+911111111111").await, Some(OtpState::sent("123456")));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("+911111111111").await, None);
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn replace_keeps_the_original_deadline() {
        let store = MemoryOtpStore::new(Duration::from_millis(40));
        store.put("+912", OtpState::sent("111111")).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        store.replace("+912", OtpState::Sent { code: "111111".into(), failures: 1 }).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(store.get("+912").await, None);

        store.replace("+913", OtpState::Verified).await;
        assert_eq!(store.get("+913").await, None);
    }

    #[test]
    fn codes_have_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
