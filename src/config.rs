//! Client-side configuration for the relay transport

use std::time::Duration;

use serde::Deserialize;

use crate::transport::RetryKind;

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8080/";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Linear backoff parameters for one retry band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryBand {
    pub base_ms: u64,
    pub step_ms: u64,
}

impl RetryBand {
    pub const fn new(base_ms: u64, step_ms: u64) -> Self {
        Self { base_ms, step_ms }
    }

    /// Delay before reconnect attempt `attempt` (1-indexed): `base + step * attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let step = self.step_ms.saturating_mul(u64::from(attempt));
        Duration::from_millis(self.base_ms.saturating_add(step))
    }
}

/// How the transport reconnects after a retryable close
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub fast: RetryBand,
    pub slow: RetryBand,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            fast: RetryBand::new(250, 250),
            slow: RetryBand::new(2_000, 2_000),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn with_fast(mut self, band: RetryBand) -> Self {
        self.fast = band;
        self
    }

    #[must_use]
    pub fn with_slow(mut self, band: RetryBand) -> Self {
        self.slow = band;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn band(&self, kind: RetryKind) -> RetryBand {
        match kind {
            RetryKind::Fast => self.fast,
            RetryKind::Slow => self.slow,
        }
    }
}

/// Settings for a [`SignalTransport`](crate::transport::SignalTransport).
///
/// Deserializable so a host can embed it in its own configuration file;
/// missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Relay WebSocket URL
    pub url: String,
    /// Credential sent as the `token` query parameter
    pub token: Option<String>,
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_URL)
    }
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_delay_is_base_plus_step_times_attempt() {
        let band = RetryBand::new(100, 50);
        assert_eq!(band.delay(1), Duration::from_millis(150));
        assert_eq!(band.delay(2), Duration::from_millis(200));
        assert_eq!(band.delay(10), Duration::from_millis(600));
    }

    #[test]
    fn band_delay_is_non_decreasing() {
        let band = ReconnectPolicy::default().slow;
        let delays: Vec<Duration> = (1..=20).map(|n| band.delay(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn band_delay_saturates() {
        let band = RetryBand::new(u64::MAX, u64::MAX);
        assert_eq!(band.delay(u32::MAX), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 1000);
        assert!(policy.fast.base_ms < policy.slow.base_ms);
        assert!(policy.fast.step_ms < policy.slow.step_ms);
        assert_eq!(policy.band(RetryKind::Fast), policy.fast);
        assert_eq!(policy.band(RetryKind::Slow), policy.slow);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{"url": "ws://relay.test/socket", "reconnect": {"max_attempts": 5}}"#;
        let config: TransportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.url, "ws://relay.test/socket");
        assert_eq!(config.token, None);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.fast, ReconnectPolicy::default().fast);
    }

    #[test]
    fn config_builders() {
        let config = TransportConfig::new("ws://relay.test/")
            .with_token("abc")
            .with_reconnect(ReconnectPolicy::default().with_fast(RetryBand::new(1, 2)));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.reconnect.fast, RetryBand::new(1, 2));
    }
}
