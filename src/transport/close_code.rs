use std::fmt;
use std::ops::Range;

/// Codes the relay uses to ask for a quick reconnect
const FAST_RETRY: Range<u16> = 4200..4299;
/// Codes the relay uses to ask the client to back off
const SLOW_RETRY: Range<u16> = 4100..4199;
/// Codes the relay uses when the credential token is stale
const CREDENTIAL_EXPIRED: Range<u16> = 4000..4099;

/// WebSocket close code as reported by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(u16);

impl CloseCode {
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// No close code in the close frame. Fatal: the transport does not
    /// reconnect.
    pub const NO_STATUS: CloseCode = CloseCode(1005);
    /// Connection dropped without a close frame, or a read/write error.
    ///
    /// Fatal like every code outside the relay's 4000..4299 bands, so a lost
    /// TCP connection ends the transport. Hosts that want to ride out network
    /// drops should watch for [`TransportFailure::FatalClose`] and reconnect.
    ///
    /// [`TransportFailure::FatalClose`]: super::TransportFailure::FatalClose
    pub const ABNORMAL: CloseCode = CloseCode(1006);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub fn classify(self) -> CloseClass {
        if FAST_RETRY.contains(&self.0) {
            CloseClass::Retry(RetryKind::Fast)
        } else if SLOW_RETRY.contains(&self.0) {
            CloseClass::Retry(RetryKind::Slow)
        } else if CREDENTIAL_EXPIRED.contains(&self.0) {
            CloseClass::CredentialExpired
        } else {
            CloseClass::Fatal
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which backoff parameters a retryable close uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryKind {
    Fast,
    Slow,
}

/// What the transport does after a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// reconnect with the band's backoff
    Retry(RetryKind),
    /// wait for `refresh(token)` before reconnecting
    CredentialExpired,
    /// give up
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_band() {
        assert_eq!(CloseCode::new(4250).classify(), CloseClass::Retry(RetryKind::Fast));
        assert_eq!(CloseCode::new(4200).classify(), CloseClass::Retry(RetryKind::Fast));
        assert_eq!(CloseCode::new(4298).classify(), CloseClass::Retry(RetryKind::Fast));
    }

    #[test]
    fn slow_band() {
        assert_eq!(CloseCode::new(4150).classify(), CloseClass::Retry(RetryKind::Slow));
        assert_eq!(CloseCode::new(4100).classify(), CloseClass::Retry(RetryKind::Slow));
    }

    #[test]
    fn credential_band() {
        assert_eq!(CloseCode::new(4050).classify(), CloseClass::CredentialExpired);
        assert_eq!(CloseCode::new(4000).classify(), CloseClass::CredentialExpired);
    }

    #[test]
    fn band_upper_bounds_are_exclusive() {
        assert_eq!(CloseCode::new(4299).classify(), CloseClass::Fatal);
        assert_eq!(CloseCode::new(4199).classify(), CloseClass::Fatal);
        assert_eq!(CloseCode::new(4099).classify(), CloseClass::Fatal);
    }

    #[test]
    fn standard_codes_are_fatal() {
        assert_eq!(CloseCode::NORMAL.classify(), CloseClass::Fatal);
        assert_eq!(CloseCode::NO_STATUS.classify(), CloseClass::Fatal);
        assert_eq!(CloseCode::ABNORMAL.classify(), CloseClass::Fatal);
        assert_eq!(CloseCode::new(4300).classify(), CloseClass::Fatal);
    }

    #[test]
    fn close_code_display() {
        assert_eq!(format!("{}", CloseCode::new(4250)), "4250");
    }
}
