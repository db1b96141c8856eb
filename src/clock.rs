//! Time and randomness sources, injected into every service so tests can pin them.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};

/// Length of link tokens and session ids.
pub const TOKEN_LENGTH: usize = 32;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Supplies the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Supplies unguessable alphanumeric strings for tokens, session ids and filename prefixes.
pub trait TokenSource: Send + Sync {
    fn token(&self, len: usize) -> String;
}

/// Tokens drawn from the operating system CSPRNG.
pub struct OsTokens {
    rng: SystemRandom,
}

impl OsTokens {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for OsTokens {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for OsTokens {
    fn token(&self, len: usize) -> String {
        // Bytes at or above this bound would bias the modulo towards the start of the charset.
        let bound = (256 / ALPHANUMERIC.len() * ALPHANUMERIC.len()) as u8;

        let mut out = String::with_capacity(len);
        let mut buf = [0u8; 64];
        while out.len() < len {
            // Only fails when the OS entropy source is missing entirely.
            if self.rng.fill(&mut buf).is_err() {
                panic!("operating system random source is unavailable");
            }
            for &b in buf.iter().filter(|&&b| b < bound) {
                if out.len() == len {
                    break;
                }
                out.push(ALPHANUMERIC[b as usize % ALPHANUMERIC.len()] as char);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_tokens_are_alphanumeric_and_sized() {
        let tokens = OsTokens::new();
        for len in [0, 1, 16, 32, 100] {
            let token = tokens.token(len);
            assert_eq!(token.len(), len);
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_os_tokens_differ() {
        let tokens = OsTokens::new();
        assert_ne!(tokens.token(TOKEN_LENGTH), tokens.token(TOKEN_LENGTH));
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
