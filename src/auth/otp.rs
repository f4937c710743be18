//! Short-lived, single-use codes gating admin self-registration.
//!
//! Codes live in process memory only, so a deployment with several server
//! processes needs sticky routing between `send-otp` and `register`.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use rand::Rng;

struct PendingCode {
    code: String,
    expires_at: Instant,
}

pub struct OtpStore {
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a fresh 6-digit code for `email`, replacing any pending one.
    pub fn issue(&self, email: &str) -> String {
        let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        self.insert(email, code.clone());
        code
    }

    fn insert(&self, email: &str, code: String) {
        let now = Instant::now();
        let mut pending = self.lock();
        pending.retain(|_, p| p.expires_at > now);
        pending.insert(
            email.to_string(),
            PendingCode {
                code,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Remove the pending code for `email` and return it if still valid.
    ///
    /// The entry is gone after this call whether or not the caller's code
    /// matches.
    pub fn consume(&self, email: &str) -> Option<String> {
        let entry = self.lock().remove(email)?;
        (entry.expires_at > Instant::now()).then_some(entry.code)
    }

    pub fn discard(&self, email: &str) {
        self.lock().remove(email);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingCode>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Compare a submitted code against the pending one without an early exit
/// on the first differing byte.
pub fn codes_match(expected: &str, submitted: &str) -> bool {
    let (a, b) = (expected.as_bytes(), submitted.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
