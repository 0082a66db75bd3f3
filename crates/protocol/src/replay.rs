// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sliding-window replay defense.
//!
//! Each receiver records the `(sender, nonce)` pairs of envelopes it has
//! accepted. A pair seen again inside the freshness window is a replay.
//! Entries age out at the window boundary, which bounds the set: only nonces
//! younger than the stale cutoff matter, older envelopes are already rejected
//! by the timestamp check.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

struct Window {
    seen: HashSet<(String, String)>,
    order: VecDeque<(DateTime<Utc>, (String, String))>,
}

pub struct ReplayGuard {
    window: Duration,
    inner: Mutex<Window>,
}

impl ReplayGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inner: Mutex::new(Window {
                seen: HashSet::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Record an accepted envelope. Returns `false` when the pair was already
    /// observed inside the window (a replay); the caller must reject.
    ///
    /// Only call this after every other verification step has passed: the
    /// window tracks accepted nonces, never rejected ones.
    pub fn accept(&self, sender_id: &str, nonce: &str) -> bool {
        let now = Utc::now();
        let mut inner = self.inner.lock();

        let cutoff = now - self.window;
        while let Some((seen_at, _)) = inner.order.front() {
            if *seen_at >= cutoff {
                break;
            }
            if let Some((_, key)) = inner.order.pop_front() {
                inner.seen.remove(&key);
            }
        }

        let key = (sender_id.to_string(), nonce.to_string());
        if !inner.seen.insert(key.clone()) {
            return false;
        }
        inner.order.push_back((now, key));
        true
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().seen.len()
    }
}
