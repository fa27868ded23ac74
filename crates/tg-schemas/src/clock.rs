use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Source of the current UTC instant.
///
/// Both gates read time exclusively through this trait so that a single
/// clock instance keeps them UTC-consistent, and so replay/tests can pin
/// time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock handle shared between the drawdown guard and the session gate.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock. Production default.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for replay and scenario tests.
///
/// Cloning shares the underlying instant: advancing one clone advances all
/// of them.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(at)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Calendar-minute bucket (minutes since the Unix epoch) for `ts`.
///
/// Used as the TTL key of the market-hours cache.
pub fn minute_bucket(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(60)
}
