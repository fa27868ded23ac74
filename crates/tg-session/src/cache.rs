use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::LiquidityCheck;

/// Liquidity probe results for the current calendar minute.
///
/// Keyed by (symbol, minute bucket). Strict TTL: the first access in a new
/// bucket drops everything from older buckets. Within a bucket the oldest
/// insertion is evicted once `capacity` is exceeded.
pub(crate) struct MarketHoursCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    bucket: Option<i64>,
    entries: HashMap<String, LiquidityCheck>,
    order: VecDeque<String>,
}

impl CacheInner {
    fn roll_to(&mut self, bucket: i64) {
        if self.bucket != Some(bucket) {
            self.entries.clear();
            self.order.clear();
            self.bucket = Some(bucket);
        }
    }
}

impl MarketHoursCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub(crate) fn get(&self, symbol: &str, bucket: i64) -> Option<LiquidityCheck> {
        let mut inner = self.inner.lock();
        inner.roll_to(bucket);
        inner.entries.get(symbol).cloned()
    }

    pub(crate) fn insert(&self, symbol: &str, bucket: i64, check: LiquidityCheck) {
        let mut inner = self.inner.lock();
        inner.roll_to(bucket);
        if inner.entries.insert(symbol.to_string(), check).is_none() {
            inner.order.push_back(symbol.to_string());
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub(crate) fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
