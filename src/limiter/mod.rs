//! The byte budget, and guards for bytes reserved from it.

use std::{
    sync::{
        atomic::{self, AtomicI64},
        Arc,
    },
    time::Duration,
};

use bon::Builder;
use conv::ConvUtil;

pub use reservation::Reservation;

mod reservation;
mod wait;

type ByteCount = i64;
type AtomicByteCount = AtomicI64;

/// Fraction of the limit available to callers who don't ask for the relaxed limit.
const STRICT_FRACTION: f32 = 0.75;

const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Limits the number of bytes buffered in memory at once.
///
/// Callers add bytes before buffering data and remove them once the data has been consumed. There
/// is one pool with two thresholds: requests under the strict limit may only use 75% of the pool,
/// while requests under the relaxed limit may use all of it.
///
/// The limiter does not keep track of individual additions. Every successful add must be matched
/// by a [remove_bytes](CacheLimiter::remove_bytes) of the same count, or that capacity is lost for
/// the life of the limiter. [Reservation]s do this automatically.
///
/// Admission is not first-come-first-served.
#[derive(Debug)]
pub struct CacheLimiter {
    value: AtomicByteCount,
    limit: ByteCount,
    strict_limit: ByteCount,
    max_backoff: Duration,
}

/// Configuration for a [CacheLimiter].
#[derive(Debug, Clone, Builder)]
pub struct Options {
    /// Maximum number of bytes, used as-is under the relaxed limit. Must be positive.
    limit: ByteCount,
    /// Upper bound of the random delay between attempts while waiting for room.
    #[builder(default = DEFAULT_MAX_BACKOFF)]
    max_backoff: Duration,
}

/// A snapshot of the state of the [CacheLimiter].
///
/// Not guaranteed to be consistent under high concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterState {
    limit: ByteCount,
    strict_limit: ByteCount,
    in_use: ByteCount,
}

impl CacheLimiter {
    /// Create a limiter for `limit` bytes, with default [Options].
    pub fn new(limit: ByteCount) -> Arc<Self> {
        Self::with_options(Options::builder().limit(limit).build())
    }

    /// Create a limiter from the given [Options].
    ///
    /// Panics if the limit is not positive.
    pub fn with_options(options: Options) -> Arc<Self> {
        assert!(options.limit >= 1, "limit must be positive");

        Arc::new(Self {
            value: AtomicByteCount::new(0),
            limit: options.limit,
            strict_limit: strict_limit(options.limit),
            max_backoff: options.max_backoff,
        })
    }

    /// The maximum number of bytes under the relaxed limit.
    pub fn limit(&self) -> ByteCount {
        self.limit
    }

    /// The maximum number of bytes under the strict limit.
    pub fn strict_limit(&self) -> ByteCount {
        self.strict_limit
    }

    /// The current state of the limiter.
    pub fn state(&self) -> LimiterState {
        LimiterState {
            limit: self.limit,
            strict_limit: self.strict_limit,
            in_use: self.in_use(),
        }
    }

    fn in_use(&self) -> ByteCount {
        self.value.load(atomic::Ordering::Acquire)
    }

    fn threshold(&self, use_relaxed_limit: bool) -> ByteCount {
        if use_relaxed_limit {
            self.limit
        } else {
            self.strict_limit
        }
    }

    /// Try to add `count` bytes without waiting.
    ///
    /// Returns `true` if the bytes fit under the chosen limit and were added. Otherwise returns
    /// `false` and leaves the limiter unchanged.
    pub fn try_add(&self, count: ByteCount, use_relaxed_limit: bool) -> bool {
        let threshold = self.threshold(use_relaxed_limit);

        // The counter is the only point of synchronisation, so add first and check afterwards.
        let previous = self.value.fetch_add(count, atomic::Ordering::SeqCst);
        if previous
            .checked_add(count)
            .is_some_and(|total| total <= threshold)
        {
            return true;
        }

        // Over the limit, take back what we just added.
        self.value.fetch_sub(count, atomic::Ordering::SeqCst);
        false
    }

    /// Give back `count` bytes which were previously added.
    pub fn remove_bytes(&self, count: ByteCount) {
        self.value.fetch_sub(count, atomic::Ordering::SeqCst);
    }

    /// Try to immediately reserve `count` bytes.
    ///
    /// Returns `None` if they don't fit under the chosen limit.
    pub fn try_reserve(
        self: &Arc<Self>,
        count: ByteCount,
        use_relaxed_limit: bool,
    ) -> Option<Reservation> {
        self.try_add(count, use_relaxed_limit)
            .then(|| self.mint_reservation(count))
    }

    fn mint_reservation(self: &Arc<Self>, count: ByteCount) -> Reservation {
        Reservation::new(count, Arc::clone(self))
    }
}

impl LimiterState {
    /// The maximum number of bytes under the relaxed limit.
    pub fn limit(&self) -> ByteCount {
        self.limit
    }
    /// The maximum number of bytes under the strict limit.
    pub fn strict_limit(&self) -> ByteCount {
        self.strict_limit
    }
    /// The number of bytes currently added.
    pub fn in_use(&self) -> ByteCount {
        self.in_use
    }
    /// The number of bytes which could be added under the chosen limit.
    pub fn available(&self, use_relaxed_limit: bool) -> ByteCount {
        let threshold = if use_relaxed_limit {
            self.limit
        } else {
            self.strict_limit
        };
        threshold.saturating_sub(self.in_use).max(0)
    }
}

/// Computed in single precision and truncated, so very large limits can differ slightly from
/// `limit * 3 / 4`.
#[allow(clippy::cast_precision_loss)]
fn strict_limit(limit: ByteCount) -> ByteCount {
    (limit as f32 * STRICT_FRACTION)
        .trunc()
        .approx_as::<ByteCount>()
        .expect("a fraction of an i64 should fit in an i64")
}
