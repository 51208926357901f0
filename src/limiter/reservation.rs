use std::sync::Arc;

use super::{ByteCount, CacheLimiter};

/// Bytes reserved from a [CacheLimiter].
///
/// The bytes are removed from the limiter when the reservation is dropped.
#[derive(Debug)]
#[must_use = "dropping a reservation immediately releases its bytes"]
pub struct Reservation {
    bytes: ByteCount,
    limiter: Arc<CacheLimiter>,
}

impl Reservation {
    pub(crate) fn new(bytes: ByteCount, limiter: Arc<CacheLimiter>) -> Self {
        Self { bytes, limiter }
    }

    /// The number of bytes held by this reservation.
    pub fn bytes(&self) -> ByteCount {
        self.bytes
    }

    /// Release the bytes back to the limiter.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.limiter.remove_bytes(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use crate::limiter::CacheLimiter;

    #[test]
    fn dropping_reservation() {
        let limiter = CacheLimiter::new(100);

        let reservation = limiter.try_reserve(60, true).unwrap();

        assert_eq!(reservation.bytes(), 60);
        assert_eq!(limiter.state().in_use(), 60);

        drop(reservation);

        assert_eq!(limiter.state().in_use(), 0);
    }

    #[test]
    fn explicitly_releasing_reservation() {
        let limiter = CacheLimiter::new(100);

        let first = limiter.try_reserve(50, false).unwrap();
        assert!(limiter.try_reserve(50, false).is_none());

        first.release();

        let second = limiter.try_reserve(50, false);
        assert!(second.is_some());
        assert_eq!(limiter.state().in_use(), 50);
    }

    #[test]
    fn failed_reservation_holds_nothing() {
        let limiter = CacheLimiter::new(10);
        let _held = limiter.try_reserve(10, true).unwrap();

        assert!(limiter.try_reserve(1, true).is_none());

        assert_eq!(limiter.state().in_use(), 10);
    }
}
