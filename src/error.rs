/// Returned when waiting for room in a [CacheLimiter](crate::CacheLimiter) is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The caller's cancellation token fired before the bytes could be added.
    #[error("Wait for cache capacity cancelled")]
    Cancelled,
}
