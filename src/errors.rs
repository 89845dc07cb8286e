use thiserror::Error;

/// Fatal, programming-error-only failures from order-internal misuse (§7).
///
/// Business-rule rejections (duplicate identifier, absent identifier, failed
/// admission predicates) are never represented here — they are plain empty
/// returns, per spec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {order_id}: fill of {attempted} exceeds remaining {remaining}")]
    FillOverflow {
        order_id: u64,
        remaining: u64,
        attempted: u64,
    },

    #[error("order {order_id}: cannot set a price on a non-Market order")]
    NotMarketOrder { order_id: u64 },
}
