//! Remote verification service.

mod client;
pub mod retry;

pub use client::{ensure_session_id, HttpJudge, Judge, FINAL_FIVE_OPTIONS};
pub use retry::{with_retry, RetryPolicy};
