//! Per-request deadline computation (`spec.md` §4.4, §5): every operation is
//! bound to `min(server_timeout, client deadline/timeout)`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use capreg_core::RequestContext;

/// Compute the deadline to bind an operation to, given the server's own
/// ceiling and the caller's context.
///
/// `ctx.deadline_ms` (an absolute Unix-epoch millisecond timestamp) is
/// preferred over `ctx.timeout_ms` (a relative duration from now) when both
/// are present, per `spec.md` §4.4. Either is clamped to the server ceiling,
/// never extending it; a deadline already in the past resolves to
/// [`Duration::ZERO`] rather than underflowing.
#[must_use]
pub fn compute_deadline(server_timeout: Duration, ctx: Option<&RequestContext>) -> Duration {
    let Some(ctx) = ctx else {
        return server_timeout;
    };

    let client_remaining = ctx
        .deadline_ms
        .map(remaining_until)
        .or_else(|| ctx.timeout_ms.map(Duration::from_millis));

    match client_remaining {
        Some(remaining) => remaining.min(server_timeout),
        None => server_timeout,
    }
}

/// Duration remaining between now and an absolute Unix-epoch millisecond
/// timestamp; `Duration::ZERO` if it has already passed.
fn remaining_until(deadline_ms: i64) -> Duration {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64;
    let remaining_ms = deadline_ms.saturating_sub(now_ms).max(0);
    Duration::from_millis(remaining_ms as u64)
}
