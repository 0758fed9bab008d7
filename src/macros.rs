/// Returns `Ok(BatchOutcome::Cancelled)` from the enclosing handler once the frame has been
/// cancelled. Whatever was already queued stays queued.
macro_rules! check_cancellation {
    ($frame:expr, $stage:literal) => {
        if $frame.cancellation.is_cancelled() {
            tracing::debug!(stage = $stage, "batch cancelled");
            return Ok($crate::handlers::BatchOutcome::Cancelled);
        }
    };
}

pub(crate) use check_cancellation;
