// ── Fleet fan-out ──
//
// One future per targeted camera, all polled together. The fan-out width
// is the number of targets; the fleet is small enough not to need a pool.

use std::future::Future;

use futures_util::future::join_all;

use crate::error::CoreError;
use crate::model::{FleetResult, Serial};

/// Run `op` for every serial concurrently, keeping the serial with its outcome.
pub(crate) async fn fan_out<T, F, Fut>(
    serials: impl IntoIterator<Item = Serial>,
    op: F,
) -> Vec<(Serial, Result<T, CoreError>)>
where
    F: Fn(Serial) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    join_all(serials.into_iter().map(|serial| {
        let fut = op(serial.clone());
        async move { (serial, fut.await) }
    }))
    .await
}

/// Aggregate per-camera outcomes, escalating only a missing host adapter.
pub(crate) fn collect_outcomes<T>(
    outcomes: Vec<(Serial, Result<T, CoreError>)>,
) -> Result<FleetResult<T>, CoreError> {
    if let Some(reason) = outcomes.iter().find_map(|(_, r)| match r {
        Err(CoreError::AdapterUnavailable { reason }) => Some(reason.clone()),
        _ => None,
    }) {
        return Err(CoreError::AdapterUnavailable { reason });
    }
    Ok(FleetResult::from_outcomes(outcomes))
}
