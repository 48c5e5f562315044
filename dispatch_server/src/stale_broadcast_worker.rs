use std::time::Duration;

use dispatch_engine::{DispatchApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the stale-broadcast worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick cancels broadcasts that nobody accepted within the configured TTL and re-dispatches their sub-orders. If
/// the dispatcher has no broadcast TTL, the sweep still retries `out-for-delivery` sub-orders that never found a
/// courier.
pub fn start_stale_broadcast_worker(api: DispatchApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Stale broadcast worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running stale broadcast sweep");
            match api.sweep().await {
                Ok(report) if report.expired + report.retried > 0 => {
                    info!(
                        "🕰️ {} broadcasts expired, {} sub-orders retried, {} dispatched",
                        report.expired, report.retried, report.dispatched
                    );
                },
                Ok(_) => trace!("🕰️ Nothing to sweep"),
                Err(e) => {
                    error!("🕰️ Error running stale broadcast sweep: {e}");
                },
            }
        }
    })
}
