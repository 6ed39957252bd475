//! Idle connection reaper.
//!
//! A background task per pool that periodically closes connections idle for
//! longer than `idle_timeout`. It holds only a weak reference, so it stops on
//! its own once the pool is closed or dropped.

use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use crate::pool::connection::Connection;
use crate::pool::connection_pool::Shared;

pub(crate) fn spawn<C: Connection>(shared: &Arc<Shared<C>>) {
    let weak = Arc::downgrade(shared);
    let interval = shared.config.reap_interval();

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            match shared.sweep_idle() {
                Some(0) => {}
                Some(reaped) => {
                    tracing::debug!(reaped, "Reaped idle connections");
                }
                None => break,
            }
        }
        tracing::trace!("Idle reaper stopped");
    });
}
