//! Elapsed-seconds timer for one transfer session

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::types::TransferSession;

const TICK: Duration = Duration::from_secs(1);

/// Increments `elapsed_seconds` once per second while its session is live
///
/// The task stops on its own when the session id changes or the session
/// reaches a terminal state, and is aborted by `stop()` or on drop.
pub struct ElapsedTimer {
    session_id: String,
    handle: JoinHandle<()>,
}

impl ElapsedTimer {
    pub fn start(session: Arc<RwLock<TransferSession>>, session_id: String) -> Self {
        let owner = session_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let mut session = session.write().await;
                if session.id != owner || session.status.is_terminal() {
                    break;
                }
                session.elapsed_seconds += 1;
            }
        });

        Self { session_id, handle }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
