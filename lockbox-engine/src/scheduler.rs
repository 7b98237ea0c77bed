//! Background key rotation.

use crate::key_manager::KeyManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Runs [`KeyManager::rotate`] every `interval` until the handle is aborted.
///
/// The first pass runs immediately. Each pass executes on the blocking pool
/// since it does RSA and Argon2 work.
pub fn spawn_rotation_task(manager: Arc<KeyManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "key rotation task started");
        // interval() panics on zero
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));

        loop {
            ticker.tick().await;

            let manager = manager.clone();
            match tokio::task::spawn_blocking(move || manager.rotate()).await {
                Ok(Ok(report)) if report.is_empty() => debug!("no keys due for rotation"),
                Ok(Ok(report)) => {
                    if !report.failed.is_empty() {
                        warn!(failed = report.failed.len(), "some keys failed to rotate");
                    }
                }
                Ok(Err(e)) => warn!("key rotation pass failed: {e}"),
                Err(e) => warn!("key rotation pass panicked: {e}"),
            }
        }
    })
}
