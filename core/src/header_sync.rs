//! Header sync loop (C7): bulk catch-up plus incremental tip-following,
//! guarded by an exclusive lock so pushes never race a bulk fetch.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapters::{HeaderNotification, Headers, Network};
use crate::streams::EventStreams;
use crate::Result;

/// Maximum headers requested per bulk round-trip.
const MAX_HEADERS_PER_REQUEST: u32 = 2000;

pub struct HeaderSync {
    headers: Arc<dyn Headers>,
    network: Arc<dyn Network>,
    events: Arc<EventStreams>,
    /// Exclusive across bulk catch-up and push-header handling; holding it
    /// across a bulk catch-up is intentional (spec §4.3) so a push can
    /// never race ahead of an in-flight bulk fetch.
    lock: Mutex<()>,
}

impl HeaderSync {
    pub fn new(headers: Arc<dyn Headers>, network: Arc<dyn Network>, events: Arc<EventStreams>) -> Self {
        Self { headers, network, events, lock: Mutex::new(()) }
    }

    /// Bulk catch-up: repeatedly requests up to 2000 headers from the
    /// current tip until the server returns zero, which signals caught-up.
    pub async fn update_headers(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.update_headers_locked().await
    }

    async fn update_headers_locked(&self) -> Result<()> {
        loop {
            let height_sought = self.headers.height();
            let batch = self
                .network
                .get_headers(height_sought, MAX_HEADERS_PER_REQUEST)
                .await?;
            if batch.count <= 0 {
                break;
            }
            self.headers.connect(height_sought, batch.raw).await?;
            self.events.publish_header(self.headers.height());
        }
        Ok(())
    }

    /// Handles a single pushed header notification.
    pub async fn process_header(&self, push: HeaderNotification) -> Result<()> {
        let _guard = self.lock.lock().await;
        let local_height = self.headers.height();
        if push.height == local_height {
            self.headers.connect(local_height, push.raw).await?;
            self.events.publish_header(self.headers.height());
        } else if push.height > local_height {
            // Several heights ahead of local: fall back to bulk catch-up,
            // still holding the lock.
            self.update_headers_locked().await?;
        }
        // push.height < local_height: stale notification, ignored.
        Ok(())
    }
}
