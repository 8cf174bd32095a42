//! Best-effort block fan-out to peers.
//!
//! Delivery failures are logged and never block commit; a peer that missed
//! a block catches up out of band.

use litefab_chain::Block;
use std::time::Duration;
use tracing::{info, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Broadcaster {
    http: reqwest::Client,
    peer_addrs: Vec<String>,
}

impl Broadcaster {
    pub fn new(peer_addrs: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            peer_addrs,
        }
    }

    /// Send the block to every configured peer concurrently.
    pub async fn broadcast(&self, block: &Block) {
        let mut deliveries = Vec::with_capacity(self.peer_addrs.len());
        for peer in &self.peer_addrs {
            let url = format!("{}/block", peer.trim_end_matches('/'));
            let http = self.http.clone();
            let block = block.clone();
            let peer = peer.clone();
            deliveries.push(tokio::spawn(async move {
                let number = block.header.number;
                match http
                    .post(&url)
                    .timeout(DELIVERY_TIMEOUT)
                    .json(&block)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => {
                        info!(peer = %peer, block = number, "block delivered");
                    }
                    Ok(resp) => {
                        warn!(peer = %peer, block = number, status = %resp.status(), "peer rejected block");
                    }
                    Err(e) => {
                        warn!(peer = %peer, block = number, error = %e, "block delivery failed");
                    }
                }
            }));
        }
        for delivery in deliveries {
            let _ = delivery.await;
        }
    }
}
