//! Raft consensus skeleton.
//!
//! Implements the role state machine with real timers: randomized election
//! timeout in [150 ms, 300 ms], 50 ms heartbeat while Leader, and
//! leader-only submission. Elections count a quorum over the static peer
//! set, so a single-node cluster votes for itself and becomes Leader;
//! without a vote transport, a multi-node cluster never reaches quorum and
//! stays in Candidate. AppendEntries log replication is not implemented;
//! a leader orders through the same batch cutter Solo uses.

use super::{Consensus, SoloConsensus};
use crate::error::NodeError;
use crate::orderer::OrdererService;
use async_trait::async_trait;
use litefab_chain::TransactionEnvelope;
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const ELECTION_TIMEOUT_MIN_MS: u64 = 150;
pub const ELECTION_TIMEOUT_MAX_MS: u64 = 300;
pub const HEARTBEAT_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
}

#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// Addresses of the other cluster members. Empty = single-node cluster.
    pub peers: Vec<String>,
    pub block_size: usize,
    pub block_timeout_ms: u64,
}

struct RaftState {
    role: RwLock<RaftRole>,
    term: AtomicU64,
    peers: Vec<String>,
}

impl RaftState {
    fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    fn quorum(&self) -> usize {
        self.cluster_size() / 2 + 1
    }
}

pub struct RaftConsensus {
    state: Arc<RaftState>,
    cutter: SoloConsensus,
}

impl RaftConsensus {
    /// Build the module and start its election loop.
    pub fn spawn(core: Arc<OrdererService>, config: RaftConfig) -> Arc<Self> {
        let state = Arc::new(RaftState {
            role: RwLock::new(RaftRole::Follower),
            term: AtomicU64::new(0),
            peers: config.peers.clone(),
        });
        let consensus = Arc::new(Self {
            state: state.clone(),
            cutter: SoloConsensus::new(core, config.block_size, config.block_timeout_ms),
        });
        tokio::spawn(Self::run(state));
        consensus
    }

    pub fn role(&self) -> RaftRole {
        *self.state.role.read()
    }

    pub fn term(&self) -> u64 {
        self.state.term.load(Ordering::SeqCst)
    }

    fn election_timeout() -> Duration {
        let ms = rand::thread_rng().gen_range(ELECTION_TIMEOUT_MIN_MS..=ELECTION_TIMEOUT_MAX_MS);
        Duration::from_millis(ms)
    }

    async fn run(state: Arc<RaftState>) {
        loop {
            let role = *state.role.read();
            match role {
                RaftRole::Follower => {
                    // no heartbeat transport exists, so the timeout always
                    // elapses and the node stands for election
                    tokio::time::sleep(Self::election_timeout()).await;
                    *state.role.write() = RaftRole::Candidate;
                    debug!("election timeout elapsed, becoming candidate");
                }
                RaftRole::Candidate => {
                    let term = state.term.fetch_add(1, Ordering::SeqCst) + 1;
                    // self-vote; RequestVote RPCs would be issued here
                    let votes = 1;
                    if votes >= state.quorum() {
                        *state.role.write() = RaftRole::Leader;
                        info!(term, "elected leader");
                    } else {
                        debug!(
                            term,
                            votes,
                            quorum = state.quorum(),
                            "election did not reach quorum"
                        );
                        tokio::time::sleep(Self::election_timeout()).await;
                    }
                }
                RaftRole::Leader => {
                    // heartbeat tick; AppendEntries would fan out here
                    tokio::time::sleep(Duration::from_millis(HEARTBEAT_INTERVAL_MS)).await;
                }
            }
        }
    }
}

#[async_trait]
impl Consensus for RaftConsensus {
    async fn submit_tx(&self, envelope: TransactionEnvelope) -> Result<(), NodeError> {
        if self.role() != RaftRole::Leader {
            return Err(NodeError::Consensus(
                "not the leader; retry against the current leader".to_string(),
            ));
        }
        self.cutter.submit_tx(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_arithmetic() {
        let single = RaftState {
            role: RwLock::new(RaftRole::Follower),
            term: AtomicU64::new(0),
            peers: vec![],
        };
        assert_eq!(single.quorum(), 1);

        let trio = RaftState {
            role: RwLock::new(RaftRole::Follower),
            term: AtomicU64::new(0),
            peers: vec!["a".into(), "b".into()],
        };
        assert_eq!(trio.quorum(), 2);
    }

    #[test]
    fn election_timeout_stays_in_band() {
        for _ in 0..64 {
            let timeout = RaftConsensus::election_timeout();
            assert!(timeout >= Duration::from_millis(ELECTION_TIMEOUT_MIN_MS));
            assert!(timeout <= Duration::from_millis(ELECTION_TIMEOUT_MAX_MS));
        }
    }
}
