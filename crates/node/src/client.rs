//! Submitting client: assembles signed proposals, gathers endorsements,
//! builds the envelope and hands it to an orderer.
//!
//! Retry policy: every configured peer is asked for an endorsement (a
//! multi-org policy needs more than one org's peer); orderers are tried in
//! order and the first reachable one wins. If everything fails the error is
//! raised to the operator.

use crate::http::{QueryResponse, StatusResponse};
use anyhow::{anyhow, bail, Context, Result};
use litefab_chain::{Proposal, ProposalResponse, TransactionEnvelope, TxPayload};
use litefab_common::{crypto, ClientConfig};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// What a successful submission looked like, for CLI reporting.
#[derive(Debug)]
pub struct SubmitSummary {
    pub tx_id: String,
    pub endorsements: usize,
    pub status: String,
}

pub struct Client {
    config: ClientConfig,
    signing_key: RsaPrivateKey,
    public_key_pem: String,
    http: reqwest::Client,
}

impl Client {
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let pem = fs::read_to_string(&config.private_key_path).with_context(|| {
            format!("reading client private key {:?}", config.private_key_path)
        })?;
        let signing_key = crypto::private_key_from_pem(&pem)?;
        let public_key_pem = crypto::public_key_to_pem(&RsaPublicKey::from(&signing_key))?;
        Ok(Self {
            config,
            signing_key,
            public_key_pem,
            http: reqwest::Client::new(),
        })
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    fn new_proposal(&self, payload: TxPayload) -> Result<Proposal> {
        let mut proposal = Proposal {
            tx_id: Uuid::new_v4().to_string(),
            creator_id: self.config.client_id.clone(),
            creator_org_id: self.config.org_id.clone(),
            creator_pub_key: self.public_key_pem.clone(),
            payload,
            signature: String::new(),
        };
        let bytes = proposal.signing_bytes()?;
        proposal.signature = crypto::sign(&self.signing_key, &bytes);
        Ok(proposal)
    }

    async fn gather_endorsements(&self, proposal: &Proposal) -> Result<Vec<ProposalResponse>> {
        let mut responses = Vec::new();
        let mut last_error: Option<anyhow::Error> = None;
        for peer in &self.config.peer_addrs {
            let url = format!("{}/proposal", peer.trim_end_matches('/'));
            match self
                .http
                .post(&url)
                .timeout(self.request_timeout())
                .json(proposal)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => match resp.json::<ProposalResponse>().await
                {
                    Ok(response) => responses.push(response),
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "unreadable proposal response");
                        last_error = Some(anyhow!("peer {peer}: unreadable response: {e}"));
                    }
                },
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(peer = %peer, status = %status, "peer rejected proposal");
                    last_error = Some(anyhow!("peer {peer} rejected proposal ({status}): {body}"));
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "peer unreachable, trying next");
                    last_error = Some(anyhow!("peer {peer} unreachable: {e}"));
                }
            }
        }
        if responses.is_empty() {
            return Err(
                last_error.unwrap_or_else(|| anyhow!("no endorsing peers are configured"))
            );
        }
        Ok(responses)
    }

    /// Full submission flow: propose, endorse, assemble, submit.
    pub async fn submit_transaction(&self, payload: TxPayload) -> Result<SubmitSummary> {
        let proposal = self.new_proposal(payload)?;
        let responses = self.gather_endorsements(&proposal).await?;

        let first = &responses[0];
        for other in &responses[1..] {
            // honest endorsers simulate deterministically; divergence means
            // a faulty or stale peer
            if other.rw_set != first.rw_set || other.result != first.result {
                warn!(
                    tx_id = %proposal.tx_id,
                    endorser = %other.endorsement.endorser_id,
                    "endorser returned a divergent read/write set"
                );
            }
        }

        let mut envelope = TransactionEnvelope {
            tx_id: proposal.tx_id.clone(),
            creator_id: proposal.creator_id.clone(),
            creator_org_id: proposal.creator_org_id.clone(),
            creator_pub_key: proposal.creator_pub_key.clone(),
            payload: proposal.payload.clone(),
            rw_set: first.rw_set.clone(),
            result: first.result.clone(),
            endorsements: responses.iter().map(|r| r.endorsement.clone()).collect(),
            client_signature: String::new(),
        };
        let bytes = envelope.signing_bytes()?;
        envelope.client_signature = crypto::sign(&self.signing_key, &bytes);

        let status = self.submit_envelope(&envelope).await?;
        info!(tx_id = %envelope.tx_id, status = %status, "envelope submitted");
        Ok(SubmitSummary {
            tx_id: envelope.tx_id,
            endorsements: envelope.endorsements.len(),
            status,
        })
    }

    async fn submit_envelope(&self, envelope: &TransactionEnvelope) -> Result<String> {
        let mut last_error: Option<anyhow::Error> = None;
        for orderer in &self.config.orderer_addrs {
            let url = format!("{}/submit", orderer.trim_end_matches('/'));
            match self
                .http
                .post(&url)
                .timeout(self.request_timeout())
                .json(envelope)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    let status = resp
                        .json::<StatusResponse>()
                        .await
                        .map(|s| s.status)
                        .unwrap_or_else(|_| "submitted".to_string());
                    return Ok(status);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    last_error = Some(anyhow!("orderer {orderer} rejected envelope ({status}): {body}"));
                }
                Err(e) => {
                    warn!(orderer = %orderer, error = %e, "orderer unreachable, trying next");
                    last_error = Some(anyhow!("orderer {orderer} unreachable: {e}"));
                }
            }
        }
        match last_error {
            Some(err) => Err(err),
            None => bail!("no orderers are configured"),
        }
    }

    /// Read a world-state key from the first peer that answers.
    pub async fn query(&self, key: &str) -> Result<Option<String>> {
        let mut last_error: Option<anyhow::Error> = None;
        for peer in &self.config.peer_addrs {
            let url = format!("{}/query", peer.trim_end_matches('/'));
            match self
                .http
                .get(&url)
                .timeout(self.request_timeout())
                .query(&[("key", key)])
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.json::<QueryResponse>().await?;
                    return Ok(body.value);
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_error = Some(anyhow!("peer {peer} rejected query ({status})"));
                }
                Err(e) => {
                    last_error = Some(anyhow!("peer {peer} unreachable: {e}"));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no peers are configured")))
    }
}
