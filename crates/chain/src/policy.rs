//! Endorsement policies: a boolean predicate over the set of organizations
//! that produced verified endorsements.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    Any,
    All,
    Majority,
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyType::Any => write!(f, "ANY"),
            PolicyType::All => write!(f, "ALL"),
            PolicyType::Majority => write!(f, "MAJORITY"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PolicyParseError {
    #[error("policy literal must look like TYPE:Org1,Org2 (got {0:?})")]
    Shape(String),

    #[error("unknown policy type {0:?} (expected ANY, ALL or MAJORITY)")]
    UnknownType(String),

    #[error("policy must name at least one organization")]
    NoOrgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndorsementPolicy {
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub orgs: Vec<String>,
}

impl EndorsementPolicy {
    pub fn new(policy_type: PolicyType, orgs: Vec<String>) -> Self {
        Self { policy_type, orgs }
    }

    /// Fallback policy for a DEPLOY that carries none: any endorsement from
    /// the creator's own organization.
    pub fn any_of_creator(creator_org_id: &str) -> Self {
        Self::new(PolicyType::Any, vec![creator_org_id.to_string()])
    }

    /// Evaluate against the distinct organizations whose endorsements
    /// verified. MAJORITY requires strictly more than half: ⌊n/2⌋ + 1.
    pub fn is_satisfied_by(&self, endorsed_orgs: &HashSet<String>) -> bool {
        let present = self
            .orgs
            .iter()
            .filter(|org| endorsed_orgs.contains(*org))
            .count();
        match self.policy_type {
            PolicyType::Any => present >= 1,
            PolicyType::All => present == self.orgs.len() && !self.orgs.is_empty(),
            PolicyType::Majority => present >= self.orgs.len() / 2 + 1,
        }
    }
}

impl FromStr for EndorsementPolicy {
    type Err = PolicyParseError;

    /// Parse the CLI literal grammar `(ANY|ALL|MAJORITY):Org1,Org2[,…]`.
    /// The type is case-insensitive; org names are trimmed.
    fn from_str(literal: &str) -> Result<Self, Self::Err> {
        let (type_part, orgs_part) = literal
            .split_once(':')
            .ok_or_else(|| PolicyParseError::Shape(literal.to_string()))?;
        let policy_type = match type_part.trim().to_ascii_uppercase().as_str() {
            "ANY" => PolicyType::Any,
            "ALL" => PolicyType::All,
            "MAJORITY" => PolicyType::Majority,
            other => return Err(PolicyParseError::UnknownType(other.to_string())),
        };
        let orgs: Vec<String> = orgs_part
            .split(',')
            .map(|org| org.trim().to_string())
            .filter(|org| !org.is_empty())
            .collect();
        if orgs.is_empty() {
            return Err(PolicyParseError::NoOrgs);
        }
        Ok(Self { policy_type, orgs })
    }
}
