use serde::{Deserialize, Serialize};

use super::*;

/// Where a vote request left the voter, and the target's counters afterwards.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct VoteOutcome {
    pub direction: Option<VoteDirection>,
    pub counters: VoteCounters,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct SettlementResponse {
    pub position: RowId,
    pub outcome: SettlementOutcome,
}
