use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NewPositionRequest {
    pub author: UserId,
    pub event: EventId,
    pub market: Market,
    pub selection: String,
    pub odds: Decimal,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PositionRequest {
    pub position: RowId,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewCommentRequest {
    pub position: RowId,
    pub author: UserId,
    pub body: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CommentRequest {
    pub comment: RowId,
}
/// `direction` stays a plain string on the wire so that unknown directions
/// reach the server and are rejected there.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoteRequest {
    pub voter: UserId,
    pub target_type: TargetType,
    pub target: RowId,
    pub direction: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoteLookupRequest {
    pub voter: UserId,
    pub target_type: TargetType,
    pub target: RowId,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventResultRequest {
    pub event: EventId,
    pub result: EventResult,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SettleEventRequest {
    pub event: EventId,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolveRequest {
    pub market: Market,
    pub selection: String,
    pub result: EventResult,
}
