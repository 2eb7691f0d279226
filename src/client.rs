use anyhow::{bail, Result};
use reqwest::{Response, StatusCode};
use serde::Serialize;

use crate::api::*;

#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    async fn post(
        &self,
        path: &'static str,
        request: impl Serialize,
        expected_code: StatusCode,
    ) -> Result<Response> {
        let response = self
            .client
            .post(self.url.clone() + path)
            .json(&request)
            .send()
            .await?;
        bail_if_err(response, expected_code).await
    }
    async fn get(&self, path: &'static str, expected_code: StatusCode) -> Result<Response> {
        let response = self.client.get(self.url.clone() + path).send().await?;
        bail_if_err(response, expected_code).await
    }
    pub async fn new_position(&self, request: NewPositionRequest) -> Result<RowId> {
        Ok(self
            .post("/new_position", request, StatusCode::CREATED)
            .await?
            .json()
            .await?)
    }
    pub async fn get_positions(&self) -> Result<Vec<Position>> {
        Ok(self.get("/get_positions", StatusCode::OK).await?.json().await?)
    }
    pub async fn get_position(&self, position: RowId) -> Result<Position> {
        Ok(self
            .post("/get_position", PositionRequest { position }, StatusCode::OK)
            .await?
            .json()
            .await?)
    }
    pub async fn delete_position(&self, position: RowId) -> Result<()> {
        self.post("/delete_position", PositionRequest { position }, StatusCode::OK)
            .await?;
        Ok(())
    }
    pub async fn new_comment(&self, request: NewCommentRequest) -> Result<RowId> {
        Ok(self
            .post("/new_comment", request, StatusCode::CREATED)
            .await?
            .json()
            .await?)
    }
    pub async fn get_comments(&self, position: RowId) -> Result<Vec<Comment>> {
        Ok(self
            .post("/get_comments", PositionRequest { position }, StatusCode::OK)
            .await?
            .json()
            .await?)
    }
    pub async fn delete_comment(&self, comment: RowId) -> Result<()> {
        self.post("/delete_comment", CommentRequest { comment }, StatusCode::OK)
            .await?;
        Ok(())
    }
    pub async fn vote(&self, request: VoteRequest) -> Result<VoteOutcome> {
        Ok(self
            .post("/vote", request, StatusCode::OK)
            .await?
            .json()
            .await?)
    }
    pub async fn get_vote(&self, request: VoteLookupRequest) -> Result<Option<VoteDirection>> {
        Ok(self
            .post("/get_vote", request, StatusCode::OK)
            .await?
            .json()
            .await?)
    }
    pub async fn record_event_result(&self, event: EventId, result: EventResult) -> Result<()> {
        self.post(
            "/record_event_result",
            EventResultRequest { event, result },
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }
    pub async fn settle_event(&self, event: EventId) -> Result<Vec<SettlementResponse>> {
        Ok(self
            .post("/settle_event", SettleEventRequest { event }, StatusCode::OK)
            .await?
            .json()
            .await?)
    }
    pub async fn resolve(&self, request: ResolveRequest) -> Result<SettlementOutcome> {
        Ok(self
            .post("/resolve", request, StatusCode::OK)
            .await?
            .json()
            .await?)
    }
}

async fn bail_if_err(response: Response, expected_code: StatusCode) -> Result<Response> {
    if response.status() != expected_code {
        bail!("{}: {}", response.status(), response.text().await?)
    } else {
        Ok(response)
    }
}
