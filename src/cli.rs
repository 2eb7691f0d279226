#![allow(unused)]
use std::str::FromStr;

use anyhow::{Context, Result};
use api::*;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::client::Client;

mod api;
mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    NewPosition {
        #[arg(short, long)]
        author: UserId,
        #[arg(short, long)]
        event: EventId,
        #[arg(short, long)]
        market: String,
        #[arg(short, long)]
        selection: String,
        #[arg(short, long)]
        odds: Decimal,
    },
    GetPositions,
    GetPosition {
        #[arg(short, long)]
        position: RowId,
    },
    Vote {
        #[arg(long)]
        voter: UserId,
        #[arg(long, default_value = "position")]
        target_type: String,
        #[arg(short, long)]
        target: RowId,
        /// upvote or downvote, voting the same direction twice removes the vote
        #[arg(short, long)]
        direction: String,
    },
    RecordResult {
        #[arg(short, long)]
        event: EventId,
        #[arg(short, long)]
        winner: Option<String>,
        #[arg(short, long)]
        score: Option<String>,
        /// Structured results as JSON, e.g. '{"totalGoals": 3}'
        #[arg(short, long)]
        market_results: Option<String>,
    },
    SettleEvent {
        #[arg(short, long)]
        event: EventId,
    },
    Resolve {
        #[arg(short, long)]
        market: String,
        #[arg(long)]
        selection: String,
        #[arg(short, long)]
        winner: Option<String>,
        #[arg(long)]
        score: Option<String>,
        #[arg(short = 'r', long)]
        market_results: Option<String>,
    },
}

fn event_result(
    winner: Option<String>,
    score: Option<String>,
    market_results: Option<String>,
) -> Result<EventResult> {
    let market_results = market_results
        .map(|raw| serde_json::from_str(&raw).context("market results are not valid JSON"))
        .transpose()?;
    Ok(EventResult {
        winner,
        score,
        market_results,
        settled_at: Some(Utc::now()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::NewPosition {
            author,
            event,
            market,
            selection,
            odds,
        } => {
            let request = NewPositionRequest {
                author,
                event,
                market: Market::from_str(&market)?,
                selection,
                odds,
            };
            let id = client.new_position(request).await?;
            println!("{}", id);
        }
        Commands::GetPositions => {
            let positions = client.get_positions().await?;
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
        Commands::GetPosition { position } => {
            let position = client.get_position(position).await?;
            println!("{}", serde_json::to_string_pretty(&position)?);
        }
        Commands::Vote {
            voter,
            target_type,
            target,
            direction,
        } => {
            let outcome = client
                .vote(VoteRequest {
                    voter,
                    target_type: TargetType::from_str(&target_type)?,
                    target,
                    direction,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::RecordResult {
            event,
            winner,
            score,
            market_results,
        } => {
            let result = event_result(winner, score, market_results)?;
            client.record_event_result(event, result).await?;
        }
        Commands::SettleEvent { event } => {
            let settled = client.settle_event(event).await?;
            for settlement in settled {
                println!("{}: {}", settlement.position, settlement.outcome);
            }
        }
        Commands::Resolve {
            market,
            selection,
            winner,
            score,
            market_results,
        } => {
            let outcome = client
                .resolve(ResolveRequest {
                    market: Market::from_str(&market)?,
                    selection,
                    result: event_result(winner, score, market_results)?,
                })
                .await?;
            println!("{}", outcome);
        }
    }
    Ok(())
}
