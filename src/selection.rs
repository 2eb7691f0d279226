//! Market selections parsed into one tagged predicate per market.
//!
//! Every string check on selections lives here. Anything the resolver
//! receives has already been accepted or rejected by [`parse_selection`].

use crate::api::Market;
use crate::event_result::parse_scoreline;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPick {
    Home,
    Away,
    Draw,
    /// Unrecognised pick, lower-cased. Never matches a winner.
    Other(String),
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Total {
    Over,
    Under,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cover {
    HomeOrDraw,
    DrawOrAway,
    HomeOrAway,
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    MatchResult(MatchPick),
    OverUnder { side: Total, line: Decimal },
    BothTeamsScore(bool),
    AsianHandicap { side: Side, handicap: Decimal },
    DoubleChance(Cover),
    CorrectScore { home: i64, away: i64 },
}
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("selection \"{selection}\" can't be parsed for market {market}")]
    UnparseableSelection { market: Market, selection: String },
}

impl MatchPick {
    /// Normalizes a match-result token. Also used for the winner reported by
    /// an event result so both sides compare on the same vocabulary.
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "1" | "home" | "home win" => Self::Home,
            "2" | "away" | "away win" => Self::Away,
            "x" | "draw" => Self::Draw,
            _ => Self::Other(lowered),
        }
    }
}
impl Cover {
    pub fn covers(&self, outcome: &MatchPick) -> bool {
        matches!(
            (self, outcome),
            (Self::HomeOrDraw, MatchPick::Home | MatchPick::Draw)
                | (Self::DrawOrAway, MatchPick::Draw | MatchPick::Away)
                | (Self::HomeOrAway, MatchPick::Home | MatchPick::Away)
        )
    }
}

pub fn parse_selection(market: Market, selection: &str) -> Result<Selection, SelectionError> {
    let unparseable = || SelectionError::UnparseableSelection {
        market,
        selection: selection.to_string(),
    };
    let lowered = selection.trim().to_lowercase();
    match market {
        Market::MatchResult => Ok(Selection::MatchResult(MatchPick::normalize(selection))),
        Market::OverUnder => {
            let (side, line) = two_tokens(&lowered).ok_or_else(unparseable)?;
            let side = match side {
                "over" => Total::Over,
                "under" => Total::Under,
                _ => return Err(unparseable()),
            };
            let line = parse_decimal(line).ok_or_else(unparseable)?;
            Ok(Selection::OverUnder { side, line })
        }
        Market::BothTeamsScore => match lowered.as_str() {
            "yes" | "true" | "1" => Ok(Selection::BothTeamsScore(true)),
            "no" | "false" | "0" => Ok(Selection::BothTeamsScore(false)),
            _ => Err(unparseable()),
        },
        Market::AsianHandicap => {
            let (side, handicap) = two_tokens(&lowered).ok_or_else(unparseable)?;
            let side = match side {
                "home" => Side::Home,
                "away" => Side::Away,
                _ => return Err(unparseable()),
            };
            let handicap = parse_decimal(handicap).ok_or_else(unparseable)?;
            Ok(Selection::AsianHandicap { side, handicap })
        }
        Market::DoubleChance => match lowered.as_str() {
            "1x" | "home or draw" => Ok(Selection::DoubleChance(Cover::HomeOrDraw)),
            "x2" | "draw or away" | "away or draw" => {
                Ok(Selection::DoubleChance(Cover::DrawOrAway))
            }
            "12" | "home or away" => Ok(Selection::DoubleChance(Cover::HomeOrAway)),
            _ => Err(unparseable()),
        },
        Market::CorrectScore => {
            let (home, away) = parse_scoreline(&lowered).ok_or_else(unparseable)?;
            Ok(Selection::CorrectScore { home, away })
        }
    }
}

fn two_tokens(s: &str) -> Option<(&str, &str)> {
    let mut tokens = s.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(first), Some(second), None) => Some((first, second)),
        _ => None,
    }
}

/// Signed decimal such as `2.5`, `-1.25` or `+0.5`.
fn parse_decimal(token: &str) -> Option<Decimal> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = Decimal::from_str(digits).ok()?;
    Some(if negative { -value } else { value })
}
