use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;

use super::*;

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::MatchResult => "MatchResult",
            Self::OverUnder => "OverUnder",
            Self::BothTeamsScore => "BothTeamsScore",
            Self::AsianHandicap => "AsianHandicap",
            Self::DoubleChance => "DoubleChance",
            Self::CorrectScore => "CorrectScore",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for Market {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "matchresult" | "1x2" | "fulltimeresult" => Ok(Self::MatchResult),
            "overunder" | "totals" | "totalgoals" => Ok(Self::OverUnder),
            "bothteamsscore" | "bothteamstoscore" | "btts" => Ok(Self::BothTeamsScore),
            "asianhandicap" | "ah" => Ok(Self::AsianHandicap),
            "doublechance" | "dc" => Ok(Self::DoubleChance),
            "correctscore" | "exactscore" => Ok(Self::CorrectScore),
            _ => bail!("Couldn't deserialize to Market: {}", s),
        }
    }
}
impl Display for SettlementStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "Pending",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::Void => "Void",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for SettlementStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Won" => Ok(Self::Won),
            "Lost" => Ok(Self::Lost),
            "Void" => Ok(Self::Void),
            e => bail!("Couldn't deserialize to SettlementStatus: {}", e),
        }
    }
}
impl From<SettlementOutcome> for SettlementStatus {
    fn from(outcome: SettlementOutcome) -> Self {
        match outcome {
            SettlementOutcome::Won => Self::Won,
            SettlementOutcome::Lost => Self::Lost,
            SettlementOutcome::Void => Self::Void,
        }
    }
}
impl Display for SettlementOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        SettlementStatus::from(*self).fmt(f)
    }
}
impl Display for TargetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Position => "Position",
            Self::Comment => "Comment",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for TargetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "position" => Ok(Self::Position),
            "comment" => Ok(Self::Comment),
            _ => bail!("Couldn't deserialize to TargetType: {}", s),
        }
    }
}
impl Display for VoteDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Upvote => "Upvote",
            Self::Downvote => "Downvote",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for VoteDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upvote" | "up" => Ok(Self::Upvote),
            "downvote" | "down" => Ok(Self::Downvote),
            _ => bail!("Couldn't deserialize to VoteDirection: {}", s),
        }
    }
}
