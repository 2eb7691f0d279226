use crate::api::{EventResult, Market, SettlementOutcome};
use crate::event_result::ResultFacts;
use crate::selection::{parse_selection, MatchPick, Selection, Side, Total};
use log::debug;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use thiserror::Error;

/// A fact needed to settle a selection could not be read from the result.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("indeterminate result: {0} unavailable")]
pub struct IndeterminateResult(&'static str);

/// Settles one position against a finished event.
///
/// Never fails. A cancelled event, a selection that doesn't parse and a result
/// that lacks the facts the market needs all settle as
/// [`SettlementOutcome::Void`]: a wrong Won/Lost is final, a Void can be
/// adjudicated again.
pub fn resolve(market: Market, selection: &str, result: &EventResult) -> SettlementOutcome {
    let facts = ResultFacts::new(result);
    if facts.is_void() {
        debug!("Event was cancelled or abandoned, {} \"{}\" is void", market, selection);
        return SettlementOutcome::Void;
    }
    let parsed = match parse_selection(market, selection) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("{}, settling as void", e);
            return SettlementOutcome::Void;
        }
    };
    match settle(&parsed, &facts) {
        Ok(outcome) => outcome,
        Err(e) => {
            debug!("{} for {} \"{}\", settling as void", e, market, selection);
            SettlementOutcome::Void
        }
    }
}

fn settle(
    selection: &Selection,
    facts: &ResultFacts,
) -> Result<SettlementOutcome, IndeterminateResult> {
    let outcome = match selection {
        Selection::MatchResult(pick) => {
            let winner = match_winner(facts)?;
            match pick {
                MatchPick::Other(_) => SettlementOutcome::Lost,
                pick => won_if(*pick == winner),
            }
        }
        Selection::OverUnder { side, line } => {
            let goals = Decimal::from(
                facts
                    .total_goals()
                    .ok_or(IndeterminateResult("total goals"))?,
            );
            // Goal totals are integers, so only whole lines can push
            if line.fract().is_zero() && goals == *line {
                debug!("Total of {} goals pushes on line {}", goals, line);
                return Ok(SettlementOutcome::Void);
            }
            won_if(match side {
                Total::Over => goals > *line,
                Total::Under => goals < *line,
            })
        }
        Selection::BothTeamsScore(predicted) => won_if(
            *predicted
                == facts
                    .both_teams_scored()
                    .ok_or(IndeterminateResult("both teams scored"))?,
        ),
        Selection::AsianHandicap { side, handicap } => {
            let (home, away) = facts.scores().ok_or(IndeterminateResult("scores"))?;
            let (home, away) = (Decimal::from(home), Decimal::from(away));
            let adjust = |score: Decimal| {
                score
                    .checked_add(*handicap)
                    .ok_or(IndeterminateResult("adjusted scores"))
            };
            let (home, away) = match side {
                Side::Home => (adjust(home)?, away),
                Side::Away => (home, adjust(away)?),
            };
            let leader = match home.cmp(&away) {
                Ordering::Greater => Side::Home,
                Ordering::Less => Side::Away,
                Ordering::Equal => {
                    debug!("Adjusted scores {}-{} are level, handicap is void", home, away);
                    return Ok(SettlementOutcome::Void);
                }
            };
            won_if(leader == *side)
        }
        Selection::DoubleChance(cover) => won_if(cover.covers(&match_winner(facts)?)),
        Selection::CorrectScore { home, away } => {
            won_if(facts.scores().ok_or(IndeterminateResult("scores"))? == (*home, *away))
        }
    };
    Ok(outcome)
}

/// A winner outside the home/draw/away vocabulary, such as a team name, is
/// indeterminate and settles as Void rather than Lost.
fn match_winner(facts: &ResultFacts) -> Result<MatchPick, IndeterminateResult> {
    let winner = facts.winner().ok_or(IndeterminateResult("winner"))?;
    match MatchPick::normalize(&winner) {
        MatchPick::Other(_) => Err(IndeterminateResult("recognisable winner")),
        winner => Ok(winner),
    }
}

fn won_if(won: bool) -> SettlementOutcome {
    if won {
        SettlementOutcome::Won
    } else {
        SettlementOutcome::Lost
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use SettlementOutcome::*;

    fn score(score: &str) -> EventResult {
        EventResult {
            score: Some(score.to_string()),
            ..Default::default()
        }
    }
    fn payload(payload: serde_json::Value) -> EventResult {
        EventResult {
            market_results: Some(payload),
            ..Default::default()
        }
    }

    #[test]
    fn match_result_from_score() {
        let r = score("2-1");
        assert_eq!(resolve(Market::MatchResult, "Home", &r), Won);
        assert_eq!(resolve(Market::MatchResult, "Draw", &r), Lost);
        assert_eq!(resolve(Market::MatchResult, "away", &r), Lost);
        assert_eq!(resolve(Market::MatchResult, "Chelsea", &r), Lost);
    }

    #[test]
    fn match_result_synonyms_settle_identically() {
        let results = [
            score("2-1"),
            score("0:0"),
            score("1-3"),
            EventResult {
                winner: Some("X".into()),
                ..Default::default()
            },
            EventResult {
                winner: Some("Away Win".into()),
                ..Default::default()
            },
        ];
        let groups = [
            ["1", "home", "Home Win"],
            ["2", "AWAY", "away win"],
            ["x", "Draw", "DRAW"],
        ];
        for r in &results {
            for group in groups {
                let expected = resolve(Market::MatchResult, group[0], r);
                for synonym in group {
                    assert_eq!(resolve(Market::MatchResult, synonym, r), expected);
                }
            }
        }
    }

    #[test]
    fn match_result_without_recognisable_winner_is_void() {
        assert_eq!(resolve(Market::MatchResult, "Home", &EventResult::default()), Void);
        let r = EventResult {
            winner: Some("postponed".into()),
            ..Default::default()
        };
        assert_eq!(resolve(Market::MatchResult, "Home", &r), Void);
    }

    #[test]
    fn cancelled_event_is_void_for_every_selection() {
        let r = EventResult {
            score: Some("2-1".into()),
            market_results: Some(json!({"cancelled": true})),
            ..Default::default()
        };
        for selection in ["Home", "Draw", "Away", "garbage"] {
            assert_eq!(resolve(Market::MatchResult, selection, &r), Void);
        }
        assert_eq!(resolve(Market::OverUnder, "Over 2.5", &r), Void);
    }

    #[test]
    fn over_under_lines() {
        assert_eq!(resolve(Market::OverUnder, "Over 2.5", &payload(json!({"totalGoals": 3}))), Won);
        assert_eq!(resolve(Market::OverUnder, "Over 2.5", &payload(json!({"totalGoals": 2}))), Lost);
        assert_eq!(resolve(Market::OverUnder, "Under 2.5", &score("1-1")), Won);
        assert_eq!(resolve(Market::OverUnder, "Over 3", &payload(json!({"totalGoals": 3}))), Void);
        assert_eq!(resolve(Market::OverUnder, "Over 3", &score("3-1")), Won);
    }

    #[test]
    fn whole_line_push_is_void_for_both_sides() {
        for goals in 0..6 {
            let r = payload(json!({ "totalGoals": goals }));
            for side in ["Over", "Under"] {
                let selection = format!("{} {}", side, goals);
                assert_eq!(resolve(Market::OverUnder, &selection, &r), Void);
            }
        }
    }

    #[test]
    fn over_under_without_goals_or_line_is_void() {
        assert_eq!(resolve(Market::OverUnder, "Over 2.5", &EventResult::default()), Void);
        assert_eq!(resolve(Market::OverUnder, "Over", &score("3-0")), Void);
    }

    #[test]
    fn both_teams_score() {
        assert_eq!(resolve(Market::BothTeamsScore, "yes", &score("1-1")), Won);
        assert_eq!(resolve(Market::BothTeamsScore, "yes", &score("1-0")), Lost);
        assert_eq!(resolve(Market::BothTeamsScore, "No", &score("0-0")), Won);
        assert_eq!(
            resolve(Market::BothTeamsScore, "no", &payload(json!({"bothTeamsScored": true}))),
            Lost
        );
        assert_eq!(resolve(Market::BothTeamsScore, "perhaps", &score("1-1")), Void);
        assert_eq!(resolve(Market::BothTeamsScore, "yes", &EventResult::default()), Void);
    }

    #[test]
    fn asian_handicap() {
        assert_eq!(resolve(Market::AsianHandicap, "Home -1.5", &score("3-1")), Won);
        assert_eq!(resolve(Market::AsianHandicap, "Home -1.5", &score("2-1")), Lost);
        assert_eq!(resolve(Market::AsianHandicap, "Away +1.5", &score("2-1")), Won);
        assert_eq!(resolve(Market::AsianHandicap, "Away 0", &score("0-1")), Won);
        assert_eq!(resolve(Market::AsianHandicap, "Home 0.5", &score("ab")), Void);
    }

    #[test]
    fn overflowing_handicap_is_void() {
        let max = Decimal::MAX.to_string();
        for selection in [format!("Home {}", max), format!("Away {}", max)] {
            assert_eq!(resolve(Market::AsianHandicap, &selection, &score("1-1")), Void);
        }
    }

    #[test]
    fn oversized_scores_do_not_settle_totals() {
        for payload_scores in [
            json!({"homeScore": i64::MAX, "awayScore": 1}),
            json!({"homeScore": 1e300, "awayScore": 1}),
        ] {
            let r = payload(payload_scores);
            assert_eq!(resolve(Market::OverUnder, "Under 2.5", &r), Void);
            assert_eq!(resolve(Market::OverUnder, "Over 2.5", &r), Void);
        }
    }

    #[test]
    fn level_adjusted_handicap_is_void() {
        for (selection, result) in [
            ("Home -1", "2-1"),
            ("Away +1", "2-1"),
            ("Home 0", "1-1"),
            ("Away -2", "0-2"),
            ("Home +1", "0-1"),
        ] {
            assert_eq!(resolve(Market::AsianHandicap, selection, &score(result)), Void);
        }
    }

    #[test]
    fn double_chance_and_correct_score() {
        assert_eq!(resolve(Market::DoubleChance, "1X", &score("1-1")), Won);
        assert_eq!(resolve(Market::DoubleChance, "X2", &score("2-0")), Lost);
        assert_eq!(resolve(Market::CorrectScore, "2-1", &score("2:1")), Won);
        assert_eq!(resolve(Market::CorrectScore, "2-1", &score("1-2")), Lost);
        assert_eq!(resolve(Market::CorrectScore, "2-1", &EventResult::default()), Void);
    }
}
