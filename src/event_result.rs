use crate::api::EventResult;
use serde_json::{Map, Value};

/// Largest integer an f64 holds exactly (2^53).
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Canonical facts read out of an [`EventResult`].
///
/// The structured payload wins whenever it holds a usable value, the score
/// string is the fallback. Nothing here fails: malformed data reads as absent.
#[derive(Debug)]
pub struct ResultFacts<'a> {
    result: &'a EventResult,
    payload: Option<Map<String, Value>>,
}

impl<'a> ResultFacts<'a> {
    pub fn new(result: &'a EventResult) -> Self {
        let payload = match &result.market_results {
            Some(Value::Object(map)) => Some(map.clone()),
            // Some feeds ship the payload as a JSON encoded string
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        };
        Self { result, payload }
    }
    pub fn is_void(&self) -> bool {
        ["cancelled", "canceled", "abandoned"]
            .iter()
            .any(|key| self.flag(key) == Some(true))
    }
    pub fn scores(&self) -> Option<(i64, i64)> {
        if let (Some(home), Some(away)) = (self.count("homeScore"), self.count("awayScore")) {
            return Some((home, away));
        }
        self.result.score.as_deref().and_then(parse_scoreline)
    }
    pub fn total_goals(&self) -> Option<i64> {
        self.count("totalGoals")
            .or_else(|| self.scores().and_then(|(home, away)| home.checked_add(away)))
    }
    pub fn both_teams_scored(&self) -> Option<bool> {
        self.flag("bothTeamsScored")
            .or_else(|| self.flag("btts"))
            .or_else(|| self.scores().map(|(home, away)| home > 0 && away > 0))
    }
    /// The winning side as reported, falling back to the final score.
    pub fn winner(&self) -> Option<String> {
        let reported = [
            self.result.winner.as_deref(),
            self.field("winner").and_then(Value::as_str),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|w| !w.is_empty());
        if let Some(winner) = reported {
            return Some(winner.to_string());
        }
        let (home, away) = self.scores()?;
        let derived = match home.cmp(&away) {
            std::cmp::Ordering::Greater => "home",
            std::cmp::Ordering::Less => "away",
            std::cmp::Ordering::Equal => "draw",
        };
        Some(derived.to_string())
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref()?.get(key)
    }
    fn flag(&self, key: &str) -> Option<bool> {
        match self.field(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
    fn count(&self, key: &str) -> Option<i64> {
        let count = match self.field(key)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }?;
        (count >= 0).then_some(count)
    }
}

/// Parses `"<int><sep><int>"` where the separator is `-` or `:`.
pub fn parse_scoreline(score: &str) -> Option<(i64, i64)> {
    let (home, away) = score.trim().split_once(|c| c == '-' || c == ':')?;
    let home = home.trim().parse::<u32>().ok()?;
    let away = away.trim().parse::<u32>().ok()?;
    Some((home.into(), away.into()))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn result(score: Option<&str>, payload: Option<Value>) -> EventResult {
        EventResult {
            winner: None,
            score: score.map(str::to_string),
            market_results: payload,
            settled_at: None,
        }
    }

    #[test]
    fn scoreline_separators() {
        assert_eq!(parse_scoreline("2-1"), Some((2, 1)));
        assert_eq!(parse_scoreline(" 0 : 3 "), Some((0, 3)));
        assert_eq!(parse_scoreline("2"), None);
        assert_eq!(parse_scoreline("-1-2"), None);
        assert_eq!(parse_scoreline("a-b"), None);
    }

    #[test]
    fn payload_scores_win_over_score_string() {
        let r = result(Some("0-0"), Some(json!({"homeScore": 3, "awayScore": "1"})));
        let facts = ResultFacts::new(&r);
        assert_eq!(facts.scores(), Some((3, 1)));
        assert_eq!(facts.total_goals(), Some(4));
        assert_eq!(facts.both_teams_scored(), Some(true));
        assert_eq!(facts.winner().as_deref(), Some("home"));
    }

    #[test]
    fn partial_payload_falls_back_to_score_string() {
        let r = result(Some("1:1"), Some(json!({"homeScore": 3})));
        let facts = ResultFacts::new(&r);
        assert_eq!(facts.scores(), Some((1, 1)));
        assert_eq!(facts.winner().as_deref(), Some("draw"));
    }

    #[test]
    fn explicit_facts_are_preferred() {
        let r = result(
            Some("2-0"),
            Some(json!({"totalGoals": 5, "bothTeamsScored": "true"})),
        );
        let facts = ResultFacts::new(&r);
        assert_eq!(facts.total_goals(), Some(5));
        assert_eq!(facts.both_teams_scored(), Some(true));
    }

    #[test]
    fn malformed_payload_degrades_to_unknown() {
        let r = result(None, Some(json!({"homeScore": -1, "awayScore": 2.5, "cancelled": "nope"})));
        let facts = ResultFacts::new(&r);
        assert!(!facts.is_void());
        assert_eq!(facts.scores(), None);
        assert_eq!(facts.total_goals(), None);
        assert_eq!(facts.both_teams_scored(), None);
        assert_eq!(facts.winner(), None);

        let r = result(Some("3-1"), Some(json!("{not json")));
        assert_eq!(ResultFacts::new(&r).scores(), Some((3, 1)));
    }

    #[test]
    fn oversized_counts_are_unknown() {
        let r = result(None, Some(json!({"homeScore": i64::MAX, "awayScore": 1})));
        let facts = ResultFacts::new(&r);
        assert_eq!(facts.scores(), Some((i64::MAX, 1)));
        assert_eq!(facts.total_goals(), None);

        let r = result(None, Some(json!({"homeScore": 1e300, "awayScore": 1, "totalGoals": 4.0})));
        let facts = ResultFacts::new(&r);
        assert_eq!(facts.scores(), None);
        assert_eq!(facts.total_goals(), Some(4));
    }

    #[test]
    fn void_flags() {
        let r = result(Some("2-1"), Some(json!({"cancelled": true})));
        assert!(ResultFacts::new(&r).is_void());
        let r = result(None, Some(json!("{\"abandoned\": true}")));
        assert!(ResultFacts::new(&r).is_void());
        let r = result(None, Some(json!({"cancelled": false})));
        assert!(!ResultFacts::new(&r).is_void());
    }

    #[test]
    fn reported_winner_wins_over_score() {
        let mut r = result(Some("0-1"), Some(json!({"winner": "Home"})));
        assert_eq!(ResultFacts::new(&r).winner().as_deref(), Some("Home"));
        r.winner = Some(" 2 ".into());
        assert_eq!(ResultFacts::new(&r).winner().as_deref(), Some("2"));
        r.winner = Some("  ".into());
        assert_eq!(ResultFacts::new(&r).winner().as_deref(), Some("Home"));
    }
}
