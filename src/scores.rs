//! Conversion of third-party fantasy statistics into the stored
//! fantasy-score layout.
//!
//! Input:  `seasonResult.raceResults.<race> -> {drivers: [..], constructors: [..]}`
//! Output: `<race> -> {drivers: {abbr -> line}, constructors: {abbr -> line}}`

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::error::TransformError;
use crate::types::{FantasyScoreDocument, RaceScores, ScoreLine};

/// Flattens an external statistics document into per-race score lines.
///
/// Missing sections and fields degrade to empty output or `null` values.
/// Races without any driver or constructor results (absent, `null` or blank
/// lists) are left out entirely,
/// and list entries without an abbreviation are skipped. Only a document
/// whose structure cannot be walked (a non-object where an object is
/// expected, a non-list where a list is expected) is an error.
pub fn parse_external_scores(document: &Value) -> Result<FantasyScoreDocument, TransformError> {
    let mut scores = FantasyScoreDocument::new();

    let root = expect_object(document, "$")?;
    let Some(season) = child_object(root, "seasonResult", "$")? else {
        return Ok(scores);
    };
    let Some(races) = child_object(season, "raceResults", "$.seasonResult")? else {
        return Ok(scores);
    };

    for (race_number, race) in races {
        let path = format!("$.seasonResult.raceResults.{race_number}");
        let race = expect_object(race, &path)?;
        let drivers = child_array(race, "drivers", &path)?;
        let constructors = child_array(race, "constructors", &path)?;

        if drivers.is_empty() && constructors.is_empty() {
            trace!(race = %race_number, "no results recorded, skipping race");
            continue;
        }

        let entry = RaceScores {
            drivers: score_lines(drivers, &format!("{path}.drivers"))?,
            constructors: score_lines(constructors, &format!("{path}.constructors"))?,
        };
        scores.insert(race_number.clone(), entry);
    }

    debug!(races = scores.len(), "parsed external scores");
    Ok(scores)
}

/// The parsed document as a JSON object, ready to merge into stored scores.
pub fn to_json_map(scores: &FantasyScoreDocument) -> Map<String, Value> {
    scores
        .iter()
        .map(|(race, entry)| (race.clone(), json!(entry)))
        .collect()
}

fn score_lines(entries: &[Value], path: &str) -> Result<BTreeMap<String, ScoreLine>, TransformError> {
    let mut lines = BTreeMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        let entry = expect_object(entry, &format!("{path}[{idx}]"))?;
        let Some(abbr) = abbreviation_key(entry) else {
            trace!(%path, idx, "entry without abbreviation skipped");
            continue;
        };
        lines.insert(
            abbr,
            ScoreLine {
                fantasy_cost: entry.get("price").cloned().unwrap_or(Value::Null),
                fantasy_score: entry.get("totalPoints").cloned().unwrap_or(Value::Null),
            },
        );
    }
    Ok(lines)
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, TransformError> {
    value.as_object().ok_or_else(|| mismatch(path, "an object", value))
}

// Absent and `null` both read as "no such section".
fn child_object<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a Map<String, Value>>, TransformError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(mismatch(&format!("{path}.{key}"), "an object", other)),
    }
}

// Blank values (`null`, `{}`, `""`, `false`, `0`) read as an empty list.
fn child_array<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], TransformError> {
    match parent.get(key) {
        Some(Value::Array(items)) => Ok(items.as_slice()),
        None => Ok(&[][..]),
        Some(other) if is_blank(other) => Ok(&[][..]),
        Some(other) => Err(mismatch(&format!("{path}.{key}"), "a list", other)),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

// Strings key as-is and numbers by their JSON text; blanks and other types
// cannot be keyed.
fn abbreviation_key(entry: &Map<String, Value>) -> Option<String> {
    match entry.get("abbreviation")? {
        value if is_blank(value) => None,
        Value::String(abbr) => Some(abbr.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> TransformError {
    TransformError::UnexpectedShape {
        path: path.to_owned(),
        expected,
        found: json_kind(found),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_race_single_driver() {
        let doc = json!({"seasonResult": {"raceResults": {"1": {
            "drivers": [{"abbreviation": "VER", "price": 30.5, "totalPoints": 26}],
            "constructors": []
        }}}});

        let parsed = parse_external_scores(&doc).unwrap();
        assert_eq!(
            Value::Object(to_json_map(&parsed)),
            json!({"1": {
                "drivers": {"VER": {"fantasy_cost": 30.5, "fantasy_score": 26}},
                "constructors": {}
            }})
        );
    }

    #[test]
    fn test_empty_races_are_omitted() {
        let doc = json!({"seasonResult": {"raceResults": {
            "1": {"drivers": [], "constructors": []},
            "2": {"drivers": []},
            "3": {},
            "4": {"drivers": null, "constructors": [{"abbreviation": "MCL", "price": 28.1, "totalPoints": 40}]}
        }}});

        let parsed = parse_external_scores(&doc).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["4"]);
        assert!(parsed["4"].drivers.is_empty());
        assert_eq!(parsed["4"].constructors["MCL"].fantasy_score, json!(40));
    }

    #[test]
    fn test_missing_abbreviation_skips_only_that_entry() {
        let doc = json!({"seasonResult": {"raceResults": {"5": {
            "drivers": [
                {"price": 10.0, "totalPoints": 3},
                {"abbreviation": "", "price": 9.0},
                {"abbreviation": "HAM", "price": 23.0, "totalPoints": 12}
            ]
        }}}});

        let parsed = parse_external_scores(&doc).unwrap();
        let drivers = &parsed["5"].drivers;
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers["HAM"].fantasy_cost, json!(23.0));
    }

    #[test]
    fn test_missing_price_and_points_become_null() {
        let doc = json!({"seasonResult": {"raceResults": {"2": {
            "drivers": [{"abbreviation": "NOR"}]
        }}}});

        let parsed = parse_external_scores(&doc).unwrap();
        assert_eq!(parsed["2"].drivers["NOR"].fantasy_cost, Value::Null);
        assert_eq!(parsed["2"].drivers["NOR"].fantasy_score, Value::Null);
    }

    #[test]
    fn test_absent_sections_give_empty_result() {
        assert!(parse_external_scores(&json!({})).unwrap().is_empty());
        assert!(parse_external_scores(&json!({"seasonResult": {}})).unwrap().is_empty());
        assert!(parse_external_scores(&json!({"seasonResult": null})).unwrap().is_empty());
    }

    #[test]
    fn test_blank_result_lists_skip_the_race() {
        let doc = json!({"seasonResult": {"raceResults": {
            "1": {"drivers": {}, "constructors": []},
            "2": {"drivers": [{"abbreviation": "VER", "price": 30.5, "totalPoints": 26}]},
            "3": {"drivers": "", "constructors": false},
            "4": {"drivers": 0, "constructors": null},
            "5": {"drivers": {}, "constructors": [{"abbreviation": "FER", "price": 20.0, "totalPoints": 9}]}
        }}});

        let parsed = parse_external_scores(&doc).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["2", "5"]);
        assert_eq!(parsed["2"].drivers["VER"].fantasy_score, json!(26));
        assert!(parsed["5"].drivers.is_empty());
        assert_eq!(parsed["5"].constructors["FER"].fantasy_cost, json!(20.0));
    }

    #[test]
    fn test_numeric_abbreviation_is_keyed_by_its_text() {
        let doc = json!({"seasonResult": {"raceResults": {"1": {
            "drivers": [
                {"abbreviation": 44, "price": 19.0, "totalPoints": 15},
                {"abbreviation": 0, "price": 5.0},
                {"abbreviation": true, "price": 5.0}
            ]
        }}}});

        let parsed = parse_external_scores(&doc).unwrap();
        let drivers = &parsed["1"].drivers;
        assert_eq!(drivers.keys().collect::<Vec<_>>(), vec!["44"]);
        assert_eq!(drivers["44"].fantasy_score, json!(15));
    }

    #[test]
    fn test_structural_mismatch_is_an_error() {
        let err = parse_external_scores(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(
            err,
            TransformError::UnexpectedShape {
                path: "$".into(),
                expected: "an object",
                found: "a list",
            }
        );

        let err = parse_external_scores(&json!({"seasonResult": {"raceResults": {"1": {
            "drivers": "VER"
        }}}}))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected a list at $.seasonResult.raceResults.1.drivers, found a string"
        );
    }
}
