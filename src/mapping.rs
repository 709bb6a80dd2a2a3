//! Read-path upgrades for team and driver mappings.
//!
//! Older data directories hold team mappings as plain name lists and driver
//! mappings keyed by driver name. Both are upgraded to the current shape when
//! read; nothing here writes back to storage.

use serde_json::{json, Map, Value};

use crate::types::{DriverEntry, TeamEntry};

/// Stored team mapping, classified by on-disk shape.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamMappingShape {
    /// `["Red Bull", "Ferrari"]`
    Legacy(Vec<Value>),
    /// `[{"name": "Red Bull", "id": "RBL"}]`, or anything unrecognised.
    Current(Value),
}

impl TeamMappingShape {
    pub fn parse(raw: Value) -> Self {
        match raw {
            Value::Array(items) if matches!(items.first(), Some(Value::String(_))) => {
                Self::Legacy(items)
            }
            other => Self::Current(other),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    pub fn into_current(self) -> Value {
        match self {
            Self::Current(doc) => doc,
            Self::Legacy(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(name) => json!(TeamEntry {
                            id: derived_team_id(&name),
                            name,
                        }),
                        other => other,
                    })
                    .collect(),
            ),
        }
    }
}

/// Stored driver mapping, classified by on-disk shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverMappingShape {
    /// `{"Max Verstappen": {"id": "VER", "team": "Red Bull"}}`
    Legacy(Map<String, Value>),
    /// `{"VER": {"name": "Max Verstappen", "team_id": "RBL"}}`, an empty
    /// mapping, or anything unrecognised.
    Current(Value),
}

impl DriverMappingShape {
    pub fn parse(raw: Value) -> Self {
        match raw {
            Value::Object(map) if looks_legacy(&map) => Self::Legacy(map),
            other => Self::Current(other),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Re-keys a legacy mapping on driver id, resolving team names against
    /// `teams`. Current documents pass through untouched.
    pub fn into_current(self, teams: &[TeamEntry]) -> Value {
        let legacy = match self {
            Self::Current(doc) => return doc,
            Self::Legacy(map) => map,
        };

        let mut upgraded = Map::with_capacity(legacy.len());
        for (name, details) in legacy {
            let Some(key) = details.get("id").map(key_text) else {
                continue;
            };
            let team_name = details.get("team").and_then(Value::as_str).unwrap_or("");
            let team_id = resolve_team_id(teams, team_name);
            upgraded.insert(key, json!(DriverEntry { name, team_id }));
        }
        Value::Object(upgraded)
    }
}

// Every value carries an `id`, and the first one has no `name` yet.
fn looks_legacy(map: &Map<String, Value>) -> bool {
    let Some(first) = map.values().next() else {
        return false;
    };
    first.get("name").is_none() && map.values().all(|v| v.get("id").is_some())
}

fn resolve_team_id(teams: &[TeamEntry], team_name: &str) -> String {
    // last match wins when a year lists the same team name twice
    teams
        .iter()
        .rev()
        .find(|team| team.name == team_name)
        .map(|team| team.id.clone())
        .unwrap_or_default()
}

/// Uppercased first three characters of a team name.
pub fn derived_team_id(name: &str) -> String {
    name.to_uppercase().chars().take(3).collect()
}

/// Strings as-is, anything else as its JSON text.
fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Team entries of a (normalized) team mapping that carry a string `name`
/// and an `id`. Non-string ids are taken as their JSON text; entries missing
/// either field are skipped.
pub fn team_entries(doc: &Value) -> Vec<TeamEntry> {
    let Some(items) = doc.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            Some(TeamEntry {
                name: item.get("name")?.as_str()?.to_owned(),
                id: key_text(item.get("id")?),
            })
        })
        .collect()
}

pub fn normalize_team_mapping(raw: Value) -> Value {
    TeamMappingShape::parse(raw).into_current()
}

pub fn normalize_driver_mapping(raw: Value, teams: &[TeamEntry]) -> Value {
    DriverMappingShape::parse(raw).into_current(teams)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams() -> Vec<TeamEntry> {
        vec![
            TeamEntry { name: "Red Bull".into(), id: "RBL".into() },
            TeamEntry { name: "Ferrari".into(), id: "FER".into() },
        ]
    }

    #[test]
    fn test_legacy_team_list_gets_ids() {
        let out = normalize_team_mapping(json!(["Red Bull", "Ferrari"]));
        assert_eq!(
            out,
            json!([{"name": "Red Bull", "id": "RED"}, {"name": "Ferrari", "id": "FER"}])
        );
    }

    #[test]
    fn test_current_team_list_untouched() {
        let doc = json!([{"name": "Red Bull", "id": "RBL"}]);
        assert!(!TeamMappingShape::parse(doc.clone()).is_legacy());
        assert_eq!(normalize_team_mapping(doc.clone()), doc);
        assert_eq!(normalize_team_mapping(json!([])), json!([]));
    }

    #[test]
    fn test_short_and_unicode_team_names() {
        assert_eq!(derived_team_id("Rb"), "RB");
        assert_eq!(derived_team_id("Škoda Racing"), "ŠKO");
    }

    #[test]
    fn test_legacy_driver_mapping_rekeyed() {
        let raw = json!({"Max Verstappen": {"id": "VER", "team": "Red Bull"}});
        assert!(DriverMappingShape::parse(raw.clone()).is_legacy());

        let out = normalize_driver_mapping(raw, &teams());
        assert_eq!(out, json!({"VER": {"name": "Max Verstappen", "team_id": "RBL"}}));
    }

    #[test]
    fn test_unknown_team_resolves_to_empty_id() {
        let raw = json!({
            "Charles Leclerc": {"id": "LEC", "team": "Ferrari"},
            "Some Rookie": {"id": "ROO", "team": "Nonexistent"},
            "No Team": {"id": "NOT"}
        });
        let out = normalize_driver_mapping(raw, &teams());
        assert_eq!(out["LEC"]["team_id"], "FER");
        assert_eq!(out["ROO"]["team_id"], "");
        assert_eq!(out["NOT"]["team_id"], "");
        assert_eq!(out["NOT"]["name"], "No Team");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = json!({
            "Max Verstappen": {"id": "VER", "team": "Red Bull"},
            "Charles Leclerc": {"id": "LEC", "team": "Ferrari"}
        });
        let once = normalize_driver_mapping(raw, &teams());
        let twice = normalize_driver_mapping(once.clone(), &teams());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_current_and_odd_shapes_pass_through() {
        let current = json!({"VER": {"name": "Max Verstappen", "team_id": "RBL"}});
        assert_eq!(normalize_driver_mapping(current.clone(), &teams()), current);

        // first value already has a name, so the document is left alone
        let mixed = json!({
            "VER": {"id": "VER", "name": "Max Verstappen"},
            "Charles Leclerc": {"id": "LEC", "team": "Ferrari"}
        });
        assert_eq!(normalize_driver_mapping(mixed.clone(), &teams()), mixed);

        // a value without an id disqualifies the legacy reading
        let partial = json!({"Max Verstappen": {"team": "Red Bull"}});
        assert_eq!(normalize_driver_mapping(partial.clone(), &teams()), partial);

        assert_eq!(normalize_driver_mapping(json!({}), &teams()), json!({}));
        assert_eq!(normalize_driver_mapping(json!([1, 2]), &teams()), json!([1, 2]));
    }

    #[test]
    fn test_non_string_ids_are_stringified() {
        let raw = json!({"Max Verstappen": {"id": 1, "team": "Red Bull"}});
        let out = normalize_driver_mapping(raw, &teams());
        assert_eq!(out, json!({"1": {"name": "Max Verstappen", "team_id": "RBL"}}));
    }

    #[test]
    fn test_team_entries_skips_malformed() {
        let doc = json!([{"name": "Red Bull", "id": "RBL"}, {"name": "Ferrari"}, "McLaren"]);
        assert_eq!(
            team_entries(&doc),
            vec![TeamEntry { name: "Red Bull".into(), id: "RBL".into() }]
        );
        assert!(team_entries(&json!({})).is_empty());
    }

    #[test]
    fn test_numeric_team_ids_still_resolve() {
        let doc = json!([{"name": "Red Bull", "id": 9}, {"name": "Ferrari", "id": "FER"}]);
        let teams = team_entries(&doc);
        assert_eq!(teams[0], TeamEntry { name: "Red Bull".into(), id: "9".into() });

        let raw = json!({"Max Verstappen": {"id": "VER", "team": "Red Bull"}});
        let out = normalize_driver_mapping(raw, &teams);
        assert_eq!(out, json!({"VER": {"name": "Max Verstappen", "team_id": "9"}}));
    }
}
