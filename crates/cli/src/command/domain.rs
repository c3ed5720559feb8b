use anyhow::Result;
use clap::ValueEnum;
use lift_analytics::{
    Coverage, Direction, ExportRow, LeaderboardRow, LiftResult, MetricKey, NetworkAggregate,
};
use lift_records::IpType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    /// Per-request override of the data sources given on the command line.
    #[serde(default)]
    pub source: Option<SourceOverrides>,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Leaderboard,
    Network,
    Lift,
    Export,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SourceOverrides {
    pub data: Option<PathBuf>,
    pub brands: Option<PathBuf>,
    pub profile: Option<String>,
}

/// Where a report's records come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub data_dir: PathBuf,
    pub brands: Option<PathBuf>,
    pub profile: String,
}

impl DataSource {
    pub fn with_overrides(mut self, overrides: Option<SourceOverrides>) -> Self {
        if let Some(overrides) = overrides {
            if let Some(data) = overrides.data {
                self.data_dir = data;
            }
            if overrides.brands.is_some() {
                self.brands = overrides.brands;
            }
            if let Some(profile) = overrides.profile {
                self.profile = profile;
            }
        }
        self
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    School,
    Brand,
    /// Schools totalled from the brand summary's partner rows.
    PartnerSchool,
    Athlete,
    Industry,
    Region,
    IpType,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LeaderboardPayload {
    pub entity: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Industry for brands, region for schools, school for athletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// `ip:percent`, e.g. `logo:25`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_lift: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_contents: Option<u64>,
    pub hide_empty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkPayload {
    /// Drop the per-category breakdowns from the output.
    pub totals_only: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LiftPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExportPayload {
    /// Append the network totals after the per-school rows.
    pub include_network: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct LeaderboardOutput {
    pub entity: EntityKind,
    pub metric: MetricKey,
    pub direction: Direction,
    /// Entries after search and filters, before `limit`.
    pub total: usize,
    pub rows: Vec<LeaderboardRow>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NetworkOutput {
    pub network: NetworkAggregate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub benchmarks: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SchoolLiftRow {
    pub school: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub lifts: BTreeMap<IpType, LiftResult>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub reported_lifts: BTreeMap<IpType, f64>,
    pub best_ip_type: Option<IpType>,
    pub best_lift_percent: Option<f64>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LiftOutput {
    pub schools: Vec<SchoolLiftRow>,
    pub network_best_ip_type: Option<IpType>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ExportOutput {
    pub rows: Vec<ExportRow>,
}

#[derive(Debug, Serialize, Clone)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
    pub meta: ResponseMeta,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone)]
pub struct Hint {
    #[serde(rename = "type")]
    pub kind: HintKind,
    pub text: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Info,
    Warn,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schools: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

pub struct CommandOutcome {
    pub data: Value,
    pub hints: Vec<Hint>,
    pub meta: ResponseMeta,
    pub coverage: Option<Coverage>,
}

impl CommandOutcome {
    pub fn from_value<T: Serialize>(value: T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(value)?,
            hints: Vec::new(),
            meta: ResponseMeta::default(),
            coverage: None,
        })
    }
}

pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(Into::into)
}

/// Stable machine-readable code plus an optional hint for an error message
#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub code: &'static str,
    pub hint: Option<Hint>,
}

pub fn classify_error(message: &str, action: Option<CommandAction>) -> ErrorClassification {
    let (code, hint) = if message.contains("Unknown metric") {
        (
            "invalid_metric",
            Some(
                "Metrics: contents, likes, comments, emv, engagement_rate, engagement_per_post, \
                 best_lift, lift:<logo|collaboration|caption_mention>",
            ),
        )
    } else if message.contains("Unknown sort direction")
        || message.contains("--min-lift")
        || message.contains("needs a brand summary")
    {
        ("invalid_request", None)
    } else if message.contains("No school documents")
        || message.contains("Failed to read data directory")
    {
        (
            "no_data",
            Some("Point --data at a directory containing one <school>.json per school."),
        )
    } else if message.contains("School not found") {
        ("not_found", None)
    } else if message.contains("Failed to load profile") {
        (
            "invalid_profile",
            Some("Pass --profile default or a path to a JSON/TOML profile file."),
        )
    } else if message.contains("Invalid JSON")
        || message.contains("unknown field")
        || message.contains("unknown variant")
    {
        ("invalid_request", None)
    } else {
        ("internal", None)
    };

    let hint = hint.map(|text| Hint {
        kind: HintKind::Info,
        text: text.to_string(),
    });
    if code == "internal" {
        log::debug!("Unclassified error for {action:?}: {message}");
    }
    ErrorClassification { code, hint }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_defaults_to_empty_payload() {
        let request: CommandRequest = serde_json::from_str(r#"{"action":"network"}"#).unwrap();
        assert_eq!(request.action, CommandAction::Network);
        assert!(request.payload.as_object().unwrap().is_empty());
        assert!(request.source.is_none());
    }

    #[test]
    fn leaderboard_payload_rejects_unknown_keys() {
        let err = parse_payload::<LeaderboardPayload>(serde_json::json!({"metrc": "likes"}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("unknown field"), "{err}");
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = DataSource {
            data_dir: PathBuf::from("data"),
            brands: Some(PathBuf::from("brands.json")),
            profile: "default".to_string(),
        };
        let merged = base.clone().with_overrides(Some(SourceOverrides {
            data: Some(PathBuf::from("other")),
            ..Default::default()
        }));
        assert_eq!(merged.data_dir, PathBuf::from("other"));
        assert_eq!(merged.brands, base.brands);
        assert_eq!(merged.profile, "default");
    }

    #[test]
    fn classifies_metric_errors() {
        let c = classify_error("Unknown metric: reach", Some(CommandAction::Leaderboard));
        assert_eq!(c.code, "invalid_metric");
        assert!(c.hint.is_some());
        assert_eq!(classify_error("boom", None).code, "internal");
    }

    #[test]
    fn only_profile_load_failures_are_profile_errors() {
        let load = classify_error(
            "Failed to load profile 'strict': Unknown profile fields: extra",
            None,
        );
        assert_eq!(load.code, "invalid_profile");
        assert!(load.hint.is_some());

        let unrelated = classify_error(
            "Invalid JSON in athlete_profile.json: expected value",
            Some(CommandAction::Leaderboard),
        );
        assert_eq!(unrelated.code, "invalid_request");
        assert_eq!(classify_error("user profile cache missing", None).code, "internal");
    }

    #[test]
    fn partner_school_without_brands_is_a_request_error() {
        let c = classify_error(
            "The partner_school leaderboard needs a brand summary (--brands)",
            Some(CommandAction::Leaderboard),
        );
        assert_eq!(c.code, "invalid_request");
    }
}
