use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lift_records::{IndustryClassifier, NameAliases, RegionMap};
use serde::Deserialize;

use crate::rollup::Normalizer;

const BUILTIN_DEFAULT: &str = include_str!("../../../profiles/default.json");

const SCHEMA_VERSION: u32 = 1;

/// Report profile: name normalization tables and passthrough benchmark inputs
#[derive(Clone, Debug)]
pub struct ReportProfile {
    name: String,
    description: Option<String>,
    normalizer: Normalizer,
    benchmarks: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(default)]
    schema_version: Option<u32>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    schools: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    brands: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    industries: Vec<RawIndustryRule>,
    fallback_industry: Option<String>,
    #[serde(default)]
    regions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    benchmarks: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawIndustryRule {
    category: String,
    #[serde(default)]
    keywords: Vec<String>,
}

impl ReportProfile {
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "default" => Some(
                Self::from_bytes("default", BUILTIN_DEFAULT.as_bytes())
                    .expect("builtin default profile must parse"),
            ),
            _ => None,
        }
    }

    /// Built-in profile by name, otherwise a profile file at `name_or_path`.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if let Some(profile) = Self::builtin(name_or_path) {
            return Ok(profile);
        }
        Self::load(Path::new(name_or_path))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        let fallback_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom");
        Self::from_bytes(fallback_name, &bytes)
            .with_context(|| format!("Invalid profile {}", path.display()))
    }

    pub fn from_bytes(fallback_name: &str, bytes: &[u8]) -> Result<Self> {
        let raw = parse_raw(bytes)?;
        Self::from_raw(fallback_name, raw)
    }

    fn from_raw(fallback_name: &str, raw: RawProfile) -> Result<Self> {
        if let Some(schema_version) = raw.schema_version {
            if schema_version != SCHEMA_VERSION {
                return Err(anyhow!(
                    "schema_version {schema_version} is not supported (expected {SCHEMA_VERSION})"
                ));
            }
        }

        let schools = alias_table("schools", &raw.schools)?;
        let brands = alias_table("brands", &raw.brands)?;

        let mut industries = IndustryClassifier::new();
        for (idx, rule) in raw.industries.iter().enumerate() {
            if rule.category.trim().is_empty() {
                return Err(anyhow!("industries[{idx}].category must not be empty"));
            }
            industries = industries.rule(&rule.category, &rule.keywords);
        }
        if let Some(fallback) = raw.fallback_industry.as_deref() {
            industries = industries.with_fallback(fallback);
        }

        let mut regions = RegionMap::new();
        for (region, members) in &raw.regions {
            for school in members {
                regions.insert(&schools.resolve(school), region);
            }
        }

        if let Some((key, value)) = raw.benchmarks.iter().find(|(_, v)| !v.is_finite()) {
            return Err(anyhow!("benchmarks.{key} must be a finite number (got {value})"));
        }

        Ok(Self {
            name: raw.name.unwrap_or_else(|| fallback_name.to_string()),
            description: raw.description,
            normalizer: Normalizer {
                schools,
                brands,
                industries,
                regions,
            },
            benchmarks: raw.benchmarks,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Illustrative benchmark figures, reported as given.
    #[must_use]
    pub fn benchmarks(&self) -> &BTreeMap<String, f64> {
        &self.benchmarks
    }
}

fn alias_table(field: &str, raw: &BTreeMap<String, Vec<String>>) -> Result<NameAliases> {
    let mut table = NameAliases::new();
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for (canonical, aliases) in raw {
        if canonical.trim().is_empty() {
            return Err(anyhow!("{field} has an empty canonical name"));
        }
        for alias in aliases.iter().chain(std::iter::once(canonical)) {
            let folded = alias.trim().to_lowercase();
            if let Some(owner) = owners.get(&folded) {
                if *owner != canonical.as_str() {
                    return Err(anyhow!(
                        "{field}: alias '{alias}' maps to both '{owner}' and '{canonical}'"
                    ));
                }
            }
            owners.insert(folded, canonical.as_str());
            table.insert(alias, canonical);
        }
    }
    Ok(table)
}

fn parse_raw(bytes: &[u8]) -> Result<RawProfile> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => {
            let utf8 = std::str::from_utf8(bytes).map_err(|err| anyhow!("{json_err}; {err}"))?;
            let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                anyhow!(
                    "Profile is not valid JSON or TOML ({json_err}); TOML parse error: {toml_err}"
                )
            })?;
            serde_json::to_value(toml_value)
                .map_err(|err| anyhow!("Failed to convert TOML profile to JSON: {err}"))?
        }
    };

    validate_profile_value(&value)?;
    serde_json::from_value(value).map_err(|err| anyhow!("Profile parse error: {err}"))
}

fn validate_profile_value(value: &serde_json::Value) -> Result<()> {
    const ROOT_KEYS: &[&str] = &[
        "schema_version",
        "name",
        "description",
        "schools",
        "brands",
        "industries",
        "fallback_industry",
        "regions",
        "benchmarks",
    ];
    const RULE_KEYS: &[&str] = &["category", "keywords"];

    let serde_json::Value::Object(root) = value else {
        return Err(anyhow!("Profile must be an object"));
    };

    let mut unknown = Vec::new();
    for key in root.keys() {
        if !ROOT_KEYS.contains(&key.as_str()) {
            unknown.push(key.clone());
        }
    }
    if let Some(serde_json::Value::Array(rules)) = root.get("industries") {
        for (idx, rule) in rules.iter().enumerate() {
            if let serde_json::Value::Object(obj) = rule {
                for key in obj.keys() {
                    if !RULE_KEYS.contains(&key.as_str()) {
                        unknown.push(format!("industries[{idx}].{key}"));
                    }
                }
            }
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Unknown profile fields: {}", unknown.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn parses_builtin_default() {
        let profile = ReportProfile::builtin("default").unwrap();
        assert_eq!(profile.name(), "default");
        assert!(profile
            .description()
            .is_some_and(|d| d.contains("conference regions")));
        let n = profile.normalizer();
        assert_eq!(n.school("Louisiana State University"), "LSU");
        assert_eq!(n.school("lsu tigers"), "LSU");
        assert_eq!(n.brand("CANES"), "Raising Cane's");
        assert_eq!(n.industries.classify("Raising Cane's", None), "Food & Beverage");
        assert_eq!(n.regions.region_of("Alabama"), Some("South"));
        assert!(profile.benchmarks().is_empty());
    }

    #[test]
    fn unknown_builtin_is_none() {
        assert!(ReportProfile::builtin("quality").is_none());
    }

    #[test]
    fn rejects_unknown_fields_with_paths() {
        let err = ReportProfile::from_bytes(
            "bad",
            br#"{"schema_version": 1, "colors": {}, "industries": [{"category": "Food", "emoji": "x"}]}"#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("colors"), "{err}");
        assert!(err.contains("industries[0].emoji"), "{err}");
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        let err = ReportProfile::from_bytes("bad", br#"{"schema_version": 2}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("schema_version 2"), "{err}");
    }

    #[test]
    fn rejects_conflicting_aliases() {
        let err = ReportProfile::from_bytes(
            "bad",
            br#"{"schools": {"LSU": ["Tigers"], "Auburn": ["tigers"]}}"#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("'Auburn' and 'LSU'"), "{err}");
    }

    #[test]
    fn loads_toml_profile_with_benchmarks() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
schema_version = 1
fallback_industry = "Misc"

[schools]
"Ole Miss" = ["University of Mississippi"]

[regions]
South = ["University of Mississippi"]

[benchmarks]
idle_athlete_share = 0.4
"#
        )
        .unwrap();
        let profile = ReportProfile::load(file.path()).unwrap();
        let n = profile.normalizer();
        assert_eq!(n.school("university of mississippi"), "Ole Miss");
        assert_eq!(n.regions.region_of("Ole Miss"), Some("South"));
        assert_eq!(n.industries.classify("Acme", None), "Misc");
        assert_eq!(profile.benchmarks().get("idle_athlete_share"), Some(&0.4));
        assert_eq!(profile.description(), None);
    }

    #[test]
    fn resolve_reports_missing_file() {
        let err = ReportProfile::resolve("/nonexistent/profile.json").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read profile"));
    }
}
