//! Boundary documents as they arrive from the data loader.
//!
//! Raw shapes are loosely typed (`Option` everywhere, IP types keyed by free-form
//! strings). Mapping into the typed records fails closed: a school without usable
//! `overall` metrics is rejected, while a malformed IP block, sponsor row or
//! athlete row is dropped on its own and logged. Nothing missing is ever zero-filled.

use crate::error::{RecordsError, Result};
use crate::types::{ContentRecord, IpType, ScopedRecord, TreatmentPair};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetrics {
    #[serde(alias = "posts")]
    pub contents: Option<f64>,
    pub likes: Option<f64>,
    pub comments: Option<f64>,
    #[serde(alias = "earnedMediaValue")]
    pub emv: Option<f64>,
    pub engagement_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIpBlock {
    pub yes: Option<RawMetrics>,
    pub no: Option<RawMetrics>,
    pub avg_lift: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPartner {
    pub brand: Option<String>,
    pub industry: Option<String>,
    #[serde(flatten)]
    pub metrics: RawMetrics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAthlete {
    pub name: Option<String>,
    #[serde(flatten)]
    pub metrics: RawMetrics,
    #[serde(default)]
    pub ip_usage: BTreeMap<String, RawIpBlock>,
}

/// One school's document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolDocument {
    pub school: Option<String>,
    pub region: Option<String>,
    pub overall: Option<RawMetrics>,
    #[serde(default)]
    pub ip_usage: BTreeMap<String, RawIpBlock>,
    #[serde(default)]
    pub sponsor_partners: Vec<RawPartner>,
    #[serde(default, rename = "top5Athletes")]
    pub top_athletes: Vec<RawAthlete>,
}

/// Treatment/control split for one IP type, plus the lift the source reported
#[derive(Debug, Clone, PartialEq)]
pub struct IpUsage {
    pub pair: TreatmentPair,
    /// Informational only; lift is always recomputed from the split.
    pub reported_lift: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AthleteReport {
    pub name: String,
    pub record: ContentRecord,
    pub ip_usage: Vec<IpUsage>,
}

/// Typed, validated view of a [`SchoolDocument`]
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolReport {
    pub school: String,
    pub region: Option<String>,
    pub overall: ContentRecord,
    pub ip_usage: Vec<IpUsage>,
    /// Sponsor rows labelled with school, brand and the raw industry string.
    pub partners: Vec<ScopedRecord>,
    pub athletes: Vec<AthleteReport>,
}

impl SchoolReport {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let doc: SchoolDocument = serde_json::from_slice(bytes)?;
        doc.into_report()
    }
}

impl SchoolDocument {
    pub fn into_report(self) -> Result<SchoolReport> {
        let school = non_blank(self.school).ok_or_else(|| missing("school"))?;
        let overall = self
            .overall
            .ok_or_else(|| missing("overall"))?
            .into_record("overall")?;

        let ip_usage = map_ip_blocks(&school, self.ip_usage);

        let mut partners = Vec::with_capacity(self.sponsor_partners.len());
        for (idx, raw) in self.sponsor_partners.into_iter().enumerate() {
            let Some(brand) = non_blank(raw.brand) else {
                log::warn!("{school}: sponsorPartners[{idx}] has no brand, skipping");
                continue;
            };
            match raw.metrics.into_record(&format!("sponsorPartners[{idx}]")) {
                Ok(record) => {
                    let mut row = ScopedRecord::for_school(&school, record).brand(brand);
                    row.industry = non_blank(raw.industry);
                    partners.push(row);
                }
                Err(err) => log::warn!("{school}: skipping sponsor {brand}: {err}"),
            }
        }

        let mut athletes = Vec::with_capacity(self.top_athletes.len());
        for (idx, raw) in self.top_athletes.into_iter().enumerate() {
            let Some(name) = non_blank(raw.name) else {
                log::warn!("{school}: top5Athletes[{idx}] has no name, skipping");
                continue;
            };
            match raw.metrics.into_record(&format!("top5Athletes[{idx}]")) {
                Ok(record) => {
                    let ip_usage = map_ip_blocks(&name, raw.ip_usage);
                    athletes.push(AthleteReport {
                        name,
                        record,
                        ip_usage,
                    });
                }
                Err(err) => log::warn!("{school}: skipping athlete {name}: {err}"),
            }
        }

        Ok(SchoolReport {
            school,
            region: non_blank(self.region),
            overall,
            ip_usage,
            partners,
            athletes,
        })
    }
}

impl RawMetrics {
    pub fn into_record(self, path: &str) -> Result<ContentRecord> {
        let field = |name: &str| format!("{path}.{name}");
        let contents = self.contents.ok_or_else(|| missing(&field("contents")))?;
        if !contents.is_finite() || contents < 0.0 || contents.fract() != 0.0 {
            return Err(RecordsError::InvalidMetric {
                field: field("contents"),
                value: contents,
            });
        }
        let likes = self.likes.ok_or_else(|| missing(&field("likes")))?;
        let comments = self.comments.ok_or_else(|| missing(&field("comments")))?;
        let emv = self.emv.unwrap_or(0.0);

        match self.engagement_rate {
            Some(rate) => ContentRecord::with_rate(contents as u64, likes, comments, emv, rate),
            None => ContentRecord::from_counts(contents as u64, likes, comments, emv),
        }
    }
}

fn map_ip_blocks(scope: &str, blocks: BTreeMap<String, RawIpBlock>) -> Vec<IpUsage> {
    let mut usage: Vec<IpUsage> = Vec::with_capacity(blocks.len());
    for (key, block) in blocks {
        let Some(ip_type) = IpType::from_key(&key) else {
            log::warn!("{scope}: unknown IP type '{key}', excluding block");
            continue;
        };
        if usage.iter().any(|u| u.pair.ip_type == ip_type) {
            log::warn!("{scope}: duplicate block for {ip_type} ('{key}'), keeping first");
            continue;
        }
        match map_ip_block(scope, ip_type, &key, block) {
            Ok(entry) => usage.push(entry),
            Err(err) => log::warn!("{scope}: excluding {ip_type} block: {err}"),
        }
    }
    usage.sort_by_key(|u| u.pair.ip_type);
    usage
}

fn map_ip_block(scope: &str, ip_type: IpType, key: &str, block: RawIpBlock) -> Result<IpUsage> {
    let treatment = block
        .yes
        .map(|m| m.into_record(&format!("ipUsage.{key}.yes")))
        .transpose()?;
    let control = block
        .no
        .map(|m| m.into_record(&format!("ipUsage.{key}.no")))
        .transpose()?;
    let pair = TreatmentPair::try_new(scope, ip_type, treatment, control)?;
    Ok(IpUsage {
        pair,
        reported_lift: block.avg_lift.filter(|v| v.is_finite()),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBrandSchool {
    pub school: Option<String>,
    #[serde(flatten)]
    pub metrics: RawMetrics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBrand {
    pub brand: Option<String>,
    pub industry: Option<String>,
    #[serde(default)]
    pub schools: Vec<RawBrandSchool>,
}

/// Brand-partnership summary: per-brand, per-school post and engagement counts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandSummaryDocument {
    #[serde(default)]
    pub brands: Vec<RawBrand>,
}

impl BrandSummaryDocument {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Flatten into brand × school rows, dropping any row that cannot be mapped.
    pub fn into_records(self) -> Vec<ScopedRecord> {
        let mut rows = Vec::new();
        for (b_idx, raw) in self.brands.into_iter().enumerate() {
            let Some(brand) = non_blank(raw.brand) else {
                log::warn!("brands[{b_idx}] has no brand name, skipping");
                continue;
            };
            let industry = non_blank(raw.industry);
            for (s_idx, entry) in raw.schools.into_iter().enumerate() {
                let Some(school) = non_blank(entry.school) else {
                    log::warn!("{brand}: schools[{s_idx}] has no school, skipping");
                    continue;
                };
                match entry.metrics.into_record(&format!("{brand}.schools[{s_idx}]")) {
                    Ok(record) => {
                        let mut row = ScopedRecord::for_school(school, record).brand(&brand);
                        row.industry = industry.clone();
                        rows.push(row);
                    }
                    Err(err) => log::warn!("{brand}: skipping row: {err}"),
                }
            }
        }
        rows
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing(field: &str) -> RecordsError {
    RecordsError::MissingField(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LSU: &str = r#"{
        "school": "Louisiana State University",
        "region": "South",
        "overall": {"contents": 150, "likes": 6000, "comments": 250, "emv": 1200.5},
        "ipUsage": {
            "logo": {
                "yes": {"contents": 100, "likes": 5000, "comments": 200},
                "no": {"contents": 100, "likes": 3000, "comments": 100},
                "avgLift": 67.7
            },
            "mention (in caption)": {
                "yes": {"contents": 10, "likes": 100, "comments": 5}
            },
            "hashtag": {
                "yes": {"contents": 1, "likes": 1, "comments": 1},
                "no": {"contents": 1, "likes": 1, "comments": 1}
            }
        },
        "sponsorPartners": [
            {"brand": "Raising Cane's", "industry": "Restaurant", "contents": 12, "likes": 900, "comments": 30},
            {"brand": "Nike", "contents": 3}
        ],
        "top5Athletes": [
            {"name": "Jane Doe", "contents": 40, "likes": 4000, "comments": 100, "engagementRate": 0.12}
        ]
    }"#;

    #[test]
    fn maps_school_document_and_excludes_bad_blocks() {
        let report = SchoolReport::from_json(LSU.as_bytes()).unwrap();
        assert_eq!(report.school, "Louisiana State University");
        assert_eq!(report.region.as_deref(), Some("South"));
        assert_eq!(report.overall.content_count, 150);
        assert_eq!(report.overall.earned_media_value, 1200.5);

        // caption block lacks "no"; hashtag is unknown
        assert_eq!(report.ip_usage.len(), 1);
        let logo = &report.ip_usage[0].pair;
        assert_eq!(logo.ip_type, IpType::Logo);
        assert_eq!(logo.treatment.content_count, 100);
        assert_eq!(logo.control.likes, 3000.0);
        assert_eq!(report.ip_usage[0].reported_lift, Some(67.7));

        // Nike row has no likes/comments
        assert_eq!(report.partners.len(), 1);
        assert_eq!(report.partners[0].brand.as_deref(), Some("Raising Cane's"));
        assert_eq!(report.partners[0].industry.as_deref(), Some("Restaurant"));

        assert_eq!(report.athletes.len(), 1);
        assert_eq!(report.athletes[0].record.engagement_rate, 0.12);
    }

    #[test]
    fn school_without_overall_is_rejected() {
        let err = SchoolReport::from_json(br#"{"school": "LSU"}"#).unwrap_err();
        assert!(matches!(err, RecordsError::MissingField(ref f) if f == "overall"));
    }

    #[test]
    fn overall_missing_likes_is_rejected_not_zeroed() {
        let err = SchoolReport::from_json(
            br#"{"school": "LSU", "overall": {"contents": 3, "comments": 1}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RecordsError::MissingField(ref f) if f == "overall.likes"));
    }

    #[test]
    fn fractional_content_count_is_invalid() {
        let err = SchoolReport::from_json(
            br#"{"school": "LSU", "overall": {"contents": 2.5, "likes": 1, "comments": 1}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RecordsError::InvalidMetric { .. }));
    }

    #[test]
    fn malformed_json_surfaces_as_json_error() {
        let err = SchoolReport::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, RecordsError::Json(_)));
    }

    #[test]
    fn brand_summary_flattens_rows() {
        let doc = BrandSummaryDocument::from_json(
            br#"{"brands": [
                {"brand": "Nike", "industry": "Apparel", "schools": [
                    {"school": "LSU", "posts": 4, "likes": 40, "comments": 4},
                    {"school": "", "posts": 1, "likes": 1, "comments": 1}
                ]},
                {"industry": "Food", "schools": []}
            ]}"#,
        )
        .unwrap();
        let rows = doc.into_records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].school, "LSU");
        assert_eq!(rows[0].brand.as_deref(), Some("Nike"));
        assert_eq!(rows[0].record.content_count, 4);
        assert_eq!(rows[0].record.engagement_rate, 11.0);
    }
}
