use crate::error::{RecordsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of IP signal carried by a post (treatment dimension for lift)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpType {
    /// Brand logo visible in the post
    Logo,
    /// Tagged collaboration with the brand
    Collaboration,
    /// Brand named in the caption
    CaptionMention,
}

impl IpType {
    pub const ALL: [IpType; 3] = [IpType::Logo, IpType::Collaboration, IpType::CaptionMention];

    pub fn as_str(&self) -> &'static str {
        match self {
            IpType::Logo => "logo",
            IpType::Collaboration => "collaboration",
            IpType::CaptionMention => "caption_mention",
        }
    }

    /// Map a loosely-named document key onto an IP type.
    ///
    /// Returns `None` for anything unrecognised so callers can exclude the block
    /// instead of guessing.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "logo" | "logos" => Some(IpType::Logo),
            "collab" | "collabs" | "collaboration" | "collaborations" => {
                Some(IpType::Collaboration)
            }
            "mention" | "caption" | "caption_mention" | "caption mention"
            | "mention (in caption)" | "mention_in_caption" => Some(IpType::CaptionMention),
            _ => None,
        }
    }
}

impl fmt::Display for IpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpType {
    type Err = RecordsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_key(s).ok_or_else(|| RecordsError::UnknownIpType(s.to_string()))
    }
}

/// Engagement metrics for one entity scope
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub content_count: u64,
    pub likes: f64,
    pub comments: f64,
    pub earned_media_value: f64,
    pub engagement_rate: f64,
}

impl ContentRecord {
    /// Build a record whose engagement rate is derived as interactions per post.
    pub fn from_counts(content_count: u64, likes: f64, comments: f64, emv: f64) -> Result<Self> {
        check_metric("likes", likes)?;
        check_metric("comments", comments)?;
        check_metric("earnedMediaValue", emv)?;
        let engagement_rate = if content_count > 0 {
            (likes + comments) / content_count as f64
        } else {
            0.0
        };
        Ok(Self {
            content_count,
            likes,
            comments,
            earned_media_value: emv,
            engagement_rate,
        })
    }

    /// Build a record with an externally supplied engagement rate.
    pub fn with_rate(
        content_count: u64,
        likes: f64,
        comments: f64,
        emv: f64,
        engagement_rate: f64,
    ) -> Result<Self> {
        check_metric("engagementRate", engagement_rate)?;
        let mut record = Self::from_counts(content_count, likes, comments, emv)?;
        record.engagement_rate = engagement_rate;
        Ok(record)
    }

    pub fn interactions(&self) -> f64 {
        self.likes + self.comments
    }

    /// Interactions per post, `0` for an empty record.
    pub fn engagement_per_post(&self) -> f64 {
        if self.content_count == 0 {
            0.0
        } else {
            self.interactions() / self.content_count as f64
        }
    }

    /// Component-wise sum. The rate is re-weighted by content count.
    pub fn combine(&self, other: &ContentRecord) -> ContentRecord {
        let content_count = self.content_count + other.content_count;
        let weighted = self.engagement_rate * self.content_count as f64
            + other.engagement_rate * other.content_count as f64;
        ContentRecord {
            content_count,
            likes: self.likes + other.likes,
            comments: self.comments + other.comments,
            earned_media_value: self.earned_media_value + other.earned_media_value,
            engagement_rate: if content_count > 0 {
                weighted / content_count as f64
            } else {
                0.0
            },
        }
    }
}

fn check_metric(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RecordsError::InvalidMetric {
            field: field.to_string(),
            value,
        })
    }
}

/// "With IP usage" and "without IP usage" records for one scope and IP type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPair {
    pub scope: String,
    pub ip_type: IpType,
    pub treatment: ContentRecord,
    pub control: ContentRecord,
}

impl TreatmentPair {
    /// Pair up two optional sides. Either side missing is an error, never a zero record.
    pub fn try_new(
        scope: impl Into<String>,
        ip_type: IpType,
        treatment: Option<ContentRecord>,
        control: Option<ContentRecord>,
    ) -> Result<Self> {
        let scope = scope.into();
        let incomplete = |side| RecordsError::IncompletePair {
            scope: scope.clone(),
            ip_type: ip_type.to_string(),
            side,
        };
        let treatment = treatment.ok_or_else(|| incomplete("yes"))?;
        let control = control.ok_or_else(|| incomplete("no"))?;
        Ok(Self {
            scope,
            ip_type,
            treatment,
            control,
        })
    }
}

/// A record with the labels it can be grouped by
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopedRecord {
    pub school: String,
    pub brand: Option<String>,
    pub athlete: Option<String>,
    pub industry: Option<String>,
    pub ip_type: Option<IpType>,
    pub record: ContentRecord,
}

impl ScopedRecord {
    pub fn for_school(school: impl Into<String>, record: ContentRecord) -> Self {
        Self {
            school: school.into(),
            record,
            ..Self::default()
        }
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn athlete(mut self, athlete: impl Into<String>) -> Self {
        self.athlete = Some(athlete.into());
        self
    }

    pub fn ip_type(mut self, ip_type: IpType) -> Self {
        self.ip_type = Some(ip_type);
        self
    }
}
