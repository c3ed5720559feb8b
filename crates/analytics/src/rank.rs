use crate::aggregate::EntityAggregate;
use crate::error::{AnalyticsError, Result};
use crate::lift::best_ip_type;
use lift_records::IpType;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Column a leaderboard can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    Contents,
    Likes,
    Comments,
    Emv,
    EngagementRate,
    EngagementPerPost,
    Lift(IpType),
    BestLift,
}

impl MetricKey {
    /// Metric value for `aggregate`; `None` only for undefined lifts.
    pub fn value(&self, aggregate: &EntityAggregate) -> Option<f64> {
        match self {
            MetricKey::Contents => Some(aggregate.total_contents as f64),
            MetricKey::Likes => Some(aggregate.total_likes),
            MetricKey::Comments => Some(aggregate.total_comments),
            MetricKey::Emv => Some(aggregate.total_emv),
            MetricKey::EngagementRate => Some(aggregate.avg_engagement_rate),
            MetricKey::EngagementPerPost => Some(aggregate.engagement_per_post()),
            MetricKey::Lift(ip_type) => aggregate.lift_percent(*ip_type),
            MetricKey::BestLift => best_ip_type(&aggregate.lifts).map(|(_, pct)| pct),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKey::Contents => f.write_str("contents"),
            MetricKey::Likes => f.write_str("likes"),
            MetricKey::Comments => f.write_str("comments"),
            MetricKey::Emv => f.write_str("emv"),
            MetricKey::EngagementRate => f.write_str("engagement_rate"),
            MetricKey::EngagementPerPost => f.write_str("engagement_per_post"),
            MetricKey::Lift(ip_type) => write!(f, "lift:{ip_type}"),
            MetricKey::BestLift => f.write_str("best_lift"),
        }
    }
}

impl FromStr for MetricKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        if let Some(ip) = key.strip_prefix("lift:") {
            let ip_type =
                IpType::from_key(ip).ok_or_else(|| AnalyticsError::UnknownMetric(s.to_string()))?;
            return Ok(MetricKey::Lift(ip_type));
        }
        match key.as_str() {
            "contents" | "posts" => Ok(MetricKey::Contents),
            "likes" => Ok(MetricKey::Likes),
            "comments" => Ok(MetricKey::Comments),
            "emv" => Ok(MetricKey::Emv),
            "engagement_rate" | "rate" => Ok(MetricKey::EngagementRate),
            "engagement_per_post" => Ok(MetricKey::EngagementPerPost),
            "best_lift" => Ok(MetricKey::BestLift),
            _ => Err(AnalyticsError::UnknownMetric(s.to_string())),
        }
    }
}

impl Serialize for MetricKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub fn toggled(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl FromStr for Direction {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(AnalyticsError::UnknownDirection(s.to_string())),
        }
    }
}

pub type Predicate = Box<dyn Fn(&EntityAggregate) -> bool + Send + Sync>;

/// Leaderboard request: sort column, direction, and optional narrowing
pub struct RankQuery {
    pub metric: MetricKey,
    pub direction: Direction,
    search: Option<String>,
    filter: Option<Predicate>,
}

impl RankQuery {
    pub fn new(metric: MetricKey) -> Self {
        Self {
            metric,
            direction: Direction::default(),
            search: None,
            filter: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Case-insensitive substring match on the entity name. Blank means no search.
    pub fn search(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into().trim().to_lowercase();
        self.search = (!needle.is_empty()).then_some(needle);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Same query with the direction flipped.
    pub fn toggle_direction(&mut self) {
        self.direction = self.direction.toggled();
    }

    fn admits(&self, aggregate: &EntityAggregate) -> bool {
        if let Some(needle) = &self.search {
            if !aggregate.name.to_lowercase().contains(needle.as_str()) {
                return false;
            }
        }
        self.filter.as_ref().map_or(true, |f| f(aggregate))
    }
}

/// Ordered view over aggregates, recomputed per query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub metric: MetricKey,
    pub direction: Direction,
    pub entries: Vec<EntityAggregate>,
}

impl Leaderboard {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.entries.iter().map(|e| self.metric.value(e)).collect()
    }

    pub fn truncate(mut self, limit: usize) -> Self {
        self.entries.truncate(limit);
        self
    }
}

/// Search, filter, then stable-sort a copy of `aggregates`.
///
/// Equal values keep their input order. Undefined values sort last in either
/// direction.
pub fn rank(aggregates: &[EntityAggregate], query: &RankQuery) -> Leaderboard {
    let mut keyed: Vec<(Option<f64>, &EntityAggregate)> = aggregates
        .iter()
        .filter(|a| query.admits(a))
        .map(|a| (query.metric.value(a), a))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_values(*a, *b, query.direction));

    log::debug!(
        "Ranked {} of {} entities by {} {:?}",
        keyed.len(),
        aggregates.len(),
        query.metric,
        query.direction
    );

    Leaderboard {
        metric: query.metric,
        direction: query.direction,
        entries: keyed.into_iter().map(|(_, a)| a.clone()).collect(),
    }
}

fn compare_values(a: Option<f64>, b: Option<f64>, direction: Direction) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            Direction::Asc => a.total_cmp(&b),
            Direction::Desc => b.total_cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Common leaderboard predicates
pub mod filters {
    use super::Predicate;
    use lift_records::IpType;

    /// Entities whose category equals `category` (case-insensitive).
    pub fn category_is(category: &str) -> Predicate {
        let wanted = category.trim().to_lowercase();
        Box::new(move |a| {
            a.category
                .as_deref()
                .is_some_and(|c| c.trim().to_lowercase() == wanted)
        })
    }

    /// Entities with a defined lift for `ip_type` strictly above `percent`.
    pub fn lift_above(ip_type: IpType, percent: f64) -> Predicate {
        Box::new(move |a| a.lift_percent(ip_type).is_some_and(|pct| pct > percent))
    }

    pub fn min_contents(min: u64) -> Predicate {
        Box::new(move |a| a.total_contents >= min)
    }

    pub fn non_empty() -> Predicate {
        Box::new(|a| !a.is_empty())
    }

    /// Every predicate must hold.
    pub fn all(predicates: Vec<Predicate>) -> Predicate {
        Box::new(move |a| predicates.iter().all(|p| p(a)))
    }
}
