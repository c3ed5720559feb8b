//! Flat rows for an external exporter. Formatting is the exporter's business.

use crate::aggregate::EntityAggregate;
use crate::network::best_for;
use crate::rank::{Leaderboard, MetricKey};
use crate::rollup::SchoolRollup;
use lift_records::IpType;
use serde::Serialize;

/// One entity × metric cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub entity: String,
    pub metric: String,
    pub value: Option<f64>,
}

/// One ranked leaderboard line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub metric: String,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_ip_type: Option<IpType>,
}

fn exported_metrics() -> Vec<MetricKey> {
    let mut metrics = vec![
        MetricKey::Contents,
        MetricKey::Likes,
        MetricKey::Comments,
        MetricKey::Emv,
        MetricKey::EngagementRate,
        MetricKey::EngagementPerPost,
    ];
    metrics.extend(IpType::ALL.iter().map(|ip| MetricKey::Lift(*ip)));
    metrics.push(MetricKey::BestLift);
    metrics
}

pub fn aggregate_rows(aggregate: &EntityAggregate) -> Vec<ExportRow> {
    exported_metrics()
        .into_iter()
        .map(|metric| ExportRow {
            entity: aggregate.name.clone(),
            metric: metric.to_string(),
            value: metric.value(aggregate),
        })
        .collect()
}

/// School × metric rows in input order.
pub fn export_rows(per_school: &[SchoolRollup]) -> Vec<ExportRow> {
    per_school
        .iter()
        .flat_map(|school| aggregate_rows(&school.aggregate))
        .collect()
}

pub fn leaderboard_rows(board: &Leaderboard) -> Vec<LeaderboardRow> {
    board
        .entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| LeaderboardRow {
            rank: idx + 1,
            entity: entry.name.clone(),
            category: entry.category.clone(),
            metric: board.metric.to_string(),
            value: board.metric.value(entry),
            best_ip_type: best_for(entry),
        })
        .collect()
}
