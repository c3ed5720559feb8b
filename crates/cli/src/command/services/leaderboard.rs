use crate::command::context::ReportData;
use crate::command::domain::{
    parse_payload, CommandOutcome, LeaderboardOutput, LeaderboardPayload,
};
use anyhow::{anyhow, Result};
use lift_analytics::{filters, leaderboard_rows, rank, Direction, MetricKey, Predicate, RankQuery};
use lift_records::IpType;
use serde_json::Value;

pub const DEFAULT_METRIC: &str = "engagement_rate";

#[derive(Default)]
pub struct LeaderboardService;

impl LeaderboardService {
    pub fn run(&self, payload: Value, data: &ReportData) -> Result<CommandOutcome> {
        let payload: LeaderboardPayload = parse_payload(payload)?;
        let metric: MetricKey = payload.metric.as_deref().unwrap_or(DEFAULT_METRIC).parse()?;
        let direction = match payload.direction.as_deref() {
            Some(raw) => raw.parse()?,
            None => Direction::default(),
        };

        let mut predicates: Vec<Predicate> = Vec::new();
        if let Some(category) = payload.category.as_deref() {
            predicates.push(filters::category_is(category));
        }
        if let Some(spec) = payload.min_lift.as_deref() {
            let (ip_type, percent) = parse_min_lift(spec)?;
            predicates.push(filters::lift_above(ip_type, percent));
        }
        if let Some(min) = payload.min_contents {
            predicates.push(filters::min_contents(min));
        }
        if payload.hide_empty {
            predicates.push(filters::non_empty());
        }

        let mut query = RankQuery::new(metric).direction(direction);
        if let Some(search) = payload.search {
            query = query.search(search);
        }
        if !predicates.is_empty() {
            query = query.filter(filters::all(predicates));
        }

        let pool = data.entities(payload.entity)?;
        let board = rank(&pool, &query);
        let total = board.len();
        let board = match payload.limit {
            Some(limit) => board.truncate(limit),
            None => board,
        };

        CommandOutcome::from_value(LeaderboardOutput {
            entity: payload.entity,
            metric,
            direction,
            total,
            rows: leaderboard_rows(&board),
        })
    }
}

/// Parse `<ip_type>:<percent>`, e.g. `logo:25` or `caption_mention:-10`.
pub fn parse_min_lift(spec: &str) -> Result<(IpType, f64)> {
    let invalid = || anyhow!("Invalid --min-lift '{spec}': expected <ip_type>:<percent>");
    let (ip, percent) = spec.split_once(':').ok_or_else(invalid)?;
    let ip_type = IpType::from_key(ip.trim()).ok_or_else(invalid)?;
    let percent: f64 = percent.trim().parse().map_err(|_| invalid())?;
    if !percent.is_finite() {
        return Err(invalid());
    }
    Ok((ip_type, percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_min_lift_specs() {
        assert_eq!(parse_min_lift("logo:25").unwrap(), (IpType::Logo, 25.0));
        assert_eq!(
            parse_min_lift(" collab : -5.5").unwrap(),
            (IpType::Collaboration, -5.5)
        );
        assert!(parse_min_lift("logo").is_err());
        assert!(parse_min_lift("banner:10").is_err());
        assert!(parse_min_lift("logo:NaN").is_err());
    }
}
