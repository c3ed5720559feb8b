use crate::aggregate::{merge_by_name, merge_by_name_and_category, EntityAggregate};
use crate::lift::{best_ip_type, mean_lift, LiftResult};
use crate::rollup::SchoolRollup;
use lift_records::IpType;
use serde::Serialize;
use std::collections::BTreeMap;

pub const NETWORK_NAME: &str = "All Schools";
pub const UNASSIGNED_REGION: &str = "Unassigned";

/// Lift for one IP type across the network
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLift {
    pub ip_type: IpType,
    /// Lift recomputed from summed treatment/control totals.
    pub pooled: Option<LiftResult>,
    /// Mean of the per-school lifts that are defined.
    pub average_lift_percent: Option<f64>,
    pub schools_with_data: usize,
    pub schools_reporting: usize,
}

/// Network-wide rollup composed from per-school rollups
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAggregate {
    pub totals: EntityAggregate,
    pub schools_included: usize,
    pub lifts: Vec<NetworkLift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_ip_type: Option<IpType>,
    pub by_region: Vec<EntityAggregate>,
    pub by_industry: Vec<EntityAggregate>,
    pub by_ip_type: Vec<EntityAggregate>,
    pub by_brand: Vec<EntityAggregate>,
    pub by_athlete: Vec<EntityAggregate>,
}

impl NetworkAggregate {
    pub fn lift(&self, ip_type: IpType) -> Option<&NetworkLift> {
        self.lifts.iter().find(|l| l.ip_type == ip_type)
    }
}

/// How many of the expected documents made it into the report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub expected: usize,
    pub included: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSource {
    pub source: String,
    pub reason: String,
}

impl Coverage {
    pub fn record_included(&mut self) {
        self.expected += 1;
        self.included += 1;
    }

    pub fn record_missing(&mut self, source: impl Into<String>, reason: impl Into<String>) {
        self.expected += 1;
        self.missing.push(MissingSource {
            source: source.into(),
            reason: reason.into(),
        });
    }

    pub fn is_partial(&self) -> bool {
        self.included < self.expected
    }
}

/// Compose the network view from whichever schools loaded.
///
/// Counters are summed; rates and lifts are recomputed from the sums. Category
/// breakdowns are merged from the per-school breakdowns, never from raw records.
pub fn compose_network(per_school: &[SchoolRollup]) -> NetworkAggregate {
    let totals =
        EntityAggregate::merge_all(NETWORK_NAME, per_school.iter().map(|s| &s.aggregate));

    let lifts: Vec<NetworkLift> = IpType::ALL
        .iter()
        .copied()
        .filter_map(|ip_type| network_lift(ip_type, per_school, &totals))
        .collect();

    let best_ip_type = lifts
        .iter()
        .filter_map(|l| l.average_lift_percent.map(|pct| (l.ip_type, pct)))
        .fold(None, |best: Option<(IpType, f64)>, candidate| match best {
            Some((_, best_pct)) if candidate.1 <= best_pct => best,
            _ => Some(candidate),
        })
        .map(|(ip_type, _)| ip_type);

    let by_region = region_breakdown(per_school);

    let network = NetworkAggregate {
        schools_included: per_school.len(),
        lifts,
        best_ip_type,
        by_region,
        by_industry: merge_by_name(per_school.iter().flat_map(|s| &s.by_industry)),
        by_ip_type: merge_by_name(per_school.iter().flat_map(|s| &s.by_ip_type)),
        by_brand: merge_by_name(per_school.iter().flat_map(|s| &s.by_brand)),
        by_athlete: merge_by_name_and_category(
            per_school.iter().flat_map(|s| &s.by_athlete),
        ),
        totals,
    };

    log::info!(
        "Composed network over {} schools: {} contents, {} IP types with lift",
        network.schools_included,
        network.totals.total_contents,
        network.lifts.len()
    );

    network
}

fn network_lift(
    ip_type: IpType,
    per_school: &[SchoolRollup],
    totals: &EntityAggregate,
) -> Option<NetworkLift> {
    let reporting: Vec<Option<f64>> = per_school
        .iter()
        .filter_map(|s| s.aggregate.lifts.get(&ip_type))
        .map(|l| l.lift_percent)
        .collect();
    if reporting.is_empty() {
        return None;
    }
    Some(NetworkLift {
        ip_type,
        pooled: totals
            .splits
            .contains_key(&ip_type)
            .then(|| totals.lifts.get(&ip_type).copied())
            .flatten(),
        average_lift_percent: mean_lift(reporting.iter().copied()),
        schools_with_data: reporting.iter().filter(|l| l.is_some()).count(),
        schools_reporting: reporting.len(),
    })
}

fn region_breakdown(per_school: &[SchoolRollup]) -> Vec<EntityAggregate> {
    let mut regions: BTreeMap<&str, Vec<&EntityAggregate>> = BTreeMap::new();
    for school in per_school {
        let region = school.region.as_deref().unwrap_or(UNASSIGNED_REGION);
        regions.entry(region).or_default().push(&school.aggregate);
    }
    regions
        .into_iter()
        .map(|(region, schools)| EntityAggregate::merge_all(region, schools))
        .collect()
}

/// Best IP type for any aggregate, by its own lifts.
pub fn best_for(aggregate: &EntityAggregate) -> Option<IpType> {
    best_ip_type(&aggregate.lifts).map(|(ip_type, _)| ip_type)
}
