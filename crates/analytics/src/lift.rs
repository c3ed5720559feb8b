use lift_records::{ContentRecord, IpType, TreatmentPair};
use serde::Serialize;
use std::collections::BTreeMap;

/// Engagement rates on both sides of a treatment pair and the lift between them
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftResult {
    pub treatment_rate: f64,
    pub control_rate: f64,
    /// `None` when the control rate is zero.
    pub lift_percent: Option<f64>,
}

/// Signed percentage change from `control_rate` to `treatment_rate`.
pub fn lift_percent(treatment_rate: f64, control_rate: f64) -> Option<f64> {
    if control_rate == 0.0 || !control_rate.is_finite() || !treatment_rate.is_finite() {
        return None;
    }
    Some((treatment_rate - control_rate) / control_rate * 100.0)
}

pub fn compute_lift(treatment: &ContentRecord, control: &ContentRecord) -> LiftResult {
    let treatment_rate = treatment.engagement_per_post();
    let control_rate = control.engagement_per_post();
    LiftResult {
        treatment_rate,
        control_rate,
        lift_percent: lift_percent(treatment_rate, control_rate),
    }
}

pub fn lift_for_pair(pair: &TreatmentPair) -> LiftResult {
    compute_lift(&pair.treatment, &pair.control)
}

/// Arithmetic mean of the defined lifts.
///
/// Undefined lifts are left out of both the sum and the count; `None` when no
/// lift is defined.
pub fn mean_lift<I>(lifts: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = lifts
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// IP type with the highest defined lift. Ties keep the earlier IP type.
pub fn best_ip_type(lifts: &BTreeMap<IpType, LiftResult>) -> Option<(IpType, f64)> {
    lifts
        .iter()
        .filter_map(|(ip_type, lift)| lift.lift_percent.map(|pct| (*ip_type, pct)))
        .fold(None, |best, candidate| match best {
            Some((_, best_pct)) if candidate.1 <= best_pct => best,
            _ => Some(candidate),
        })
}
