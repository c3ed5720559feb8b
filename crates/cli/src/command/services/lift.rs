use crate::command::context::ReportData;
use crate::command::domain::{
    parse_payload, CommandOutcome, LiftOutput, LiftPayload, SchoolLiftRow,
};
use anyhow::{anyhow, Result};
use lift_analytics::{best_ip_type, SchoolRollup};
use serde_json::Value;

#[derive(Default)]
pub struct LiftService;

impl LiftService {
    pub fn run(&self, payload: Value, data: &ReportData) -> Result<CommandOutcome> {
        let payload: LiftPayload = parse_payload(payload)?;

        let selected: Vec<&SchoolRollup> = match payload.school.as_deref() {
            Some(name) => {
                let wanted = data.profile.normalizer().school(name);
                let rollup = data
                    .rollups
                    .iter()
                    .find(|r| r.name().eq_ignore_ascii_case(&wanted))
                    .ok_or_else(|| anyhow!("School not found: {name}"))?;
                vec![rollup]
            }
            None => data.rollups.iter().collect(),
        };

        let schools = selected.into_iter().map(lift_row).collect();
        CommandOutcome::from_value(LiftOutput {
            schools,
            network_best_ip_type: data.network.best_ip_type,
        })
    }
}

fn lift_row(rollup: &SchoolRollup) -> SchoolLiftRow {
    let best = best_ip_type(&rollup.aggregate.lifts);
    SchoolLiftRow {
        school: rollup.name().to_string(),
        region: rollup.region.clone(),
        lifts: rollup.aggregate.lifts.clone(),
        reported_lifts: rollup.reported_lifts.clone(),
        best_ip_type: best.map(|(ip_type, _)| ip_type),
        best_lift_percent: best.map(|(_, pct)| pct),
    }
}
