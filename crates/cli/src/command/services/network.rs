use crate::command::context::ReportData;
use crate::command::domain::{parse_payload, CommandOutcome, NetworkOutput, NetworkPayload};
use anyhow::Result;
use serde_json::Value;

#[derive(Default)]
pub struct NetworkService;

impl NetworkService {
    pub fn run(&self, payload: Value, data: &ReportData) -> Result<CommandOutcome> {
        let payload: NetworkPayload = parse_payload(payload)?;
        let mut network = data.network.clone();
        if payload.totals_only {
            network.by_region.clear();
            network.by_industry.clear();
            network.by_ip_type.clear();
            network.by_brand.clear();
            network.by_athlete.clear();
        }
        CommandOutcome::from_value(NetworkOutput {
            network,
            profile_description: data.profile.description().map(str::to_string),
            benchmarks: data.profile.benchmarks().clone(),
        })
    }
}
