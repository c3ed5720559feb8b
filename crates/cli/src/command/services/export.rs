use crate::command::context::ReportData;
use crate::command::domain::{parse_payload, CommandOutcome, ExportOutput, ExportPayload};
use anyhow::Result;
use lift_analytics::{aggregate_rows, export_rows};
use serde_json::Value;

#[derive(Default)]
pub struct ExportService;

impl ExportService {
    pub fn run(&self, payload: Value, data: &ReportData) -> Result<CommandOutcome> {
        let payload: ExportPayload = parse_payload(payload)?;
        let mut rows = export_rows(&data.rollups);
        if payload.include_network {
            rows.extend(aggregate_rows(&data.network.totals));
        }
        CommandOutcome::from_value(ExportOutput { rows })
    }
}
