mod export;
mod leaderboard;
mod lift;
mod network;

use crate::command::context::ReportData;
use crate::command::domain::{CommandAction, CommandOutcome};
use anyhow::Result;
use serde_json::Value;

#[derive(Default)]
pub struct Services {
    export: export::ExportService,
    leaderboard: leaderboard::LeaderboardService,
    lift: lift::LiftService,
    network: network::NetworkService,
}

impl Services {
    pub fn route(
        &self,
        action: CommandAction,
        payload: Value,
        data: &ReportData,
    ) -> Result<CommandOutcome> {
        match action {
            CommandAction::Leaderboard => self.leaderboard.run(payload, data),
            CommandAction::Network => self.network.run(payload, data),
            CommandAction::Lift => self.lift.run(payload, data),
            CommandAction::Export => self.export.run(payload, data),
        }
    }
}
