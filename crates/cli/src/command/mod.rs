mod context;
pub mod domain;
mod services;

pub use domain::{
    classify_error, CommandAction, CommandRequest, CommandResponse, CommandStatus, DataSource,
    EntityKind, ExportPayload, LeaderboardPayload, LiftPayload, NetworkPayload, ResponseMeta,
};

use context::ReportData;
use domain::CommandOutcome;
use serde_json::Value;
use services::Services;
use std::time::Instant;

pub struct CommandHandler {
    source: DataSource,
    services: Services,
}

impl CommandHandler {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            services: Services::default(),
        }
    }

    pub async fn execute(&self, request: CommandRequest) -> CommandResponse {
        let started = Instant::now();
        let CommandRequest {
            action,
            payload,
            source,
        } = request;
        let source = self.source.clone().with_overrides(source);

        match self.load_and_route(action, payload, &source).await {
            Ok(outcome) => CommandResponse {
                status: CommandStatus::Ok,
                message: None,
                code: None,
                hints: outcome.hints,
                data: outcome.data,
                coverage: outcome.coverage,
                meta: ResponseMeta {
                    duration_ms: Some(started.elapsed().as_millis() as u64),
                    ..outcome.meta
                },
            },
            Err(err) => error_response(err, Some(action), started.elapsed().as_millis() as u64),
        }
    }

    async fn load_and_route(
        &self,
        action: CommandAction,
        payload: Value,
        source: &DataSource,
    ) -> anyhow::Result<CommandOutcome> {
        let data = ReportData::load(source).await?;
        let mut outcome = self.services.route(action, payload, &data)?;
        data.annotate(&mut outcome);
        Ok(outcome)
    }
}

pub fn error_response(
    err: anyhow::Error,
    action: Option<CommandAction>,
    duration_ms: u64,
) -> CommandResponse {
    let message = format!("{err:#}");
    let classification = classify_error(&message, action);
    CommandResponse {
        status: CommandStatus::Error,
        message: Some(message),
        code: Some(classification.code.to_string()),
        hints: classification.hint.into_iter().collect(),
        data: Value::Null,
        coverage: None,
        meta: ResponseMeta {
            duration_ms: Some(duration_ms),
            ..Default::default()
        },
    }
}

pub async fn execute(request: CommandRequest, source: DataSource) -> CommandResponse {
    CommandHandler::new(source).execute(request).await
}
