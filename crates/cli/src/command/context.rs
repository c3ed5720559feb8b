use crate::command::domain::{
    CommandOutcome, DataSource, EntityKind, Hint, HintKind, ResponseMeta,
};
use crate::loader::{load_brand_summary, load_school_dir};
use anyhow::{bail, Context as AnyhowContext, Result};
use lift_analytics::{
    brand_aggregates, build_school_rollup, compose_network, school_aggregates, Coverage,
    EntityAggregate, NetworkAggregate, ReportProfile, SchoolRollup,
};
use lift_records::ScopedRecord;
use std::collections::HashMap;

/// Everything a command needs, loaded once per request
pub struct ReportData {
    pub source: DataSource,
    pub profile: ReportProfile,
    pub rollups: Vec<SchoolRollup>,
    pub network: NetworkAggregate,
    pub brand_rows: Vec<ScopedRecord>,
    pub coverage: Coverage,
    pub hints: Vec<Hint>,
}

impl ReportData {
    pub async fn load(source: &DataSource) -> Result<Self> {
        let profile = ReportProfile::resolve(&source.profile)
            .with_context(|| format!("Failed to load profile '{}'", source.profile))?;
        let normalizer = profile.normalizer();

        let batch = load_school_dir(&source.data_dir).await?;

        let mut coverage = Coverage::default();
        let mut rollups: Vec<SchoolRollup> = Vec::with_capacity(batch.schools.len());
        let mut seen: HashMap<String, String> = HashMap::new();
        for loaded in batch.schools {
            let rollup = build_school_rollup(&loaded.report, normalizer);
            if let Some(first) = seen.get(rollup.name()) {
                log::warn!(
                    "Skipping {}: {} was already loaded from {first}",
                    loaded.source,
                    rollup.name()
                );
                coverage.record_missing(
                    loaded.source,
                    format!("duplicate of {} ({first})", rollup.name()),
                );
                continue;
            }
            seen.insert(rollup.name().to_string(), loaded.source);
            coverage.record_included();
            rollups.push(rollup);
        }
        for failure in batch.failures {
            coverage.record_missing(failure.source, failure.reason);
        }

        if rollups.is_empty() {
            bail!(
                "No school documents could be loaded from {} ({} skipped)",
                source.data_dir.display(),
                coverage.missing.len()
            );
        }

        let mut hints = Vec::new();
        if coverage.is_partial() {
            hints.push(Hint {
                kind: HintKind::Warn,
                text: format!(
                    "Partial data: {} of {} school documents included",
                    coverage.included, coverage.expected
                ),
            });
        }

        let brand_rows = match &source.brands {
            Some(path) => match load_brand_summary(path).await {
                Ok(rows) => rows,
                Err(err) => {
                    log::warn!("Ignoring brand summary: {err:#}");
                    hints.push(Hint {
                        kind: HintKind::Warn,
                        text: format!("Brand summary skipped: {err:#}"),
                    });
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let network = compose_network(&rollups);

        Ok(Self {
            source: source.clone(),
            profile,
            rollups,
            network,
            brand_rows,
            coverage,
            hints,
        })
    }

    /// Rankable aggregates for one entity kind.
    ///
    /// Brands come from the brand summary when one was given, otherwise from the
    /// merged per-school sponsor breakdowns. Partner schools exist only in the
    /// brand summary.
    pub fn entities(&self, kind: EntityKind) -> Result<Vec<EntityAggregate>> {
        let pool = match kind {
            EntityKind::School => self.rollups.iter().map(|r| r.aggregate.clone()).collect(),
            EntityKind::Brand if !self.brand_rows.is_empty() => {
                brand_aggregates(&self.brand_rows, self.profile.normalizer())
            }
            EntityKind::Brand => self.network.by_brand.clone(),
            EntityKind::PartnerSchool if self.brand_rows.is_empty() => {
                bail!("The partner_school leaderboard needs a brand summary (--brands)")
            }
            EntityKind::PartnerSchool => {
                school_aggregates(&self.brand_rows, self.profile.normalizer())
            }
            EntityKind::Athlete => self.network.by_athlete.clone(),
            EntityKind::Industry => self.network.by_industry.clone(),
            EntityKind::Region => self.network.by_region.clone(),
            EntityKind::IpType => self.network.by_ip_type.clone(),
        };
        Ok(pool)
    }

    /// Attach coverage, hints and request metadata to a service result.
    pub fn annotate(&self, outcome: &mut CommandOutcome) {
        outcome.hints.extend(self.hints.iter().cloned());
        outcome.coverage = Some(self.coverage.clone());
        outcome.meta = ResponseMeta {
            profile: Some(self.profile.name().to_string()),
            data_dir: Some(self.source.data_dir.display().to_string()),
            schools: Some(self.rollups.len()),
            duration_ms: outcome.meta.duration_ms,
        };
    }
}
