use crate::aggregate::{aggregate, by_content_count, EntityAggregate, TreatmentSplit};
use lift_records::{
    IndustryClassifier, IpType, IpUsage, NameAliases, RegionMap, SchoolReport, ScopedRecord,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Lookups applied to labels before grouping
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    pub schools: NameAliases,
    pub brands: NameAliases,
    pub industries: IndustryClassifier,
    pub regions: RegionMap,
}

impl Normalizer {
    pub fn school(&self, name: &str) -> String {
        self.schools.resolve(name)
    }

    pub fn brand(&self, name: &str) -> String {
        self.brands.resolve(name)
    }

    pub fn industry(&self, row: &ScopedRecord) -> Option<String> {
        row.brand
            .as_deref()
            .map(|brand| self.industries.classify(brand, row.industry.as_deref()))
    }
}

/// One school's aggregate and its category breakdowns
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRollup {
    pub aggregate: EntityAggregate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub by_brand: Vec<EntityAggregate>,
    pub by_industry: Vec<EntityAggregate>,
    pub by_athlete: Vec<EntityAggregate>,
    pub by_ip_type: Vec<EntityAggregate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub reported_lifts: BTreeMap<IpType, f64>,
}

impl SchoolRollup {
    pub fn name(&self) -> &str {
        &self.aggregate.name
    }
}

pub fn build_school_rollup(report: &SchoolReport, normalizer: &Normalizer) -> SchoolRollup {
    let school = normalizer.school(&report.school);

    let mut overall = aggregate(
        std::slice::from_ref(&report.overall),
        |_| Some(school.clone()),
        by_content_count,
    )
    .pop()
    .unwrap_or_else(|| EntityAggregate::empty(&school));
    for usage in &report.ip_usage {
        overall = overall.with_split(usage.pair.ip_type, TreatmentSplit::from(&usage.pair));
    }

    let by_brand = brand_aggregates(&report.partners, normalizer);
    let by_industry = aggregate(
        &report.partners,
        |row| normalizer.industry(row),
        by_content_count,
    );

    let athlete_rows: Vec<ScopedRecord> = report
        .athletes
        .iter()
        .map(|a| ScopedRecord::for_school(&school, a.record).athlete(&a.name))
        .collect();
    let by_athlete = aggregate(&athlete_rows, |row| row.athlete.clone(), by_content_count)
        .into_iter()
        .map(|agg| {
            let name = agg.name.clone();
            let usage = report
                .athletes
                .iter()
                .filter(|a| a.name == name)
                .flat_map(|a| a.ip_usage.iter());
            attach_splits(agg.with_category(school.clone()), usage)
        })
        .collect();

    let by_ip_type = ip_type_aggregates(&school, &report.ip_usage);

    let reported_lifts = report
        .ip_usage
        .iter()
        .filter_map(|u| u.reported_lift.map(|v| (u.pair.ip_type, v)))
        .collect();

    let region = report
        .region
        .clone()
        .or_else(|| normalizer.regions.region_of(&school).map(str::to_string));
    if let Some(region) = &region {
        overall = overall.with_category(region.clone());
    }

    log::debug!(
        "{school}: {} brands, {} industries, {} athletes, {} IP types",
        by_brand.len(),
        by_industry.len(),
        report.athletes.len(),
        by_ip_type.len()
    );

    SchoolRollup {
        aggregate: overall,
        region,
        by_brand,
        by_industry,
        by_athlete,
        by_ip_type,
        reported_lifts,
    }
}

/// Brand rollups with the industry category attached.
///
/// Works for sponsor rows of one school as well as brand-summary rows spanning
/// many schools.
pub fn brand_aggregates(rows: &[ScopedRecord], normalizer: &Normalizer) -> Vec<EntityAggregate> {
    let mut categories: HashMap<String, String> = HashMap::new();
    for row in rows {
        if let (Some(brand), Some(industry)) = (row.brand.as_deref(), normalizer.industry(row)) {
            categories
                .entry(normalizer.brand(brand))
                .or_insert(industry);
        }
    }
    aggregate(
        rows,
        |row| row.brand.as_deref().map(|b| normalizer.brand(b)),
        by_content_count,
    )
    .into_iter()
    .map(|agg| match categories.get(&agg.name) {
        Some(category) => agg.with_category(category.clone()),
        None => agg,
    })
    .collect()
}

/// Per-school rollups drawn from brand-summary rows (school × brand), with the
/// region as category.
pub fn school_aggregates(rows: &[ScopedRecord], normalizer: &Normalizer) -> Vec<EntityAggregate> {
    aggregate(
        rows,
        |row| Some(normalizer.school(&row.school)),
        by_content_count,
    )
    .into_iter()
    .map(|agg| match normalizer.regions.region_of(&agg.name) {
        Some(region) => agg.with_category(region),
        None => agg,
    })
    .collect()
}

fn ip_type_aggregates(scope: &str, usage: &[IpUsage]) -> Vec<EntityAggregate> {
    let rows: Vec<ScopedRecord> = usage
        .iter()
        .map(|u| ScopedRecord::for_school(scope, u.pair.treatment).ip_type(u.pair.ip_type))
        .collect();
    aggregate(
        &rows,
        |row| row.ip_type.map(|ip| ip.as_str().to_string()),
        by_content_count,
    )
    .into_iter()
    .zip(usage)
    .map(|(agg, u)| agg.with_split(u.pair.ip_type, TreatmentSplit::from(&u.pair)))
    .collect()
}

fn attach_splits<'a, I>(mut agg: EntityAggregate, usage: I) -> EntityAggregate
where
    I: Iterator<Item = &'a IpUsage>,
{
    for u in usage {
        let split = TreatmentSplit::from(&u.pair);
        let merged = match agg.splits.get(&u.pair.ip_type) {
            Some(existing) => existing.combine(&split),
            None => split,
        };
        agg = agg.with_split(u.pair.ip_type, merged);
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{
        "school": "Louisiana State University",
        "overall": {"contents": 150, "likes": 6000, "comments": 250},
        "ipUsage": {
            "logo": {
                "yes": {"contents": 100, "likes": 5000, "comments": 200},
                "no": {"contents": 100, "likes": 3000, "comments": 100},
                "avgLift": 70.0
            },
            "collab": {
                "yes": {"contents": 5, "likes": 50, "comments": 0},
                "no": {"contents": 0, "likes": 0, "comments": 0}
            }
        },
        "sponsorPartners": [
            {"brand": "Raising Canes", "industry": "Restaurant", "contents": 10, "likes": 100, "comments": 0},
            {"brand": "Nike", "contents": 20, "likes": 400, "comments": 0},
            {"brand": "raising canes", "industry": "restaurant", "contents": 10, "likes": 300, "comments": 0}
        ],
        "top5Athletes": [
            {"name": "Jane Doe", "contents": 40, "likes": 4000, "comments": 0,
             "ipUsage": {"logo": {"yes": {"contents": 4, "likes": 80, "comments": 0},
                                  "no": {"contents": 4, "likes": 40, "comments": 0}}}}
        ]
    }"#;

    fn normalizer() -> Normalizer {
        let mut n = Normalizer::default();
        n.schools.insert("Louisiana State University", "LSU");
        n.brands.insert("raising canes", "Raising Cane's");
        n.industries = IndustryClassifier::new()
            .rule("Food & Beverage", ["restaurant"])
            .rule("Apparel", ["nike"]);
        n.regions.insert("LSU", "South");
        n
    }

    #[test]
    fn builds_school_rollup_with_normalized_names() {
        let report = SchoolReport::from_json(DOC.as_bytes()).unwrap();
        let rollup = build_school_rollup(&report, &normalizer());

        assert_eq!(rollup.name(), "LSU");
        assert_eq!(rollup.region.as_deref(), Some("South"));
        assert_eq!(rollup.aggregate.category.as_deref(), Some("South"));
        assert_eq!(rollup.aggregate.total_contents, 150);
        assert_eq!(rollup.reported_lifts.get(&IpType::Logo), Some(&70.0));

        let logo = rollup.aggregate.lifts[&IpType::Logo];
        assert!((logo.lift_percent.unwrap() - 67.741_935).abs() < 1e-4);
        assert_eq!(rollup.aggregate.lift_percent(IpType::Collaboration), None);

        let brands: Vec<(&str, Option<&str>, u64)> = rollup
            .by_brand
            .iter()
            .map(|b| (b.name.as_str(), b.category.as_deref(), b.total_contents))
            .collect();
        assert_eq!(
            brands,
            vec![
                ("Raising Cane's", Some("Food & Beverage"), 20),
                ("Nike", Some("Apparel"), 20),
            ]
        );

        let industries: Vec<&str> = rollup.by_industry.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(industries, vec!["Food & Beverage", "Apparel"]);
    }

    #[test]
    fn athletes_and_ip_types_carry_lifts() {
        let report = SchoolReport::from_json(DOC.as_bytes()).unwrap();
        let rollup = build_school_rollup(&report, &normalizer());

        assert_eq!(rollup.by_athlete.len(), 1);
        assert_eq!(rollup.by_athlete[0].name, "Jane Doe");
        assert_eq!(rollup.by_athlete[0].category.as_deref(), Some("LSU"));
        assert_eq!(rollup.by_athlete[0].lift_percent(IpType::Logo), Some(100.0));

        let ip_names: Vec<&str> = rollup.by_ip_type.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(ip_names, vec!["logo", "collaboration"]);
        assert_eq!(rollup.by_ip_type[0].total_contents, 100);
        assert_eq!(rollup.by_ip_type[1].lift_percent(IpType::Collaboration), None);
    }

    #[test]
    fn school_aggregates_from_brand_rows() {
        let rows = vec![
            ScopedRecord::for_school("Louisiana State University", Default::default()).brand("Nike"),
            ScopedRecord::for_school("LSU", Default::default()).brand("Gatorade"),
        ];
        let schools = school_aggregates(&rows, &normalizer());
        assert_eq!(schools.len(), 1);
        assert_eq!(schools[0].name, "LSU");
        assert_eq!(schools[0].category.as_deref(), Some("South"));
    }
}
