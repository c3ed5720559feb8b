use crate::lift::{compute_lift, mean_lift, LiftResult};
use lift_records::{ContentRecord, IpType, ScopedRecord, TreatmentPair};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Anything carrying a [`ContentRecord`] can be aggregated
pub trait Metered {
    fn record(&self) -> &ContentRecord;
}

impl Metered for ContentRecord {
    fn record(&self) -> &ContentRecord {
        self
    }
}

impl Metered for ScopedRecord {
    fn record(&self) -> &ContentRecord {
        &self.record
    }
}

impl<T: Metered> Metered for &T {
    fn record(&self) -> &ContentRecord {
        (*self).record()
    }
}

/// Zero-safe ratio shared by every rate in the engine.
///
/// Returns `0` when the denominator is not positive.
pub fn weighted_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Standard weight: posts contributing to the rate
pub fn by_content_count<T: Metered>(item: &T) -> f64 {
    item.record().content_count as f64
}

/// Raw treatment/control totals behind a lift value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentSplit {
    pub treatment: ContentRecord,
    pub control: ContentRecord,
}

impl TreatmentSplit {
    pub fn lift(&self) -> LiftResult {
        compute_lift(&self.treatment, &self.control)
    }

    pub fn combine(&self, other: &TreatmentSplit) -> TreatmentSplit {
        TreatmentSplit {
            treatment: self.treatment.combine(&other.treatment),
            control: self.control.combine(&other.control),
        }
    }
}

impl From<&TreatmentPair> for TreatmentSplit {
    fn from(pair: &TreatmentPair) -> Self {
        Self {
            treatment: pair.treatment,
            control: pair.control,
        }
    }
}

/// Rollup of every record sharing one group key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAggregate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub total_contents: u64,
    pub total_likes: f64,
    pub total_comments: f64,
    #[serde(rename = "totalEMV")]
    pub total_emv: f64,
    pub avg_engagement_rate: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub lifts: BTreeMap<IpType, LiftResult>,
    /// Σ weight behind `avg_engagement_rate`.
    #[serde(skip)]
    pub rate_weight: f64,
    #[serde(skip)]
    pub splits: BTreeMap<IpType, TreatmentSplit>,
}

impl EntityAggregate {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            total_contents: 0,
            total_likes: 0.0,
            total_comments: 0.0,
            total_emv: 0.0,
            avg_engagement_rate: 0.0,
            lifts: BTreeMap::new(),
            rate_weight: 0.0,
            splits: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Attach a lift derived from raw totals. The totals are kept so that later
    /// merges can pool them instead of averaging percentages.
    pub fn with_split(mut self, ip_type: IpType, split: TreatmentSplit) -> Self {
        self.lifts.insert(ip_type, split.lift());
        self.splits.insert(ip_type, split);
        self
    }

    /// Attach a lift whose raw totals are not available.
    pub fn with_lift(mut self, ip_type: IpType, lift: LiftResult) -> Self {
        self.splits.remove(&ip_type);
        self.lifts.insert(ip_type, lift);
        self
    }

    pub fn lift_percent(&self, ip_type: IpType) -> Option<f64> {
        self.lifts.get(&ip_type).and_then(|l| l.lift_percent)
    }

    pub fn total_interactions(&self) -> f64 {
        self.total_likes + self.total_comments
    }

    /// Interactions per post over the summed counters.
    pub fn engagement_per_post(&self) -> f64 {
        weighted_ratio(self.total_interactions(), self.total_contents as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.total_contents == 0
    }

    fn add_record(&mut self, record: &ContentRecord, weight: f64) {
        self.total_contents += record.content_count;
        self.total_likes += record.likes;
        self.total_comments += record.comments;
        self.total_emv += record.earned_media_value;
        // avg_engagement_rate holds Σ(rate·w) until finish()
        self.avg_engagement_rate += record.engagement_rate * weight;
        self.rate_weight += weight;
    }

    fn finish(&mut self) {
        self.avg_engagement_rate = weighted_ratio(self.avg_engagement_rate, self.rate_weight);
    }

    /// Combine aggregates into one named rollup.
    ///
    /// Counters are summed and the rate is re-weighted from each part's weight.
    /// The category survives only when every categorised part agrees on it.
    /// A lift is pooled from summed splits when every part reporting that IP type
    /// kept its split; otherwise the percentage is the mean of the parts' non-null
    /// lifts.
    pub fn merge_all<'a, I>(name: impl Into<String>, parts: I) -> EntityAggregate
    where
        I: IntoIterator<Item = &'a EntityAggregate>,
    {
        let mut merged = EntityAggregate::empty(name);
        let mut lift_parts: BTreeMap<IpType, Vec<&'a EntityAggregate>> = BTreeMap::new();
        let mut weighted_rate = 0.0;
        let mut categories: Vec<&'a str> = Vec::new();

        for part in parts {
            merged.total_contents += part.total_contents;
            merged.total_likes += part.total_likes;
            merged.total_comments += part.total_comments;
            merged.total_emv += part.total_emv;
            merged.rate_weight += part.rate_weight;
            weighted_rate += part.avg_engagement_rate * part.rate_weight;
            if let Some(category) = part.category.as_deref() {
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
            for ip_type in part.lifts.keys() {
                lift_parts.entry(*ip_type).or_default().push(part);
            }
        }
        merged.avg_engagement_rate = weighted_ratio(weighted_rate, merged.rate_weight);
        if let [only] = categories.as_slice() {
            merged.category = Some((*only).to_string());
        }

        for (ip_type, sources) in lift_parts {
            let pooled = sources
                .iter()
                .map(|p| p.splits.get(&ip_type).copied())
                .try_fold(TreatmentSplit::default(), |acc, split| {
                    split.map(|s| acc.combine(&s))
                });
            merged = match pooled {
                Some(split) => merged.with_split(ip_type, split),
                None => {
                    let lifts: Vec<&LiftResult> =
                        sources.iter().filter_map(|p| p.lifts.get(&ip_type)).collect();
                    let n = lifts.len() as f64;
                    let averaged = LiftResult {
                        treatment_rate: weighted_ratio(
                            lifts.iter().map(|l| l.treatment_rate).sum(),
                            n,
                        ),
                        control_rate: weighted_ratio(lifts.iter().map(|l| l.control_rate).sum(), n),
                        lift_percent: mean_lift(lifts.iter().map(|l| l.lift_percent)),
                    };
                    merged.with_lift(ip_type, averaged)
                }
            };
        }

        merged
    }
}

/// Group items by key and roll them up.
///
/// `group_key` returning `None` leaves the item out of every group. Keys are
/// compared exactly; normalize before calling. Groups come back in first-seen
/// order. The rate of each group is `Σ(rate·weight) / Σ(weight)`, or `0` when the
/// total weight is zero.
pub fn aggregate<T, K, W>(items: &[T], group_key: K, weight: W) -> Vec<EntityAggregate>
where
    T: Metered,
    K: Fn(&T) -> Option<String>,
    W: Fn(&T) -> f64,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<EntityAggregate> = Vec::new();

    for item in items {
        let Some(key) = group_key(item) else {
            continue;
        };
        let w = weight(item);
        let w = if w.is_finite() && w > 0.0 { w } else { 0.0 };

        let slot = *index.entry(key).or_insert_with_key(|key| {
            groups.push(EntityAggregate::empty(key.clone()));
            groups.len() - 1
        });
        groups[slot].add_record(item.record(), w);
    }

    for group in &mut groups {
        group.finish();
    }
    groups
}

/// Merge aggregates that share a name, preserving first-seen order.
pub fn merge_by_name<'a, I>(parts: I) -> Vec<EntityAggregate>
where
    I: IntoIterator<Item = &'a EntityAggregate>,
{
    merge_grouped(parts, |part| (part.name.as_str(), None))
}

/// Merge aggregates that share both name and category, preserving first-seen
/// order. Same-named entities in different categories stay apart.
pub fn merge_by_name_and_category<'a, I>(parts: I) -> Vec<EntityAggregate>
where
    I: IntoIterator<Item = &'a EntityAggregate>,
{
    merge_grouped(parts, |part| {
        (part.name.as_str(), part.category.as_deref())
    })
}

fn merge_grouped<'a, I, K>(parts: I, key: K) -> Vec<EntityAggregate>
where
    I: IntoIterator<Item = &'a EntityAggregate>,
    K: Fn(&'a EntityAggregate) -> (&'a str, Option<&'a str>),
{
    let mut index: HashMap<(&'a str, Option<&'a str>), usize> = HashMap::new();
    let mut grouped: Vec<Vec<&'a EntityAggregate>> = Vec::new();
    for part in parts {
        let slot = *index.entry(key(part)).or_insert_with(|| {
            grouped.push(Vec::new());
            grouped.len() - 1
        });
        grouped[slot].push(part);
    }
    grouped
        .into_iter()
        .map(|group| EntityAggregate::merge_all(group[0].name.clone(), group))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn rec(count: u64, rate: f64) -> ContentRecord {
        ContentRecord::with_rate(count, 0.0, 0.0, 0.0, rate).unwrap()
    }

    fn counts(count: u64, likes: f64, comments: f64) -> ContentRecord {
        ContentRecord::from_counts(count, likes, comments, 0.0).unwrap()
    }

    fn rows() -> Vec<ScopedRecord> {
        vec![
            ScopedRecord::for_school("LSU", rec(100, 0.05)).brand("Nike"),
            ScopedRecord::for_school("LSU", rec(1, 0.90)).brand("Gatorade"),
            ScopedRecord::for_school("Bama", rec(300, 0.01)).brand("Nike"),
            ScopedRecord::for_school("Bama", rec(0, 0.0)).brand("Empty Co"),
        ]
    }

    #[test]
    fn groups_in_first_seen_order_with_sums() {
        let groups = aggregate(&rows(), |r| r.brand.clone(), by_content_count);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Nike", "Gatorade", "Empty Co"]);
        assert_eq!(groups[0].total_contents, 400);
    }

    #[test]
    fn rate_is_weighted_not_naive_mean() {
        let groups = aggregate(&rows(), |r| Some(r.school.clone()), by_content_count);
        let lsu = &groups[0];
        let weighted = (0.05 * 100.0 + 0.90 * 1.0) / 101.0;
        let naive = (0.05 + 0.90) / 2.0;
        assert!((lsu.avg_engagement_rate - weighted).abs() < 1e-12);
        assert!((lsu.avg_engagement_rate - naive).abs() > 0.1);
    }

    #[test]
    fn empty_group_has_zero_rate_and_is_kept() {
        let groups = aggregate(&rows(), |r| r.brand.clone(), by_content_count);
        let empty = groups.iter().find(|g| g.name == "Empty Co").unwrap();
        assert_eq!(empty.avg_engagement_rate, 0.0);
        assert!(empty.is_empty());
    }

    #[test]
    fn none_key_skips_record() {
        let mut items = rows();
        items.push(ScopedRecord::for_school("LSU", rec(5, 1.0)));
        let groups = aggregate(&items, |r| r.brand.clone(), by_content_count);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn exact_string_keys_are_not_normalized() {
        let items = vec![
            ScopedRecord::for_school("LSU", rec(1, 1.0)),
            ScopedRecord::for_school("lsu", rec(1, 1.0)),
        ];
        let groups = aggregate(&items, |r| Some(r.school.clone()), by_content_count);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn merge_all_pools_splits() {
        let a = EntityAggregate::empty("A").with_split(
            IpType::Logo,
            TreatmentSplit {
                treatment: counts(100, 5000.0, 200.0),
                control: counts(100, 3000.0, 100.0),
            },
        );
        let b = EntityAggregate::empty("B").with_split(
            IpType::Logo,
            TreatmentSplit {
                treatment: counts(50, 1000.0, 50.0),
                control: counts(100, 3000.0, 100.0),
            },
        );
        let merged = EntityAggregate::merge_all("All", [&a, &b]);
        let lift = merged.lifts[&IpType::Logo];
        // (6250/150) vs (6200/200)
        assert!((lift.treatment_rate - 6250.0 / 150.0).abs() < 1e-9);
        assert!((lift.control_rate - 31.0).abs() < 1e-9);
        assert!(merged.splits.contains_key(&IpType::Logo));
    }

    #[test]
    fn merge_all_averages_when_split_missing() {
        let with_split = EntityAggregate::empty("A").with_split(
            IpType::Logo,
            TreatmentSplit {
                treatment: counts(10, 20.0, 0.0),
                control: counts(10, 10.0, 0.0),
            },
        );
        let bare = EntityAggregate::empty("B").with_lift(
            IpType::Logo,
            LiftResult {
                treatment_rate: 1.0,
                control_rate: 0.0,
                lift_percent: None,
            },
        );
        let merged = EntityAggregate::merge_all("All", [&with_split, &bare]);
        assert_eq!(merged.lift_percent(IpType::Logo), Some(100.0));
        assert!(!merged.splits.contains_key(&IpType::Logo));
    }

    #[test]
    fn merge_all_drops_conflicting_category() {
        let a = EntityAggregate::empty("a").with_category("South");
        let b = EntityAggregate::empty("b").with_category("South");
        let c = EntityAggregate::empty("c").with_category("West");
        let same = EntityAggregate::merge_all("ab", [&a, &b]);
        assert_eq!(same.category.as_deref(), Some("South"));
        let mixed = EntityAggregate::merge_all("abc", [&a, &b, &c]);
        assert_eq!(mixed.category, None);
    }

    #[test]
    fn merge_by_name_keeps_order() {
        let items = vec![
            EntityAggregate::empty("x"),
            EntityAggregate::empty("y"),
            EntityAggregate::empty("x"),
        ];
        let merged = merge_by_name(&items);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "x");
        assert_eq!(merged[1].name, "y");
    }

    #[test]
    fn merge_by_name_and_category_keeps_namesakes_apart() {
        let items = vec![
            EntityAggregate::empty("John Smith").with_category("LSU"),
            EntityAggregate::empty("John Smith").with_category("Alabama"),
            EntityAggregate::empty("John Smith").with_category("LSU"),
        ];
        let merged = merge_by_name_and_category(&items);
        let keys: Vec<(&str, Option<&str>)> = merged
            .iter()
            .map(|m| (m.name.as_str(), m.category.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![("John Smith", Some("LSU")), ("John Smith", Some("Alabama"))]
        );
        assert_eq!(merge_by_name(&items).len(), 1);
    }

    proptest! {
        #[test]
        fn proptest_rate_matches_weighted_formula(
            entries in proptest::collection::vec((0u64..500, 0.0f64..10.0), 1..20)
        ) {
            let items: Vec<ContentRecord> = entries.iter().map(|(c, r)| rec(*c, *r)).collect();
            let groups = aggregate(&items, |_| Some("g".to_string()), by_content_count);
            let num: f64 = entries.iter().map(|(c, r)| *c as f64 * r).sum();
            let den: f64 = entries.iter().map(|(c, _)| *c as f64).sum();
            let expected = if den > 0.0 { num / den } else { 0.0 };
            prop_assert_eq!(groups.len(), 1);
            prop_assert!(groups[0].avg_engagement_rate.is_finite());
            prop_assert!((groups[0].avg_engagement_rate - expected).abs() < 1e-9);
        }
    }
}
