//! Name normalization lookups.
//!
//! These are plain values handed to grouping functions; aggregation never consults
//! them on its own.

use std::collections::HashMap;

/// Case-insensitive alias table mapping variant spellings to one display name
#[derive(Debug, Clone, Default)]
pub struct NameAliases {
    canonical: HashMap<String, String>,
}

impl NameAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.canonical
            .insert(fold(alias), canonical.trim().to_string());
    }

    /// Canonical name for `name`, or `name` itself (trimmed) when unknown.
    pub fn resolve(&self, name: &str) -> String {
        self.canonical
            .get(&fold(name))
            .cloned()
            .unwrap_or_else(|| name.trim().to_string())
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

impl<A: AsRef<str>, C: AsRef<str>> FromIterator<(A, C)> for NameAliases {
    fn from_iter<T: IntoIterator<Item = (A, C)>>(iter: T) -> Self {
        let mut aliases = Self::new();
        for (alias, canonical) in iter {
            aliases.insert(alias.as_ref(), canonical.as_ref());
        }
        aliases
    }
}

#[derive(Debug, Clone)]
struct IndustryRule {
    category: String,
    keywords: Vec<String>,
}

/// Keyword classifier for brand industries. Rules are checked in order.
#[derive(Debug, Clone)]
pub struct IndustryClassifier {
    rules: Vec<IndustryRule>,
    fallback: String,
}

impl Default for IndustryClassifier {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            fallback: IndustryClassifier::OTHER.to_string(),
        }
    }
}

impl IndustryClassifier {
    pub const OTHER: &'static str = "Other";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    pub fn rule<I, S>(mut self, category: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rules.push(IndustryRule {
            category: category.to_string(),
            keywords: keywords
                .into_iter()
                .map(|k| fold(k.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
        });
        self
    }

    /// Classify a brand.
    ///
    /// A declared industry wins: mapped onto a rule category when one matches,
    /// otherwise kept as declared. Without one the brand name is matched, then
    /// the fallback applies.
    pub fn classify(&self, brand: &str, declared: Option<&str>) -> String {
        if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
            return self.match_text(declared).unwrap_or(declared).to_string();
        }
        self.match_text(brand)
            .unwrap_or(self.fallback.as_str())
            .to_string()
    }

    fn match_text(&self, text: &str) -> Option<&str> {
        let haystack = fold(text);
        if haystack.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| {
                fold(&rule.category) == haystack
                    || rule.keywords.iter().any(|k| haystack.contains(k.as_str()))
            })
            .map(|rule| rule.category.as_str())
    }
}

/// School → region lookup. Unknown schools have no region.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: HashMap<String, String>,
}

impl RegionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, school: &str, region: &str) {
        self.regions.insert(fold(school), region.trim().to_string());
    }

    pub fn region_of(&self, school: &str) -> Option<&str> {
        self.regions.get(&fold(school)).map(String::as_str)
    }
}

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_case_insensitively() {
        let aliases: NameAliases = [
            ("Louisiana State University", "LSU"),
            ("louisiana state", "LSU"),
        ]
        .into_iter()
        .collect();
        assert_eq!(aliases.resolve("LOUISIANA STATE UNIVERSITY "), "LSU");
        assert_eq!(aliases.resolve("Louisiana State"), "LSU");
        assert_eq!(aliases.resolve(" Alabama "), "Alabama");
        assert_eq!(aliases.len(), 2);
    }

    #[test]
    fn classifier_prefers_declared_industry_then_brand_name() {
        let classifier = IndustryClassifier::new()
            .rule("Food & Beverage", ["restaurant", "chicken", "drink"])
            .rule("Apparel", ["nike", "shoe"]);
        assert_eq!(
            classifier.classify("Nike", Some("Restaurant chain")),
            "Food & Beverage"
        );
        assert_eq!(classifier.classify("Nike", None), "Apparel");
        assert_eq!(classifier.classify("Nike", Some("apparel")), "Apparel");
        assert_eq!(classifier.classify("Acme Bank", None), "Other");
    }

    #[test]
    fn unmatched_declared_industry_is_kept() {
        let classifier = IndustryClassifier::new().rule("Apparel", ["nike", "shoe"]);
        assert_eq!(classifier.classify("Nike", Some(" Gaming ")), "Gaming");
        assert_eq!(classifier.classify("Nike", Some("  ")), "Apparel");
        assert_eq!(classifier.classify("Acme", Some("")), "Other");
    }

    #[test]
    fn first_matching_rule_wins() {
        let classifier = IndustryClassifier::new()
            .rule("Energy Drinks", ["energy"])
            .rule("Utilities", ["energy"])
            .with_fallback("Unclassified");
        assert_eq!(classifier.classify("Energy Co", None), "Energy Drinks");
        assert_eq!(classifier.classify("Bank", None), "Unclassified");
    }

    #[test]
    fn region_lookup() {
        let mut regions = RegionMap::new();
        regions.insert("LSU", "South");
        assert_eq!(regions.region_of("lsu"), Some("South"));
        assert_eq!(regions.region_of("Oregon"), None);
    }
}
