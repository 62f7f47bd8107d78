use std::str::FromStr;

use thiserror::Error;

use crate::model::{PropertyCategory, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(PropertyCategory),
}

impl CategoryFilter {
    pub fn admits(&self, category: Option<PropertyCategory>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(*wanted),
        }
    }

    pub fn label(&self) -> String {
        match self {
            CategoryFilter::All => "All Types".to_string(),
            CategoryFilter::Only(category) => category.to_string(),
        }
    }

    /// Steps through `All → Residential → Commercial → Land → All`.
    pub fn cycle(&self) -> CategoryFilter {
        match self {
            CategoryFilter::All => CategoryFilter::Only(PropertyCategory::Residential),
            CategoryFilter::Only(PropertyCategory::Residential) => {
                CategoryFilter::Only(PropertyCategory::Commercial)
            }
            CategoryFilter::Only(PropertyCategory::Commercial) => {
                CategoryFilter::Only(PropertyCategory::Land)
            }
            CategoryFilter::Only(PropertyCategory::Land) => CategoryFilter::All,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = FilterParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.is_empty() {
            return Ok(CategoryFilter::All);
        }
        PropertyCategory::from_str(trimmed)
            .map(CategoryFilter::Only)
            .map_err(|_| FilterParseError::UnknownCategory(trimmed.to_string()))
    }
}

/// Transient table filter: category selector plus identifier substring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub category: CategoryFilter,
    pub query: String,
}

impl FilterCriteria {
    pub fn new(category: CategoryFilter, query: impl Into<String>) -> Self {
        Self {
            category,
            query: query.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category == CategoryFilter::All && self.id_query().is_empty()
    }

    /// Identifier query with surrounding whitespace removed; matching is
    /// case-sensitive.
    pub fn id_query(&self) -> &str {
        self.query.trim()
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        if !self.category.admits(record.category()) {
            return false;
        }
        let needle = self.id_query();
        needle.is_empty() || record.id().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("unknown property type '{0}' (expected Residential, Commercial, Land or all)")]
    UnknownCategory(String),
}

/// Keeps the records admitted by `criteria`, in collection order.
pub fn project<R: Record>(collection: &[R], criteria: &FilterCriteria) -> Vec<R> {
    collection
        .iter()
        .filter(|record| criteria.matches(*record))
        .cloned()
        .collect()
}

pub fn project_refs<'a, R: Record>(collection: &'a [R], criteria: &FilterCriteria) -> Vec<&'a R> {
    collection
        .iter()
        .filter(|record| criteria.matches(*record))
        .collect()
}

/// Parses a filter line such as `type:Commercial ab12`.
///
/// `type:` tokens set the category (last one wins, `type:all` clears it);
/// everything else is joined into the identifier query.
pub fn parse_filter(input: &str) -> Result<FilterCriteria, FilterParseError> {
    let mut criteria = FilterCriteria::default();
    let mut terms = Vec::new();
    for raw in input.split_whitespace() {
        if let Some(value) = raw.strip_prefix("type:") {
            criteria.category = value.parse()?;
            continue;
        }
        terms.push(raw);
    }
    criteria.query = terms.join(" ");
    Ok(criteria)
}

pub fn filter_chips(criteria: &FilterCriteria) -> Vec<String> {
    let mut chips = Vec::new();
    if let CategoryFilter::Only(category) = criteria.category {
        chips.push(format!("type:{category}"));
    }
    let query = criteria.id_query();
    if !query.is_empty() {
        chips.push(format!("id~{query}"));
    }
    chips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordId, TitleSearchRequest};

    fn request(id: &str, category: Option<PropertyCategory>) -> TitleSearchRequest {
        TitleSearchRequest {
            id: RecordId::new(id),
            property_type: category,
            property_city: "Pune".into(),
            property_state: "MH".into(),
            property_address: format!("{id} Main Street"),
            registration_number: None,
            created_at: None,
            contact_full_name: "Asha".into(),
            contact_email: "asha@example.com".into(),
            contact_phone: "99999".into(),
            contact_notes: None,
            property_documents: Vec::new(),
        }
    }

    fn sample() -> Vec<TitleSearchRequest> {
        vec![
            request("r-100", Some(PropertyCategory::Residential)),
            request("c-200", Some(PropertyCategory::Commercial)),
            request("l-300", Some(PropertyCategory::Land)),
            request("c-201", Some(PropertyCategory::Commercial)),
            request("x-400", None),
        ]
    }

    fn ids(records: &[TitleSearchRequest]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn empty_criteria_is_identity() {
        let collection = sample();
        let projected = project(&collection, &FilterCriteria::default());
        assert_eq!(projected, collection);
    }

    #[test]
    fn category_filter_keeps_only_matching_type() {
        let collection = vec![
            request("a", Some(PropertyCategory::Residential)),
            request("b", Some(PropertyCategory::Commercial)),
            request("c", Some(PropertyCategory::Land)),
        ];
        let criteria = FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Commercial), "");
        let projected = project(&collection, &criteria);
        assert_eq!(ids(&projected), vec!["b"]);
    }

    #[test]
    fn id_query_is_substring_match() {
        let collection = vec![request("ab1234", None), request("xy9999", None)];
        let criteria = FilterCriteria::new(CategoryFilter::All, "ab12");
        assert_eq!(ids(&project(&collection, &criteria)), vec!["ab1234"]);
    }

    #[test]
    fn id_query_is_case_sensitive_and_trimmed() {
        let collection = vec![request("AB1234", None), request("ab1234", None)];
        let criteria = FilterCriteria::new(CategoryFilter::All, "  ab12 ");
        assert_eq!(ids(&project(&collection, &criteria)), vec!["ab1234"]);
    }

    #[test]
    fn filters_compose_and_preserve_order() {
        let collection = sample();
        let criteria = FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Commercial), "c-2");
        assert_eq!(ids(&project(&collection, &criteria)), vec!["c-200", "c-201"]);
    }

    #[test]
    fn projection_is_an_ordered_subsequence() {
        let collection = sample();
        let criteria_set = [
            FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Land), ""),
            FilterCriteria::new(CategoryFilter::All, "0"),
            FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Commercial), "1"),
            FilterCriteria::new(CategoryFilter::All, "missing"),
        ];
        for criteria in &criteria_set {
            let projected = project(&collection, criteria);
            let mut cursor = collection.iter();
            for kept in &projected {
                assert!(
                    cursor.any(|candidate| candidate == kept),
                    "{kept:?} out of order for {criteria:?}"
                );
            }
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let collection = sample();
        let criteria = FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Commercial), "c");
        let once = project(&collection, &criteria);
        let twice = project(&once, &criteria);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_collection_projects_to_empty() {
        let collection: Vec<TitleSearchRequest> = Vec::new();
        let criteria = FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Land), "zz");
        assert!(project(&collection, &criteria).is_empty());
    }

    #[test]
    fn uncategorised_records_only_pass_all() {
        let collection = vec![request("n1", None)];
        let land = FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Land), "");
        assert!(project(&collection, &land).is_empty());
        assert_eq!(project_refs(&collection, &FilterCriteria::default()).len(), 1);
    }

    #[test]
    fn parse_filter_reads_type_and_terms() {
        let criteria = parse_filter("type:commercial ab12").expect("parse");
        assert_eq!(
            criteria.category,
            CategoryFilter::Only(PropertyCategory::Commercial)
        );
        assert_eq!(criteria.query, "ab12");

        let reset = parse_filter("type:Land type:all").expect("parse");
        assert_eq!(reset.category, CategoryFilter::All);
        assert!(reset.is_empty());
    }

    #[test]
    fn parse_filter_rejects_unknown_type() {
        let err = parse_filter("type:castle").unwrap_err();
        assert_eq!(err, FilterParseError::UnknownCategory("castle".into()));
    }

    #[test]
    fn chips_describe_active_filters() {
        let criteria = FilterCriteria::new(CategoryFilter::Only(PropertyCategory::Land), " 42 ");
        assert_eq!(filter_chips(&criteria), vec!["type:Land", "id~42"]);
        assert!(filter_chips(&FilterCriteria::default()).is_empty());
    }

    #[test]
    fn category_cycle_wraps_to_all() {
        let mut filter = CategoryFilter::All;
        for _ in 0..4 {
            filter = filter.cycle();
        }
        assert_eq!(filter, CategoryFilter::All);
    }
}
