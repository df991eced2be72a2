//! Query parameter validation and serialization.
//!
//! [`AnimalQuery`] and [`OrganizationQuery`] collect filter options and turn
//! them into a flat key/value map for the query string. Validation runs
//! before serialization and reports every violation at once, so a bad query
//! never reaches the network.

use crate::vocabulary::{
    Vocabulary, AGES, ANIMAL_SORTS, ANIMAL_TYPES, COATS, GENDERS, ORGANIZATION_SORTS, SIZES,
    STATUSES,
};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Serialized query parameters, keyed by wire name.
pub type QueryParameters = BTreeMap<String, String>;

/// Largest accepted search radius, in miles.
pub const MAX_DISTANCE: u32 = 500;

/// Largest page size the API serves.
pub const MAX_RESULTS_PER_PAGE: u32 = 100;

const DISTANCE_RANGE: RangeInclusive<u32> = 0..=MAX_DISTANCE;
const RESULTS_PER_PAGE_RANGE: RangeInclusive<u32> = 1..=MAX_RESULTS_PER_PAGE;

/// A filter value holding zero or more entries.
///
/// A single string and a list of strings are both accepted; a multi-valued
/// filter is sent as one comma-joined value with its order preserved.
///
/// # Examples
///
/// ```
/// use petfinder_client::FilterValue;
///
/// let single = FilterValue::from("dog");
/// let many = FilterValue::from(vec!["small", "medium"]);
///
/// assert_eq!(single.joined(), "dog");
/// assert_eq!(many.joined(), "small,medium");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterValue(Vec<String>);

impl FilterValue {
    /// Returns `true` if the filter holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Joins the entries with commas.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    fn lowercased(&self) -> Self {
        Self(self.0.iter().map(|v| v.to_ascii_lowercase()).collect())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl<T: Into<String>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<String>, const N: usize> From<[T; N]> for FilterValue {
    fn from(values: [T; N]) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<String>> From<&[T]> for FilterValue {
    fn from(values: &[T]) -> Self {
        Self(values.iter().cloned().map(Into::into).collect())
    }
}

/// One rejected query field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterViolation {
    /// The field that failed validation.
    pub field: String,
    /// Why it failed.
    pub message: String,
}

impl ParameterViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParameterViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collects violations across all fields of a query.
#[derive(Default)]
struct Validator {
    violations: Vec<ParameterViolation>,
}

impl Validator {
    fn enumerated(&mut self, vocabulary: &Vocabulary, value: Option<&FilterValue>) {
        let Some(value) = value else { return };
        let unknown = vocabulary.unknown(value.iter());
        if !unknown.is_empty() {
            self.violations.push(ParameterViolation::new(
                vocabulary.field,
                format!(
                    "{:?} not valid, must be one of {:?}",
                    unknown, vocabulary.values
                ),
            ));
        }
    }

    fn single(&mut self, vocabulary: &Vocabulary, value: Option<&str>) {
        if let Some(value) = value {
            if !vocabulary.contains(value) {
                self.violations.push(ParameterViolation::new(
                    vocabulary.field,
                    format!("{value:?} not valid, must be one of {:?}", vocabulary.values),
                ));
            }
        }
    }

    fn range(&mut self, field: &str, value: Option<u32>, range: RangeInclusive<u32>) {
        if let Some(value) = value {
            if !range.contains(&value) {
                self.violations.push(ParameterViolation::new(
                    field,
                    format!(
                        "{value} out of range, must be between {} and {}",
                        range.start(),
                        range.end()
                    ),
                ));
            }
        }
    }

    fn require(&mut self, field: &str, condition: bool, message: &str) {
        if !condition {
            self.violations.push(ParameterViolation::new(field, message));
        }
    }

    fn finish(self) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidParameters {
                violations: self.violations,
            })
        }
    }
}

/// Writes present fields into a [`QueryParameters`] map, skipping absent ones.
#[derive(Default)]
struct Serializer {
    params: QueryParameters,
}

impl Serializer {
    fn filter(&mut self, key: &str, value: Option<&FilterValue>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.params.insert(key.to_string(), value.joined());
        }
        self
    }

    fn text(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.params.insert(key.to_string(), value.to_string());
        }
        self
    }

    fn flag(&mut self, key: &str, value: Option<bool>) -> &mut Self {
        if let Some(value) = value {
            self.params
                .insert(key.to_string(), u8::from(value).to_string());
        }
        self
    }

    fn number(&mut self, key: &str, value: Option<u32>) -> &mut Self {
        if let Some(value) = value {
            self.params.insert(key.to_string(), value.to_string());
        }
        self
    }

    fn finish(&mut self) -> QueryParameters {
        std::mem::take(&mut self.params)
    }
}

fn is_distance_sort(sort: Option<&str>) -> bool {
    matches!(sort, Some(s) if s.trim_start_matches('-').eq_ignore_ascii_case("distance"))
}

/// Validates a list of animal types, as used by the type and breed lookups.
///
/// An empty list means "every type" and yields the full vocabulary.
pub fn validate_animal_types(types: &FilterValue) -> Result<Vec<String>> {
    if types.is_empty() {
        return Ok(ANIMAL_TYPES.values.iter().map(|t| t.to_string()).collect());
    }

    let mut validator = Validator::default();
    validator.enumerated(&ANIMAL_TYPES, Some(types));
    validator.finish()?;

    Ok(types.lowercased().0)
}

/// Filters for the animal search endpoint.
///
/// # Examples
///
/// ```
/// use petfinder_client::AnimalQuery;
///
/// let params = AnimalQuery::new()
///     .animal_type("dog")
///     .size(["small", "medium"])
///     .good_with_cats(true)
///     .location("98115")
///     .distance(25)
///     .build()
///     .unwrap();
///
/// assert_eq!(params["type"], "dog");
/// assert_eq!(params["size"], "small,medium");
/// assert_eq!(params["good_with_cats"], "1");
/// assert!(!params.contains_key("coat"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimalQuery {
    animal_type: Option<FilterValue>,
    breed: Option<FilterValue>,
    size: Option<FilterValue>,
    gender: Option<FilterValue>,
    age: Option<FilterValue>,
    color: Option<String>,
    coat: Option<FilterValue>,
    status: Option<FilterValue>,
    name: Option<String>,
    organization_id: Option<FilterValue>,
    good_with_children: Option<bool>,
    good_with_dogs: Option<bool>,
    good_with_cats: Option<bool>,
    house_trained: Option<bool>,
    declawed: Option<bool>,
    special_needs: Option<bool>,
    location: Option<String>,
    distance: Option<u32>,
    sort: Option<String>,
    results_per_page: Option<u32>,
}

impl AnimalQuery {
    /// Creates an empty query matching every animal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn animal_type(mut self, value: impl Into<FilterValue>) -> Self {
        self.animal_type = Some(value.into());
        self
    }

    pub fn breed(mut self, value: impl Into<FilterValue>) -> Self {
        self.breed = Some(value.into());
        self
    }

    pub fn size(mut self, value: impl Into<FilterValue>) -> Self {
        self.size = Some(value.into());
        self
    }

    pub fn gender(mut self, value: impl Into<FilterValue>) -> Self {
        self.gender = Some(value.into());
        self
    }

    pub fn age(mut self, value: impl Into<FilterValue>) -> Self {
        self.age = Some(value.into());
        self
    }

    pub fn color(mut self, value: impl Into<String>) -> Self {
        self.color = Some(value.into());
        self
    }

    pub fn coat(mut self, value: impl Into<FilterValue>) -> Self {
        self.coat = Some(value.into());
        self
    }

    pub fn status(mut self, value: impl Into<FilterValue>) -> Self {
        self.status = Some(value.into());
        self
    }

    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    /// Restricts results to one or more organizations.
    pub fn organization_id(mut self, value: impl Into<FilterValue>) -> Self {
        self.organization_id = Some(value.into());
        self
    }

    pub fn good_with_children(mut self, value: bool) -> Self {
        self.good_with_children = Some(value);
        self
    }

    pub fn good_with_dogs(mut self, value: bool) -> Self {
        self.good_with_dogs = Some(value);
        self
    }

    pub fn good_with_cats(mut self, value: bool) -> Self {
        self.good_with_cats = Some(value);
        self
    }

    pub fn house_trained(mut self, value: bool) -> Self {
        self.house_trained = Some(value);
        self
    }

    pub fn declawed(mut self, value: bool) -> Self {
        self.declawed = Some(value);
        self
    }

    pub fn special_needs(mut self, value: bool) -> Self {
        self.special_needs = Some(value);
        self
    }

    /// City/state, latitude,longitude or postal code.
    pub fn location(mut self, value: impl Into<String>) -> Self {
        self.location = Some(value.into());
        self
    }

    /// Search radius in miles, 0 to 500.
    pub fn distance(mut self, value: u32) -> Self {
        self.distance = Some(value);
        self
    }

    pub fn sort(mut self, value: impl Into<String>) -> Self {
        self.sort = Some(value.into());
        self
    }

    /// Page size, 1 to 100. The server default applies when unset.
    pub fn results_per_page(mut self, value: u32) -> Self {
        self.results_per_page = Some(value);
        self
    }

    /// Validates every field, then serializes the present ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameters`] listing every invalid field.
    pub fn build(&self) -> Result<QueryParameters> {
        let mut validator = Validator::default();
        validator.enumerated(&ANIMAL_TYPES, self.animal_type.as_ref());
        validator.enumerated(&SIZES, self.size.as_ref());
        validator.enumerated(&GENDERS, self.gender.as_ref());
        validator.enumerated(&AGES, self.age.as_ref());
        validator.enumerated(&COATS, self.coat.as_ref());
        validator.enumerated(&STATUSES, self.status.as_ref());
        validator.single(&ANIMAL_SORTS, self.sort.as_deref());
        validator.range("distance", self.distance, DISTANCE_RANGE);
        validator.range("limit", self.results_per_page, RESULTS_PER_PAGE_RANGE);
        validator.require(
            "location",
            self.location.is_some() || !is_distance_sort(self.sort.as_deref()),
            "sorting by distance requires a location",
        );
        validator.finish()?;

        let lower = |v: &Option<FilterValue>| v.as_ref().map(FilterValue::lowercased);
        let sort = self.sort.as_ref().map(|s| s.to_ascii_lowercase());

        Ok(Serializer::default()
            .filter("type", lower(&self.animal_type).as_ref())
            .filter("breed", self.breed.as_ref())
            .filter("size", lower(&self.size).as_ref())
            .filter("gender", lower(&self.gender).as_ref())
            .filter("age", lower(&self.age).as_ref())
            .text("color", self.color.as_deref())
            .filter("coat", lower(&self.coat).as_ref())
            .filter("status", lower(&self.status).as_ref())
            .text("name", self.name.as_deref())
            .filter("organization", self.organization_id.as_ref())
            .flag("good_with_children", self.good_with_children)
            .flag("good_with_dogs", self.good_with_dogs)
            .flag("good_with_cats", self.good_with_cats)
            .flag("house_trained", self.house_trained)
            .flag("declawed", self.declawed)
            .flag("special_needs", self.special_needs)
            .text("location", self.location.as_deref())
            .number("distance", self.distance)
            .text("sort", sort.as_deref())
            .number("limit", self.results_per_page)
            .finish())
    }
}

/// Filters for the organization search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationQuery {
    name: Option<String>,
    location: Option<String>,
    distance: Option<u32>,
    state: Option<String>,
    country: Option<String>,
    query: Option<String>,
    sort: Option<String>,
    results_per_page: Option<u32>,
}

impl OrganizationQuery {
    /// Creates an empty query matching every organization.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    pub fn location(mut self, value: impl Into<String>) -> Self {
        self.location = Some(value.into());
        self
    }

    pub fn distance(mut self, value: u32) -> Self {
        self.distance = Some(value);
        self
    }

    /// Two-letter state abbreviation.
    pub fn state(mut self, value: impl Into<String>) -> Self {
        self.state = Some(value.into());
        self
    }

    /// Two-letter country abbreviation.
    pub fn country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    /// Free-text search over name, city and state.
    pub fn query(mut self, value: impl Into<String>) -> Self {
        self.query = Some(value.into());
        self
    }

    pub fn sort(mut self, value: impl Into<String>) -> Self {
        self.sort = Some(value.into());
        self
    }

    pub fn results_per_page(mut self, value: u32) -> Self {
        self.results_per_page = Some(value);
        self
    }

    /// Validates every field, then serializes the present ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameters`] listing every invalid field.
    pub fn build(&self) -> Result<QueryParameters> {
        let mut validator = Validator::default();
        validator.single(&ORGANIZATION_SORTS, self.sort.as_deref());
        validator.range("distance", self.distance, DISTANCE_RANGE);
        validator.range("limit", self.results_per_page, RESULTS_PER_PAGE_RANGE);
        validator.require(
            "location",
            self.location.is_some() || !is_distance_sort(self.sort.as_deref()),
            "sorting by distance requires a location",
        );
        validator.finish()?;

        let sort = self.sort.as_ref().map(|s| s.to_ascii_lowercase());

        Ok(Serializer::default()
            .text("name", self.name.as_deref())
            .text("location", self.location.as_deref())
            .number("distance", self.distance)
            .text("state", self.state.as_deref())
            .text("country", self.country.as_deref())
            .text("query", self.query.as_deref())
            .text("sort", sort.as_deref())
            .number("limit", self.results_per_page)
            .finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violations(err: Error) -> Vec<ParameterViolation> {
        match err {
            Error::InvalidParameters { violations } => violations,
            other => panic!("Expected InvalidParameters, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let params = AnimalQuery::new().build().unwrap();
        assert!(params.is_empty());

        let params = AnimalQuery::new().name("").breed(Vec::<String>::new()).build().unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_multi_valued_filters_are_comma_joined_in_order() {
        let params = AnimalQuery::new()
            .age(vec!["senior", "baby", "adult"])
            .breed(["Pug", "Beagle"])
            .organization_id(vec!["NJ333", "WA01"])
            .build()
            .unwrap();

        assert_eq!(params["age"], "senior,baby,adult");
        assert_eq!(params["breed"], "Pug,Beagle");
        assert_eq!(params["organization"], "NJ333,WA01");
    }

    #[test]
    fn test_boolean_filters_are_coerced_to_digits() {
        let params = AnimalQuery::new()
            .good_with_children(true)
            .declawed(false)
            .build()
            .unwrap();

        assert_eq!(params["good_with_children"], "1");
        assert_eq!(params["declawed"], "0");
        assert!(!params.contains_key("special_needs"));
    }

    #[test]
    fn test_enumerated_values_are_lowercased() {
        let params = AnimalQuery::new()
            .animal_type("Dog")
            .gender(["Female"])
            .build()
            .unwrap();

        assert_eq!(params["type"], "dog");
        assert_eq!(params["gender"], "female");
    }

    #[test]
    fn test_every_violation_is_reported() {
        let err = AnimalQuery::new()
            .animal_type("dragon")
            .size(["small", "gigantic"])
            .gender("both")
            .age("ancient")
            .coat("scaly")
            .status("sold")
            .sort("oldest")
            .distance(501)
            .results_per_page(101)
            .build()
            .unwrap_err();

        let fields: Vec<String> = violations(err).into_iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            vec!["type", "size", "gender", "age", "coat", "status", "sort", "distance", "limit"]
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        assert!(AnimalQuery::new().distance(0).build().is_ok());
        assert!(AnimalQuery::new().distance(500).build().is_ok());
        assert!(AnimalQuery::new().results_per_page(100).build().is_ok());
        assert!(AnimalQuery::new().results_per_page(0).build().is_err());
    }

    #[test]
    fn test_distance_sort_requires_location() {
        let err = AnimalQuery::new().sort("-distance").build().unwrap_err();
        assert_eq!(violations(err)[0].field, "location");

        let params = AnimalQuery::new()
            .sort("distance")
            .location("Seattle, WA")
            .build()
            .unwrap();
        assert_eq!(params["sort"], "distance");
    }

    #[test]
    fn test_organization_query() {
        let params = OrganizationQuery::new()
            .state("WA")
            .query("rescue")
            .sort("-name")
            .results_per_page(50)
            .build()
            .unwrap();

        assert_eq!(params["state"], "WA");
        assert_eq!(params["query"], "rescue");
        assert_eq!(params["sort"], "-name");
        assert_eq!(params["limit"], "50");

        let err = OrganizationQuery::new().sort("recent").build().unwrap_err();
        assert_eq!(violations(err)[0].field, "sort");
    }

    #[test]
    fn test_validate_animal_types() {
        assert_eq!(
            validate_animal_types(&FilterValue::default()).unwrap().len(),
            ANIMAL_TYPES.values.len()
        );
        assert_eq!(
            validate_animal_types(&FilterValue::from(["Cat", "horse"])).unwrap(),
            vec!["cat".to_string(), "horse".to_string()]
        );
        assert!(validate_animal_types(&FilterValue::from("reptile")).is_err());
    }
}
