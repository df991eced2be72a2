//! Converting raw payloads into rectangular frames.
//!
//! Every payload belongs to one [`ResourceKind`]. The kind is matched once, in
//! [`ResourceKind::layout`], to pick where the records live, how they are
//! flattened and which link columns are rewritten to bare identifiers. Both
//! API generations are understood: current documents (`{"animals": [...]}`)
//! and legacy documents rooted at `petfinder` with `$t` text nodes.

use crate::flatten::{FlatRecord, FlattenRules, RecordFlattener, SubStructure, ZeroOrMore};
use crate::response::{scalar_u64, BatchEntry, Lookup};
use serde_json::Value;

/// The fixed set of resource shapes the API emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `{"animal": {...}}` or legacy `petfinder.pet`.
    Animal,
    /// `{"animals": [...]}` or legacy `petfinder.pets.pet`.
    AnimalCollection,
    /// `{"organization": {...}}`.
    Organization,
    /// `{"organizations": [...]}`.
    OrganizationCollection,
    /// Legacy `petfinder.shelter`.
    Shelter,
    /// Legacy `petfinder.shelters.shelter`.
    ShelterCollection,
    /// `{"breeds": [...]}` or legacy `petfinder.breeds.breed`.
    BreedList,
}

/// Which API generation produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Current,
    Legacy,
}

impl Generation {
    /// Legacy payloads are rooted at a `petfinder` object.
    pub fn of(body: &Value) -> Self {
        if body.get("petfinder").is_some() {
            Generation::Legacy
        } else {
            Generation::Current
        }
    }
}

/// A link column rewritten to a bare identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierColumn {
    /// Dotted source column, e.g. `_links.self.href`.
    pub source: &'static str,
    /// Semantic target column, e.g. `animal_id`.
    pub target: &'static str,
}

/// Where records live in a payload and how to turn them into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Path from the document root to the record or record list.
    pub path: &'static [&'static str],
    pub rules: FlattenRules,
    pub identifiers: &'static [IdentifierColumn],
    /// Columns removed because a renamed identifier already carries them.
    pub dropped: &'static [&'static str],
}

const LEGACY_PET_RULES: FlattenRules = FlattenRules {
    sub_structures: &[
        SubStructure {
            path: &["breeds", "breed"],
            item_key: Some("$t"),
            prefix: "breed",
        },
        SubStructure {
            path: &["media", "photos", "photo"],
            item_key: Some("$t"),
            prefix: "photos",
        },
        SubStructure {
            path: &["options", "option"],
            item_key: Some("$t"),
            prefix: "status",
        },
    ],
    strip_prefixes: &["contact."],
};

const ANIMAL_RULES: FlattenRules = FlattenRules {
    sub_structures: &[
        SubStructure {
            path: &["photos"],
            item_key: Some("full"),
            prefix: "photos",
        },
        SubStructure {
            path: &["tags"],
            item_key: None,
            prefix: "tags",
        },
    ],
    strip_prefixes: &[],
};

const ORGANIZATION_RULES: FlattenRules = FlattenRules {
    sub_structures: &[SubStructure {
        path: &["photos"],
        item_key: Some("full"),
        prefix: "photos",
    }],
    strip_prefixes: &[],
};

const ANIMAL_IDENTIFIERS: &[IdentifierColumn] = &[
    IdentifierColumn {
        source: "_links.self.href",
        target: "animal_id",
    },
    IdentifierColumn {
        source: "_links.type.href",
        target: "animal_type",
    },
    IdentifierColumn {
        source: "_links.organization.href",
        target: "organization_id",
    },
];

const ORGANIZATION_IDENTIFIERS: &[IdentifierColumn] = &[IdentifierColumn {
    source: "_links.self.href",
    target: "organization_id",
}];

const BREED_IDENTIFIERS: &[IdentifierColumn] = &[IdentifierColumn {
    source: "_links.type.href",
    target: "animal_type",
}];

impl ResourceKind {
    /// Returns `true` for kinds whose payload holds a list of records.
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            ResourceKind::AnimalCollection
                | ResourceKind::OrganizationCollection
                | ResourceKind::ShelterCollection
                | ResourceKind::BreedList
        )
    }

    /// The column that identifies a record of this kind.
    pub fn id_column(self) -> &'static str {
        match self {
            ResourceKind::Animal | ResourceKind::AnimalCollection => "animal_id",
            ResourceKind::Organization | ResourceKind::OrganizationCollection => {
                "organization_id"
            }
            ResourceKind::Shelter | ResourceKind::ShelterCollection => "id",
            ResourceKind::BreedList => "name",
        }
    }

    /// Picks the layout for a payload of this kind.
    ///
    /// Organizations only exist in the current generation and shelters only
    /// in the legacy one; for those, the generation of the payload is ignored.
    pub fn layout(self, generation: Generation) -> Layout {
        use Generation::{Current, Legacy};

        match (self, generation) {
            (ResourceKind::Animal, Current) => Layout {
                path: &["animal"],
                rules: ANIMAL_RULES,
                identifiers: ANIMAL_IDENTIFIERS,
                dropped: &[],
            },
            (ResourceKind::AnimalCollection, Current) => Layout {
                path: &["animals"],
                rules: ANIMAL_RULES,
                identifiers: ANIMAL_IDENTIFIERS,
                dropped: &[],
            },
            (ResourceKind::Animal, Legacy) => Layout {
                path: &["petfinder", "pet"],
                rules: LEGACY_PET_RULES,
                identifiers: &[],
                dropped: &[],
            },
            (ResourceKind::AnimalCollection, Legacy) => Layout {
                path: &["petfinder", "pets", "pet"],
                rules: LEGACY_PET_RULES,
                identifiers: &[],
                dropped: &[],
            },
            (ResourceKind::Organization, _) => Layout {
                path: &["organization"],
                rules: ORGANIZATION_RULES,
                identifiers: ORGANIZATION_IDENTIFIERS,
                dropped: &["_links.animals.href"],
            },
            (ResourceKind::OrganizationCollection, _) => Layout {
                path: &["organizations"],
                rules: ORGANIZATION_RULES,
                identifiers: ORGANIZATION_IDENTIFIERS,
                dropped: &["_links.animals.href"],
            },
            (ResourceKind::Shelter, _) => Layout {
                path: &["petfinder", "shelter"],
                rules: FlattenRules::PLAIN,
                identifiers: &[],
                dropped: &[],
            },
            (ResourceKind::ShelterCollection, _) => Layout {
                path: &["petfinder", "shelters", "shelter"],
                rules: FlattenRules::PLAIN,
                identifiers: &[],
                dropped: &[],
            },
            (ResourceKind::BreedList, Current) => Layout {
                path: &["breeds"],
                rules: FlattenRules::PLAIN,
                identifiers: BREED_IDENTIFIERS,
                dropped: &[],
            },
            (ResourceKind::BreedList, Legacy) => Layout {
                path: &["petfinder", "breeds", "breed"],
                rules: FlattenRules::PLAIN,
                identifiers: &[],
                dropped: &[],
            },
        }
    }

    /// The records carried by `body`, in server order.
    ///
    /// Absent or empty record nodes and recognized not-found payloads yield no
    /// records. A legacy collection holding a single record is read as a list
    /// of one.
    pub fn records(self, body: &Value) -> ZeroOrMore<Value> {
        if is_not_found(body) {
            return ZeroOrMore::default();
        }
        let layout = self.layout(Generation::of(body));
        let node = layout
            .path
            .iter()
            .try_fold(body, |node, key| node.get(*key));
        ZeroOrMore::from_json(node)
    }
}

/// Recognizes payloads that mean "no such record".
fn is_not_found(body: &Value) -> bool {
    let current = body.get("status").and_then(Value::as_u64) == Some(404);
    let legacy = body
        .pointer("/petfinder/header/status/code/$t")
        .and_then(scalar_u64)
        == Some(201);
    current || legacy
}

/// Rewrites link columns to bare identifiers and drops duplicated columns.
fn apply_identifiers(row: &mut FlatRecord, layout: &Layout) {
    for identifier in layout.identifiers {
        if let Some(link) = row.remove(identifier.source) {
            let bare = match &link {
                Value::String(href) => Value::String(bare_identifier(href).to_string()),
                other => other.clone(),
            };
            row.insert(identifier.target, bare);
        }
    }
    for column in layout.dropped {
        row.remove(column);
    }
}

/// `/v2/animals/123` becomes `123`; query strings and trailing slashes are ignored.
pub fn bare_identifier(href: &str) -> &str {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// A rectangular table of flattened records.
///
/// Columns are the union of every row's columns in first-seen order; a row
/// lacking a column reads as `null` there.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularFrame {
    kind: ResourceKind,
    columns: Vec<String>,
    rows: Vec<FlatRecord>,
}

impl TabularFrame {
    /// An empty frame with no columns.
    pub fn empty(kind: ResourceKind) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Builds a frame from rows.
    pub fn from_rows(kind: ResourceKind, rows: Vec<FlatRecord>) -> Self {
        let mut frame = Self::empty(kind);
        for row in rows {
            frame.push(row);
        }
        frame
    }

    fn push(&mut self, row: FlatRecord) {
        for column in row.columns() {
            if !self.columns.iter().any(|c| c == column) {
                self.columns.push(column.to_string());
            }
        }
        self.rows.push(row);
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FlatRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The cell at `row`/`column`; `Null` for a missing cell in a known column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let record = self.rows.get(row)?;
        if !self.has_column(column) {
            return None;
        }
        Some(record.get(column).unwrap_or(&Value::Null))
    }

    /// Every cell of one column, top to bottom.
    pub fn column(&self, column: &str) -> Vec<&Value> {
        (0..self.rows.len())
            .filter_map(|row| self.get(row, column))
            .collect()
    }

    /// Appends all rows of `other`.
    pub fn append(&mut self, other: TabularFrame) {
        for row in other.rows {
            self.push(row);
        }
    }

    /// Drops every column whose name contains `marker`.
    pub fn drop_columns_matching(&mut self, marker: &str) {
        self.columns.retain(|c| !c.contains(marker));
        for row in &mut self.rows {
            row.retain(|c| !c.contains(marker));
        }
    }

    /// Rows as equally long value vectors, in column order.
    pub fn to_matrix(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }
}

/// Flattens one record of `kind` taken from a payload of `generation`.
pub fn flatten_record(kind: ResourceKind, generation: Generation, record: &Value) -> FlatRecord {
    let layout = kind.layout(generation);
    let mut row = RecordFlattener::new(layout.rules).flatten(record);
    apply_identifiers(&mut row, &layout);
    row
}

/// Converts one raw payload into a frame.
///
/// Collections yield one row per record, singular kinds one row. A payload
/// without matching records, or a recognized not-found payload, yields an
/// empty frame.
///
/// # Examples
///
/// ```
/// use petfinder_client::{normalize, ResourceKind};
/// use serde_json::json;
///
/// let raw = json!({"animals": [{
///     "id": 123,
///     "name": "Rex",
///     "_links": {
///         "self": {"href": "/v2/animals/123"},
///         "type": {"href": "/v2/types/dog"},
///         "organization": {"href": "/v2/organizations/wa01"}
///     }
/// }]});
///
/// let frame = normalize(&raw, ResourceKind::AnimalCollection);
/// assert_eq!(frame.len(), 1);
/// assert_eq!(frame.get(0, "animal_id"), Some(&json!("123")));
/// assert_eq!(frame.get(0, "organization_id"), Some(&json!("wa01")));
/// ```
pub fn normalize(raw: &Value, kind: ResourceKind) -> TabularFrame {
    let generation = Generation::of(raw);
    let rows = kind
        .records(raw)
        .iter()
        .map(|record| flatten_record(kind, generation, record))
        .collect();
    TabularFrame::from_rows(kind, rows)
}

/// Converts the result of a lookup by id list into a frame.
///
/// Found records are flattened as singular records; a not-found entry keeps its
/// place as a row holding only the id column.
pub fn batch_frame(kind: ResourceKind, entries: &[BatchEntry]) -> TabularFrame {
    let rows = entries
        .iter()
        .map(|entry| match &entry.lookup {
            Lookup::Found(record) => flatten_record(kind, entry.generation, record),
            Lookup::NotFound => {
                let mut row = FlatRecord::default();
                row.insert(kind.id_column(), entry.id.clone());
                row
            }
        })
        .collect();
    TabularFrame::from_rows(kind, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn animal(id: u64, org: &str) -> Value {
        json!({
            "id": id,
            "organization_id": org.to_uppercase(),
            "type": "Dog",
            "name": format!("Dog {id}"),
            "breeds": {"primary": "Pug", "secondary": null, "mixed": false, "unknown": false},
            "photos": [
                {"small": "s.jpg", "medium": "m.jpg", "large": "l.jpg", "full": format!("full-{id}.jpg")}
            ],
            "tags": [],
            "contact": {"email": "a@b.org", "address": {"city": "Seattle"}},
            "_links": {
                "self": {"href": format!("/v2/animals/{id}")},
                "type": {"href": "/v2/types/dog"},
                "organization": {"href": format!("/v2/organizations/{org}")}
            }
        })
    }

    #[test]
    fn test_animal_collection_identifiers_are_bare() {
        let raw = json!({"animals": [animal(1, "wa01"), animal(2, "nj333")]});
        let frame = normalize(&raw, ResourceKind::AnimalCollection);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("animal_id"), vec![&json!("1"), &json!("2")]);
        assert_eq!(frame.column("animal_type"), vec![&json!("dog"), &json!("dog")]);
        assert_eq!(
            frame.column("organization_id"),
            vec![&json!("wa01"), &json!("nj333")]
        );
        assert!(!frame.has_column("_links.self.href"));
        assert!(!frame.has_column("_links.organization.href"));
    }

    #[test]
    fn test_animal_sub_structures() {
        let frame = normalize(&json!({"animal": animal(7, "wa01")}), ResourceKind::Animal);

        assert_eq!(frame.len(), 1);
        assert_eq!(frame.get(0, "photos0"), Some(&json!("full-7.jpg")));
        assert_eq!(frame.get(0, "tags0"), Some(&json!("na")));
        assert_eq!(frame.get(0, "breeds.primary"), Some(&json!("Pug")));
        assert_eq!(frame.get(0, "contact.address.city"), Some(&json!("Seattle")));
    }

    #[test]
    fn test_organization_drops_animals_link() {
        let raw = json!({"organizations": [{
            "id": "WA01",
            "name": "Seattle Humane",
            "photos": [],
            "_links": {
                "self": {"href": "/v2/organizations/wa01"},
                "animals": {"href": "/v2/animals?organization=wa01"}
            }
        }]});

        let frame = normalize(&raw, ResourceKind::OrganizationCollection);
        assert_eq!(frame.get(0, "organization_id"), Some(&json!("wa01")));
        assert_eq!(frame.get(0, "photos0"), Some(&json!("na")));
        assert!(!frame.has_column("_links.animals.href"));
    }

    #[test]
    fn test_legacy_pets_single_record_collection() {
        let raw = json!({"petfinder": {
            "header": {"status": {"code": {"$t": "100"}}},
            "lastOffset": {"$t": "1"},
            "pets": {"pet": {
                "id": {"$t": "99"},
                "name": {"$t": "Tom"},
                "breeds": {"breed": {"$t": "Tabby"}},
                "contact": {"email": {"$t": "x@y.org"}},
                "options": {}
            }}
        }});

        let frame = normalize(&raw, ResourceKind::AnimalCollection);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.get(0, "id"), Some(&json!("99")));
        assert_eq!(frame.get(0, "breed0"), Some(&json!("Tabby")));
        assert_eq!(frame.get(0, "photos0"), Some(&json!("na")));
        assert_eq!(frame.get(0, "status0"), Some(&json!("na")));
        assert_eq!(frame.get(0, "email"), Some(&json!("x@y.org")));
    }

    #[test]
    fn test_empty_and_not_found_payloads() {
        assert!(normalize(&json!({"animals": []}), ResourceKind::AnimalCollection).is_empty());
        assert!(normalize(&json!({}), ResourceKind::OrganizationCollection).is_empty());
        assert!(normalize(&json!({"petfinder": {"pets": {}}}), ResourceKind::AnimalCollection)
            .is_empty());
        assert!(normalize(
            &json!({"status": 404, "title": "Not Found", "detail": "Not Found"}),
            ResourceKind::Animal
        )
        .is_empty());
        assert!(normalize(
            &json!({"petfinder": {"header": {"status": {"code": {"$t": "201"}}}}}),
            ResourceKind::Shelter
        )
        .is_empty());
    }

    #[test]
    fn test_breed_lists() {
        let current = json!({"breeds": [
            {"name": "Affenpinscher", "_links": {"type": {"href": "/v2/types/dog"}}},
            {"name": "Akita", "_links": {"type": {"href": "/v2/types/dog"}}}
        ]});
        let frame = normalize(&current, ResourceKind::BreedList);
        assert_eq!(frame.columns(), &["name".to_string(), "animal_type".to_string()]);
        assert_eq!(frame.get(1, "name"), Some(&json!("Akita")));

        let legacy = json!({"petfinder": {"breeds": {"@animal": "cat", "breed": [
            {"$t": "Abyssinian"}, {"$t": "Bengal"}
        ]}}});
        let frame = normalize(&legacy, ResourceKind::BreedList);
        assert_eq!(frame.column("name"), vec![&json!("Abyssinian"), &json!("Bengal")]);
    }

    #[test]
    fn test_shelters() {
        let raw = json!({"petfinder": {"shelters": {"shelter": [
            {"id": {"$t": "WA01"}, "name": {"$t": "One"}, "city": {"$t": "Seattle"}},
            {"id": {"$t": "WA02"}, "name": {"$t": "Two"}, "zip": {"$t": "98101"}}
        ]}}});

        let frame = normalize(&raw, ResourceKind::ShelterCollection);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get(1, "city"), Some(&Value::Null));
        assert_eq!(frame.to_matrix()[1].len(), frame.columns().len());
    }

    #[test]
    fn test_batch_not_found_keeps_its_row() {
        let entries = vec![
            BatchEntry {
                id: "1".to_string(),
                status: http::StatusCode::OK,
                generation: Generation::Current,
                lookup: Lookup::Found(animal(1, "wa01")),
            },
            BatchEntry {
                id: "404404".to_string(),
                status: http::StatusCode::NOT_FOUND,
                generation: Generation::Current,
                lookup: Lookup::NotFound,
            },
        ];

        let frame = batch_frame(ResourceKind::Animal, &entries);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("animal_id"), vec![&json!("1"), &json!("404404")]);
        assert_eq!(frame.get(1, "name"), Some(&Value::Null));
    }

    #[test]
    fn test_batch_legacy_records_use_legacy_rules() {
        let body = json!({"petfinder": {
            "header": {"status": {"code": {"$t": "100"}}},
            "pet": {
                "id": {"$t": "99"},
                "name": {"$t": "Tom"},
                "breeds": {"breed": {"$t": "Tabby"}},
                "contact": {"email": {"$t": "x@y.org"}},
                "options": {"option": [{"$t": "hasShots"}, {"$t": "altered"}]}
            }
        }});
        let record = ResourceKind::Animal.records(&body).into_iter().next().unwrap();
        let entries = vec![BatchEntry {
            id: "99".to_string(),
            status: http::StatusCode::OK,
            generation: Generation::of(&body),
            lookup: Lookup::Found(record),
        }];

        let frame = batch_frame(ResourceKind::Animal, &entries);
        let expected = normalize(&body, ResourceKind::Animal);
        assert_eq!(frame.columns(), expected.columns());
        assert_eq!(frame.get(0, "breed0"), Some(&json!("Tabby")));
        assert_eq!(frame.get(0, "email"), Some(&json!("x@y.org")));
        assert_eq!(frame.get(0, "status0"), Some(&json!("hasShots")));
        assert_eq!(frame.get(0, "status1"), Some(&json!("altered")));
        assert!(!frame.has_column("contact.email"));
        assert!(!frame.has_column("breeds.breed"));
    }

    #[test]
    fn test_bare_identifier() {
        assert_eq!(bare_identifier("/v2/animals/123"), "123");
        assert_eq!(bare_identifier("/v2/types/small-furry/"), "small-furry");
        assert_eq!(bare_identifier("NJ333"), "NJ333");
    }

    #[test]
    fn test_drop_columns_matching() {
        let mut frame = normalize(
            &json!({"animals": [animal(1, "wa01")]}),
            ResourceKind::AnimalCollection,
        );
        frame.drop_columns_matching("contact.");
        assert!(!frame.has_column("contact.email"));
        assert!(frame.rows()[0].get("contact.email").is_none());
    }
}
