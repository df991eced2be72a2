//! Fixed vocabularies accepted by the Petfinder API.
//!
//! These tables are process-wide read-only constants. Every enumerated query
//! filter is checked against one of them before a request is built.

/// A named set of allowed values for one query field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    /// The field name used in error messages.
    pub field: &'static str,
    /// The allowed values, lowercase.
    pub values: &'static [&'static str],
}

impl Vocabulary {
    /// Returns `true` if `value` is a member of this vocabulary (ASCII case-insensitive).
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.eq_ignore_ascii_case(value))
    }

    /// Returns the values of `candidates` that are not members of this vocabulary,
    /// in the order they were given.
    pub fn unknown<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        candidates.into_iter().filter(|c| !self.contains(c)).collect()
    }
}

pub const ANIMAL_TYPES: Vocabulary = Vocabulary {
    field: "type",
    values: &[
        "dog",
        "cat",
        "rabbit",
        "small-furry",
        "horse",
        "bird",
        "scales-fins-other",
        "barnyard",
    ],
};

pub const SIZES: Vocabulary = Vocabulary {
    field: "size",
    values: &["small", "medium", "large", "xlarge"],
};

pub const GENDERS: Vocabulary = Vocabulary {
    field: "gender",
    values: &["male", "female", "unknown"],
};

pub const AGES: Vocabulary = Vocabulary {
    field: "age",
    values: &["baby", "young", "adult", "senior"],
};

pub const COATS: Vocabulary = Vocabulary {
    field: "coat",
    values: &["short", "medium", "long", "wire", "hairless", "curly"],
};

pub const STATUSES: Vocabulary = Vocabulary {
    field: "status",
    values: &["adoptable", "adopted", "found"],
};

pub const ANIMAL_SORTS: Vocabulary = Vocabulary {
    field: "sort",
    values: &["recent", "-recent", "distance", "-distance", "random"],
};

pub const ORGANIZATION_SORTS: Vocabulary = Vocabulary {
    field: "sort",
    values: &[
        "distance",
        "-distance",
        "name",
        "-name",
        "country",
        "-country",
        "state",
        "-state",
    ],
};
