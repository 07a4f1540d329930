//! Reference strings
//!
//! The literal value of a reference-typed row uses one of three grammars:
//!
//! - `#<recordId>`: bare internal record id
//! - `<type>#<legacyId>`: legacy id, where `<type>` may contain the `*` wildcard
//! - `<type>?<field>=<literal>`: equality query against persisted objects

use crate::error::ModelError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Wildcard marker inside a type name
pub const WILDCARD: char = '*';

/// Parsed reference string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Record id within the current load run
    ById { record_id: String },
    /// Externally assigned legacy id of a (possibly wildcarded) type
    ByLegacyId { type_name: String, legacy_id: String },
    /// Single persisted object with `field == value`
    ByQuery {
        type_name: String,
        field: String,
        value: String,
    },
}

impl Reference {
    /// Reference by record id
    #[inline]
    #[must_use]
    pub fn by_id(record_id: impl Into<String>) -> Self {
        Self::ById {
            record_id: record_id.into(),
        }
    }

    /// Reference by legacy id
    #[inline]
    #[must_use]
    pub fn by_legacy_id(type_name: impl Into<String>, legacy_id: impl Into<String>) -> Self {
        Self::ByLegacyId {
            type_name: type_name.into(),
            legacy_id: legacy_id.into(),
        }
    }

    /// Reference by query
    #[inline]
    #[must_use]
    pub fn by_query(
        type_name: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::ByQuery {
            type_name: type_name.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Target type name, absent for bare ids
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::ById { .. } => None,
            Self::ByLegacyId { type_name, .. } | Self::ByQuery { type_name, .. } => {
                Some(type_name)
            }
        }
    }

    /// Whether the target type name contains a wildcard
    #[inline]
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.type_name().is_some_and(|t| t.contains(WILDCARD))
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById { record_id } => write!(f, "#{record_id}"),
            Self::ByLegacyId {
                type_name,
                legacy_id,
            } => write!(f, "{type_name}#{legacy_id}"),
            Self::ByQuery {
                type_name,
                field,
                value,
            } => write!(f, "{type_name}?{field}={value}"),
        }
    }
}

impl FromStr for Reference {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidReference(s.to_string());
        let trimmed = s.trim();

        if let Some(record_id) = trimmed.strip_prefix('#') {
            if record_id.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::by_id(record_id));
        }

        let split = trimmed.find(['#', '?']).ok_or_else(invalid)?;
        let (type_name, rest) = trimmed.split_at(split);
        if !is_valid_type_name(type_name) {
            return Err(invalid());
        }

        if let Some(legacy_id) = rest.strip_prefix('#') {
            if legacy_id.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::by_legacy_id(type_name, legacy_id));
        }

        // rest starts with '?'
        let criteria = &rest[1..];
        let (field, value) = criteria.split_once('=').ok_or_else(invalid)?;
        if field.is_empty() || !field.chars().all(is_name_char) || type_name.contains(WILDCARD) {
            return Err(invalid());
        }
        Ok(Self::by_query(type_name, field, value))
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn is_valid_type_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| is_name_char(c) || c == WILDCARD)
}

/// Match a type name against a pattern where `*` stands for any run of characters
#[must_use]
pub fn type_matches(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && p[pi] == WILDCARD {
            star = Some((pi, ni));
            pi += 1;
        } else if pi < p.len() && p[pi] == n[ni] {
            pi += 1;
            ni += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == WILDCARD)
}
