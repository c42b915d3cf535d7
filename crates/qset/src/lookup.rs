//! The `field__operator` filter grammar.
//!
//! A filter key is a field name optionally followed by `__` and an operator suffix.
//! The suffix vocabulary is stable:
//! `exact, in, isnull, startswith, endswith, contains, icontains, istartswith,
//! iendswith, gt, gte, lt, lte`. Unknown suffixes fall back to `exact`.

use std::fmt;
use std::str::FromStr;

/// Separator between a field name and its operator suffix.
pub const LOOKUP_SEP: &str = "__";

/// Comparison operator selected by a key's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lookup {
    #[default]
    Exact,
    In,
    IsNull,
    StartsWith,
    EndsWith,
    Contains,
    IContains,
    IStartsWith,
    IEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Lookup {
    pub const ALL: [Lookup; 13] = [
        Lookup::Exact,
        Lookup::In,
        Lookup::IsNull,
        Lookup::StartsWith,
        Lookup::EndsWith,
        Lookup::Contains,
        Lookup::IContains,
        Lookup::IStartsWith,
        Lookup::IEndsWith,
        Lookup::Gt,
        Lookup::Gte,
        Lookup::Lt,
        Lookup::Lte,
    ];

    /// The suffix as written in a filter key.
    pub fn as_str(self) -> &'static str {
        match self {
            Lookup::Exact => "exact",
            Lookup::In => "in",
            Lookup::IsNull => "isnull",
            Lookup::StartsWith => "startswith",
            Lookup::EndsWith => "endswith",
            Lookup::Contains => "contains",
            Lookup::IContains => "icontains",
            Lookup::IStartsWith => "istartswith",
            Lookup::IEndsWith => "iendswith",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
        }
    }

    /// Look up a known suffix.
    pub fn from_suffix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    /// Whether this is one of the LIKE-based operators.
    pub fn is_pattern(self) -> bool {
        self.wildcards().is_some()
    }

    /// Whether the match ignores case.
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Lookup::IContains | Lookup::IStartsWith | Lookup::IEndsWith
        )
    }

    /// SQL comparison operator for the ordering lookups.
    pub fn comparison_operator(self) -> Option<&'static str> {
        match self {
            Lookup::Gt => Some(">"),
            Lookup::Gte => Some(">="),
            Lookup::Lt => Some("<"),
            Lookup::Lte => Some("<="),
            _ => None,
        }
    }

    /// (leading `%`, trailing `%`) for the pattern lookups.
    fn wildcards(self) -> Option<(bool, bool)> {
        match self {
            Lookup::StartsWith | Lookup::IStartsWith => Some((false, true)),
            Lookup::EndsWith | Lookup::IEndsWith => Some((true, false)),
            Lookup::Contains | Lookup::IContains => Some((true, true)),
            _ => None,
        }
    }

    /// Build the escaped LIKE pattern for a pattern lookup.
    ///
    /// Returns `None` for lookups that are not pattern-based.
    pub fn like_pattern(self, needle: &str) -> Option<String> {
        let (lead, trail) = self.wildcards()?;
        let escaped = escape_like(needle);
        let mut out = String::with_capacity(escaped.len() + 2);
        if lead {
            out.push('%');
        }
        out.push_str(&escaped);
        if trail {
            out.push('%');
        }
        Some(out)
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lookup {
    type Err = std::convert::Infallible;

    /// Never fails: unknown suffixes resolve to [`Lookup::Exact`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Lookup::from_suffix(s).unwrap_or_else(|| {
            tracing::debug!(
                target: "qset.query",
                suffix = s,
                "unknown lookup suffix, falling back to exact"
            );
            Lookup::Exact
        }))
    }
}

/// Split a filter key into its field name and lookup.
///
/// Only the first two `__`-separated segments are significant:
/// `age__gte` → (`age`, `Gte`), `name` → (`name`, `Exact`).
pub fn split_key(key: &str) -> (&str, Lookup) {
    let mut segments = key.split(LOOKUP_SEP);
    let field = segments.next().unwrap_or_default();
    let lookup = match segments.next() {
        Some(suffix) => suffix.parse::<Lookup>().unwrap_or_default(),
        None => Lookup::Exact,
    };
    (field, lookup)
}

/// Escape LIKE metacharacters so the value matches literally.
///
/// `\` → `\\`, `%` → `\%`, `_` → `\_`. The escape character is always backslash.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_field_is_exact() {
        assert_eq!(split_key("name"), ("name", Lookup::Exact));
    }

    #[test]
    fn split_every_known_suffix() {
        for lookup in Lookup::ALL {
            let key = format!("f__{}", lookup.as_str());
            assert_eq!(split_key(&key), ("f", lookup));
        }
    }

    #[test]
    fn unknown_suffix_falls_back_to_exact() {
        assert_eq!(split_key("name__regex"), ("name", Lookup::Exact));
        assert_eq!(split_key("name__"), ("name", Lookup::Exact));
    }

    #[test]
    fn extra_segments_are_ignored() {
        assert_eq!(split_key("a__gt__b"), ("a", Lookup::Gt));
    }

    #[test]
    fn escape_like_metacharacters() {
        assert_eq!(escape_like("100%_done"), r"100\%\_done");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn patterns_anchor_wildcards() {
        assert_eq!(Lookup::StartsWith.like_pattern("Jo").unwrap(), "Jo%");
        assert_eq!(Lookup::IEndsWith.like_pattern("son").unwrap(), "%son");
        assert_eq!(Lookup::Contains.like_pattern("5%").unwrap(), r"%5\%%");
        assert_eq!(Lookup::Gt.like_pattern("x"), None);
    }
}
