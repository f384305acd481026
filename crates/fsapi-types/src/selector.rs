//! Label and field selectors used to filter list and watch results.
//!
//! Label selectors accept the Kubernetes syntax: comma-separated
//! requirements of the form `k=v`, `k==v`, `k!=v`, `k in (a,b)`,
//! `k notin (a,b)`, `k` (exists) and `!k` (does not exist). Field selectors
//! accept `metadata.name` and `metadata.namespace` with `=`, `==` or `!=`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;
use crate::meta::ObjectMeta;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A single `key op values` clause of a label selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: BTreeSet<String>,
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => {
                value.map(|v| self.values.contains(v)).unwrap_or(false)
            }
            Operator::NotEquals | Operator::NotIn => {
                value.map(|v| !self.values.contains(v)).unwrap_or(true)
            }
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::NotEquals => write!(f, "{}!={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::Exists => f.write_str(&self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A conjunction of label requirements. The empty selector matches
/// everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// The selector that matches every object.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Equality selector requiring every `key=value` pair of `set`.
    pub fn from_set<K, V, I>(set: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let requirements = set
            .into_iter()
            .map(|(k, v)| Requirement {
                key: k.into(),
                operator: Operator::Equals,
                values: BTreeSet::from([v.into()]),
            })
            .collect();
        Self { requirements }
    }

    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::everything());
        }
        let requirements = split_top_level(input)
            .into_iter()
            .map(|term| parse_requirement(input, term.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for Selector {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// Split on commas that are not inside a parenthesised value list.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_requirement(input: &str, term: &str) -> Result<Requirement, TypeError> {
    let fail = |reason: &str| TypeError::InvalidSelector {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if term.is_empty() {
        return Err(fail("empty requirement"));
    }

    if let Some(key) = term.strip_prefix('!') {
        let key = key.trim();
        check_key(key).map_err(|r| fail(&r))?;
        return Ok(Requirement {
            key: key.to_string(),
            operator: Operator::DoesNotExist,
            values: BTreeSet::new(),
        });
    }

    if let Some(open) = term.find('(') {
        let close = term
            .rfind(')')
            .filter(|c| *c == term.len() - 1 && *c > open)
            .ok_or_else(|| fail("unterminated value list"))?;
        let head: Vec<&str> = term[..open].split_whitespace().collect();
        let (key, operator) = match head.as_slice() {
            [key, "in"] => (*key, Operator::In),
            [key, "notin"] => (*key, Operator::NotIn),
            _ => return Err(fail("expected 'in' or 'notin' before value list")),
        };
        check_key(key).map_err(|r| fail(&r))?;
        let values: BTreeSet<String> = term[open + 1..close]
            .split(',')
            .map(|v| v.trim().to_string())
            .collect();
        if values.iter().any(|v| v.is_empty()) {
            return Err(fail("empty value in set"));
        }
        return Ok(Requirement {
            key: key.to_string(),
            operator,
            values,
        });
    }

    let (key, operator, value) = if let Some((k, v)) = term.split_once("!=") {
        (k, Operator::NotEquals, v)
    } else if let Some((k, v)) = term.split_once("==") {
        (k, Operator::Equals, v)
    } else if let Some((k, v)) = term.split_once('=') {
        (k, Operator::Equals, v)
    } else {
        check_key(term).map_err(|r| fail(&r))?;
        return Ok(Requirement {
            key: term.to_string(),
            operator: Operator::Exists,
            values: BTreeSet::new(),
        });
    };

    let key = key.trim();
    let value = value.trim();
    check_key(key).map_err(|r| fail(&r))?;
    if value.contains(char::is_whitespace) || value.contains('=') {
        return Err(fail("malformed value"));
    }
    Ok(Requirement {
        key: key.to_string(),
        operator,
        values: BTreeSet::from([value.to_string()]),
    })
}

fn check_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("empty key".into());
    }
    if key.contains(|c: char| c.is_whitespace() || "=!(),".contains(c)) {
        return Err(format!("invalid key {key:?}"));
    }
    Ok(())
}

/// A field that field selectors can filter on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectableField {
    Name,
    Namespace,
}

impl SelectableField {
    fn parse(field: &str) -> Result<Self, TypeError> {
        match field {
            "metadata.name" => Ok(Self::Name),
            "metadata.namespace" => Ok(Self::Namespace),
            other => Err(TypeError::UnsupportedField(other.to_string())),
        }
    }

    fn get<'a>(&self, meta: &'a ObjectMeta) -> &'a str {
        match self {
            Self::Name => &meta.name,
            Self::Namespace => &meta.namespace,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "metadata.name",
            Self::Namespace => "metadata.namespace",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct FieldTerm {
    field: SelectableField,
    value: String,
    negated: bool,
}

/// Filter over indexable metadata fields. The empty selector matches
/// everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSelector {
    terms: Vec<FieldTerm>,
}

impl FieldSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    /// `field=value`, e.g. a watch targeting one object by name.
    pub fn one_term_equal(field: &str, value: impl Into<String>) -> Result<Self, TypeError> {
        Ok(Self {
            terms: vec![FieldTerm {
                field: SelectableField::parse(field)?,
                value: value.into(),
                negated: false,
            }],
        })
    }

    /// Add an equality term, narrowing the selector.
    pub fn and_equal(mut self, field: &str, value: impl Into<String>) -> Result<Self, TypeError> {
        self.terms.push(FieldTerm {
            field: SelectableField::parse(field)?,
            value: value.into(),
            negated: false,
        });
        Ok(self)
    }

    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::everything());
        }
        let mut terms = Vec::new();
        for term in input.split(',') {
            let (field, value, negated) = if let Some((f, v)) = term.split_once("!=") {
                (f, v, true)
            } else if let Some((f, v)) = term.split_once("==") {
                (f, v, false)
            } else if let Some((f, v)) = term.split_once('=') {
                (f, v, false)
            } else {
                return Err(TypeError::InvalidSelector {
                    input: input.to_string(),
                    reason: format!("invalid field selector term {term:?}"),
                });
            };
            terms.push(FieldTerm {
                field: SelectableField::parse(field.trim())?,
                value: value.trim().to_string(),
                negated,
            });
        }
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        self.terms
            .iter()
            .all(|t| (t.field.get(meta) == t.value) != t.negated)
    }
}

impl FromStr for FieldSelector {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                let op = if t.negated { "!=" } else { "=" };
                format!("{}{}{}", t.field.as_str(), op, t.value)
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Options accepted by list and watch.
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub label_selector: Selector,
    pub field_selector: FieldSelector,
    /// For watches: resume after this version instead of replaying the
    /// current state. `None` or `"0"` replays the current state.
    pub resource_version: Option<String>,
}

impl ListOptions {
    pub fn with_labels(label_selector: Selector) -> Self {
        Self {
            label_selector,
            ..Default::default()
        }
    }

    pub fn with_fields(field_selector: FieldSelector) -> Self {
        Self {
            field_selector,
            ..Default::default()
        }
    }

    /// Builder-style resume point.
    pub fn resume_from(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = Some(resource_version.into());
        self
    }

    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        self.label_selector.matches(&meta.labels) && self.field_selector.matches(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let s = Selector::parse("").unwrap();
        assert!(s.is_empty());
        assert!(s.matches(&labels(&[])));
        assert!(s.matches(&labels(&[("a", "b")])));
    }

    #[test]
    fn equality_requirements() {
        let s: Selector = "group=foo".parse().unwrap();
        assert!(s.matches(&labels(&[("group", "foo")])));
        assert!(!s.matches(&labels(&[("group", "bar")])));
        assert!(!s.matches(&labels(&[])));

        let s: Selector = "group==foo,tier!=db".parse().unwrap();
        assert!(s.matches(&labels(&[("group", "foo"), ("tier", "web")])));
        assert!(s.matches(&labels(&[("group", "foo")])));
        assert!(!s.matches(&labels(&[("group", "foo"), ("tier", "db")])));
    }

    #[test]
    fn set_requirements() {
        let s: Selector = "env in (prod, staging),team notin (a,b)".parse().unwrap();
        assert_eq!(s.requirements().len(), 2);
        assert!(s.matches(&labels(&[("env", "prod")])));
        assert!(s.matches(&labels(&[("env", "staging"), ("team", "c")])));
        assert!(!s.matches(&labels(&[("env", "dev")])));
        assert!(!s.matches(&labels(&[("env", "prod"), ("team", "a")])));
    }

    #[test]
    fn existence_requirements() {
        let s: Selector = "owned,!legacy".parse().unwrap();
        assert!(s.matches(&labels(&[("owned", "")])));
        assert!(!s.matches(&labels(&[("owned", "x"), ("legacy", "y")])));
        assert!(!s.matches(&labels(&[])));
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for bad in ["a=b,", "=b", "a in (x", "a in ()", "a foo (x)", "a=b c", "a=b=c"] {
            assert!(Selector::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn from_set_builds_equality() {
        let s = Selector::from_set([("group", "foo")]);
        assert_eq!(s.to_string(), "group=foo");
        assert!(s.matches(&labels(&[("group", "foo"), ("x", "y")])));
    }

    #[test]
    fn field_selector_on_name() {
        let f = FieldSelector::one_term_equal("metadata.name", "a").unwrap();
        assert!(f.matches(&ObjectMeta::named("a")));
        assert!(!f.matches(&ObjectMeta::named("b")));

        let f: FieldSelector = "metadata.name!=a".parse().unwrap();
        assert!(!f.matches(&ObjectMeta::named("a")));
        assert!(f.matches(&ObjectMeta::named("b")));
    }

    #[test]
    fn and_equal_narrows() {
        let f = FieldSelector::everything()
            .and_equal("metadata.namespace", "team")
            .unwrap();
        let mut meta = ObjectMeta::named("a");
        assert!(!f.matches(&meta));
        meta.namespace = "team".into();
        assert!(f.matches(&meta));
        assert_eq!(f.to_string(), "metadata.namespace=team");
    }

    #[test]
    fn field_selector_rejects_unknown_fields() {
        assert_eq!(
            FieldSelector::parse("spec.message=x"),
            Err(TypeError::UnsupportedField("spec.message".into()))
        );
    }

    #[test]
    fn list_options_combine_selectors() {
        let opts = ListOptions {
            label_selector: "group=foo".parse().unwrap(),
            field_selector: "metadata.name=a".parse().unwrap(),
            resource_version: None,
        };
        assert!(opts.matches(&ObjectMeta::named("a").with_label("group", "foo")));
        assert!(!opts.matches(&ObjectMeta::named("b").with_label("group", "foo")));
        assert!(!opts.matches(&ObjectMeta::named("a").with_label("group", "bar")));
    }

    proptest! {
        #[test]
        fn display_reparses_to_same_selector(
            pairs in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{1,8}", 0..5)
        ) {
            let s = Selector::from_set(pairs.clone());
            let reparsed = Selector::parse(&s.to_string()).unwrap();
            prop_assert_eq!(&reparsed, &s);
            prop_assert!(reparsed.matches(&pairs));
        }
    }
}
