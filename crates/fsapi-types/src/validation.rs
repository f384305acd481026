//! Object name and label validation.
//!
//! Names become file names on disk, so they must be a single path segment:
//! - non-empty
//! - not `.` or `..`
//! - no `/` or `%`
//!
//! Label keys are an optional DNS-subdomain prefix and `/`, followed by a
//! qualified name of at most 63 characters. Label values are empty or a
//! qualified name.

use std::collections::BTreeMap;

use crate::error::FieldError;
use crate::meta::ObjectMeta;

const QUALIFIED_NAME_MAX: usize = 63;
const DNS_SUBDOMAIN_MAX: usize = 253;

/// Validate an object name, returning one error per violated rule.
pub fn validate_object_name(name: &str, field: &str) -> Vec<FieldError> {
    if name.is_empty() {
        return vec![FieldError::required(field, "name or generateName is required")];
    }
    let mut errs = Vec::new();
    if name == "." || name == ".." {
        errs.push(FieldError::invalid(field, name, format!("may not be '{name}'")));
    }
    for forbidden in ['/', '%', '\\', '\0'] {
        if name.contains(forbidden) {
            errs.push(FieldError::invalid(
                field,
                name,
                format!("may not contain {forbidden:?}"),
            ));
        }
    }
    errs
}

/// Validate every key and value of a label map.
pub fn validate_labels(labels: &BTreeMap<String, String>, field: &str) -> Vec<FieldError> {
    let mut errs = Vec::new();
    for (key, value) in labels {
        errs.extend(validate_label_key(key, field));
        if !value.is_empty() {
            if let Some(detail) = qualified_name_problem(value) {
                errs.push(FieldError::invalid(field, value, detail));
            }
        }
    }
    errs
}

fn validate_label_key(key: &str, field: &str) -> Vec<FieldError> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    let mut errs = Vec::new();
    if let Some(prefix) = prefix {
        if let Some(detail) = dns_subdomain_problem(prefix) {
            errs.push(FieldError::invalid(field, key, format!("prefix part {detail}")));
        }
    }
    if let Some(detail) = qualified_name_problem(name) {
        errs.push(FieldError::invalid(field, key, format!("name part {detail}")));
    }
    errs
}

fn qualified_name_problem(s: &str) -> Option<String> {
    if s.is_empty() {
        return Some("must be non-empty".into());
    }
    if s.len() > QUALIFIED_NAME_MAX {
        return Some(format!("must be no more than {QUALIFIED_NAME_MAX} characters"));
    }
    let bytes = s.as_bytes();
    let edges_ok = bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();
    let body_ok = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !edges_ok || !body_ok {
        return Some(
            "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
                .into(),
        );
    }
    None
}

fn dns_subdomain_problem(s: &str) -> Option<String> {
    if s.is_empty() {
        return Some("must be non-empty".into());
    }
    if s.len() > DNS_SUBDOMAIN_MAX {
        return Some(format!("must be no more than {DNS_SUBDOMAIN_MAX} characters"));
    }
    let label_ok = |label: &str| {
        let b = label.as_bytes();
        !b.is_empty()
            && b[0].is_ascii_alphanumeric()
            && b[b.len() - 1].is_ascii_alphanumeric()
            && b.iter()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == b'-')
    };
    if !s.split('.').all(label_ok) {
        return Some("must be a lowercase RFC 1123 subdomain".into());
    }
    None
}

/// Validate the caller-controlled parts of object metadata.
pub fn validate_object_meta(meta: &ObjectMeta, check_labels: bool) -> Vec<FieldError> {
    let mut errs = validate_object_name(&meta.name, "metadata.name");
    if !meta.namespace.is_empty() {
        errs.extend(validate_object_name(&meta.namespace, "metadata.namespace"));
    }
    if check_labels {
        errs.extend(validate_labels(&meta.labels, "metadata.labels"));
    }
    let mut seen = std::collections::BTreeSet::new();
    for f in &meta.finalizers {
        if f.is_empty() {
            errs.push(FieldError::required("metadata.finalizers", "finalizer must be non-empty"));
        } else if !seen.insert(f.as_str()) {
            errs.push(FieldError::invalid("metadata.finalizers", f, "duplicate finalizer"));
        }
    }
    errs
}
