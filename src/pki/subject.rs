//! Certificate subjects and the canonical recognized-field table.
//!
//! One table maps every recognized subject field to its OID, in both dotted
//! and arc form. The subject builder, the rcgen encoding step and the
//! x509-parser decoding step all go through this table, so the set of
//! recognized fields lives in exactly one place.

use std::collections::BTreeMap;

use rcgen::{DistinguishedName, DnType, DnValue};
use serde::{Deserialize, Serialize};
use x509_parser::x509::X509Name;

use crate::errors::{Error, Result};

/// A recognized subject field: wire name, dotted OID and OID arcs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectField {
    pub name: &'static str,
    pub oid: &'static str,
    arcs: &'static [u64],
}

impl SubjectField {
    fn dn_type(&self) -> DnType {
        match self.name {
            "common_name" => DnType::CommonName,
            "organization_name" => DnType::OrganizationName,
            "organizational_unit_name" => DnType::OrganizationalUnitName,
            "locality_name" => DnType::LocalityName,
            "state_or_province_name" => DnType::StateOrProvinceName,
            "country_name" => DnType::CountryName,
            _ => DnType::CustomDnType(self.arcs.to_vec()),
        }
    }
}

macro_rules! subject_field {
    ($name:literal, $oid:literal, [$($arc:literal),+]) => {
        SubjectField { name: $name, oid: $oid, arcs: &[$($arc),+] }
    };
}

/// Canonical ordered list of recognized subject fields. The order fixes the
/// field-evaluation order of [`Subject::build`]; `common_name` is first and
/// is the only mandatory field.
pub const RECOGNIZED_FIELDS: &[SubjectField] = &[
    subject_field!("common_name", "2.5.4.3", [2, 5, 4, 3]),
    subject_field!("organization_name", "2.5.4.10", [2, 5, 4, 10]),
    subject_field!("locality_name", "2.5.4.7", [2, 5, 4, 7]),
    subject_field!("state_or_province_name", "2.5.4.8", [2, 5, 4, 8]),
    subject_field!("country_name", "2.5.4.6", [2, 5, 4, 6]),
    subject_field!("organizational_unit_name", "2.5.4.11", [2, 5, 4, 11]),
    subject_field!("email_address", "1.2.840.113549.1.9.1", [1, 2, 840, 113549, 1, 9, 1]),
    subject_field!("street_address", "2.5.4.9", [2, 5, 4, 9]),
    subject_field!("postal_code", "2.5.4.17", [2, 5, 4, 17]),
    subject_field!("business_category", "2.5.4.15", [2, 5, 4, 15]),
    subject_field!(
        "incorporation_locality",
        "1.3.6.1.4.1.311.60.2.1.1",
        [1, 3, 6, 1, 4, 1, 311, 60, 2, 1, 1]
    ),
    subject_field!(
        "incorporation_state_or_province",
        "1.3.6.1.4.1.311.60.2.1.2",
        [1, 3, 6, 1, 4, 1, 311, 60, 2, 1, 2]
    ),
    subject_field!(
        "incorporation_country",
        "1.3.6.1.4.1.311.60.2.1.3",
        [1, 3, 6, 1, 4, 1, 311, 60, 2, 1, 3]
    ),
    subject_field!("surname", "2.5.4.4", [2, 5, 4, 4]),
    subject_field!("title", "2.5.4.12", [2, 5, 4, 12]),
    subject_field!("serial_number", "2.5.4.5", [2, 5, 4, 5]),
    subject_field!("name", "2.5.4.41", [2, 5, 4, 41]),
    subject_field!("given_name", "2.5.4.42", [2, 5, 4, 42]),
    subject_field!("initials", "2.5.4.43", [2, 5, 4, 43]),
    subject_field!("generation_qualifier", "2.5.4.44", [2, 5, 4, 44]),
    subject_field!("dn_qualifier", "2.5.4.46", [2, 5, 4, 46]),
    subject_field!("pseudonym", "2.5.4.65", [2, 5, 4, 65]),
    subject_field!(
        "domain_component",
        "0.9.2342.19200300.100.1.25",
        [0, 9, 2342, 19200300, 100, 1, 25]
    ),
];

fn field_by_name(name: &str) -> Option<&'static SubjectField> {
    RECOGNIZED_FIELDS.iter().find(|f| f.name == name)
}

fn field_by_oid(oid: &str) -> Option<&'static SubjectField> {
    RECOGNIZED_FIELDS.iter().find(|f| f.oid == oid)
}

/// A certificate subject: recognized field names mapped to values.
///
/// Deserialization rejects unrecognized field names, so a typo in a request
/// or a stored role template fails loudly instead of silently dropping out
/// of the issued certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Subject {
    fields: BTreeMap<String, String>,
}

impl TryFrom<BTreeMap<String, String>> for Subject {
    type Error = Error;

    fn try_from(fields: BTreeMap<String, String>) -> Result<Self> {
        for key in fields.keys() {
            if field_by_name(key).is_none() {
                return Err(Error::validation(format!("unrecognized subject field '{}'", key)));
            }
        }
        Ok(Self { fields })
    }
}

impl From<Subject> for BTreeMap<String, String> {
    fn from(subject: Subject) -> Self {
        subject.fields
    }
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_common_name(cn: impl Into<String>) -> Self {
        let mut subject = Self::new();
        subject.fields.insert("common_name".to_string(), cn.into());
        subject
    }

    /// Set a recognized field. Empty values are treated as absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let field = field_by_name(name)
            .ok_or_else(|| Error::validation(format!("unrecognized subject field '{}'", name)))?;
        let value = value.into();
        if !value.is_empty() {
            self.fields.insert(field.name.to_string(), value);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get("common_name").filter(|cn| !cn.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Shallow overwrite of this subject with every field present in `other`.
    pub fn merge(&mut self, other: &Subject) {
        for (key, value) in &other.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Construct the effective subject for a certificate.
    ///
    /// The common name always comes from the request. Every other recognized
    /// field takes the request's value when present and non-empty, otherwise
    /// the parent's value when inheritance is on, otherwise it is omitted.
    pub fn build(requested: &Subject, parent: Option<&Subject>, inherit_parent: bool) -> Result<Subject> {
        let cn = requested
            .common_name()
            .ok_or_else(|| Error::validation("common_name is required"))?;

        let mut subject = Subject::with_common_name(cn);
        for field in RECOGNIZED_FIELDS.iter().skip(1) {
            match requested.get(field.name).filter(|v| !v.is_empty()) {
                Some(value) => {
                    subject.fields.insert(field.name.to_string(), value.to_string());
                }
                None => {
                    if inherit_parent {
                        if let Some(value) = parent.and_then(|p| p.get(field.name)) {
                            subject.fields.insert(field.name.to_string(), value.to_string());
                        }
                    }
                }
            }
        }
        Ok(subject)
    }

    /// Encode into an rcgen distinguished name, in canonical field order.
    pub fn to_distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        for field in RECOGNIZED_FIELDS {
            if let Some(value) = self.get(field.name) {
                dn.push(field.dn_type(), value);
            }
        }
        dn
    }

    /// Decode from an rcgen distinguished name (CSR subjects).
    /// Attributes outside the recognized set are dropped.
    pub fn from_distinguished_name(dn: &DistinguishedName) -> Subject {
        let mut subject = Subject::new();
        for field in RECOGNIZED_FIELDS {
            if let Some(value) = dn.get(&field.dn_type()).and_then(dn_value_string) {
                if !value.is_empty() {
                    subject.fields.insert(field.name.to_string(), value);
                }
            }
        }
        subject
    }

    /// Decode from a parsed X.509 name (stored certificates).
    /// Attributes outside the recognized set are dropped.
    pub fn from_x509_name(name: &X509Name<'_>) -> Subject {
        let mut subject = Subject::new();
        for attr in name.iter_attributes() {
            let oid = attr.attr_type().to_id_string();
            if let Some(field) = field_by_oid(&oid) {
                if let Ok(value) = attr.as_str() {
                    if !value.is_empty() {
                        subject.fields.insert(field.name.to_string(), value.to_string());
                    }
                }
            }
        }
        subject
    }
}

// Serialized as a flat string map; the derive would expose the inner field.
impl utoipa::PartialSchema for Subject {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{ObjectBuilder, Type};
        ObjectBuilder::new()
            .schema_type(Type::Object)
            .description(Some("Recognized subject field names mapped to string values"))
            .additional_properties(Some(ObjectBuilder::new().schema_type(Type::String)))
            .into()
    }
}

impl utoipa::ToSchema for Subject {}

fn dn_value_string(value: &DnValue) -> Option<String> {
    match value {
        DnValue::Utf8String(s) => Some(s.clone()),
        DnValue::PrintableString(s) => Some(s.as_str().to_string()),
        DnValue::Ia5String(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(pairs: &[(&str, &str)]) -> Subject {
        let mut s = Subject::new();
        for (k, v) in pairs {
            s.set(k, *v).unwrap();
        }
        s
    }

    #[test]
    fn test_recognized_field_count_and_head() {
        assert_eq!(RECOGNIZED_FIELDS.len(), 23);
        assert_eq!(RECOGNIZED_FIELDS[0].name, "common_name");
    }

    #[test]
    fn test_unrecognized_field_rejected() {
        let mut s = Subject::new();
        assert!(s.set("favourite_colour", "blue").is_err());

        let raw: BTreeMap<String, String> =
            [("common_name".to_string(), "x".to_string()), ("bogus".to_string(), "y".to_string())]
                .into_iter()
                .collect();
        assert!(Subject::try_from(raw).is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys() {
        let err = serde_json::from_str::<Subject>(r#"{"common_name":"a","nope":"b"}"#).unwrap_err();
        assert!(err.to_string().contains("unrecognized subject field"));
    }

    #[test]
    fn test_build_requires_common_name() {
        let err = Subject::build(&Subject::new(), None, true).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_build_request_wins_over_parent() {
        let requested =
            subject(&[("common_name", "leaf.example"), ("organization_name", "Leaf Org")]);
        let parent = subject(&[
            ("common_name", "Parent CA"),
            ("organization_name", "Parent Org"),
            ("country_name", "SE"),
        ]);

        let built = Subject::build(&requested, Some(&parent), true).unwrap();
        assert_eq!(built.get("common_name"), Some("leaf.example"));
        assert_eq!(built.get("organization_name"), Some("Leaf Org"));
        assert_eq!(built.get("country_name"), Some("SE"));
    }

    #[test]
    fn test_build_common_name_never_inherited() {
        let requested = subject(&[("common_name", "leaf.example")]);
        let parent = subject(&[("common_name", "Parent CA")]);

        let built = Subject::build(&requested, Some(&parent), true).unwrap();
        assert_eq!(built.get("common_name"), Some("leaf.example"));
    }

    #[test]
    fn test_build_without_inheritance_omits_parent_fields() {
        let requested = subject(&[("common_name", "leaf.example")]);
        let parent = subject(&[("common_name", "Parent CA"), ("country_name", "SE")]);

        let built = Subject::build(&requested, Some(&parent), false).unwrap();
        assert_eq!(built.get("country_name"), None);
    }

    #[test]
    fn test_build_absent_everywhere_is_omitted() {
        let requested = subject(&[("common_name", "leaf.example")]);
        let built = Subject::build(&requested, None, true).unwrap();
        assert_eq!(built.get("locality_name"), None);
        assert!(!BTreeMap::from(built).contains_key("locality_name"));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = subject(&[("common_name", "a"), ("country_name", "SE")]);
        let overlay = subject(&[("country_name", "NO"), ("title", "svc")]);
        base.merge(&overlay);

        assert_eq!(base.get("common_name"), Some("a"));
        assert_eq!(base.get("country_name"), Some("NO"));
        assert_eq!(base.get("title"), Some("svc"));
    }

    #[test]
    fn test_distinguished_name_roundtrip() {
        let original = subject(&[
            ("common_name", "svc.example.com"),
            ("organization_name", "Example"),
            ("email_address", "ops@example.com"),
            ("domain_component", "example"),
        ]);

        let dn = original.to_distinguished_name();
        let decoded = Subject::from_distinguished_name(&dn);
        assert_eq!(decoded, original);
    }
}
