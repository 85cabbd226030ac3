//! Roles: named issuance policies attached to a CA (or a client).
//!
//! A role bounds what certificates can be issued under it. Common names are
//! checked against the role's domain paths with suffix matching; wildcard and
//! naked common names need explicit opt-in. TTL and key-size fields feed the
//! issuance pipeline; the optional subject template is merged into requested
//! subjects during client issuance.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::storage::{CertificateStore, SecretStore};

use super::locks::ScopeLocks;
use super::subject::Subject;
use super::{ca_exists, roles_path};

/// A role record. All fields are optional; updates carry only the fields
/// they change and merge-on-put overwrites field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(default)]
pub struct Role {
    /// Domain suffixes an issued CN must match. Empty or absent allows any CN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,

    /// Allow common names starting with `*`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_wildcards: Option<bool>,

    /// Allow a common name that equals a path exactly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_naked: Option<bool>,

    /// RSA key size for client issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    /// Validity in hours when the request does not ask for one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,

    /// Ceiling in hours for requested TTLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ttl: Option<i64>,

    /// Subject template merged over requested subjects during client issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
}

impl Role {
    /// Overwrite every field present in `update`.
    pub fn merge(&mut self, update: Role) {
        if update.paths.is_some() {
            self.paths = update.paths;
        }
        if update.allow_wildcards.is_some() {
            self.allow_wildcards = update.allow_wildcards;
        }
        if update.allow_naked.is_some() {
            self.allow_naked = update.allow_naked;
        }
        if update.size.is_some() {
            self.size = update.size;
        }
        if update.default_ttl.is_some() {
            self.default_ttl = update.default_ttl;
        }
        if update.max_ttl.is_some() {
            self.max_ttl = update.max_ttl;
        }
        if update.subject.is_some() {
            self.subject = update.subject;
        }
    }

    pub fn paths(&self) -> &[String] {
        self.paths.as_deref().unwrap_or(&[])
    }

    pub fn allow_wildcards(&self) -> bool {
        self.allow_wildcards.unwrap_or(false)
    }

    pub fn allow_naked(&self) -> bool {
        self.allow_naked.unwrap_or(false)
    }

    /// Check a common name (or alternative domain) against this role.
    ///
    /// Wildcards are gated before path matching. Paths match by suffix; the
    /// first path that matches decides, and an exact match counts as naked.
    /// An empty path list allows everything.
    pub fn validate_common_name(&self, role_name: &str, cn: &str) -> Result<()> {
        if cn.starts_with('*') && !self.allow_wildcards() {
            return Err(Error::validation(format!(
                "Wildcards are not allowed for the {} role",
                role_name
            )));
        }

        let paths = self.paths();
        if paths.is_empty() {
            return Ok(());
        }

        for path in paths {
            if cn == path && !self.allow_naked() {
                return Err(Error::validation(format!(
                    "Naked CN {} is not allowed for the {} role",
                    cn, role_name
                )));
            }
            if cn.ends_with(path.as_str()) {
                return Ok(());
            }
        }

        Err(Error::validation(format!("CN {} is not allowed for the {} role", cn, role_name)))
    }
}

/// CRUD for role records under a CA.
#[derive(Clone)]
pub struct RoleRegistry {
    secrets: SecretStore,
    certs: CertificateStore,
    locks: ScopeLocks,
}

impl RoleRegistry {
    pub fn new(secrets: SecretStore, certs: CertificateStore, locks: ScopeLocks) -> Self {
        Self { secrets, certs, locks }
    }

    fn ensure_ca(&self, ca: &str) -> Result<()> {
        if !ca_exists(&self.secrets, ca) {
            return Err(Error::not_found(format!("{} CA not found", ca)));
        }
        Ok(())
    }

    fn try_read(&self, ca: &str, role: &str) -> Result<Option<Role>> {
        let path = roles_path(ca);
        if !self.certs.exists(role, Some(&path)) {
            return Ok(None);
        }
        let raw = self.certs.read(role, Some(&path))?;
        let record = serde_json::from_slice(&raw).map_err(|e| Error::Serialization {
            source: e,
            context: format!("decode role {} of CA {}", role, ca),
        })?;
        Ok(Some(record))
    }

    /// Create or update a role. Updates merge field by field into the stored
    /// record. Returns the effective record and whether it was created.
    pub fn put(&self, ca: &str, role: &str, update: Role) -> Result<(Role, bool)> {
        self.ensure_ca(ca)?;

        let scope = self.locks.scope(&format!("roles/{}/{}", ca, role));
        let _guard = scope.lock();

        let (mut record, created) = match self.try_read(ca, role)? {
            Some(existing) => (existing, false),
            None => (Role::default(), true),
        };
        record.merge(update);

        let encoded = serde_json::to_vec(&record)?;
        self.certs.write(role, &encoded, Some(&roles_path(ca)))?;
        Ok((record, created))
    }

    pub fn get(&self, ca: &str, role: &str) -> Result<Role> {
        self.ensure_ca(ca)?;
        self.try_read(ca, role)?
            .ok_or_else(|| Error::not_found(format!("{} role not found for CA {}", role, ca)))
    }

    pub fn list(&self, ca: &str) -> Result<Vec<String>> {
        self.ensure_ca(ca)?;
        self.certs.list(Some(&roles_path(ca)))
    }

    pub fn delete(&self, ca: &str, role: &str) -> Result<()> {
        self.ensure_ca(ca)?;
        let path = roles_path(ca);
        if !self.certs.exists(role, Some(&path)) {
            return Err(Error::not_found(format!("{} role not found for CA {}", role, ca)));
        }
        self.certs.delete(role, Some(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::PRIVATE_KEY_BLOB;
    use crate::storage::FileStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn role(paths: &[&str], wildcards: bool, naked: bool) -> Role {
        Role {
            paths: Some(paths.iter().map(|p| p.to_string()).collect()),
            allow_wildcards: Some(wildcards),
            allow_naked: Some(naked),
            ..Role::default()
        }
    }

    #[test]
    fn test_empty_paths_allow_any_cn() {
        let role = Role::default();
        assert!(role.validate_common_name("web", "anything.at.all").is_ok());
    }

    #[test]
    fn test_suffix_match() {
        let role = role(&["example.com"], false, false);
        assert!(role.validate_common_name("web", "api.example.com").is_ok());
        assert!(role.validate_common_name("web", "api.other.org").is_err());
    }

    #[test]
    fn test_wildcard_gate() {
        let restricted = role(&["example.com"], false, false);
        let err = restricted.validate_common_name("web", "*.example.com").unwrap_err();
        assert!(err.to_string().contains("Wildcards"));

        let open = role(&["example.com"], true, false);
        assert!(open.validate_common_name("web", "*.example.com").is_ok());
    }

    #[test]
    fn test_naked_gate() {
        let restricted = role(&["example.com"], false, false);
        let err = restricted.validate_common_name("web", "example.com").unwrap_err();
        assert!(err.to_string().contains("Naked"));

        let open = role(&["example.com"], false, true);
        assert!(open.validate_common_name("web", "example.com").is_ok());
    }

    #[test]
    fn test_first_matching_path_decides() {
        // example.com appears before sub.example.com, so a naked match on
        // the first path rejects even though the second would allow it.
        let role = Role {
            paths: Some(vec!["example.com".to_string(), "sub.example.com".to_string()]),
            allow_naked: Some(false),
            ..Role::default()
        };
        assert!(role.validate_common_name("web", "example.com").is_err());
        assert!(role.validate_common_name("web", "sub.example.com").is_ok());
    }

    #[test]
    fn test_merge_overwrites_only_present_fields() {
        let mut stored = Role {
            paths: Some(vec!["example.com".to_string()]),
            size: Some(2048),
            default_ttl: Some(24),
            ..Role::default()
        };
        stored.merge(Role { default_ttl: Some(48), ..Role::default() });

        assert_eq!(stored.default_ttl, Some(48));
        assert_eq!(stored.size, Some(2048));
        assert_eq!(stored.paths, Some(vec!["example.com".to_string()]));
    }

    fn registry() -> (tempfile::TempDir, RoleRegistry) {
        let dir = tempdir().expect("tempdir");
        let secrets =
            SecretStore::new(Arc::new(FileStore::open(dir.path().join("secrets")).unwrap()));
        let certs =
            CertificateStore::new(Arc::new(FileStore::open(dir.path().join("certs")).unwrap()));
        secrets.write(PRIVATE_KEY_BLOB, b"key", Some("myca")).unwrap();
        (dir, RoleRegistry::new(secrets, certs, ScopeLocks::new()))
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let (_dir, registry) = registry();
        let (record, created) =
            registry.put("myca", "web", role(&["example.com"], true, false)).unwrap();
        assert!(created);
        assert_eq!(registry.get("myca", "web").unwrap(), record);
    }

    #[test]
    fn test_put_merges_into_existing_record() {
        let (_dir, registry) = registry();
        registry.put("myca", "web", role(&["example.com"], false, false)).unwrap();
        let (record, created) =
            registry.put("myca", "web", Role { size: Some(4096), ..Role::default() }).unwrap();

        assert!(!created);
        assert_eq!(record.size, Some(4096));
        assert_eq!(record.paths, Some(vec!["example.com".to_string()]));
    }

    #[test]
    fn test_roles_require_existing_ca() {
        let (_dir, registry) = registry();
        assert!(matches!(
            registry.put("ghost", "web", Role::default()).unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(registry.list("ghost").unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn test_list_and_delete() {
        let (_dir, registry) = registry();
        registry.put("myca", "web", Role::default()).unwrap();
        registry.put("myca", "api", Role::default()).unwrap();
        assert_eq!(registry.list("myca").unwrap(), vec!["api", "web"]);

        registry.delete("myca", "web").unwrap();
        assert_eq!(registry.list("myca").unwrap(), vec!["api"]);
        assert!(matches!(registry.delete("myca", "web").unwrap_err(), Error::NotFound(_)));
    }
}
