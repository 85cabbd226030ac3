//! Trust-chain assembly.

use std::collections::HashSet;

use crate::errors::{Error, Result};
use crate::storage::{CertificateStore, SecretStore};

use super::{PARENT_BLOB, PRIVATE_KEY_BLOB};

/// Reconstructs certificate chains by walking stored parent pointers.
#[derive(Clone)]
pub struct ChainBuilder {
    secrets: SecretStore,
    certs: CertificateStore,
}

impl ChainBuilder {
    pub fn new(secrets: SecretStore, certs: CertificateStore) -> Self {
        Self { secrets, certs }
    }

    /// Build a PEM bundle starting at `head_pem`, then every ancestor CA
    /// from `parent` up to the root, leaf first.
    pub fn build(&self, head_pem: &str, parent: Option<&str>) -> Result<String> {
        let mut chain = String::from(head_pem.trim_end());
        chain.push('\n');

        let mut seen: HashSet<String> = HashSet::new();
        let mut next = parent.map(str::to_string);
        while let Some(ca) = next {
            if !seen.insert(ca.clone()) {
                return Err(Error::internal(format!("parent cycle detected at CA {}", ca)));
            }
            let pem = self.certs.read_string(&ca, None)?;
            chain.push_str(pem.trim_end());
            chain.push('\n');
            next = self.parent_of(&ca)?;
        }
        Ok(chain)
    }

    /// Read a CA's parent pointer, if it has one.
    pub fn parent_of(&self, ca: &str) -> Result<Option<String>> {
        if !self.secrets.exists(PARENT_BLOB, Some(ca)) {
            return Ok(None);
        }
        let parent = self.secrets.read_string(PARENT_BLOB, Some(ca))?;
        Ok(Some(parent.trim().to_string()))
    }

    /// Chain for a CA's own certificate, the CA itself first.
    pub fn for_ca(&self, ca: &str) -> Result<String> {
        if !self.secrets.exists(PRIVATE_KEY_BLOB, Some(ca)) {
            return Err(Error::not_found(format!("{} CA not found", ca)));
        }
        let cert = self.certs.read_string(ca, None)?;
        let parent = self.parent_of(ca)?;
        self.build(&cert, parent.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn stores() -> (tempfile::TempDir, SecretStore, CertificateStore) {
        let dir = tempdir().expect("tempdir");
        let secrets =
            SecretStore::new(Arc::new(FileStore::open(dir.path().join("secrets")).unwrap()));
        let certs =
            CertificateStore::new(Arc::new(FileStore::open(dir.path().join("certs")).unwrap()));
        (dir, secrets, certs)
    }

    fn seed_ca(secrets: &SecretStore, certs: &CertificateStore, name: &str, parent: Option<&str>) {
        secrets.write(PRIVATE_KEY_BLOB, b"key", Some(name)).unwrap();
        certs.write(name, format!("CERT-{}\n", name).as_bytes(), None).unwrap();
        if let Some(parent) = parent {
            secrets.write(PARENT_BLOB, parent.as_bytes(), Some(name)).unwrap();
        }
    }

    #[test]
    fn test_chain_walks_to_root_leaf_first() {
        let (_dir, secrets, certs) = stores();
        seed_ca(&secrets, &certs, "root", None);
        seed_ca(&secrets, &certs, "inter", Some("root"));

        let builder = ChainBuilder::new(secrets, certs);
        let chain = builder.build("CERT-leaf", Some("inter")).unwrap();
        assert_eq!(chain, "CERT-leaf\nCERT-inter\nCERT-root\n");
    }

    #[test]
    fn test_root_chain_is_single_certificate() {
        let (_dir, secrets, certs) = stores();
        seed_ca(&secrets, &certs, "root", None);

        let builder = ChainBuilder::new(secrets, certs);
        assert_eq!(builder.for_ca("root").unwrap(), "CERT-root\n");
    }

    #[test]
    fn test_missing_ca_is_not_found() {
        let (_dir, secrets, certs) = stores();
        let builder = ChainBuilder::new(secrets, certs);
        assert!(matches!(builder.for_ca("ghost").unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn test_parent_cycle_detected() {
        let (_dir, secrets, certs) = stores();
        seed_ca(&secrets, &certs, "a", Some("b"));
        seed_ca(&secrets, &certs, "b", Some("a"));

        let builder = ChainBuilder::new(secrets, certs);
        let err = builder.for_ca("a").unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
