//! CA lifecycle: root and intermediate creation, lookup and deletion.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TtlConfig;
use crate::errors::{Error, Result};
use crate::storage::{CertificateStore, SecretStore};

use super::chain::ChainBuilder;
use super::locks::ScopeLocks;
use super::material;
use super::subject::Subject;
use super::ttl::resolve_end_date;
use super::{ca_exists, PARENT_BLOB, PRIVATE_KEY_BLOB};

/// A CA's stored certificate and private key PEM.
pub struct CaMaterial {
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// Load a CA's key and certificate from the stores.
pub(crate) fn load_ca_material(
    secrets: &SecretStore,
    certs: &CertificateStore,
    ca: &str,
) -> Result<CaMaterial> {
    if !ca_exists(secrets, ca) {
        return Err(Error::not_found(format!("{} CA not found", ca)));
    }
    let private_key_pem = secrets.read_string(PRIVATE_KEY_BLOB, Some(ca))?;
    let certificate_pem = certs.read_string(ca, None)?;
    Ok(CaMaterial { certificate_pem, private_key_pem })
}

/// What CA reads and creates return over the API: the CA's own certificate
/// and its full chain up to the root.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CaRecord {
    pub certificate: String,
    pub ca_chain: String,
}

/// Manages the CA hierarchy.
#[derive(Clone)]
pub struct CaManager {
    secrets: SecretStore,
    certs: CertificateStore,
    chains: ChainBuilder,
    ttl: TtlConfig,
    locks: ScopeLocks,
}

impl CaManager {
    pub fn new(
        secrets: SecretStore,
        certs: CertificateStore,
        ttl: TtlConfig,
        locks: ScopeLocks,
    ) -> Self {
        let chains = ChainBuilder::new(secrets.clone(), certs.clone());
        Self { secrets, certs, chains, ttl, locks }
    }

    /// Create a self-signed root CA.
    ///
    /// All validation (name collision, TTL bounds, subject) happens before
    /// key generation; the key is persisted before the certificate.
    pub fn create_root(
        &self,
        name: &str,
        subject: &Subject,
        key_size: u32,
        ttl: Option<i64>,
    ) -> Result<CaRecord> {
        let scope = self.locks.scope(&format!("cas/{}", name));
        let _guard = scope.lock();

        if ca_exists(&self.secrets, name) {
            return Err(Error::conflict(format!("{} CA already exists", name)));
        }
        let not_after = resolve_end_date(ttl, Some(self.ttl.ca_max_ttl), self.ttl.ca_root_ttl)?;
        let subject = Subject::build(subject, None, false)?;

        let key = material::generate_key_pair(key_size)?;
        let params = material::certificate_params(&subject, not_after, material::new_serial(), true)?;
        let cert = params.self_signed(&key.key_pair)?;

        self.secrets.write(PRIVATE_KEY_BLOB, key.private_key_pem.as_bytes(), Some(name))?;
        self.certs.write(name, cert.pem().as_bytes(), None)?;

        info!(ca = %name, "created root CA");
        Ok(CaRecord { certificate: cert.pem(), ca_chain: cert.pem() })
    }

    /// Create an intermediate CA signed by `parent`. Subject fields the
    /// request leaves out are inherited from the parent's certificate.
    pub fn create_intermediate(
        &self,
        parent: &str,
        name: &str,
        subject: &Subject,
        key_size: u32,
        ttl: Option<i64>,
    ) -> Result<CaRecord> {
        let parent_material = load_ca_material(&self.secrets, &self.certs, parent)?;

        let scope = self.locks.scope(&format!("cas/{}", name));
        let _guard = scope.lock();

        if ca_exists(&self.secrets, name) {
            return Err(Error::conflict(format!("{} CA already exists", name)));
        }
        let not_after =
            resolve_end_date(ttl, Some(self.ttl.ca_max_ttl), self.ttl.ca_intermediate_ttl)?;
        let parent_subject =
            material::parse_certificate(parent_material.certificate_pem.as_bytes())?.subject;
        let subject = Subject::build(subject, Some(&parent_subject), true)?;

        let key = material::generate_key_pair(key_size)?;
        let mut params =
            material::certificate_params(&subject, not_after, material::new_serial(), true)?;
        params.use_authority_key_identifier_extension = true;
        let issuer = material::load_issuer(
            &parent_material.certificate_pem,
            &parent_material.private_key_pem,
        )?;
        let cert = params.signed_by(&key.key_pair, &issuer)?;

        self.secrets.write(PRIVATE_KEY_BLOB, key.private_key_pem.as_bytes(), Some(name))?;
        self.secrets.write(PARENT_BLOB, parent.as_bytes(), Some(name))?;
        self.certs.write(name, cert.pem().as_bytes(), None)?;

        let ca_chain = self.chains.build(&cert.pem(), Some(parent))?;
        info!(ca = %name, parent = %parent, "created intermediate CA");
        Ok(CaRecord { certificate: cert.pem(), ca_chain })
    }

    /// Load a CA's key and certificate.
    pub fn load(&self, ca: &str) -> Result<CaMaterial> {
        load_ca_material(&self.secrets, &self.certs, ca)
    }

    /// A CA's certificate together with its chain.
    pub fn get(&self, ca: &str) -> Result<CaRecord> {
        let material = self.load(ca)?;
        let ca_chain = self.chains.for_ca(ca)?;
        Ok(CaRecord { certificate: material.certificate_pem, ca_chain })
    }

    /// A CA's own certificate PEM.
    pub fn certificate(&self, ca: &str) -> Result<String> {
        Ok(self.load(ca)?.certificate_pem)
    }

    /// A CA's chain up to the root, the CA itself first.
    pub fn chain(&self, ca: &str) -> Result<String> {
        self.chains.for_ca(ca)
    }

    /// Delete a CA's key material and certificate. Certificates issued under
    /// the CA and its roles are left in place.
    pub fn delete(&self, ca: &str) -> Result<()> {
        let scope = self.locks.scope(&format!("cas/{}", ca));
        let _guard = scope.lock();

        if !ca_exists(&self.secrets, ca) {
            return Err(Error::not_found(format!("{} CA not found", ca)));
        }
        self.secrets.delete(ca, None)?;
        if self.certs.exists(ca, None) {
            self.certs.delete(ca, None)?;
        }
        info!(ca = %ca, "deleted CA");
        Ok(())
    }

    /// Names of every stored CA.
    pub fn list(&self) -> Result<Vec<String>> {
        self.secrets.list(None)
    }
}
