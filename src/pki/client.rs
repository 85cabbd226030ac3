//! Clients: named consumers bound to a CA, with their own roles and
//! certificate shelf.
//!
//! A client pins the CA its certificates come from and may carry default
//! subject overrides. Client roles work like CA roles but add a subject
//! template and supply the key size themselves; certificates issued for a
//! client are stored under the client by common name and marked for client
//! authentication.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TtlConfig;
use crate::errors::{Error, Result};
use crate::storage::{CertificateStore, SecretStore};

use super::ca::load_ca_material;
use super::chain::ChainBuilder;
use super::locks::ScopeLocks;
use super::material;
use super::role::Role;
use super::subject::Subject;
use super::ttl::resolve_end_date;
use super::{
    ca_exists, client_certs_path, client_path, client_roles_path, CLIENTS_DIR, CLIENT_BLOB,
};

/// The response body for client issue and sign: certificate, chain, the
/// common name it is stored under, and (for `issue` only) the private key.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ClientIssued {
    pub certificate: String,
    pub ca_chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub common_name: String,
}

/// A client record. `ca` is mandatory on the effective record but optional
/// here so updates can omit it under merge-on-put.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(default)]
pub struct Client {
    /// Name of the CA this client's certificates are issued under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,

    /// Default subject overrides applied to every certificate issued for
    /// this client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
}

impl Client {
    /// Overwrite every field present in `update`.
    pub fn merge(&mut self, update: Client) {
        if update.ca.is_some() {
            self.ca = update.ca;
        }
        if update.subject.is_some() {
            self.subject = update.subject;
        }
    }

    fn ca(&self) -> Result<&str> {
        self.ca.as_deref().ok_or_else(|| Error::internal("client record is missing a CA"))
    }
}

/// CRUD for clients and client roles, plus client-scoped issuance.
#[derive(Clone)]
pub struct ClientRegistry {
    secrets: SecretStore,
    certs: CertificateStore,
    chains: ChainBuilder,
    ttl: TtlConfig,
    locks: ScopeLocks,
}

impl ClientRegistry {
    pub fn new(
        secrets: SecretStore,
        certs: CertificateStore,
        ttl: TtlConfig,
        locks: ScopeLocks,
    ) -> Self {
        let chains = ChainBuilder::new(secrets.clone(), certs.clone());
        Self { secrets, certs, chains, ttl, locks }
    }

    fn try_read(&self, client: &str) -> Result<Option<Client>> {
        let path = client_path(client);
        if !self.certs.exists(CLIENT_BLOB, Some(&path)) {
            return Ok(None);
        }
        let raw = self.certs.read(CLIENT_BLOB, Some(&path))?;
        let record = serde_json::from_slice(&raw).map_err(|e| Error::Serialization {
            source: e,
            context: format!("decode client {}", client),
        })?;
        Ok(Some(record))
    }

    fn fetch(&self, client: &str) -> Result<Client> {
        self.try_read(client)?
            .ok_or_else(|| Error::not_found(format!("{} client not found", client)))
    }

    /// Create or update a client. The effective record must name an existing
    /// CA. Returns the record and whether it was created.
    pub fn put(&self, client: &str, update: Client) -> Result<(Client, bool)> {
        let scope = self.locks.scope(&format!("clients/{}", client));
        let _guard = scope.lock();

        let (mut record, created) = match self.try_read(client)? {
            Some(existing) => (existing, false),
            None => (Client::default(), true),
        };
        record.merge(update);

        let ca = record
            .ca
            .as_deref()
            .ok_or_else(|| Error::validation("a client requires a ca"))?;
        if !ca_exists(&self.secrets, ca) {
            return Err(Error::not_found(format!("{} CA not found", ca)));
        }

        let encoded = serde_json::to_vec(&record)?;
        self.certs.write(CLIENT_BLOB, &encoded, Some(&client_path(client)))?;
        Ok((record, created))
    }

    pub fn get(&self, client: &str) -> Result<Client> {
        self.fetch(client)
    }

    /// Delete a client and everything under it: record, roles, certificates.
    pub fn delete(&self, client: &str) -> Result<()> {
        let scope = self.locks.scope(&format!("clients/{}", client));
        let _guard = scope.lock();

        if self.try_read(client)?.is_none() {
            return Err(Error::not_found(format!("{} client not found", client)));
        }
        self.certs.delete(client, Some(CLIENTS_DIR))?;
        info!(client = %client, "deleted client");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.certs.list(Some(CLIENTS_DIR))
    }

    // Client roles.

    fn try_read_role(&self, client: &str, role: &str) -> Result<Option<Role>> {
        let path = client_roles_path(client);
        if !self.certs.exists(role, Some(&path)) {
            return Ok(None);
        }
        let raw = self.certs.read(role, Some(&path))?;
        let record = serde_json::from_slice(&raw).map_err(|e| Error::Serialization {
            source: e,
            context: format!("decode role {} of client {}", role, client),
        })?;
        Ok(Some(record))
    }

    /// Create or update a role scoped to a client.
    pub fn put_role(&self, client: &str, role: &str, update: Role) -> Result<(Role, bool)> {
        self.fetch(client)?;

        let scope = self.locks.scope(&format!("clients/{}/roles/{}", client, role));
        let _guard = scope.lock();

        let (mut record, created) = match self.try_read_role(client, role)? {
            Some(existing) => (existing, false),
            None => (Role::default(), true),
        };
        record.merge(update);

        let encoded = serde_json::to_vec(&record)?;
        self.certs.write(role, &encoded, Some(&client_roles_path(client)))?;
        Ok((record, created))
    }

    pub fn get_role(&self, client: &str, role: &str) -> Result<Role> {
        self.fetch(client)?;
        self.try_read_role(client, role)?.ok_or_else(|| {
            Error::not_found(format!("{} role not found for client {}", role, client))
        })
    }

    pub fn list_roles(&self, client: &str) -> Result<Vec<String>> {
        self.fetch(client)?;
        self.certs.list(Some(&client_roles_path(client)))
    }

    pub fn delete_role(&self, client: &str, role: &str) -> Result<()> {
        self.fetch(client)?;
        let path = client_roles_path(client);
        if !self.certs.exists(role, Some(&path)) {
            return Err(Error::not_found(format!(
                "{} role not found for client {}",
                role, client
            )));
        }
        self.certs.delete(role, Some(&path))
    }

    // Client certificates.

    /// The subject a client certificate is issued with: the request merged
    /// over CA inheritance, then the client's defaults, then the role
    /// template, strongest last.
    fn effective_subject(
        &self,
        requested: &Subject,
        ca_subject: &Subject,
        client: &Client,
        role: &Role,
    ) -> Result<Subject> {
        let mut subject = Subject::build(requested, Some(ca_subject), true)?;
        if let Some(defaults) = &client.subject {
            subject.merge(defaults);
        }
        if let Some(template) = &role.subject {
            subject.merge(template);
        }
        Ok(subject)
    }

    /// Issue a certificate for a client under one of its roles. The key size
    /// comes from the role; the certificate is stored under the client by
    /// common name and marked for client authentication.
    pub fn issue(
        &self,
        client_name: &str,
        role_name: &str,
        subject: &Subject,
        ttl: Option<i64>,
    ) -> Result<ClientIssued> {
        let client = self.fetch(client_name)?;
        let role = self.get_role(client_name, role_name)?;
        let ca = client.ca()?;
        let ca_material = load_ca_material(&self.secrets, &self.certs, ca)?;

        let ca_subject =
            material::parse_certificate(ca_material.certificate_pem.as_bytes())?.subject;
        let subject = self.effective_subject(subject, &ca_subject, &client, &role)?;
        let cn = subject
            .common_name()
            .ok_or_else(|| Error::validation("common_name is required"))?
            .to_string();
        role.validate_common_name(role_name, &cn)?;

        let key_size = role.size.ok_or_else(|| {
            Error::validation(format!("{} role does not define a key size", role_name))
        })?;
        let not_after = resolve_end_date(
            ttl,
            Some(role.max_ttl.unwrap_or(self.ttl.cert_max_ttl)),
            role.default_ttl.unwrap_or(self.ttl.cert_default_ttl),
        )?;

        let key = material::generate_key_pair(key_size)?;
        let mut params =
            material::certificate_params(&subject, not_after, material::new_serial(), false)?;
        params.use_authority_key_identifier_extension = true;
        material::set_client_auth(&mut params);

        let issuer =
            material::load_issuer(&ca_material.certificate_pem, &ca_material.private_key_pem)?;
        let cert = params.signed_by(&key.key_pair, &issuer)?;

        self.certs.write(&cn, cert.pem().as_bytes(), Some(&client_certs_path(client_name)))?;
        let ca_chain = self.chains.build(&cert.pem(), Some(ca))?;

        info!(client = %client_name, role = %role_name, cn = %cn, "issued client certificate");
        Ok(ClientIssued {
            certificate: cert.pem(),
            ca_chain,
            private_key: Some(key.private_key_pem),
            common_name: cn,
        })
    }

    /// Counter-sign a CSR for a client. The subject is rebuilt from the CSR
    /// through the same inheritance and template pipeline as `issue`;
    /// `cn_override` replaces the CSR's common name when given.
    pub fn sign(
        &self,
        client_name: &str,
        role_name: &str,
        csr_pem: &str,
        ttl: Option<i64>,
        cn_override: Option<&str>,
    ) -> Result<ClientIssued> {
        let client = self.fetch(client_name)?;
        let role = self.get_role(client_name, role_name)?;
        let ca = client.ca()?;
        let ca_material = load_ca_material(&self.secrets, &self.certs, ca)?;

        let mut csr = material::parse_csr(csr_pem)?;
        let mut requested = Subject::from_distinguished_name(&csr.params.distinguished_name);
        if let Some(cn) = cn_override {
            requested.set("common_name", cn)?;
        }

        let ca_subject =
            material::parse_certificate(ca_material.certificate_pem.as_bytes())?.subject;
        let subject = self.effective_subject(&requested, &ca_subject, &client, &role)?;
        let cn = subject
            .common_name()
            .ok_or_else(|| Error::validation("CSR subject is missing a common_name"))?
            .to_string();
        role.validate_common_name(role_name, &cn)?;

        let not_after = resolve_end_date(
            ttl,
            Some(role.max_ttl.unwrap_or(self.ttl.cert_max_ttl)),
            role.default_ttl.unwrap_or(self.ttl.cert_default_ttl),
        )?;

        csr.params.distinguished_name = subject.to_distinguished_name();
        csr.params.not_before = time::OffsetDateTime::now_utc();
        csr.params.not_after = material::to_offset_time(not_after)?;
        csr.params.serial_number = Some(rcgen::SerialNumber::from(material::new_serial()));
        csr.params.use_authority_key_identifier_extension = true;
        material::set_client_auth(&mut csr.params);

        let issuer =
            material::load_issuer(&ca_material.certificate_pem, &ca_material.private_key_pem)?;
        let cert = csr.signed_by(&issuer)?;

        self.certs.write(&cn, cert.pem().as_bytes(), Some(&client_certs_path(client_name)))?;
        let ca_chain = self.chains.build(&cert.pem(), Some(ca))?;

        info!(client = %client_name, role = %role_name, cn = %cn, "signed client CSR");
        Ok(ClientIssued {
            certificate: cert.pem(),
            ca_chain,
            private_key: None,
            common_name: cn,
        })
    }

    /// A stored client certificate with its chain.
    pub fn get_certificate(
        &self,
        client_name: &str,
        cn: &str,
    ) -> Result<super::issuer::CertificateRecord> {
        let client = self.fetch(client_name)?;
        let path = client_certs_path(client_name);
        if !self.certs.exists(cn, Some(&path)) {
            return Err(Error::not_found(format!(
                "{} certificate not found for client {}",
                cn, client_name
            )));
        }
        let certificate = self.certs.read_string(cn, Some(&path))?;
        let ca_chain = self.chains.build(&certificate, Some(client.ca()?))?;
        Ok(super::issuer::CertificateRecord { certificate, ca_chain })
    }

    pub fn delete_certificate(&self, client_name: &str, cn: &str) -> Result<()> {
        self.fetch(client_name)?;
        let path = client_certs_path(client_name);
        if !self.certs.exists(cn, Some(&path)) {
            return Err(Error::not_found(format!(
                "{} certificate not found for client {}",
                cn, client_name
            )));
        }
        self.certs.delete(cn, Some(&path))
    }

    pub fn list_certificates(&self, client_name: &str) -> Result<Vec<String>> {
        self.fetch(client_name)?;
        self.certs.list(Some(&client_certs_path(client_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::ca::CaManager;
    use crate::storage::FileStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        cas: CaManager,
        clients: ClientRegistry,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().expect("tempdir");
        let secrets =
            SecretStore::new(Arc::new(FileStore::open(dir.path().join("secrets")).unwrap()));
        let certs =
            CertificateStore::new(Arc::new(FileStore::open(dir.path().join("certs")).unwrap()));
        let locks = ScopeLocks::new();
        let ttl = TtlConfig::default();
        let cas = CaManager::new(secrets.clone(), certs.clone(), ttl.clone(), locks.clone());
        cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        let clients = ClientRegistry::new(secrets, certs, ttl, locks);
        Fixture { _dir: dir, cas, clients }
    }

    fn bound_client() -> Client {
        Client { ca: Some("root".to_string()), ..Client::default() }
    }

    fn issue_role() -> Role {
        Role {
            paths: Some(vec!["example.com".to_string()]),
            size: Some(2048),
            ..Role::default()
        }
    }

    #[test]
    fn test_put_requires_existing_ca() {
        let f = fixture();
        let err = f
            .clients
            .put("svc", Client { ca: Some("ghost".to_string()), ..Client::default() })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = f.clients.put("svc", Client::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_put_merge_keeps_ca_when_update_omits_it() {
        let f = fixture();
        let (_, created) = f.clients.put("svc", bound_client()).unwrap();
        assert!(created);

        let defaults = Subject::with_common_name("ignored");
        let (record, created) = f
            .clients
            .put("svc", Client { subject: Some(defaults.clone()), ..Client::default() })
            .unwrap();
        assert!(!created);
        assert_eq!(record.ca.as_deref(), Some("root"));
        assert_eq!(record.subject, Some(defaults));
    }

    #[test]
    fn test_client_roles_require_client() {
        let f = fixture();
        assert!(matches!(
            f.clients.put_role("ghost", "web", Role::default()).unwrap_err(),
            Error::NotFound(_)
        ));

        f.clients.put("svc", bound_client()).unwrap();
        f.clients.put_role("svc", "web", issue_role()).unwrap();
        assert_eq!(f.clients.list_roles("svc").unwrap(), vec!["web"]);
        assert_eq!(f.clients.get_role("svc", "web").unwrap(), issue_role());
    }

    #[test]
    fn test_issue_stores_certificate_under_common_name() {
        let f = fixture();
        f.clients.put("svc", bound_client()).unwrap();
        f.clients.put_role("svc", "web", issue_role()).unwrap();

        let issued = f
            .clients
            .issue("svc", "web", &Subject::with_common_name("svc.example.com"), Some(24))
            .unwrap();

        assert_eq!(issued.common_name, "svc.example.com");
        assert!(issued.private_key.is_some());
        assert_eq!(issued.ca_chain.matches("BEGIN CERTIFICATE").count(), 2);

        let stored = f.clients.get_certificate("svc", "svc.example.com").unwrap();
        assert_eq!(stored.certificate, issued.certificate);
        assert_eq!(f.clients.list_certificates("svc").unwrap(), vec!["svc.example.com"]);
    }

    #[test]
    fn test_issue_applies_role_template_over_request() {
        let f = fixture();
        let mut template = Subject::new();
        template.set("organization_name", "Templated Org").unwrap();

        f.clients.put("svc", bound_client()).unwrap();
        f.clients
            .put_role("svc", "web", Role { subject: Some(template), ..issue_role() })
            .unwrap();

        let mut requested = Subject::with_common_name("svc.example.com");
        requested.set("organization_name", "Requested Org").unwrap();
        let issued = f.clients.issue("svc", "web", &requested, Some(24)).unwrap();

        let parsed = material::parse_certificate(issued.certificate.as_bytes()).unwrap();
        assert_eq!(parsed.subject.get("organization_name"), Some("Templated Org"));
    }

    #[test]
    fn test_issue_requires_role_key_size() {
        let f = fixture();
        f.clients.put("svc", bound_client()).unwrap();
        f.clients.put_role("svc", "web", Role { size: None, ..issue_role() }).unwrap();

        let err = f
            .clients
            .issue("svc", "web", &Subject::with_common_name("a.example.com"), None)
            .unwrap_err();
        assert!(err.to_string().contains("key size"));
    }

    #[test]
    fn test_sign_with_cn_override() {
        let f = fixture();
        f.clients.put("svc", bound_client()).unwrap();
        f.clients.put_role("svc", "web", issue_role()).unwrap();

        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params.distinguished_name =
            Subject::with_common_name("original.example.com").to_distinguished_name();
        let csr_pem = params.serialize_request(&key).unwrap().pem().unwrap();

        let signed = f
            .clients
            .sign("svc", "web", &csr_pem, Some(24), Some("override.example.com"))
            .unwrap();

        assert_eq!(signed.common_name, "override.example.com");
        assert!(signed.private_key.is_none());
        assert!(f.clients.get_certificate("svc", "override.example.com").is_ok());
    }

    #[test]
    fn test_delete_client_removes_subtree() {
        let f = fixture();
        f.clients.put("svc", bound_client()).unwrap();
        f.clients.put_role("svc", "web", issue_role()).unwrap();
        f.clients
            .issue("svc", "web", &Subject::with_common_name("svc.example.com"), Some(24))
            .unwrap();

        f.clients.delete("svc").unwrap();
        assert!(matches!(f.clients.get("svc").unwrap_err(), Error::NotFound(_)));
        assert!(f.clients.list().unwrap().is_empty());

        // The CA is untouched.
        assert!(f.cas.get("root").is_ok());
    }

    #[test]
    fn test_delete_certificate() {
        let f = fixture();
        f.clients.put("svc", bound_client()).unwrap();
        f.clients.put_role("svc", "web", issue_role()).unwrap();
        f.clients
            .issue("svc", "web", &Subject::with_common_name("svc.example.com"), Some(24))
            .unwrap();

        f.clients.delete_certificate("svc", "svc.example.com").unwrap();
        assert!(matches!(
            f.clients.get_certificate("svc", "svc.example.com").unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
