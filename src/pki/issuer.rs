//! Leaf-certificate issuance under a CA and role.
//!
//! Two entry points: `issue` generates a key pair server-side and returns it
//! once alongside the certificate; `sign` counter-signs a caller-provided
//! CSR and never sees a private key. Issued certificates are stored under
//! their serial number and can be inspected later through `info`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TtlConfig;
use crate::errors::{Error, Result};
use crate::storage::{CertificateStore, SecretStore};

use super::ca::load_ca_material;
use super::chain::ChainBuilder;
use super::material;
use super::role::{Role, RoleRegistry};
use super::subject::Subject;
use super::ttl::resolve_end_date;

/// The response body for issue and sign: the new certificate, its chain, the
/// serial it is stored under, and (for `issue` only) the private key.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IssuedCertificate {
    pub certificate: String,
    pub ca_chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub serial: String,
}

/// A stored certificate and its chain.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CertificateRecord {
    pub certificate: String,
    pub ca_chain: String,
}

/// Decoded attributes of a stored certificate.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CertificateInfo {
    pub subject: Subject,
    pub serial: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Issues and counter-signs leaf certificates.
#[derive(Clone)]
pub struct CertificateIssuer {
    secrets: SecretStore,
    certs: CertificateStore,
    chains: ChainBuilder,
    roles: RoleRegistry,
    ttl: TtlConfig,
}

impl CertificateIssuer {
    pub fn new(
        secrets: SecretStore,
        certs: CertificateStore,
        roles: RoleRegistry,
        ttl: TtlConfig,
    ) -> Self {
        let chains = ChainBuilder::new(secrets.clone(), certs.clone());
        Self { secrets, certs, chains, roles, ttl }
    }

    fn end_date(&self, role: &Role, requested_ttl: Option<i64>) -> Result<DateTime<Utc>> {
        resolve_end_date(
            requested_ttl,
            Some(role.max_ttl.unwrap_or(self.ttl.cert_max_ttl)),
            role.default_ttl.unwrap_or(self.ttl.cert_default_ttl),
        )
    }

    /// Issue a certificate under `ca` constrained by `role_name`, generating
    /// the key pair server-side. Subject fields the request leaves out are
    /// inherited from the CA certificate.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        &self,
        ca: &str,
        role_name: &str,
        subject: &Subject,
        key_size: u32,
        ttl: Option<i64>,
        alt_domains: &[String],
        alt_ips: &[String],
    ) -> Result<IssuedCertificate> {
        let role = self.roles.get(ca, role_name)?;
        let ca_material = load_ca_material(&self.secrets, &self.certs, ca)?;

        let ca_subject = material::parse_certificate(ca_material.certificate_pem.as_bytes())?.subject;
        let subject = Subject::build(subject, Some(&ca_subject), true)?;
        let cn = subject
            .common_name()
            .ok_or_else(|| Error::validation("common_name is required"))?;
        role.validate_common_name(role_name, cn)?;
        for domain in alt_domains {
            role.validate_common_name(role_name, domain)?;
        }
        let not_after = self.end_date(&role, ttl)?;

        let key = material::generate_key_pair(key_size)?;
        let serial = material::new_serial();
        let mut params = material::certificate_params(&subject, not_after, serial, false)?;
        params.use_authority_key_identifier_extension = true;
        material::add_alt_names(&mut params, alt_domains, alt_ips)?;

        let issuer =
            material::load_issuer(&ca_material.certificate_pem, &ca_material.private_key_pem)?;
        let cert = params.signed_by(&key.key_pair, &issuer)?;

        let serial = serial.to_string();
        self.certs.write(&serial, cert.pem().as_bytes(), None)?;
        let ca_chain = self.chains.build(&cert.pem(), Some(ca))?;

        info!(ca = %ca, role = %role_name, serial = %serial, "issued certificate");
        Ok(IssuedCertificate {
            certificate: cert.pem(),
            ca_chain,
            private_key: Some(key.private_key_pem),
            serial,
        })
    }

    /// Counter-sign a CSR under `ca` constrained by `role_name`. The CSR's
    /// subject and public key are used as submitted; only the validity
    /// window and serial are set here.
    pub fn sign(
        &self,
        ca: &str,
        role_name: &str,
        csr_pem: &str,
        ttl: Option<i64>,
    ) -> Result<IssuedCertificate> {
        let role = self.roles.get(ca, role_name)?;
        let ca_material = load_ca_material(&self.secrets, &self.certs, ca)?;

        let mut csr = material::parse_csr(csr_pem)?;
        let subject = Subject::from_distinguished_name(&csr.params.distinguished_name);
        let cn = subject
            .common_name()
            .ok_or_else(|| Error::validation("CSR subject is missing a common_name"))?;
        role.validate_common_name(role_name, cn)?;
        let not_after = self.end_date(&role, ttl)?;

        let serial = material::new_serial();
        csr.params.not_before = time::OffsetDateTime::now_utc();
        csr.params.not_after = material::to_offset_time(not_after)?;
        csr.params.serial_number = Some(rcgen::SerialNumber::from(serial));
        csr.params.use_authority_key_identifier_extension = true;

        let issuer =
            material::load_issuer(&ca_material.certificate_pem, &ca_material.private_key_pem)?;
        let cert = csr.signed_by(&issuer)?;

        let serial = serial.to_string();
        self.certs.write(&serial, cert.pem().as_bytes(), None)?;
        let ca_chain = self.chains.build(&cert.pem(), Some(ca))?;

        info!(ca = %ca, role = %role_name, serial = %serial, "signed CSR");
        Ok(IssuedCertificate { certificate: cert.pem(), ca_chain, private_key: None, serial })
    }

    /// Decode a stored certificate's subject, issuer, serial and validity.
    pub fn info(&self, serial: &str) -> Result<CertificateInfo> {
        if !self.certs.exists(serial, None) {
            return Err(Error::not_found(format!("{} certificate not found", serial)));
        }
        let pem = self.certs.read(serial, None)?;
        let parsed = material::parse_certificate(&pem)?;
        Ok(CertificateInfo {
            subject: parsed.subject,
            serial: parsed.serial,
            issuer: parsed.issuer,
            not_before: parsed.not_before,
            not_after: parsed.not_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::ca::CaManager;
    use crate::pki::locks::ScopeLocks;
    use crate::storage::FileStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        cas: CaManager,
        roles: RoleRegistry,
        issuer: CertificateIssuer,
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
        let roles = RoleRegistry::new(secrets.clone(), certs.clone(), locks);
        let issuer = CertificateIssuer::new(secrets, certs, roles.clone(), ttl);
        Fixture { _dir: dir, cas, roles, issuer }
    }

    fn web_role() -> Role {
        Role { paths: Some(vec!["example.com".to_string()]), ..Role::default() }
    }

    #[test]
    fn test_issue_returns_key_chain_and_stored_serial() {
        let f = fixture();
        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        f.roles.put("root", "web", web_role()).unwrap();

        let issued = f
            .issuer
            .issue(
                "root",
                "web",
                &Subject::with_common_name("svc.example.com"),
                2048,
                Some(24),
                &[],
                &[],
            )
            .unwrap();

        assert!(issued.private_key.as_deref().unwrap().contains("PRIVATE KEY"));
        assert_eq!(issued.ca_chain.matches("BEGIN CERTIFICATE").count(), 2);

        let details = f.issuer.info(&issued.serial).unwrap();
        assert_eq!(details.serial, issued.serial);
        assert_eq!(details.subject.common_name(), Some("svc.example.com"));
        assert!(details.issuer.contains("Root"));
    }

    #[test]
    fn test_issue_rejects_cn_outside_role_paths() {
        let f = fixture();
        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        f.roles.put("root", "web", web_role()).unwrap();

        let err = f
            .issuer
            .issue("root", "web", &Subject::with_common_name("svc.other.org"), 2048, None, &[], &[])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_issue_validates_alt_domains_against_role() {
        let f = fixture();
        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        f.roles.put("root", "web", web_role()).unwrap();

        let err = f
            .issuer
            .issue(
                "root",
                "web",
                &Subject::with_common_name("svc.example.com"),
                2048,
                None,
                &["svc.other.org".to_string()],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_issue_respects_role_ttl_ceiling() {
        let f = fixture();
        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        f.roles.put("root", "web", Role { max_ttl: Some(10), ..web_role() }).unwrap();

        let err = f
            .issuer
            .issue(
                "root",
                "web",
                &Subject::with_common_name("svc.example.com"),
                2048,
                Some(11),
                &[],
                &[],
            )
            .unwrap_err();
        assert!(err.to_string().contains("larger than max allowed TTL 10"));
    }

    #[test]
    fn test_issue_requires_role_and_ca() {
        let f = fixture();
        let err = f
            .issuer
            .issue("root", "web", &Subject::with_common_name("a.example.com"), 2048, None, &[], &[])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        let err = f
            .issuer
            .issue("root", "web", &Subject::with_common_name("a.example.com"), 2048, None, &[], &[])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_sign_uses_csr_subject_verbatim() {
        let f = fixture();
        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        f.roles.put("root", "web", web_role()).unwrap();

        let key = rcgen::KeyPair::generate().unwrap();
        let mut subject = Subject::with_common_name("svc.example.com");
        subject.set("organization_name", "Requester").unwrap();
        let mut params = rcgen::CertificateParams::default();
        params.distinguished_name = subject.to_distinguished_name();
        let csr_pem = params.serialize_request(&key).unwrap().pem().unwrap();

        let signed = f.issuer.sign("root", "web", &csr_pem, Some(24)).unwrap();
        assert!(signed.private_key.is_none());

        let parsed = material::parse_certificate(signed.certificate.as_bytes()).unwrap();
        assert_eq!(parsed.subject.common_name(), Some("svc.example.com"));
        assert_eq!(parsed.subject.get("organization_name"), Some("Requester"));
        assert_eq!(parsed.serial, signed.serial);
    }

    #[test]
    fn test_sign_rejects_csr_cn_outside_role() {
        let f = fixture();
        f.cas.create_root("root", &Subject::with_common_name("Root"), 2048, Some(48)).unwrap();
        f.roles.put("root", "web", web_role()).unwrap();

        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params.distinguished_name =
            Subject::with_common_name("svc.other.org").to_distinguished_name();
        let csr_pem = params.serialize_request(&key).unwrap().pem().unwrap();

        let err = f.issuer.sign("root", "web", &csr_pem, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_info_missing_serial_is_not_found() {
        let f = fixture();
        assert!(matches!(f.issuer.info("12345").unwrap_err(), Error::NotFound(_)));
    }
}
