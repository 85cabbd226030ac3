//! Key and certificate material: the seam to the crypto stack.
//!
//! Key pairs are RSA, generated with the `rsa` crate (rcgen's ring backend
//! signs RSA but cannot generate RSA keys) and handed to rcgen as PKCS#8 PEM.
//! Certificate assembly and signing go through rcgen; decoding of stored
//! PEM material goes through x509-parser.

use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};
use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, ExtendedKeyUsagePurpose,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use time::OffsetDateTime;
use x509_parser::parse_x509_certificate;
use x509_parser::pem::parse_x509_pem;

use super::subject::Subject;
use crate::errors::{Error, Result};

/// Key sizes accepted for generated RSA key pairs.
const SUPPORTED_KEY_SIZES: &[u32] = &[2048, 3072, 4096];

/// A freshly generated key pair plus its one-time PEM encoding.
#[derive(Debug)]
pub struct KeyMaterial {
    pub key_pair: KeyPair,
    pub private_key_pem: String,
}

/// Generate an RSA key pair of `bits` bits.
pub fn generate_key_pair(bits: u32) -> Result<KeyMaterial> {
    if !SUPPORTED_KEY_SIZES.contains(&bits) {
        return Err(Error::validation(format!(
            "unsupported key size {}, expected one of 2048, 3072, 4096",
            bits
        )));
    }

    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, bits as usize)?;
    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::crypto(format!("encode private key: {}", e)))?
        .to_string();

    let key_pair = KeyPair::from_pem(&private_key_pem)?;
    Ok(KeyMaterial { key_pair, private_key_pem })
}

/// Generate a serial number for a new certificate. Kept to 63 bits so the
/// DER integer stays positive and the decimal rendering matches what
/// x509-parser reports when the certificate is decoded again.
pub fn new_serial() -> u64 {
    rand::random::<u64>() >> 1
}

/// Assemble certificate parameters for a subject and validity window.
pub fn certificate_params(
    subject: &Subject,
    not_after: DateTime<Utc>,
    serial: u64,
    is_ca: bool,
) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject.to_distinguished_name();
    params.serial_number = Some(SerialNumber::from(serial));
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = to_offset_time(not_after)?;

    if is_ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
        ];
    } else {
        params.is_ca = IsCa::NoCa;
        params.key_usages =
            vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
    }

    Ok(params)
}

/// Add subject-alternative-name extensions. Domains must be IA5 strings and
/// IPs must parse as addresses; anything else is a validation failure.
pub fn add_alt_names(
    params: &mut CertificateParams,
    alt_domains: &[String],
    alt_ips: &[String],
) -> Result<()> {
    for domain in alt_domains {
        let name = Ia5String::try_from(domain.clone())
            .map_err(|_| Error::validation(format!("invalid alternative domain '{}'", domain)))?;
        params.subject_alt_names.push(SanType::DnsName(name));
    }
    for ip in alt_ips {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| Error::validation(format!("invalid alternative IP '{}'", ip)))?;
        params.subject_alt_names.push(SanType::IpAddress(addr));
    }
    Ok(())
}

/// Mark issued certificates for client authentication.
pub fn set_client_auth(params: &mut CertificateParams) {
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
}

/// Reconstruct a signing authority from a CA's stored certificate and key.
pub fn load_issuer(cert_pem: &str, key_pem: &str) -> Result<Issuer<'static, KeyPair>> {
    let key_pair = KeyPair::from_pem(key_pem)
        .map_err(|e| Error::crypto(format!("parse CA private key: {}", e)))?;
    Issuer::from_ca_cert_pem(cert_pem, key_pair)
        .map_err(|e| Error::crypto(format!("parse CA certificate: {}", e)))
}

/// Parse a PEM-encoded certificate signing request.
pub fn parse_csr(csr_pem: &str) -> Result<CertificateSigningRequestParams> {
    CertificateSigningRequestParams::from_pem(csr_pem)
        .map_err(|e| Error::validation(format!("malformed CSR: {}", e)))
}

/// Fields decoded from a stored certificate.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub subject: Subject,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Decode a PEM-encoded certificate's subject, issuer, serial and validity.
pub fn parse_certificate(pem_bytes: &[u8]) -> Result<ParsedCertificate> {
    let (_, pem) = parse_x509_pem(pem_bytes)
        .map_err(|e| Error::validation(format!("malformed certificate PEM: {}", e)))?;
    let (_, cert) = parse_x509_certificate(&pem.contents)
        .map_err(|e| Error::validation(format!("malformed certificate: {}", e)))?;

    let subject = Subject::from_x509_name(cert.subject());
    let issuer = cert.issuer().to_string();
    let serial = cert.serial.to_string();
    let not_before = to_chrono(cert.validity().not_before.to_datetime())?;
    let not_after = to_chrono(cert.validity().not_after.to_datetime())?;

    Ok(ParsedCertificate { subject, issuer, serial, not_before, not_after })
}

pub(crate) fn to_offset_time(dt: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::internal(format!("convert certificate time: {}", e)))
}

fn to_chrono(dt: OffsetDateTime) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(dt.unix_timestamp(), 0)
        .single()
        .ok_or_else(|| Error::internal("convert certificate time".to_string()))
}
