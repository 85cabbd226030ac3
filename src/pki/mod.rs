//! # PKI Core
//!
//! CA hierarchy management, subject policy, trust-chain assembly and
//! certificate issuance. Components are constructed with [`SecretStore`] and
//! [`CertificateStore`](crate::storage::CertificateStore) handles plus the
//! TTL configuration; nothing in here reaches for ambient state.
//!
//! Store layout, shared by every component:
//!
//! ```text
//! secrets/<ca>/private                 CA private key (PKCS#8 PEM)
//! secrets/<ca>/parent                  parent CA name (intermediates only)
//! certs/<ca>                           CA certificate (PEM)
//! certs/<serial>                       issued leaf certificates (PEM)
//! certs/roles/<ca>/<role>              role records (JSON)
//! certs/clients/<name>/client          client records (JSON)
//! certs/clients/<name>/roles/<role>    client role records (JSON)
//! certs/clients/<name>/certs/<cn>      client certificates (PEM)
//! ```

pub mod ca;
pub mod chain;
pub mod client;
pub mod issuer;
pub mod locks;
pub mod material;
pub mod role;
pub mod subject;
pub mod ttl;

pub use ca::{CaManager, CaMaterial, CaRecord};
pub use chain::ChainBuilder;
pub use client::{Client, ClientIssued, ClientRegistry};
pub use issuer::{CertificateInfo, CertificateIssuer, CertificateRecord, IssuedCertificate};
pub use locks::ScopeLocks;
pub use role::{Role, RoleRegistry};
pub use subject::Subject;

use crate::storage::SecretStore;

/// Blob name of a CA's private key under `secrets/<ca>/`.
pub(crate) const PRIVATE_KEY_BLOB: &str = "private";

/// Blob name of a CA's parent pointer under `secrets/<ca>/`.
pub(crate) const PARENT_BLOB: &str = "parent";

/// Blob name of a client record under `certs/clients/<name>/`.
pub(crate) const CLIENT_BLOB: &str = "client";

/// Directory under the certificate store holding client subtrees.
pub(crate) const CLIENTS_DIR: &str = "clients";

pub(crate) fn roles_path(ca: &str) -> String {
    format!("roles/{}", ca)
}

pub(crate) fn client_path(client: &str) -> String {
    format!("{}/{}", CLIENTS_DIR, client)
}

pub(crate) fn client_roles_path(client: &str) -> String {
    format!("{}/{}/roles", CLIENTS_DIR, client)
}

pub(crate) fn client_certs_path(client: &str) -> String {
    format!("{}/{}/certs", CLIENTS_DIR, client)
}

/// A CA exists exactly when its private key does.
pub(crate) fn ca_exists(secrets: &SecretStore, ca: &str) -> bool {
    secrets.exists(PRIVATE_KEY_BLOB, Some(ca))
}
