use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::pki::{CaManager, CertificateIssuer, ClientRegistry, RoleRegistry, ScopeLocks};
use crate::storage::{CertificateStore, FileStore, SecretStore};

use super::{
    docs,
    handlers::{
        cas::{
            create_intermediate_handler, create_root_handler, delete_ca_handler,
            get_ca_certificate_handler, get_ca_chain_handler, get_ca_handler, list_cas_handler,
        },
        certificates::{get_certificate_info_handler, issue_handler, sign_handler},
        clients::{
            delete_client_certificate_handler, delete_client_handler,
            delete_client_role_handler, get_client_certificate_handler, get_client_handler,
            get_client_role_handler, issue_client_handler, list_client_roles_handler,
            list_clients_handler, put_client_handler, put_client_role_handler,
            sign_client_handler,
        },
        roles::{delete_role_handler, get_role_handler, list_roles_handler, put_role_handler},
    },
};

/// Shared handler state: one instance of each PKI component over the same
/// pair of stores and lock table.
#[derive(Clone)]
pub struct ApiState {
    pub cas: CaManager,
    pub roles: RoleRegistry,
    pub issuer: CertificateIssuer,
    pub clients: ClientRegistry,
}

impl ApiState {
    /// Wire up every component over a store pair.
    pub fn new(secrets: SecretStore, certs: CertificateStore, config: &AppConfig) -> Self {
        let locks = ScopeLocks::new();
        let ttl = config.ttl.clone();
        let cas = CaManager::new(secrets.clone(), certs.clone(), ttl.clone(), locks.clone());
        let roles = RoleRegistry::new(secrets.clone(), certs.clone(), locks.clone());
        let issuer = CertificateIssuer::new(secrets.clone(), certs.clone(), roles.clone(), ttl.clone());
        let clients = ClientRegistry::new(secrets, certs, ttl, locks);
        Self { cas, roles, issuer, clients }
    }

    /// Open filesystem stores at the configured paths and wire up state.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let secrets = SecretStore::new(Arc::new(FileStore::open(&config.storage.secrets_path)?));
        let certs = CertificateStore::new(Arc::new(FileStore::open(&config.storage.certs_path)?));
        Ok(Self::new(secrets, certs, config))
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/cas", post(create_root_handler).get(list_cas_handler))
        .route("/api/v1/cas/{parent}/intermediates", post(create_intermediate_handler))
        .route("/api/v1/cas/{ca}", get(get_ca_handler).delete(delete_ca_handler))
        .route("/api/v1/cas/{ca}/certificate", get(get_ca_certificate_handler))
        .route("/api/v1/cas/{ca}/chain", get(get_ca_chain_handler))
        .route("/api/v1/cas/{ca}/roles", get(list_roles_handler))
        .route(
            "/api/v1/cas/{ca}/roles/{role}",
            put(put_role_handler).get(get_role_handler).delete(delete_role_handler),
        )
        .route("/api/v1/cas/{ca}/roles/{role}/issue", post(issue_handler))
        .route("/api/v1/cas/{ca}/roles/{role}/sign", post(sign_handler))
        .route("/api/v1/certificates/{serial}", get(get_certificate_info_handler))
        .route("/api/v1/clients", get(list_clients_handler))
        .route(
            "/api/v1/clients/{client}",
            put(put_client_handler).get(get_client_handler).delete(delete_client_handler),
        )
        .route("/api/v1/clients/{client}/roles", get(list_client_roles_handler))
        .route(
            "/api/v1/clients/{client}/roles/{role}",
            put(put_client_role_handler)
                .get(get_client_role_handler)
                .delete(delete_client_role_handler),
        )
        .route("/api/v1/clients/{client}/roles/{role}/issue", post(issue_client_handler))
        .route("/api/v1/clients/{client}/roles/{role}/sign", post(sign_client_handler))
        .route(
            "/api/v1/clients/{client}/certificates/{cn}",
            get(get_client_certificate_handler).delete(delete_client_certificate_handler),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .merge(docs::docs_router())
}
