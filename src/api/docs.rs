use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[allow(unused_imports)]
use crate::api::handlers::{
    cas::{CreateIntermediateCaBody, CreateRootCaBody},
    certificates::{IssueCertificateBody, SignCertificateBody},
    clients::{IssueClientCertificateBody, SignClientCertificateBody},
};
#[allow(unused_imports)]
use crate::pki::{
    CaRecord, CertificateInfo, CertificateRecord, Client, ClientIssued, IssuedCertificate, Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::cas::create_root_handler,
        crate::api::handlers::cas::create_intermediate_handler,
        crate::api::handlers::cas::list_cas_handler,
        crate::api::handlers::cas::get_ca_handler,
        crate::api::handlers::cas::delete_ca_handler,
        crate::api::handlers::cas::get_ca_certificate_handler,
        crate::api::handlers::cas::get_ca_chain_handler,
        crate::api::handlers::roles::put_role_handler,
        crate::api::handlers::roles::get_role_handler,
        crate::api::handlers::roles::list_roles_handler,
        crate::api::handlers::roles::delete_role_handler,
        crate::api::handlers::certificates::issue_handler,
        crate::api::handlers::certificates::sign_handler,
        crate::api::handlers::certificates::get_certificate_info_handler,
        crate::api::handlers::clients::put_client_handler,
        crate::api::handlers::clients::get_client_handler,
        crate::api::handlers::clients::delete_client_handler,
        crate::api::handlers::clients::list_clients_handler,
        crate::api::handlers::clients::put_client_role_handler,
        crate::api::handlers::clients::get_client_role_handler,
        crate::api::handlers::clients::list_client_roles_handler,
        crate::api::handlers::clients::delete_client_role_handler,
        crate::api::handlers::clients::issue_client_handler,
        crate::api::handlers::clients::sign_client_handler,
        crate::api::handlers::clients::get_client_certificate_handler,
        crate::api::handlers::clients::delete_client_certificate_handler,
    ),
    components(schemas(
        CreateRootCaBody,
        CreateIntermediateCaBody,
        IssueCertificateBody,
        SignCertificateBody,
        IssueClientCertificateBody,
        SignClientCertificateBody,
        CaRecord,
        Role,
        Client,
        IssuedCertificate,
        ClientIssued,
        CertificateRecord,
        CertificateInfo,
    )),
    tags(
        (name = "CAs", description = "Certificate authority lifecycle"),
        (name = "Roles", description = "Issuance policies under a CA"),
        (name = "Certificates", description = "Issuance, CSR signing and inspection"),
        (name = "Clients", description = "Client registry and client-scoped issuance"),
    ),
    info(
        title = "Palisade API",
        description = "Private certificate authority management service",
    )
)]
pub struct ApiDoc;

pub fn docs_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
