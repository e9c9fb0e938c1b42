//! Connection API endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use portage_core::problem;
use portage_core::{Connection, ConnectionStore, ConnectionType, Problem, Resource};
use serde::Deserialize;
use tracing::{debug, error};
use utoipa::{OpenApi, ToSchema};

use crate::service::{refresh_connection_health, ConnectionError};

pub struct ConnectionsState {
    pub connections: Arc<ConnectionStore>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_connection,
        list_connections,
        get_connection,
        update_connection,
        delete_connection,
        test_connection,
        list_resource_types,
        list_resources_of_type
    ),
    components(schemas(ConnectionRequest, Connection)),
    info(
        title = "Connections API",
        description = "Manage AWX/AAP connections, check their health and browse remote resources",
        version = "1.0.0"
    )
)]
pub struct ConnectionsApiDoc;

pub fn configure_routes(state: Arc<ConnectionsState>) -> Router {
    Router::new()
        .route("/connections", post(create_connection))
        .route("/connections", get(list_connections))
        .route("/connections/{id}", get(get_connection))
        .route("/connections/{id}", put(update_connection))
        .route("/connections/{id}", delete(delete_connection))
        .route("/connections/{id}/test", post(test_connection))
        .route("/connections/{id}/resources", get(list_resource_types))
        .route("/connections/{id}/resources/{type}", get(list_resources_of_type))
        .with_state(state)
}

impl From<ConnectionError> for Problem {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotFound(id) => problem::new(StatusCode::NOT_FOUND)
                .with_title("Connection Not Found")
                .with_detail(format!("no connection with id {id}")),
            ConnectionError::Platform(e) => problem::new(StatusCode::BAD_GATEWAY)
                .with_title("Platform Error")
                .with_detail(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConnectionRequest {
    pub name: String,
    #[serde(rename = "type", default)]
    pub conn_type: ConnectionType,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub scheme: String,
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ca_cert: String,
    #[serde(default)]
    pub insecure: bool,
}

impl ConnectionRequest {
    fn into_connection(self) -> Connection {
        let role = if self.role.is_empty() {
            match self.conn_type {
                ConnectionType::Awx => "source".to_string(),
                ConnectionType::Aap => "destination".to_string(),
            }
        } else {
            self.role
        };
        let scheme = if self.scheme.is_empty() {
            match self.conn_type {
                ConnectionType::Aap => "https".to_string(),
                ConnectionType::Awx => "http".to_string(),
            }
        } else {
            self.scheme
        };
        let port = if self.port == 0 {
            if scheme == "https" {
                443
            } else {
                80
            }
        } else {
            self.port
        };
        Connection {
            name: self.name,
            conn_type: self.conn_type,
            role,
            scheme,
            host: self.host,
            port,
            username: self.username,
            password: self.password,
            ca_cert: self.ca_cert,
            insecure: self.insecure,
            ..Default::default()
        }
    }
}

fn masked(mut conn: Connection) -> Connection {
    conn.password = conn.masked_password();
    conn
}

fn not_found(id: &str) -> Problem {
    problem::new(StatusCode::NOT_FOUND)
        .with_title("Connection Not Found")
        .with_detail(format!("no connection with id {id}"))
}

/// Register a new connection
#[utoipa::path(
    tag = "Connections",
    post,
    path = "/connections",
    request_body = ConnectionRequest,
    responses(
        (status = 201, description = "Connection created", body = Connection)
    )
)]
async fn create_connection(
    State(state): State<Arc<ConnectionsState>>,
    Json(req): Json<ConnectionRequest>,
) -> impl IntoResponse {
    let conn = state.connections.create(req.into_connection());
    debug!("created connection {} ({})", conn.name, conn.id);
    (StatusCode::CREATED, Json(masked(conn)))
}

/// List all connections
#[utoipa::path(
    tag = "Connections",
    get,
    path = "/connections",
    responses(
        (status = 200, description = "All connections", body = [Connection])
    )
)]
async fn list_connections(State(state): State<Arc<ConnectionsState>>) -> impl IntoResponse {
    let conns: Vec<Connection> = state.connections.list().into_iter().map(masked).collect();
    Json(conns)
}

/// Get a connection by ID
#[utoipa::path(
    tag = "Connections",
    get,
    path = "/connections/{id}",
    params(("id" = String, Path, description = "Connection ID")),
    responses(
        (status = 200, description = "Connection details", body = Connection),
        (status = 404, description = "Connection not found")
    )
)]
async fn get_connection(
    State(state): State<Arc<ConnectionsState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let conn = state.connections.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(masked(conn)))
}

/// Update a connection's settings
#[utoipa::path(
    tag = "Connections",
    put,
    path = "/connections/{id}",
    request_body = ConnectionRequest,
    params(("id" = String, Path, description = "Connection ID")),
    responses(
        (status = 200, description = "Connection updated", body = Connection),
        (status = 404, description = "Connection not found")
    )
)]
async fn update_connection(
    State(state): State<Arc<ConnectionsState>>,
    Path(id): Path<String>,
    Json(req): Json<ConnectionRequest>,
) -> Result<impl IntoResponse, Problem> {
    let existing = state.connections.get(&id).ok_or_else(|| not_found(&id))?;
    let mut conn = req.into_connection();
    conn.id = id;
    // An empty password in the request keeps the stored secret.
    if conn.password.is_empty() {
        conn.password = existing.password;
    }
    state.connections.update(conn.clone());
    Ok(Json(masked(conn)))
}

/// Delete a connection
#[utoipa::path(
    tag = "Connections",
    delete,
    path = "/connections/{id}",
    params(("id" = String, Path, description = "Connection ID")),
    responses(
        (status = 204, description = "Connection deleted"),
        (status = 404, description = "Connection not found")
    )
)]
async fn delete_connection(
    State(state): State<Arc<ConnectionsState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    if !state.connections.delete(&id) {
        return Err(not_found(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Ping the connection, verify credentials and run API discovery
#[utoipa::path(
    tag = "Connections",
    post,
    path = "/connections/{id}/test",
    params(("id" = String, Path, description = "Connection ID")),
    responses(
        (status = 200, description = "Health refreshed", body = Connection),
        (status = 404, description = "Connection not found")
    )
)]
async fn test_connection(
    State(state): State<Arc<ConnectionsState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let conn = refresh_connection_health(&state.connections, &id).await?;
    Ok(Json(masked(conn)))
}

/// List the browsable resource types for a connection
#[utoipa::path(
    tag = "Resources",
    get,
    path = "/connections/{id}/resources",
    params(("id" = String, Path, description = "Connection ID")),
    responses(
        (status = 200, description = "Resource types for the connection's flavor"),
        (status = 404, description = "Connection not found")
    )
)]
async fn list_resource_types(
    State(state): State<Arc<ConnectionsState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let conn = state.connections.get(&id).ok_or_else(|| not_found(&id))?;
    let platform = portage_platform::new_platform(&conn).map_err(|e| {
        problem::new(StatusCode::BAD_GATEWAY)
            .with_title("Platform Error")
            .with_detail(e.to_string())
    })?;
    Ok(Json(platform.resource_types()))
}

/// List all objects of a resource type on the remote
#[utoipa::path(
    tag = "Resources",
    get,
    path = "/connections/{id}/resources/{type}",
    params(
        ("id" = String, Path, description = "Connection ID"),
        ("type" = String, Path, description = "Resource type name, e.g. job_templates")
    ),
    responses(
        (status = 200, description = "Objects of the requested type"),
        (status = 404, description = "Connection or resource type not found"),
        (status = 502, description = "Remote API error")
    )
)]
async fn list_resources_of_type(
    State(state): State<Arc<ConnectionsState>>,
    Path((id, type_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, Problem> {
    let conn = state.connections.get(&id).ok_or_else(|| not_found(&id))?;
    let platform = portage_platform::new_platform(&conn).map_err(|e| {
        problem::new(StatusCode::BAD_GATEWAY)
            .with_title("Platform Error")
            .with_detail(e.to_string())
    })?;
    let resources: Vec<Resource> = platform.list_resources(&type_name).await.map_err(|e| {
        error!("listing {type_name} on {}: {e}", conn.name);
        match e {
            portage_platform::PlatformError::UnknownResourceType(_) => {
                problem::new(StatusCode::NOT_FOUND)
                    .with_title("Unknown Resource Type")
                    .with_detail(e.to_string())
            }
            _ => problem::new(StatusCode::BAD_GATEWAY)
                .with_title("Remote API Error")
                .with_detail(e.to_string()),
        }
    })?;
    Ok(Json(resources))
}
