//! Data preparation service endpoints

use crate::endpoint::{EndpointOptions, PollEndpoint, RequestEndpoint};
use datasource_mux::Method;
use datasource_url::UrlError;

const APP_PATH: &str = "/namespaces/:namespace/apps/dataprep";

/// Interval used by the service liveness ping
pub const PING_INTERVAL_MS: u64 = 2000;

/// Data preparation endpoint table
#[derive(Debug, Clone)]
pub struct DataPrepApi {
    // Workspaces
    pub create_workspace: RequestEndpoint,
    pub delete_workspace: RequestEndpoint,
    pub get_workspace: RequestEndpoint,
    pub list_workspaces: RequestEndpoint,
    pub execute: RequestEndpoint,
    pub summary: RequestEndpoint,
    pub get_schema: RequestEndpoint,

    // Service management
    pub get_app: RequestEndpoint,
    pub create_app: RequestEndpoint,
    pub start_service: RequestEndpoint,
    pub stop_service: RequestEndpoint,
    pub poll_service_status: PollEndpoint,
    pub get_usage: RequestEndpoint,
    pub get_info: RequestEndpoint,
    pub ping: RequestEndpoint,

    // Connections
    pub list_connections: RequestEndpoint,
    pub create_connection: RequestEndpoint,
    pub get_connection: RequestEndpoint,
    pub update_connection: RequestEndpoint,
    pub delete_connection: RequestEndpoint,
    pub list_tables: RequestEndpoint,
}

impl DataPrepApi {
    /// Build the endpoint table
    ///
    /// # Errors
    /// Returns an error if a template fails to parse
    pub fn new() -> Result<Self, UrlError> {
        let service = format!("{APP_PATH}/services/service");
        let workspace = format!("{service}/methods/workspaces/:workspaceId");
        let connections = format!("{service}/methods/connections");
        let request = |method, path: String| RequestEndpoint::new(method, &path);

        Ok(Self {
            create_workspace: request(Method::Put, workspace.clone())?,
            delete_workspace: request(Method::Delete, workspace.clone())?,
            get_workspace: request(Method::Get, workspace.clone())?,
            list_workspaces: request(Method::Get, format!("{service}/methods/workspaces"))?,
            execute: request(Method::Post, format!("{workspace}/execute"))?,
            summary: request(Method::Post, format!("{workspace}/summary"))?,
            get_schema: request(Method::Post, format!("{workspace}/schema"))?,

            get_app: request(Method::Get, APP_PATH.to_string())?,
            create_app: request(Method::Put, APP_PATH.to_string())?,
            start_service: request(Method::Post, format!("{service}/start"))?,
            stop_service: request(Method::Post, format!("{service}/stop"))?,
            poll_service_status: PollEndpoint::new(Method::Get, &format!("{service}/status"))?,
            get_usage: request(Method::Get, format!("{service}/methods/usage"))?,
            get_info: request(Method::Get, format!("{service}/methods/info"))?,
            ping: request(Method::Get, format!("{service}/methods/usage"))?
                .with_options(EndpointOptions::new().with_interval(PING_INTERVAL_MS)),

            list_connections: request(Method::Get, connections.clone())?,
            create_connection: request(Method::Post, format!("{connections}/create"))?,
            get_connection: request(Method::Get, format!("{connections}/:connectionId"))?,
            update_connection: request(Method::Post, format!("{connections}/:connectionId/update"))?,
            delete_connection: request(Method::Delete, format!("{connections}/:connectionId"))?,
            list_tables: request(Method::Get, format!("{connections}/:connectionId/tables"))?,
        })
    }
}
