use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::backend::common::dtos::WorkspaceRootResponse;
use crate::backend::common::error::ServiceError;
use crate::backend::event_polling_emission_pipeline::event_runtime::NotifierOptions;
use crate::backend::workspace_discovery_context::discovery_runtime::DiscoveryOptions;

use super::events_commands::workspace_events;
use super::http_request::{
    read_http_request, workspace_root_payload_from_body, workspace_root_payload_from_query,
    write_json_response,
};
use super::workspace_commands::workspace_resolve;

pub(crate) const WORKSPACE_RESOLVE_ROUTE: &str = "/workspace/resolve";
pub(crate) const WORKSPACE_EVENTS_ROUTE: &str = "/workspace/events";

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub discovery: Arc<DiscoveryOptions>,
    pub notifier: NotifierOptions,
}

pub async fn serve(listener: TcpListener, config: ServiceConfig) -> Result<(), ServiceError> {
    let config = Arc::new(config);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("[service] listening on http://{addr}");
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!("[service] accept failed: {error}");
                continue;
            }
        };

        let config = config.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, peer, &config).await {
                tracing::debug!("[service] connection from {peer} ended with error: {error}");
            }
        });
    }
}

/// Binds `host:port`. Host names such as `localhost` and bare IPv6 literals are accepted.
pub async fn bind_listener(host: &str, port: u16) -> Result<TcpListener, ServiceError> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok(TcpListener::bind((host, port)).await?)
}

pub async fn run(host: &str, port: u16, config: ServiceConfig) -> Result<(), ServiceError> {
    let listener = bind_listener(host, port).await?;
    serve(listener, config).await
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: &ServiceConfig,
) -> Result<(), ServiceError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match read_http_request(&mut reader).await {
        Ok(request) => request,
        Err(ServiceError::Io(error)) => return Err(ServiceError::Io(error)),
        Err(error) => {
            let status = match error {
                ServiceError::PayloadTooLarge { .. } => 413,
                _ => 400,
            };
            write_json_response(
                &mut writer,
                status,
                &WorkspaceRootResponse::failed(error.to_string()),
            )
            .await?;
            return Ok(());
        }
    };
    tracing::debug!("[service] {peer} {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", WORKSPACE_EVENTS_ROUTE) => {
            match workspace_root_payload_from_query(&request.query) {
                Ok(payload) => workspace_events(reader, writer, payload, config).await,
                Err(error) => reject(&mut writer, 400, error).await,
            }
        }
        ("GET", WORKSPACE_RESOLVE_ROUTE) => match workspace_root_payload_from_query(&request.query)
        {
            Ok(payload) => {
                let response = workspace_resolve(payload, config.discovery.clone()).await;
                write_json_response(&mut writer, 200, &response).await
            }
            Err(error) => reject(&mut writer, 400, error).await,
        },
        ("POST", WORKSPACE_RESOLVE_ROUTE) => match workspace_root_payload_from_body(&request.body)
        {
            Ok(payload) => {
                let response = workspace_resolve(payload, config.discovery.clone()).await;
                write_json_response(&mut writer, 200, &response).await
            }
            Err(error) => reject(&mut writer, 400, error).await,
        },
        (_, WORKSPACE_EVENTS_ROUTE) | (_, WORKSPACE_RESOLVE_ROUTE) => {
            let message = format!("{} is not supported on {}.", request.method, request.path);
            reject(&mut writer, 405, ServiceError::BadRequest(message)).await
        }
        _ => {
            let message = format!("No handler is registered for {}.", request.path);
            reject(&mut writer, 404, ServiceError::BadRequest(message)).await
        }
    }
}

async fn reject<W>(writer: &mut W, status: u16, error: ServiceError) -> Result<(), ServiceError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    write_json_response(writer, status, &WorkspaceRootResponse::failed(error.to_string())).await
}
