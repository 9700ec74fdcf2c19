use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::backend::common::dtos::{WorkspaceRootPayload, WorkspaceRootResponse};
use crate::backend::common::error::ServiceError;
use crate::backend::event_polling_emission_pipeline::event_runtime::open_workspace_event_stream;

use super::command_entry::ServiceConfig;
use super::http_request::{write_event_stream_head, write_json_response};
use super::workspace_commands::resolve_workspace_root_blocking;

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Resolves the root, then streams `ready`, `workspace-change` and heartbeat
/// frames until the client goes away or the connection fails internally.
pub(crate) async fn workspace_events<R, W>(
    mut reader: R,
    mut writer: W,
    payload: WorkspaceRootPayload,
    config: &ServiceConfig,
) -> Result<(), ServiceError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let resolved = match resolve_workspace_root_blocking(payload, config.discovery.clone()).await {
        Ok(resolved) => resolved,
        Err(error) => {
            tracing::info!("[workspace-events] {error}");
            return write_json_response(
                &mut writer,
                400,
                &WorkspaceRootResponse::failed(error.to_string()),
            )
            .await;
        }
    };

    write_event_stream_head(&mut writer).await?;

    let request_id = request_id();
    let mut stream = open_workspace_event_stream(&resolved, &request_id, &config.notifier);
    let connection = stream.connection().clone();
    let mut scratch = [0u8; 256];

    let outcome = loop {
        tokio::select! {
            frame = stream.next_frame() => {
                let Some(frame) = frame else {
                    break Ok(());
                };

                let delivery = async {
                    writer.write_all(frame.render().as_bytes()).await?;
                    writer.flush().await
                };
                match tokio::time::timeout(config.notifier.write_timeout, delivery).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => break Err(ServiceError::Io(error)),
                    Err(_) => {
                        tracing::warn!(
                            "[workspace-events] client {request_id} stopped reading; closing stream"
                        );
                        break Err(ServiceError::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "event stream client stopped reading",
                        )));
                    }
                }
            }
            read = reader.read(&mut scratch) => {
                match read {
                    Ok(0) | Err(_) => {
                        tracing::debug!("[workspace-events] client {request_id} disconnected");
                        break Ok(());
                    }
                    Ok(_) => {}
                }
            }
        }
    };

    connection.close();
    tracing::info!(
        "[workspace-events] stream {request_id} closed for {}",
        resolved.workspace_root.display()
    );

    match outcome {
        Err(ServiceError::Io(error))
            if matches!(
                error.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ) =>
        {
            Ok(())
        }
        other => other,
    }
}
