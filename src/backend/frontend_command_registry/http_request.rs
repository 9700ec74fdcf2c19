use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::backend::common::constants::{MAX_REQUEST_BODY_BYTES, MAX_REQUEST_HEAD_BYTES};
use crate::backend::common::dtos::{WorkspaceMetaContext, WorkspaceRootPayload};
use crate::backend::common::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestHead {
    method: String,
    target: String,
    content_length: usize,
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|index| index + 4)
}

fn parse_request_head(head: &str) -> Result<RequestHead, ServiceError> {
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Request line is missing.".to_string()))?;

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ServiceError::BadRequest(format!(
            "Malformed request line \"{request_line}\"."
        )));
    };

    if !version.starts_with("HTTP/1.") {
        return Err(ServiceError::BadRequest(format!(
            "Unsupported protocol version \"{version}\"."
        )));
    }

    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse::<usize>().map_err(|_| {
                ServiceError::BadRequest("Content-Length must be a non-negative integer.".to_string())
            })?;
        }
    }

    if content_length > MAX_REQUEST_BODY_BYTES {
        return Err(ServiceError::PayloadTooLarge {
            limit: MAX_REQUEST_BODY_BYTES,
        });
    }

    Ok(RequestHead {
        method: method.to_ascii_uppercase(),
        target: target.to_string(),
        content_length,
    })
}

fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let pairs = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    (path.to_string(), pairs)
}

pub(crate) async fn read_http_request<R>(reader: &mut R) -> Result<HttpRequest, ServiceError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(end) = find_head_end(&buffer) {
            break end;
        }

        if buffer.len() > MAX_REQUEST_HEAD_BYTES {
            return Err(ServiceError::PayloadTooLarge {
                limit: MAX_REQUEST_HEAD_BYTES,
            });
        }

        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(ServiceError::BadRequest(
                "Connection closed before the request head was complete.".to_string(),
            ));
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let parsed = parse_request_head(&head)?;

    let mut body = buffer.split_off(head_end);
    while body.len() < parsed.content_length {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(ServiceError::BadRequest(
                "Connection closed before the request body was complete.".to_string(),
            ));
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(parsed.content_length);

    let (path, query) = split_target(&parsed.target);
    Ok(HttpRequest {
        method: parsed.method,
        path,
        query,
        body,
    })
}

/// Decodes discovery fields from query parameters; `knownWorktree` repeats per entry.
pub(crate) fn workspace_root_payload_from_query(
    query: &[(String, String)],
) -> Result<WorkspaceRootPayload, ServiceError> {
    let mut payload = WorkspaceRootPayload::default();

    for (key, value) in query {
        match key.as_str() {
            "workspaceRoot" => payload.workspace_root = Some(value.clone()),
            "rootName" => payload.root_name = Some(value.clone()),
            "worktree" => payload.worktree = Some(value.clone()),
            "knownWorktree" | "knownWorktrees" => payload.known_worktrees.push(value.clone()),
            "workspaceMeta" => {
                let meta = serde_json::from_str::<WorkspaceMetaContext>(value).map_err(|error| {
                    ServiceError::BadRequest(format!(
                        "workspaceMeta must be a JSON object with version, rootName, createdAt or updatedAt: {error}."
                    ))
                })?;
                payload.workspace_meta = Some(meta);
            }
            _ => {}
        }
    }

    Ok(payload)
}

pub(crate) fn workspace_root_payload_from_body(
    body: &[u8],
) -> Result<WorkspaceRootPayload, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(WorkspaceRootPayload::default());
    }

    serde_json::from_slice::<WorkspaceRootPayload>(body).map_err(|error| {
        ServiceError::BadRequest(format!("Request body is not a valid resolve request: {error}."))
    })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

pub(crate) async fn write_json_response<W, T>(
    writer: &mut W,
    status: u16,
    body: &T,
) -> Result<(), ServiceError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(body)
        .map_err(|error| ServiceError::BadRequest(format!("Could not encode response: {error}.")))?;
    let head = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status_text(status),
        payload.len()
    );

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub(crate) async fn write_event_stream_head<W>(writer: &mut W) -> Result<(), ServiceError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\nX-Accel-Buffering: no\r\n\r\n",
        )
        .await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_request_head_and_body() {
        let raw = b"POST /workspace/resolve HTTP/1.1\r\nHost: x\r\nContent-Length: 16\r\n\r\n{\"rootName\":\"p\"}".to_vec();
        let mut reader = std::io::Cursor::new(raw);
        let request = read_http_request(&mut reader).await.unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/workspace/resolve");
        assert_eq!(request.body, b"{\"rootName\":\"p\"}".to_vec());
    }

    #[tokio::test]
    async fn rejects_truncated_head() {
        let mut reader = std::io::Cursor::new(b"GET / HTTP/1.1\r\n".to_vec());
        assert!(matches!(
            read_http_request(&mut reader).await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_oversized_body_declaration() {
        let head = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_BODY_BYTES + 1
        );
        assert!(matches!(
            parse_request_head(&head),
            Err(ServiceError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn decodes_repeated_known_worktrees_and_meta() {
        let (path, query) = split_target(
            "/workspace/events?rootName=proj&knownWorktree=feature%2Flogin-fix&knownWorktree=main&workspaceMeta=%7B%22version%22%3A1%7D",
        );
        assert_eq!(path, "/workspace/events");

        let payload = workspace_root_payload_from_query(&query).unwrap();
        assert_eq!(payload.root_name.as_deref(), Some("proj"));
        assert_eq!(
            payload.known_worktrees,
            vec!["feature/login-fix".to_string(), "main".to_string()]
        );
        assert_eq!(payload.workspace_meta.unwrap().version, Some(1));
    }

    #[test]
    fn malformed_meta_query_is_a_bad_request() {
        let query = vec![("workspaceMeta".to_string(), "{nope".to_string())];
        assert!(matches!(
            workspace_root_payload_from_query(&query),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_body_decodes_to_default_payload() {
        let payload = workspace_root_payload_from_body(b"  ").unwrap();
        assert!(payload.root_name.is_none());
        assert!(payload.known_worktrees.is_empty());
    }
}
