//! HTTP framing for the request handler
//!
//! Routes:
//! - `POST /sync/plan` - [`SyncHandler::plan`]
//! - `POST /sync/complete` - [`SyncHandler::complete`]
//! - `POST /sync/delete` - [`SyncHandler::delete_data`]
//! - `GET /health` - liveness check
//!
//! Sync routes require `Authorization: Bearer <jwt>`. Failures are answered
//! with `{"error": "<message>"}` and the status from [`ServerError::status`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::handler::SyncHandler;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Accepts connections on `listener` until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    handler: Arc<SyncHandler>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(addr = %addr, "Request handler listening");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let handler = Arc::clone(&handler);

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let handler = Arc::clone(&handler);
                        async move { handle_request(&handler, req).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(peer = %peer, error = %e, "HTTP connection error");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                info!("Request handler shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Handles a single HTTP request
pub async fn handle_request<B>(
    handler: &SyncHandler,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match route(handler, req).await {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_server_error() {
                error!(%method, %path, error = %err, "Request failed");
            } else {
                debug!(%method, %path, error = %err, "Request refused");
            }
            let body = serde_json::json!({ "error": err.public_message() }).to_string();
            json_bytes(err.status(), Bytes::from(body))
        }
    };

    Ok(response)
}

async fn route<B>(handler: &SyncHandler, req: Request<B>) -> Result<Response<Full<Bytes>>, ServerError>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" })),
        (&Method::POST, "/sync/plan") => {
            let bearer = bearer(&req)?;
            let request = read_json(req).await?;
            json_response(StatusCode::OK, &handler.plan(&bearer, request).await?)
        }
        (&Method::POST, "/sync/complete") => {
            let bearer = bearer(&req)?;
            let request = read_json(req).await?;
            json_response(StatusCode::OK, &handler.complete(&bearer, request).await?)
        }
        (&Method::POST, "/sync/delete") => {
            let bearer = bearer(&req)?;
            let request = read_json(req).await?;
            json_response(StatusCode::OK, &handler.delete_data(&bearer, request).await?)
        }
        (method, path @ ("/health" | "/sync/plan" | "/sync/complete" | "/sync/delete")) => {
            Err(ServerError::MethodNotAllowed(format!("{method} {path}")))
        }
        (_, path) => Err(ServerError::NotFound(path.to_string())),
    }
}

/// Extracts the bearer credential from the Authorization header
fn bearer<B>(req: &Request<B>) -> Result<String, ServerError> {
    let value = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ServerError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| ServerError::Unauthorized("malformed Authorization header".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServerError::Unauthorized("expected a Bearer credential".into()))
}

async fn read_json<B, T>(req: Request<B>) -> Result<T, ServerError>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
    T: DeserializeOwned,
{
    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ServerError::PayloadTooLarge
            } else {
                ServerError::InvalidRequest(format!("unreadable body: {e}"))
            }
        })?
        .to_bytes();

    serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Full<Bytes>>, ServerError> {
    let body = serde_json::to_vec(value).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(json_bytes(status, Bytes::from(body)))
}

fn json_bytes(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
