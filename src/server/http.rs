//! HTTP server for the SMS log receiver
//!
//! Built directly on `hyper` and `tokio`:
//! - one tokio task per connection, HTTP/1.1
//! - `POST <upload_path>`: multipart upload
//! - `GET /health`: liveness probe
//!
//! # Example
//!
//! ```no_run
//! use smslog_receiver::config::Config;
//! use smslog_receiver::server::Server;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.server.address = "127.0.0.1:0".to_string();
//! let server = Server::bind(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::response::ErrorTemplate;
use crate::server::ServerError;
use crate::storage::SmsLogStore;
use crate::upload::{MultipartReceiver, UploadHandler};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, Instrument};

/// Per-server state shared by all connections
struct AppState {
    upload_path: String,
    receiver: MultipartReceiver,
    handler: UploadHandler,
}

/// Upload server bound to a local address
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the configured address and load the error template.
    ///
    /// If port 0 is specified, the OS assigns an available port; see
    /// [`Server::local_addr`].
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let template = ErrorTemplate::from_config(config.storage.error_template.as_deref())?;
        let handler = UploadHandler::new(SmsLogStore::new(&config.storage), template);
        Self::bind_with_handler(config, handler).await
    }

    /// Bind with a prepared handler, e.g. one with a fixed clock
    pub async fn bind_with_handler(
        config: Config,
        handler: UploadHandler,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        // Actual bound address, important for port 0
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(
            address = %local_addr,
            upload_path = %config.server.upload_path,
            base_dir = %handler.store().layout().base_dir().display(),
            "Server bound"
        );

        let state = AppState {
            upload_path: config.server.upload_path.clone(),
            receiver: MultipartReceiver::new(&config.upload),
            handler,
        };

        Ok(Self {
            state: Arc::new(state),
            listener,
            local_addr,
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve connections until the process ends
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve connections until `shutdown` completes.
    ///
    /// Connections already accepted are allowed to finish.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Accepting connections on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    let span = tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        peer = %peer_addr,
                    );
                    async move { handle_request(req, state).await }.instrument(span)
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Route a request
///
/// * `GET /health` - returns "ok"
/// * `POST {upload_path}` - multipart upload
/// * other methods on `{upload_path}` - 405
/// * everything else - 404
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();

    if path == "/health" && req.method() == Method::GET {
        return Ok(respond(StatusCode::OK, "text/plain", Bytes::from_static(b"ok")));
    }

    if path != state.upload_path {
        debug!("No route for {}", path);
        return Ok(respond(
            StatusCode::NOT_FOUND,
            "text/plain",
            Bytes::from_static(b"Not Found"),
        ));
    }

    if req.method() != Method::POST {
        let mut response = respond(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            Bytes::from_static(b"Method Not Allowed"),
        );
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
        return Ok(response);
    }

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let received = state
        .receiver
        .receive(content_type.as_deref(), req.into_body().into_data_stream())
        .await;
    debug!(status = received.status.code(), "Upload received");

    let outcome = state.handler.handle(received).await;
    let status =
        StatusCode::from_u16(outcome.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Ok(respond(
        status,
        outcome.content_type(),
        Bytes::from(outcome.body().to_string()),
    ))
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
