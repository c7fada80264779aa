//!The control surface: status endpoints and live MJPEG streams of the annotated frames.

pub(crate) mod server;

use std::net::{SocketAddr, TcpListener};

use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{debug, error, info};
use watchpost_core::error::{Result, WatchpostError};

pub use crate::server::state::AppState;

pub fn router(state: AppState) -> Router {
    server::endpoint::routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .with_state(state)
}

///A bound, not yet serving, http server.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: AppState,
}

impl Server {
    ///Binds the listening socket. Failing here is fatal for the process.
    pub fn bind(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|err| WatchpostError::config(format!("cannot bind {}: {}", addr, err)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            state,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    ///Serves until `shutdown` fires. Open streams end at that point too, so the server can drain.
    pub fn serve(self, shutdown: CancellationToken) -> JoinHandle<()> {
        let Server {
            listener,
            local_addr,
            mut state,
        } = self;
        state.shutdown = shutdown.clone();
        let app = router(state);

        tokio::spawn(async move {
            let builder = match axum::Server::from_tcp(listener) {
                Ok(builder) => builder,
                Err(err) => {
                    error!("cannot serve on {}: {}", local_addr, err);
                    return;
                }
            };
            info!("listening on http://{}", local_addr);
            let served = builder
                .serve(app.into_make_service())
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(err) = served {
                error!("http server failed: {}", err);
            }
            debug!("http server shutting down!");
        })
    }
}
