//! One HTTP connection: read the request, dispatch, close

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use super::config::ServerConfig;
use super::http::{self, RequestError};
use super::routes::{self, Route};
use crate::error::is_disconnect;
use crate::feed::Feed;
use crate::stats::ServerMetrics;

pub(crate) struct Connection {
    id: u64,
    socket: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    feed: Arc<Feed>,
    metrics: Arc<ServerMetrics>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        socket: TcpStream,
        peer: SocketAddr,
        config: Arc<ServerConfig>,
        feed: Arc<Feed>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            id,
            socket,
            peer,
            config,
            feed,
            metrics,
        }
    }

    pub(crate) async fn run(self) -> io::Result<()> {
        let Connection {
            id,
            socket,
            peer,
            config,
            feed,
            metrics,
        } = self;
        let (mut reader, mut writer) = socket.into_split();

        let request = match http::read_request(
            &mut reader,
            config.max_request_bytes,
            config.request_timeout,
        )
        .await
        {
            Ok(request) => request,
            Err(RequestError::Io(e)) if is_disconnect(&e) => return Ok(()),
            Err(RequestError::Io(e)) => return Err(e),
            Err(e) => {
                tracing::debug!(connection_id = id, peer = %peer, error = %e, "Bad request");
                let status = match e {
                    RequestError::TimedOut => 408,
                    RequestError::TooLarge => 431,
                    _ => 400,
                };
                return http::write_text(&mut writer, status, &format!("{}\n", e), &[]).await;
            }
        };

        tracing::debug!(
            connection_id = id,
            peer = %peer,
            method = %request.method,
            path = %request.path,
            "Request"
        );

        if request.method != "GET" {
            return http::write_text(
                &mut writer,
                405,
                "method not allowed\n",
                &[("Allow", "GET")],
            )
            .await;
        }

        match Route::resolve(&config.feed_name, &request.path) {
            Route::Page => routes::serve_page(&mut writer, &feed, &config.feed_name).await,
            Route::TestFrame => routes::serve_test_frame(&mut writer, &feed).await,
            Route::Stream => routes::serve_stream(reader, writer, peer, feed, &metrics).await,
            Route::NotFound => routes::serve_not_found(&mut writer).await,
        }
    }
}
