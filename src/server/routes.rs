//! Request routing and handlers
//!
//! Every feed is served under `/<feed>`:
//!
//! | Path                  | Response                                   |
//! |-----------------------|--------------------------------------------|
//! | `/<feed>`             | HTML viewer page                           |
//! | `/<feed>/stream`      | `multipart/x-mixed-replace` JPEG stream    |
//! | `/<feed>/video-feed`  | same as `/stream`                          |
//! | `/<feed>/test-frame`  | single JPEG, live or placeholder           |
//!
//! All three start the capture loop on first use.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::http;
use crate::codec::{CONTENT_TYPE, PART_CONTENT_TYPE};
use crate::feed::Feed;
use crate::session::CancelToken;
use crate::stats::ServerMetrics;

/// Seconds a rejected viewer is asked to wait before retrying
pub const RETRY_AFTER_SECS: &str = "5";

/// Resolved request target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Viewer page
    Page,
    /// Live multipart stream
    Stream,
    /// Single still frame
    TestFrame,
    /// Anything else
    NotFound,
}

impl Route {
    /// Match `path` against the routes of `feed_name`
    pub fn resolve(feed_name: &str, path: &str) -> Route {
        let rest = path
            .strip_prefix('/')
            .and_then(|p| p.strip_prefix(feed_name));

        match rest {
            Some("") | Some("/") => Route::Page,
            Some("/stream") | Some("/video-feed") => Route::Stream,
            Some("/test-frame") => Route::TestFrame,
            _ => Route::NotFound,
        }
    }
}

/// The HTML viewer page for `feed_name`
pub fn viewer_page(feed_name: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{name}</title>\n\
         <style>\n\
         body {{ margin: 0; background: #111; display: flex; align-items: center; \
         justify-content: center; height: 100vh; }}\n\
         img {{ max-width: 100%; max-height: 100%; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <img src=\"/{name}/stream\" alt=\"{name} live feed\">\n\
         </body>\n\
         </html>\n",
        name = feed_name
    )
}

pub(crate) async fn serve_page(
    writer: &mut OwnedWriteHalf,
    feed: &Feed,
    feed_name: &str,
) -> io::Result<()> {
    feed.ensure_started().await;
    let page = viewer_page(feed_name);
    http::write_response(writer, 200, "text/html; charset=utf-8", page.as_bytes(), &[]).await
}

pub(crate) async fn serve_test_frame(writer: &mut OwnedWriteHalf, feed: &Feed) -> io::Result<()> {
    feed.ensure_started().await;
    let frame = feed.current_frame();
    http::write_response(writer, 200, PART_CONTENT_TYPE, &frame, &[]).await
}

pub(crate) async fn serve_not_found(writer: &mut OwnedWriteHalf) -> io::Result<()> {
    http::write_text(writer, 404, "not found\n", &[]).await
}

/// Stream chunks to one viewer until it leaves
pub(crate) async fn serve_stream(
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    peer: SocketAddr,
    feed: Arc<Feed>,
    metrics: &ServerMetrics,
) -> io::Result<()> {
    feed.ensure_started().await;

    let session = match feed.open_session() {
        Ok(session) => session,
        Err(e) => {
            metrics.viewer_rejected();
            tracing::warn!(peer = %peer, error = %e, "Viewer rejected");
            return http::write_text(
                &mut writer,
                503,
                "viewer limit reached, retry later\n",
                &[("Retry-After", RETRY_AFTER_SECS)],
            )
            .await;
        }
    };

    let head = http::response_head(200, CONTENT_TYPE, None, &[]);
    writer.write_all(head.as_bytes()).await?;

    let session_id = session.id();
    metrics.viewer_opened();
    tracing::info!(session_id = session_id, peer = %peer, "Viewer connected");

    let watcher = tokio::spawn(watch_transport(
        reader,
        session.cancel_token(),
        Arc::clone(&feed),
    ));

    let end = session.stream_to(&mut writer).await;
    watcher.abort();
    metrics.viewer_closed();

    tracing::info!(session_id = session_id, peer = %peer, reason = %end, "Viewer disconnected");
    Ok(())
}

/// Cancel the session as soon as the viewer hangs up or the feed closes
///
/// A viewer never sends anything after its request head, so EOF or an error
/// on the read half means the connection is gone.
async fn watch_transport(mut reader: OwnedReadHalf, cancel: CancelToken, feed: Arc<Feed>) {
    let mut buf = [0u8; 256];
    let hangup = async {
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    tokio::select! {
        _ = hangup => {}
        _ = feed.closed() => {}
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_routes() {
        assert_eq!(Route::resolve("cam", "/cam"), Route::Page);
        assert_eq!(Route::resolve("cam", "/cam/"), Route::Page);
        assert_eq!(Route::resolve("cam", "/cam/stream"), Route::Stream);
        assert_eq!(Route::resolve("cam", "/cam/video-feed"), Route::Stream);
        assert_eq!(Route::resolve("cam", "/cam/test-frame"), Route::TestFrame);
    }

    #[test]
    fn test_resolve_unknown() {
        assert_eq!(Route::resolve("cam", "/"), Route::NotFound);
        assert_eq!(Route::resolve("cam", "/camera"), Route::NotFound);
        assert_eq!(Route::resolve("cam", "/cam/stream/extra"), Route::NotFound);
        assert_eq!(Route::resolve("cam", "/other/stream"), Route::NotFound);
    }

    #[test]
    fn test_viewer_page_embeds_stream() {
        let page = viewer_page("borah-cam");
        assert!(page.contains("<img src=\"/borah-cam/stream\""));
        assert!(page.contains("<title>borah-cam</title>"));
    }
}
