//! Per-connection session loop.
//!
//! A session reads one frame, dispatches it, and only reads the next frame
//! once the handler has returned. Malformed frames and read failures close the
//! connection without a reply. The session also stops as soon as the daemon's
//! shutdown token fires, abandoning any request in flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::handlers::{dispatch, Flow};
use super::observability::spans;
use crate::protocol::{Request, MAX_FRAME_LENGTH};

/// State shared by every session of one server.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Snapshot read by `search` and written by `index`.
    pub snapshot_path: PathBuf,
    /// Walker progress sampling interval.
    pub sample_interval: Duration,
    /// Fired by `kill`; stops the accept loop and every session.
    pub shutdown: CancellationToken,
}

/// Short identifier for log correlation.
#[must_use]
pub fn new_session_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Serve one connection until EOF, a fatal frame error, or shutdown.
pub async fn run_session<S>(stream: S, ctx: Arc<SessionContext>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::info!("New connection established");
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));

    loop {
        let next = tokio::select! {
            () = ctx.shutdown.cancelled() => break,
            next = framed.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Error reading message");
                break;
            }
            None => break,
        };

        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Closing connection on malformed message");
                break;
            }
        };

        let span = spans::request_span(request.kind());
        let flow = tokio::select! {
            () = ctx.shutdown.cancelled() => Flow::Close,
            flow = dispatch(request, &mut framed, &ctx).instrument(span) => flow,
        };

        if flow == Flow::Close {
            break;
        }
    }

    tracing::info!("Connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn context(snapshot_path: PathBuf) -> Arc<SessionContext> {
        Arc::new(SessionContext {
            snapshot_path,
            sample_interval: Duration::from_millis(10),
            shutdown: CancellationToken::new(),
        })
    }

    fn client_side(stream: DuplexStream) -> Framed<DuplexStream, LinesCodec> {
        Framed::new(stream, LinesCodec::new())
    }

    #[tokio::test]
    async fn test_ping_pong_twice_on_one_session() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (client, server) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(server, context(tmp.path().join("trie.gob"))));

        let mut client = client_side(client);
        for _ in 0..2 {
            client.send(r#"{"type":"ping"}"#).await.unwrap();
            let reply = client.next().await.unwrap().unwrap();
            assert_eq!(reply, r#"{"type":"pong"}"#);
        }

        drop(client);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_without_reply() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (client, server) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(server, context(tmp.path().join("trie.gob"))));

        let mut client = client_side(client);
        client.send("this is not json").await.unwrap();

        assert!(client.next().await.is_none());
        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_payload_closes_without_reply() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (client, server) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(server, context(tmp.path().join("trie.gob"))));

        let mut client = client_side(client);
        client
            .send(r#"{"type":"count","data":"{\"dir\":42}"}"#)
            .await
            .unwrap();

        assert!(client.next().await.is_none());
        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_type_keeps_session_open() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (client, server) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(server, context(tmp.path().join("trie.gob"))));

        let mut client = client_side(client);
        client.send(r#"{"type":"frobnicate"}"#).await.unwrap();
        client.send(r#"{"type":"ping"}"#).await.unwrap();
        assert_eq!(client.next().await.unwrap().unwrap(), r#"{"type":"pong"}"#);

        drop(client);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_kill_cancels_shutdown_token() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = context(tmp.path().join("trie.gob"));
        let (client, server) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(server, Arc::clone(&ctx)));

        let mut client = client_side(client);
        client
            .send(r#"{"type":"kill","data":"test over"}"#)
            .await
            .unwrap();

        assert!(client.next().await.is_none());
        session.await.unwrap();
        assert!(ctx.shutdown.is_cancelled());
    }

    /// Starts a `count` on a session whose client never reads, so the
    /// handler stays blocked writing its first progress frame.
    async fn stalled_count(
        ctx: &Arc<SessionContext>,
        dir: &std::path::Path,
    ) -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(16);
        let session = tokio::spawn(run_session(server, Arc::clone(ctx)));

        let frame = Request::Count(crate::protocol::CountRequest {
            dir: dir.to_string_lossy().into_owned(),
            update_freq: 10.0,
        })
        .to_envelope()
        .unwrap()
        .to_frame()
        .unwrap();
        let mut client = client_side(client);
        client.send(frame).await.unwrap();
        (client.into_inner(), session)
    }

    #[tokio::test]
    async fn test_ping_answered_while_other_session_walks() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        let ctx = context(tmp.path().join("trie.gob"));
        let (_busy_client, busy) = stalled_count(&ctx, tmp.path()).await;

        let (client, server) = tokio::io::duplex(4096);
        let idle = tokio::spawn(run_session(server, Arc::clone(&ctx)));
        let mut client = client_side(client);
        client.send(r#"{"type":"ping"}"#).await.unwrap();
        assert_eq!(client.next().await.unwrap().unwrap(), r#"{"type":"pong"}"#);

        assert!(!busy.is_finished());
        ctx.shutdown.cancel();
        busy.await.unwrap();
        idle.await.unwrap();
    }

    #[tokio::test]
    async fn test_kill_abandons_in_flight_count_on_other_session() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        let ctx = context(tmp.path().join("trie.gob"));
        let (mut busy_client, busy) = stalled_count(&ctx, tmp.path()).await;

        let (client, server) = tokio::io::duplex(4096);
        let killer = tokio::spawn(run_session(server, Arc::clone(&ctx)));
        let mut client = client_side(client);
        client.send(r#"{"type":"kill","data":"busy"}"#).await.unwrap();
        assert!(client.next().await.is_none());
        killer.await.unwrap();

        busy.await.unwrap();
        let mut received = Vec::new();
        busy_client.read_to_end(&mut received).await.unwrap();
        let received = String::from_utf8_lossy(&received);
        assert!(!received.contains("count.done"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_session() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = context(tmp.path().join("trie.gob"));
        let (_client, server) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(server, Arc::clone(&ctx)));

        ctx.shutdown.cancel();
        session.await.unwrap();
    }

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
