//! Request handlers.
//!
//! Each handler writes its own response frames. A write failure means the
//! client is gone: the handler logs it, finishes whatever background work is
//! already running, and tells the session to close.

use std::time::Instant;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec};

use super::session::SessionContext;
use crate::protocol::{
    encode_frame, kind, CountRequest, Envelope, IndexRequest, Request, SearchRequest,
    SearchResults,
};
use crate::search::FuzzyRanker;
use crate::snapshot;
use crate::trie::{PathTrie, DEFAULT_RENDER_LIMIT};
use crate::walker::{WalkMode, WalkOutcome, Walker};

/// What the session should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next frame.
    Continue,
    /// Close the connection.
    Close,
}

type Frames<S> = Framed<S, LinesCodec>;

/// Route a decoded request to its handler.
pub async fn dispatch<S>(request: Request, framed: &mut Frames<S>, ctx: &SessionContext) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let flow = match request {
        Request::Ping => ping(framed).await,
        Request::Count(req) => count(req, framed, ctx).await,
        Request::Index(req) => index(req, framed, ctx).await,
        Request::Search(req) => search(req, framed, ctx).await,
        Request::Kill { reason } => kill(reason.as_deref(), ctx),
        Request::Unknown(other) => {
            tracing::warn!(kind = %other, "Unknown message type");
            Flow::Continue
        }
    };
    tracing::debug!(elapsed = ?started.elapsed(), "Request handled");
    flow
}

async fn send_line<S>(framed: &mut Frames<S>, line: String) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match framed.send(line).await {
        Ok(()) => Flow::Continue,
        Err(e) => {
            tracing::warn!(error = %e, "Error writing message");
            Flow::Close
        }
    }
}

async fn send_envelope<S>(framed: &mut Frames<S>, envelope: &Envelope) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match envelope.to_frame() {
        Ok(line) => send_line(framed, line).await,
        Err(e) => {
            tracing::error!(error = %e, kind = %envelope.kind, "Error encoding message");
            Flow::Continue
        }
    }
}

async fn ping<S>(framed: &mut Frames<S>) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::debug!("Received ping message");
    send_envelope(framed, &Envelope::bare(kind::PONG)).await
}

fn kill(reason: Option<&str>, ctx: &SessionContext) -> Flow {
    match reason {
        Some(reason) => tracing::info!(reason, "Received kill message"),
        None => tracing::info!("Received kill message"),
    }
    ctx.shutdown.cancel();
    Flow::Close
}

/// Run `walker` on the blocking pool, forwarding every progress sample as an
/// `<op>.progress` frame. Samples are drained to the end even after the client
/// is gone so the walk always completes.
async fn stream_walk<S>(
    op: &str,
    walker: Walker,
    framed: &mut Frames<S>,
) -> Option<(WalkOutcome, Flow)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut progress, handle) = walker.spawn();
    let mut flow = Flow::Continue;

    while let Some(count) = progress.recv().await {
        if flow == Flow::Continue {
            flow = send_envelope(framed, &Envelope::progress(op, count)).await;
        }
    }

    match handle.await {
        Ok(outcome) => Some((outcome, flow)),
        Err(e) => {
            tracing::error!(error = %e, "Walk task failed");
            None
        }
    }
}

async fn count<S>(req: CountRequest, framed: &mut Frames<S>, ctx: &SessionContext) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::info!(dir = %req.dir, "Count");

    let walker = Walker::new(&req.dir, WalkMode::Count).with_sample_interval(ctx.sample_interval);
    let Some((outcome, flow)) = stream_walk(kind::COUNT, walker, framed).await else {
        return Flow::Close;
    };

    if let Some(error) = &outcome.error {
        tracing::warn!(%error, count = outcome.count, "Count stopped early");
    }
    if flow == Flow::Close {
        return flow;
    }
    send_envelope(framed, &Envelope::done(kind::COUNT, outcome.count)).await
}

async fn index<S>(req: IndexRequest, framed: &mut Frames<S>, ctx: &SessionContext) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::info!(dir = %req.dir, "Index");

    let walker = Walker::new(&req.dir, WalkMode::Index).with_sample_interval(ctx.sample_interval);
    let Some((outcome, flow)) = stream_walk(kind::INDEX, walker, framed).await else {
        return Flow::Close;
    };

    if let Some(error) = &outcome.error {
        tracing::warn!(%error, count = outcome.count, "Index stopped early, persisting partial index");
    }

    if let Some(trie) = outcome.trie {
        tracing::trace!(tree = %trie.render(DEFAULT_RENDER_LIMIT), "Indexed tree");
        match snapshot::save_async(trie, ctx.snapshot_path.clone()).await {
            Ok(()) => tracing::info!(
                path = %ctx.snapshot_path.display(),
                entries = outcome.count,
                "Index persisted"
            ),
            Err(e) => tracing::error!(error = %e, "Error saving index"),
        }
    }

    if flow == Flow::Close {
        return flow;
    }
    send_envelope(framed, &Envelope::done(kind::INDEX, outcome.count)).await
}

async fn search<S>(req: SearchRequest, framed: &mut Frames<S>, ctx: &SessionContext) -> Flow
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::info!(search = %req.search, dir = %req.dir, fuzzy = req.fuzzy, "Search");

    let started = Instant::now();
    let trie = match snapshot::load_async(ctx.snapshot_path.clone()).await {
        Ok(trie) => trie,
        Err(e) => {
            tracing::error!(error = %e, "Error loading index");
            return send_envelope(framed, &Envelope::error(kind::SEARCH, e.to_string())).await;
        }
    };
    tracing::debug!(elapsed = ?started.elapsed(), "Index loaded");

    let started = Instant::now();
    let results = match tokio::task::spawn_blocking(move || execute_search(&trie, &req)).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, "Search task failed");
            return Flow::Continue;
        }
    };
    tracing::debug!(elapsed = ?started.elapsed(), results = results.len(), "Search finished");

    match encode_frame(&results) {
        Ok(line) => send_line(framed, line).await,
        Err(e) => {
            tracing::error!(error = %e, "Error encoding search results");
            Flow::Continue
        }
    }
}

/// Evaluate a search request against a loaded index.
///
/// Exact searches match filenames; fuzzy searches rank every indexed path.
/// Either way the result list is truncated to `max_results` last.
#[must_use]
pub fn execute_search(trie: &PathTrie, request: &SearchRequest) -> SearchResults {
    if request.fuzzy {
        let candidates = trie.all_paths();
        let mut matches = FuzzyRanker::new()
            .with_min_score(request.min_score)
            .rank(&request.search, &candidates);
        matches.truncate(request.max_results);
        SearchResults::Fuzzy(matches)
    } else {
        let mut paths = trie.exact_search(&request.search);
        paths.truncate(request.max_results);
        SearchResults::Exact(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio_util::sync::CancellationToken;

    fn trie() -> PathTrie {
        ["/a/readme.md", "/a/readme_old.md", "/a/xyz.md", "/b/readme.md"]
            .into_iter()
            .collect()
    }

    fn context(snapshot_path: &Path) -> Arc<SessionContext> {
        Arc::new(SessionContext {
            snapshot_path: snapshot_path.to_path_buf(),
            sample_interval: Duration::from_millis(10),
            shutdown: CancellationToken::new(),
        })
    }

    fn pair() -> (Frames<DuplexStream>, Frames<DuplexStream>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            Framed::new(a, LinesCodec::new()),
            Framed::new(b, LinesCodec::new()),
        )
    }

    #[test]
    fn test_execute_exact_search() {
        let results = execute_search(&trie(), &SearchRequest::exact("readme.md"));
        assert_eq!(
            results,
            SearchResults::Exact(vec!["/a/readme.md".to_string(), "/b/readme.md".to_string()])
        );
    }

    #[test]
    fn test_execute_exact_search_truncates() {
        let results = execute_search(&trie(), &SearchRequest::exact("readme.md").with_max_results(1));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_execute_fuzzy_search() {
        let results = execute_search(&trie(), &SearchRequest::fuzzy("readme"));
        let SearchResults::Fuzzy(matches) = results else {
            panic!("expected fuzzy results");
        };
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.path != "/a/xyz.md"));
    }

    #[test]
    fn test_execute_fuzzy_search_truncates_after_ranking() {
        let all = execute_search(&trie(), &SearchRequest::fuzzy("readme"));
        let top = execute_search(&trie(), &SearchRequest::fuzzy("readme").with_max_results(1));
        let (SearchResults::Fuzzy(all), SearchResults::Fuzzy(top)) = (all, top) else {
            panic!("expected fuzzy results");
        };
        assert_eq!(top, all[..1].to_vec());
    }

    #[tokio::test]
    async fn test_count_streams_progress_then_done() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        let ctx = context(&tmp.path().join("trie.gob"));
        let (mut server, mut client) = pair();

        let req = CountRequest {
            dir: tmp.path().to_string_lossy().into_owned(),
            update_freq: 10.0,
        };
        let flow = count(req, &mut server, &ctx).await;
        assert_eq!(flow, Flow::Continue);
        drop(server);

        let mut frames = Vec::new();
        while let Some(Ok(line)) = client.next().await {
            frames.push(Envelope::parse(&line).unwrap());
        }

        let done = frames.last().unwrap();
        assert_eq!(*done, Envelope::done(kind::COUNT, 2));
        assert!(frames[..frames.len() - 1]
            .iter()
            .all(|f| f.is_progress_of(kind::COUNT)));
        assert_eq!(frames.iter().filter(|f| f.is_done_of(kind::COUNT)).count(), 1);
    }

    #[tokio::test]
    async fn test_index_persists_before_done() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("x");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("sub").join("a.txt"), "a").unwrap();
        let snapshot_path = tmp.path().join("data").join("trie.gob");
        let ctx = context(&snapshot_path);
        let (mut server, _client) = pair();

        let req = IndexRequest {
            dir: root.to_string_lossy().into_owned(),
            update_freq: 10.0,
        };
        assert_eq!(index(req, &mut server, &ctx).await, Flow::Continue);

        let loaded = snapshot::load(&snapshot_path).unwrap();
        assert_eq!(loaded.exact_search("a.txt").len(), 2);
    }

    #[tokio::test]
    async fn test_search_without_snapshot_replies_with_error_frame() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = context(&tmp.path().join("missing.gob"));
        let (mut server, mut client) = pair();

        let flow = search(SearchRequest::exact("a.txt"), &mut server, &ctx).await;
        assert_eq!(flow, Flow::Continue);

        let reply = Envelope::parse(&client.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.kind, "search.error");
        assert!(reply.data.contains("missing.gob"));
    }

    #[tokio::test]
    async fn test_search_writes_bare_array() {
        let tmp = tempfile::TempDir::new().unwrap();
        let snapshot_path = tmp.path().join("trie.gob");
        snapshot::save(&trie(), &snapshot_path).unwrap();
        let ctx = context(&snapshot_path);
        let (mut server, mut client) = pair();

        search(SearchRequest::exact("xyz.md"), &mut server, &ctx).await;

        let line = client.next().await.unwrap().unwrap();
        assert_eq!(line, r#"["/a/xyz.md"]"#);
    }

    #[tokio::test]
    async fn test_count_on_closed_client_still_finishes() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        let ctx = context(&tmp.path().join("trie.gob"));
        let (mut server, client) = pair();
        drop(client);

        let req = CountRequest {
            dir: tmp.path().to_string_lossy().into_owned(),
            update_freq: 10.0,
        };
        assert_eq!(count(req, &mut server, &ctx).await, Flow::Close);
    }
}
