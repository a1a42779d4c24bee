//! Client for the daemon protocol.
//!
//! Used by the one-shot CLI subcommands and by the integration tests. A
//! [`Client`] holds one connection and issues requests one at a time, the same
//! way the server reads them.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::error::{ProtocolError, ServerError};
use crate::protocol::{
    default_update_freq, kind, CountRequest, Envelope, IndexRequest, Request, SearchRequest,
    SearchResults, MAX_FRAME_LENGTH,
};
use crate::{Error, Result};

/// A connection to a running daemon.
#[derive(Debug)]
pub struct Client {
    framed: Framed<TcpStream, LinesCodec>,
}

fn codec_error(e: LinesCodecError) -> Error {
    match e {
        LinesCodecError::Io(e) => Error::Io(e),
        LinesCodecError::MaxLineLengthExceeded => {
            ProtocolError::Malformed("response frame too long".to_string()).into()
        }
    }
}

fn closed() -> Error {
    ServerError::Request("connection closed by daemon".to_string()).into()
}

impl Client {
    /// Connect to a daemon.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH)),
        })
    }

    async fn send(&mut self, request: &Request) -> Result<()> {
        let frame = request.to_envelope()?.to_frame()?;
        self.framed.send(frame).await.map_err(codec_error)
    }

    async fn next_line(&mut self) -> Result<String> {
        match self.framed.next().await {
            Some(line) => line.map_err(codec_error),
            None => Err(closed()),
        }
    }

    async fn next_envelope(&mut self) -> Result<Envelope> {
        let line = self.next_line().await?;
        Ok(Envelope::parse(&line)?)
    }

    /// Check that the daemon is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the reply is not `pong`.
    pub async fn ping(&mut self) -> Result<()> {
        self.send(&Request::Ping).await?;
        let reply = self.next_envelope().await?;
        if reply.kind == kind::PONG {
            Ok(())
        } else {
            Err(ServerError::Request(format!("unexpected reply '{}'", reply.kind)).into())
        }
    }

    /// Count the files under `dir`, reporting every progress frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails before the `count.done` frame.
    pub async fn count(&mut self, dir: &str, on_progress: impl FnMut(u64)) -> Result<u64> {
        let request = Request::Count(CountRequest {
            dir: dir.to_string(),
            update_freq: default_update_freq(),
        });
        self.walk(kind::COUNT, &request, on_progress).await
    }

    /// Index the files under `dir`, reporting every progress frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails before the `index.done` frame.
    pub async fn index(&mut self, dir: &str, on_progress: impl FnMut(u64)) -> Result<u64> {
        let request = Request::Index(IndexRequest {
            dir: dir.to_string(),
            update_freq: default_update_freq(),
        });
        self.walk(kind::INDEX, &request, on_progress).await
    }

    async fn walk(
        &mut self,
        op: &str,
        request: &Request,
        mut on_progress: impl FnMut(u64),
    ) -> Result<u64> {
        self.send(request).await?;
        let mut last = 0;
        loop {
            let frame = self.next_envelope().await?;
            if frame.is_progress_of(op) {
                last = frame.payload()?;
                on_progress(last);
            } else if frame.is_done_of(op) {
                // A bare `.done` frame carries no count; the last progress value is final
                if frame.data.is_empty() {
                    return Ok(last);
                }
                return Ok(frame.payload()?);
            } else {
                tracing::debug!(kind = %frame.kind, "Ignoring unexpected frame");
            }
        }
    }

    /// Run a search against the daemon's last persisted index.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the daemon replies with a
    /// `search.error` frame.
    pub async fn search(&mut self, request: &SearchRequest) -> Result<SearchResults> {
        self.send(&Request::Search(request.clone())).await?;
        let line = self.next_line().await?;
        let reply: serde_json::Value = serde_json::from_str(&line)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        // Results are a bare array; only an object can be an error envelope
        if reply.is_object() {
            let envelope: Envelope = serde_json::from_value(reply)
                .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
            return Err(ServerError::Request(envelope.data).into());
        }

        let decoded = if request.fuzzy {
            serde_json::from_value(reply).map(SearchResults::Fuzzy)
        } else {
            serde_json::from_value(reply).map(SearchResults::Exact)
        };
        decoded.map_err(|e| ProtocolError::payload(kind::SEARCH, e).into())
    }

    /// Ask the daemon to shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be written.
    pub async fn kill(mut self, reason: Option<String>) -> Result<()> {
        self.send(&Request::Kill { reason }).await?;
        // The daemon closes the connection once it has stopped reading
        while let Some(Ok(_)) = self.framed.next().await {}
        Ok(())
    }
}
