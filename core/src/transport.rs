//! Transport seam: the host capability that actually moves bytes.
//!
//! # Design
//! The builder never touches sockets. At `start()` it hands a frozen
//! [`RequestHead`] to a [`Transport`] chosen by scheme and receives a
//! [`Connection`]. Body chunks are pushed with `write`; `finish` signals the
//! end of the body and resolves once the status line and headers arrive,
//! yielding the body as a stream of chunks.
//!
//! [`UreqTransport`] is the default. ureq is blocking, so each exchange
//! runs on a tokio blocking task: outgoing chunks reach it through a channel
//! read as `io::Read`, and response chunks come back through a bounded
//! channel. `finish` sends an explicit end-of-body marker; a `Connection`
//! dropped without it makes the body reader fail, so ureq aborts the
//! exchange instead of terminating a truncated body. Dropping the response
//! stream closes its channel and the blocking task stops on its next send.
//!
//! Methods without a body are sent as soon as they are opened. Dropping
//! their `Connection` only discards the response.

use std::fmt;
use std::io::{self, Read};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};

use bytes::{Buf, Bytes};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Error;
use crate::http::{RequestHead, ResponseMeta, Scheme};

const READ_BUF_SIZE: usize = 16 * 1024;
const CHUNK_CHANNEL_DEPTH: usize = 16;

/// A response whose body is still arriving.
pub struct IncomingResponse {
    pub meta: ResponseMeta,
    pub body: BoxStream<'static, Result<Bytes, Error>>,
}

impl fmt::Debug for IncomingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingResponse")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Opens one exchange per call. Implementations must not pool, retry or
/// follow redirects on the builder's behalf, and must abort the exchange
/// when a `Connection` with a body is dropped before `finish`.
pub trait Transport: Send + Sync {
    fn open(&self, head: RequestHead) -> Result<Box<dyn Connection>, Error>;
}

/// One in-flight request handle, exclusively owned by a builder.
pub trait Connection: Send {
    /// Append bytes to the outgoing body.
    fn write(&mut self, chunk: Bytes) -> Result<(), Error>;

    /// No more body bytes; wait for the response head.
    fn finish(self: Box<Self>) -> BoxFuture<'static, Result<IncomingResponse, Error>>;
}

/// Transport capabilities keyed by scheme.
#[derive(Clone)]
pub struct Transports {
    pub plain: Arc<dyn Transport>,
    pub secure: Arc<dyn Transport>,
}

impl Transports {
    /// Use one transport for both schemes.
    pub fn single(transport: Arc<dyn Transport>) -> Self {
        Self {
            plain: transport.clone(),
            secure: transport,
        }
    }

    pub fn select(&self, scheme: Scheme) -> &Arc<dyn Transport> {
        match scheme {
            Scheme::Http => &self.plain,
            Scheme::Https => &self.secure,
        }
    }
}

impl Default for Transports {
    fn default() -> Self {
        Transports::single(Arc::new(UreqTransport::default()))
    }
}

impl fmt::Debug for Transports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transports").finish_non_exhaustive()
    }
}

/// Blocking ureq agent driven from tokio's blocking pool.
///
/// Status codes are returned as data, never as errors, and redirects are
/// not followed. The crate is built without ureq's `gzip` feature, so
/// response bodies and their `Content-Length` reach the builder as sent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn open(&self, head: RequestHead) -> Result<Box<dyn Connection>, Error> {
        let runtime = tokio::runtime::Handle::try_current().map_err(Error::transport)?;

        let mut request = ureq::http::Request::builder()
            .method(head.method.as_str())
            .uri(head.uri());
        for (name, value) in &head.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let (body_tx, body_rx) = std_mpsc::channel::<Option<Bytes>>();
        let (head_tx, head_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_DEPTH);
        let agent = self.agent.clone();
        let with_body = head.method.allows_body();

        runtime.spawn_blocking(move || {
            let result = if with_body {
                let reader = ChannelReader::new(body_rx);
                request
                    .body(ureq::SendBody::from_owned_reader(reader))
                    .map_err(Error::transport)
                    .and_then(|req| agent.run(req).map_err(Error::transport))
            } else {
                drop(body_rx);
                request
                    .body(())
                    .map_err(Error::transport)
                    .and_then(|req| agent.run(req).map_err(Error::transport))
            };

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    let _ = head_tx.send(Err(err));
                    return;
                }
            };

            let (parts, body) = response.into_parts();
            let meta = ResponseMeta {
                status: parts.status.as_u16(),
                headers: parts
                    .headers
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect(),
            };
            if head_tx.send(Ok(meta)).is_err() {
                return;
            }

            let mut reader = body.into_reader();
            let mut buf = vec![0u8; READ_BUF_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = Bytes::copy_from_slice(&buf[..n]);
                        if chunk_tx.blocking_send(Ok(chunk)).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        let _ = chunk_tx.blocking_send(Err(Error::from(err)));
                        break;
                    }
                }
            }
        });

        Ok(Box::new(UreqConnection {
            body_tx: Some(body_tx),
            head_rx,
            chunk_rx,
        }))
    }
}

struct UreqConnection {
    body_tx: Option<std_mpsc::Sender<Option<Bytes>>>,
    head_rx: oneshot::Receiver<Result<ResponseMeta, Error>>,
    chunk_rx: mpsc::Receiver<Result<Bytes, Error>>,
}

impl Connection for UreqConnection {
    fn write(&mut self, chunk: Bytes) -> Result<(), Error> {
        let tx = self.body_tx.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(Some(chunk)).map_err(|_| Error::ConnectionClosed)
    }

    fn finish(mut self: Box<Self>) -> BoxFuture<'static, Result<IncomingResponse, Error>> {
        if let Some(tx) = self.body_tx.take() {
            // A closed receiver means the exchange already failed; the
            // head channel reports why.
            let _ = tx.send(None);
        }
        let UreqConnection {
            head_rx, chunk_rx, ..
        } = *self;
        async move {
            let meta = head_rx.await.map_err(|_| Error::ConnectionClosed)??;
            Ok(IncomingResponse {
                meta,
                body: ReceiverStream::new(chunk_rx).boxed(),
            })
        }
        .boxed()
    }
}

/// Outgoing body fed chunk by chunk from the builder. `None` marks the end
/// of the body; a sender dropped before it aborts the read.
struct ChannelReader {
    rx: Mutex<std_mpsc::Receiver<Option<Bytes>>>,
    pending: Bytes,
    done: bool,
}

impl ChannelReader {
    fn new(rx: std_mpsc::Receiver<Option<Bytes>>) -> Self {
        Self {
            rx: Mutex::new(rx),
            pending: Bytes::new(),
            done: false,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            if self.done {
                return Ok(0);
            }
            let rx = self
                .rx
                .get_mut()
                .map_err(|_| io::Error::other("body channel poisoned"))?;
            match rx.recv() {
                Ok(Some(chunk)) => self.pending = chunk,
                Ok(None) => self.done = true,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "request dropped before its body was finished",
                    ))
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_reader_drains_chunks_then_eof() {
        let (tx, rx) = std_mpsc::channel();
        tx.send(Some(Bytes::from_static(b"hello "))).unwrap();
        tx.send(Some(Bytes::from_static(b"world"))).unwrap();
        tx.send(None).unwrap();
        drop(tx);

        let mut reader = ChannelReader::new(rx);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn channel_reader_respects_small_buffers() {
        let (tx, rx) = std_mpsc::channel();
        tx.send(Some(Bytes::from_static(b"abcdef"))).unwrap();
        tx.send(None).unwrap();

        let mut reader = ChannelReader::new(rx);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn channel_reader_aborts_when_dropped_without_end_marker() {
        let (tx, rx) = std_mpsc::channel();
        tx.send(Some(Bytes::from_static(b"partial"))).unwrap();
        drop(tx);

        let mut reader = ChannelReader::new(rx);
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 7);
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn finish_sends_the_end_marker() {
        let (body_tx, body_rx) = std_mpsc::channel();
        let (_head_tx, head_rx) = oneshot::channel();
        let (_chunk_tx, chunk_rx) = mpsc::channel(1);
        let mut conn = Box::new(UreqConnection {
            body_tx: Some(body_tx),
            head_rx,
            chunk_rx,
        });
        conn.write(Bytes::from_static(b"x")).unwrap();
        drop(conn.finish());

        let mut reader = ChannelReader::new(body_rx);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"x");
    }

    #[test]
    fn ureq_transport_needs_a_runtime() {
        let head = RequestHead {
            method: crate::http::Method::Get,
            scheme: Scheme::Http,
            host: "127.0.0.1".to_string(),
            port: 9,
            path: "/".to_string(),
            headers: Vec::new(),
        };
        let err = UreqTransport::default().open(head).err().unwrap();
        assert_eq!(err.code(), "transport");
    }
}
