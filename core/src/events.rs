//! Observer contract for a single request.
//!
//! A builder fans every response chunk out to two kinds of consumers:
//! event subscribers ([`EventReceiver`]) and raw chunk streams
//! ([`ChunkStream`]). Both are fed from the same arrival loop inside
//! `perform()`, so they observe the same chunks in the same order.
//!
//! Per chunk the order is: `Data` event, stream item, aggregation, then
//! `Progress`. On success `End` precedes resolution and `Close` follows it.
//! On failure `Error` precedes rejection. Nothing fires after that.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::Error;

/// Events emitted by a builder to its subscribers.
#[derive(Debug, Clone)]
pub enum RequestEvent {
    /// One response body chunk, in arrival order.
    Data(Bytes),
    /// Cumulative download progress against the declared length.
    Progress { fraction: f64, received: u64, total: u64 },
    /// The response body has been fully received.
    End,
    /// The builder released its transport handle after success.
    Close,
    /// The request failed; the builder is settled.
    Error(Error),
}

/// Receiving half of a subscription created by `RequestBuilder::subscribe`.
pub type EventReceiver = mpsc::UnboundedReceiver<RequestEvent>;

/// Raw response chunks, readable while `perform()` aggregates the same data.
///
/// Yields each chunk once, then ends. A failed request yields its error as
/// the final item.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::UnboundedReceiver<Result<Bytes, Error>>,
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Sending side owned by the builder.
#[derive(Debug, Default)]
pub(crate) struct Emitter {
    subscribers: Vec<mpsc::UnboundedSender<RequestEvent>>,
    streams: Vec<mpsc::UnboundedSender<Result<Bytes, Error>>>,
}

impl Emitter {
    pub(crate) fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn stream(&mut self) -> ChunkStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.push(tx);
        ChunkStream { rx }
    }

    /// Closed receivers are pruned as a side effect.
    pub(crate) fn emit(&mut self, event: RequestEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn chunk(&mut self, chunk: &Bytes) {
        self.emit(RequestEvent::Data(chunk.clone()));
        self.streams.retain(|tx| tx.send(Ok(chunk.clone())).is_ok());
    }

    pub(crate) fn fail(&mut self, err: &Error) {
        self.emit(RequestEvent::Error(err.clone()));
        self.streams.retain(|tx| tx.send(Err(err.clone())).is_ok());
    }

    /// Drops every sender so receivers observe the end of their channel.
    pub(crate) fn close(&mut self) {
        self.subscribers.clear();
        self.streams.clear();
    }
}
