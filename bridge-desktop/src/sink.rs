//! Event Sink backed by an unbounded channel

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bridge_traits::{ChannelError, EventSink};
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

/// One item observed by a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(Value),
    Error(ChannelError),
}

#[derive(Debug)]
enum Frame {
    Item(StreamItem),
    End,
}

/// Creates a connected sink/stream pair.
pub fn event_channel() -> (Arc<ChannelEventSink>, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let sink = Arc::new(ChannelEventSink {
        sender,
        closed: AtomicBool::new(false),
    });
    let stream = EventStream {
        receiver,
        finished: false,
    };
    (sink, stream)
}

/// Write half handed to a stream handler.
///
/// Writes never block. Anything written after `end_of_stream`, or after the
/// listener dropped its [`EventStream`], is discarded.
#[derive(Debug)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<Frame>,
    closed: AtomicBool,
}

impl ChannelEventSink {
    fn push(&self, frame: Frame) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if self.sender.send(frame).is_err() {
            trace!("Listener gone; event dropped");
        }
    }

    /// Whether the listener can still receive events.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.sender.is_closed()
    }
}

impl EventSink for ChannelEventSink {
    fn success(&self, event: Value) {
        self.push(Frame::Item(StreamItem::Event(event)));
    }

    fn error(&self, code: &str, message: &str, details: Option<Value>) {
        let mut error = ChannelError::new(code, message);
        error.details = details;
        self.push(Frame::Item(StreamItem::Error(error)));
    }

    fn end_of_stream(&self) {
        self.push(Frame::End);
        self.closed.store(true, Ordering::Release);
    }
}

/// Read half owned by the listener.
///
/// Yields items in write order and finishes after `end_of_stream` or once
/// every sink clone is dropped.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Frame>,
    finished: bool,
}

impl EventStream {
    /// Returns the next buffered item without waiting.
    pub fn try_recv(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(Frame::Item(item)) => Some(item),
            Ok(Frame::End) | Err(mpsc::error::TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
        }
    }

    /// Drains everything currently buffered.
    pub fn drain(&mut self) -> Vec<StreamItem> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Whether the stream has seen its end.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for EventStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Frame::Item(item))) => Poll::Ready(Some(item)),
            Poll::Ready(Some(Frame::End)) | Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
