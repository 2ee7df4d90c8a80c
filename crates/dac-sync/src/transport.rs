//! Directional line queues and the object-transfer seam.
//!
//! Each direction of an exchange is its own bounded queue. Closing the
//! sending half is how a side signals that it has nothing more to say on
//! that queue.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use dac_store::Object;

use crate::error::{SyncError, SyncResult};
use crate::line::ProtoLine;
use crate::types::Phase;

/// Outbound half of a line queue.
#[async_trait]
pub trait LineSink: Send {
    async fn send_line(&mut self, line: ProtoLine) -> SyncResult<()>;

    /// Close the queue. Further sends fail with
    /// [`SyncError::TransportClosed`].
    fn close(&mut self);
}

/// Inbound half of a line queue.
#[async_trait]
pub trait LineSource: Send {
    /// The next line, or `None` once the peer has closed the queue.
    async fn recv_line(&mut self) -> Option<ProtoLine>;
}

/// Source of the object set accompanying a batch of updates.
#[async_trait]
pub trait PackReceiver: Send {
    async fn receive_objects(&mut self) -> SyncResult<Vec<Object>>;
}

/// [`LineSink`] over a tokio mpsc sender.
#[derive(Debug)]
pub struct QueueSink {
    tx: Option<mpsc::Sender<ProtoLine>>,
}

impl QueueSink {
    pub fn new(tx: mpsc::Sender<ProtoLine>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl LineSink for QueueSink {
    async fn send_line(&mut self, line: ProtoLine) -> SyncResult<()> {
        let tx = self.tx.as_ref().ok_or(SyncError::TransportClosed)?;
        tx.send(line).await.map_err(|_| SyncError::TransportClosed)
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

#[async_trait]
impl LineSource for mpsc::Receiver<ProtoLine> {
    async fn recv_line(&mut self) -> Option<ProtoLine> {
        self.recv().await
    }
}

/// A bounded line queue: the sink to write into and the receiver the peer
/// reads from.
pub fn line_queue(capacity: usize) -> (QueueSink, mpsc::Receiver<ProtoLine>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueSink::new(tx), rx)
}

#[async_trait]
impl PackReceiver for Vec<Object> {
    async fn receive_objects(&mut self) -> SyncResult<Vec<Object>> {
        Ok(std::mem::take(self))
    }
}

/// Drains the channel until every sender is dropped.
#[async_trait]
impl PackReceiver for mpsc::Receiver<Object> {
    async fn receive_objects(&mut self) -> SyncResult<Vec<Object>> {
        let mut objects = Vec::new();
        while let Some(object) = self.recv().await {
            objects.push(object);
        }
        Ok(objects)
    }
}

/// Run `fut` under an optional deadline, charging a timeout to `phase`.
pub(crate) async fn with_deadline<F, T>(
    limit: Option<Duration>,
    phase: Phase,
    fut: F,
) -> SyncResult<T>
where
    F: std::future::Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SyncError::Timeout { phase }),
        None => Ok(fut.await),
    }
}

/// Read one line for `phase`, treating a closed queue as premature.
pub(crate) async fn next_line<S: LineSource + ?Sized>(
    source: &mut S,
    limit: Option<Duration>,
    phase: Phase,
) -> SyncResult<ProtoLine> {
    with_deadline(limit, phase, source.recv_line())
        .await?
        .ok_or(SyncError::UnexpectedEof { phase })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_delivers_then_closes() {
        let (mut sink, mut rx) = line_queue(4);
        sink.send_line(ProtoLine::new("a", "1")).await.unwrap();
        sink.close();
        assert!(sink.is_closed());
        assert!(matches!(
            sink.send_line(ProtoLine::flush()).await,
            Err(SyncError::TransportClosed)
        ));

        assert_eq!(rx.recv_line().await, Some(ProtoLine::new("a", "1")));
        assert_eq!(rx.recv_line().await, None);
    }

    #[tokio::test]
    async fn send_fails_when_peer_is_gone() {
        let (mut sink, rx) = line_queue(1);
        drop(rx);
        assert!(matches!(
            sink.send_line(ProtoLine::flush()).await,
            Err(SyncError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn next_line_times_out() {
        let (_sink, mut rx) = line_queue(1);
        let err = next_line(&mut rx, Some(Duration::from_millis(20)), Phase::AwaitingUpdates)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { phase: Phase::AwaitingUpdates }));
    }

    #[tokio::test]
    async fn next_line_reports_eof() {
        let (sink, mut rx) = line_queue(1);
        drop(sink);
        let err = next_line(&mut rx, None, Phase::AwaitingUpdates).await.unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedEof { .. }));
    }

    #[tokio::test]
    async fn pack_from_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let root = Object::new("root", vec![]);
        tx.send(root.clone()).await.unwrap();
        drop(tx);
        assert_eq!(rx.receive_objects().await.unwrap(), vec![root]);
    }

    #[tokio::test]
    async fn pack_from_vec_is_taken_once() {
        let mut objects = vec![Object::new("a", vec![])];
        assert_eq!(objects.receive_objects().await.unwrap().len(), 1);
        assert!(objects.receive_objects().await.unwrap().is_empty());
    }
}
