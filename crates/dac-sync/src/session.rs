//! Receive side of a sync exchange.

use tracing::{debug, info, warn};

use dac_graph::Graph;
use dac_refs::{ReferenceReader, ReferenceWriter};
use dac_store::{Object, ObjectReader, ObjectWriter};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::line::ProtoLine;
use crate::pack::{PackIndex, TransferView};
use crate::transport::{next_line, with_deadline, LineSink, LineSource, PackReceiver};
use crate::types::{Phase, ReceiveReport, RefUpdate, RefUpdateOutcome};
use crate::verifier::FastForwardVerifier;

/// One receive exchange against a local graph.
///
/// Phases must be driven in order: [`advertise`](Self::advertise),
/// [`await_updates`](Self::await_updates),
/// [`validate_transfer`](Self::validate_transfer), then
/// [`report_status`](Self::report_status). Calling one out of order fails
/// with [`SyncError::PhaseViolation`]. Every phase is bounded by the
/// configured timeout.
pub struct ReceiveSession<'g, O, R> {
    graph: &'g Graph<O, R>,
    config: SyncConfig,
    phase: Phase,
    updates: Vec<RefUpdate>,
    malformed_lines: usize,
}

impl<'g, O, R> ReceiveSession<'g, O, R>
where
    O: ObjectReader + ObjectWriter,
    R: ReferenceReader + ReferenceWriter,
{
    pub fn new(graph: &'g Graph<O, R>, config: SyncConfig) -> Self {
        Self {
            graph,
            config,
            phase: Phase::Idle,
            updates: Vec::new(),
            malformed_lines: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Updates collected so far and not yet validated.
    pub fn updates(&self) -> &[RefUpdate] {
        &self.updates
    }

    /// Run every phase back to back.
    ///
    /// The advertisement closes its queue, so the status report goes out on
    /// a separate sink.
    pub async fn receive<A, U, P, S>(
        &mut self,
        advertisement: &mut A,
        requests: &mut U,
        pack: &mut P,
        status: &mut S,
    ) -> SyncResult<ReceiveReport>
    where
        A: LineSink + ?Sized,
        U: LineSource + ?Sized,
        P: PackReceiver + ?Sized,
        S: LineSink + ?Sized,
    {
        self.advertise(advertisement).await?;
        self.await_updates(requests).await?;
        let report = self.validate_transfer(pack).await?;
        self.report_status(status, &report).await?;
        Ok(report)
    }

    /// Send every local reference, then a flush line, then close `sink`.
    /// Returns the number of references advertised.
    pub async fn advertise<S: LineSink + ?Sized>(&mut self, sink: &mut S) -> SyncResult<usize> {
        self.begin(Phase::Idle, Phase::Advertising)?;
        let result = with_deadline(
            self.config.phase_timeout(),
            Phase::Advertising,
            self.send_advertisement(sink),
        )
        .await
        .and_then(|sent| sent);
        self.settle(result, Phase::AwaitingUpdates)
    }

    /// Collect update requests until a flush line.
    ///
    /// Malformed lines are logged and dropped. The queue closing before the
    /// flush line fails the phase.
    pub async fn await_updates<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> SyncResult<&[RefUpdate]> {
        self.begin(Phase::AwaitingUpdates, Phase::AwaitingUpdates)?;
        let limit = self.config.phase_timeout();
        let result = with_deadline(limit, Phase::AwaitingUpdates, self.read_updates(source))
            .await
            .and_then(|read| read);
        self.settle(result, Phase::ValidatingTransfer)?;
        Ok(&self.updates)
    }

    /// Receive the object set and decide every collected update.
    ///
    /// Updates are decided independently and in arrival order. The supplied
    /// objects are written to the local store before the first accepted
    /// reference moves.
    pub async fn validate_transfer<P: PackReceiver + ?Sized>(
        &mut self,
        pack: &mut P,
    ) -> SyncResult<ReceiveReport> {
        self.begin(Phase::ValidatingTransfer, Phase::ValidatingTransfer)?;
        let received = with_deadline(
            self.config.phase_timeout(),
            Phase::ValidatingTransfer,
            pack.receive_objects(),
        )
        .await
        .and_then(|objects| objects);
        let result = received.and_then(|objects| self.apply_updates(objects));
        self.settle(result, Phase::Reporting)
    }

    /// Send one status line per decided update, then a flush line, then
    /// close `sink`.
    pub async fn report_status<S: LineSink + ?Sized>(
        &mut self,
        sink: &mut S,
        report: &ReceiveReport,
    ) -> SyncResult<()> {
        self.begin(Phase::Reporting, Phase::Reporting)?;
        let result = with_deadline(
            self.config.phase_timeout(),
            Phase::Reporting,
            send_statuses(sink, report),
        )
        .await
        .and_then(|sent| sent);
        self.settle(result, Phase::Done)
    }

    fn begin(&mut self, required: Phase, running: Phase) -> SyncResult<()> {
        if self.phase != required {
            return Err(SyncError::PhaseViolation {
                expected: required,
                actual: self.phase,
            });
        }
        self.phase = running;
        Ok(())
    }

    fn settle<T>(&mut self, result: SyncResult<T>, next: Phase) -> SyncResult<T> {
        match result {
            Ok(value) => {
                self.phase = next;
                Ok(value)
            }
            Err(e) => {
                warn!(phase = %self.phase, error = %e, "sync session aborted");
                self.phase = Phase::Aborted;
                Err(e)
            }
        }
    }

    async fn send_advertisement<S: LineSink + ?Sized>(&self, sink: &mut S) -> SyncResult<usize> {
        let refs = self.graph.references()?;
        for reference in &refs {
            sink.send_line(ProtoLine::advertisement(reference, &self.config.ref_prefix))
                .await?;
        }
        sink.send_line(ProtoLine::flush()).await?;
        sink.close();
        debug!(refs = refs.len(), "advertised references");
        Ok(refs.len())
    }

    async fn read_updates<S: LineSource + ?Sized>(&mut self, source: &mut S) -> SyncResult<()> {
        loop {
            let line = next_line(source, None, Phase::AwaitingUpdates).await?;
            if line.is_flush() {
                break;
            }
            match RefUpdate::parse(&line, &self.config.ref_prefix) {
                Ok(update) => {
                    debug!(
                        ref_name = %update.name,
                        from = ?update.from.map(|id| id.short_hex()),
                        to = %update.to.short_hex(),
                        "received update request"
                    );
                    self.updates.push(update);
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed update line");
                    self.malformed_lines += 1;
                }
            }
        }
        Ok(())
    }

    fn apply_updates(&mut self, objects: Vec<Object>) -> SyncResult<ReceiveReport> {
        let index = PackIndex::new(objects)?;
        let updates = std::mem::take(&mut self.updates);
        let mut ingested = false;

        let mut outcomes = Vec::with_capacity(updates.len());
        for update in updates {
            let result = self.apply_one(&index, &update, &mut ingested);
            match &result {
                Ok(()) => info!(
                    ref_name = %update.name,
                    to = %update.to.short_hex(),
                    "applied update"
                ),
                Err(e) => warn!(ref_name = %update.name, error = %e, "rejected update"),
            }
            outcomes.push(RefUpdateOutcome { update, result });
        }

        Ok(ReceiveReport {
            outcomes,
            objects_received: index.len(),
            malformed_lines: self.malformed_lines,
        })
    }

    fn apply_one(
        &self,
        index: &PackIndex,
        update: &RefUpdate,
        ingested: &mut bool,
    ) -> SyncResult<()> {
        if self.config.local_fallback {
            let view = TransferView::with_fallback(index, self.graph.objects());
            FastForwardVerifier::new(&view).verify(update)?;
        } else {
            FastForwardVerifier::new(index).verify(update)?;
        }

        if !*ingested {
            self.graph.objects().write_objects(index.objects())?;
            *ingested = true;
            debug!(objects = index.len(), "stored transferred objects");
        }

        self.graph
            .move_reference(&update.name, update.from, update.to)?;
        Ok(())
    }
}

async fn send_statuses<S: LineSink + ?Sized>(sink: &mut S, report: &ReceiveReport) -> SyncResult<()> {
    for status in report.statuses() {
        sink.send_line(status.to_line()).await?;
    }
    sink.send_line(ProtoLine::flush()).await?;
    sink.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::transport::line_queue;
    use dac_graph::GraphError;
    use dac_refs::InMemoryRefStore;
    use dac_store::InMemoryObjectStore;
    use dac_types::ObjectId;

    type MemGraph = Graph<InMemoryObjectStore, InMemoryRefStore>;

    fn graph() -> MemGraph {
        Graph::new(InMemoryObjectStore::new(), InMemoryRefStore::new())
    }

    /// Local graph holding `objects`, with `name` bound to `target`.
    fn local(objects: &[&Object], name: &str, target: ObjectId) -> MemGraph {
        let g = graph();
        for object in objects {
            g.objects().write_object(object).unwrap();
        }
        g.bind_reference(target, name).unwrap();
        g
    }

    /// Skip the advertisement and queue `lines` followed by a flush.
    async fn session_with_requests<'g>(
        g: &'g MemGraph,
        config: SyncConfig,
        lines: Vec<ProtoLine>,
    ) -> ReceiveSession<'g, InMemoryObjectStore, InMemoryRefStore> {
        let mut session = ReceiveSession::new(g, config);
        let (mut adv, _adv_rx) = line_queue(64);
        session.advertise(&mut adv).await.unwrap();

        let (mut tx, mut rx) = line_queue(64);
        for line in lines {
            tx.send_line(line).await.unwrap();
        }
        tx.send_line(ProtoLine::flush()).await.unwrap();
        session.await_updates(&mut rx).await.unwrap();
        session
    }

    fn update_line(name: &str, from: Option<ObjectId>, to: ObjectId) -> ProtoLine {
        RefUpdate::new(name, from, to).to_line("refs/heads/")
    }

    #[tokio::test]
    async fn advertisement_is_refs_then_flush_then_close() {
        let x = Object::new("X", vec![]);
        let g = local(&[&x], "B", x.id());
        let mut session = ReceiveSession::new(&g, SyncConfig::default());
        let (mut sink, mut rx) = line_queue(64);

        assert_eq!(session.advertise(&mut sink).await.unwrap(), 1);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.command, x.id().to_hex());
        assert_eq!(first.payload_str(), Some("refs/heads/B"));
        assert!(rx.recv().await.unwrap().is_flush());
        assert!(rx.recv().await.is_none());
        assert_eq!(session.phase(), Phase::AwaitingUpdates);
    }

    #[tokio::test]
    async fn empty_store_advertises_only_flush() {
        let g = graph();
        let mut session = ReceiveSession::new(&g, SyncConfig::default());
        let (mut sink, mut rx) = line_queue(4);
        assert_eq!(session.advertise(&mut sink).await.unwrap(), 0);
        assert!(rx.recv().await.unwrap().is_flush());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn fast_forward_moves_reference() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let c = Object::new("C", vec![b.id()]);
        let g = local(&[&a], "B", a.id());

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![update_line("B", Some(a.id()), c.id())],
        )
        .await;
        let report = session
            .validate_transfer(&mut vec![c.clone(), b.clone()])
            .await
            .unwrap();

        assert_eq!(report.objects_received, 2);
        assert_eq!(report.applied().count(), 1);
        assert_eq!(g.resolve("B").unwrap(), c.id());
        assert_eq!(g.read_object(&b.id()).unwrap(), b);
        assert_eq!(session.phase(), Phase::Reporting);
    }

    #[tokio::test]
    async fn missing_link_is_orphaned_and_reference_stays() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let c = Object::new("C", vec![b.id()]);
        let g = local(&[&a], "B", a.id());

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![update_line("B", Some(a.id()), c.id())],
        )
        .await;
        let report = session.validate_transfer(&mut vec![c.clone()]).await.unwrap();

        let rejected: Vec<_> = report.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert!(matches!(
            rejected[0].result,
            Err(SyncError::OrphanedAncestor { id, .. }) if id == b.id()
        ));
        assert_eq!(g.resolve("B").unwrap(), a.id());
        assert!(matches!(g.read_object(&c.id()), Err(GraphError::ObjectNotFound(_))));
    }

    #[tokio::test]
    async fn divergent_update_is_rejected() {
        let root = Object::new("root", vec![]);
        let x = Object::new("X", vec![root.id()]);
        let y = Object::new("Y", vec![root.id()]);
        let g = local(&[&root, &x], "B", x.id());

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![update_line("B", Some(x.id()), y.id())],
        )
        .await;
        let report = session
            .validate_transfer(&mut vec![y.clone(), root.clone()])
            .await
            .unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            Err(SyncError::NonFastForward { from, to, .. }) if from == x.id() && to == y.id()
        ));
        assert_eq!(g.resolve("B").unwrap(), x.id());
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let g = local(&[&a], "B", a.id());

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![
                ProtoLine::new("not-hex", "garbage"),
                update_line("B", Some(a.id()), b.id()),
                ProtoLine::new(a.id().to_hex(), "no-separator"),
            ],
        )
        .await;
        assert_eq!(session.updates().len(), 1);

        let report = session.validate_transfer(&mut vec![b.clone()]).await.unwrap();
        assert_eq!(report.malformed_lines, 2);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(g.resolve("B").unwrap(), b.id());
    }

    #[tokio::test]
    async fn rejections_do_not_block_other_updates() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let island = Object::new("island", vec![]);
        let g = local(&[&a], "main", a.id());
        g.bind_reference(a.id(), "other").unwrap();

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![
                update_line("other", Some(a.id()), island.id()),
                update_line("main", Some(a.id()), b.id()),
            ],
        )
        .await;
        let report = session
            .validate_transfer(&mut vec![b.clone(), island.clone()])
            .await
            .unwrap();

        assert!(!report.outcomes[0].is_applied());
        assert!(report.outcomes[1].is_applied());
        assert_eq!(g.resolve("main").unwrap(), b.id());
        assert_eq!(g.resolve("other").unwrap(), a.id());
    }

    #[tokio::test]
    async fn stale_from_is_rejected() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let c = Object::new("C", vec![b.id()]);
        let g = local(&[&a], "B", a.id());

        // Forward from b, but the local reference is still at a.
        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![update_line("B", Some(b.id()), c.id())],
        )
        .await;
        let report = session.validate_transfer(&mut vec![c.clone()]).await.unwrap();
        assert!(matches!(
            report.outcomes[0].result,
            Err(SyncError::Graph(GraphError::StaleReference { .. }))
        ));
        assert_eq!(g.resolve("B").unwrap(), a.id());
    }

    #[tokio::test]
    async fn creation_requires_absent_reference() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let g = local(&[&a], "taken", a.id());

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![update_line("fresh", None, b.id()), update_line("taken", None, b.id())],
        )
        .await;
        let report = session
            .validate_transfer(&mut vec![a.clone(), b.clone()])
            .await
            .unwrap();

        assert!(report.outcomes[0].is_applied());
        assert_eq!(g.resolve("fresh").unwrap(), b.id());
        assert!(matches!(
            report.outcomes[1].result,
            Err(SyncError::Graph(GraphError::StaleReference { .. }))
        ));
        assert_eq!(g.resolve("taken").unwrap(), a.id());
    }

    #[tokio::test]
    async fn omitted_merge_history_still_fast_forwards() {
        // tip merges a long new branch onto `from` with a side link to
        // history the receiver already holds and the sender left out.
        let old = Object::new("old", vec![]);
        let from = Object::new("from", vec![old.id()]);
        let n1 = Object::new("n1", vec![from.id()]);
        let n2 = Object::new("n2", vec![n1.id()]);
        let side = Object::new("side", vec![old.id()]);
        let tip = Object::new("tip", vec![n2.id(), side.id()]);
        let g = local(&[&old, &from], "B", from.id());

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![update_line("B", Some(from.id()), tip.id())],
        )
        .await;
        let report = session
            .validate_transfer(&mut vec![tip.clone(), n2.clone(), n1.clone(), side.clone()])
            .await
            .unwrap();
        assert!(report.outcomes[0].is_applied());
        assert_eq!(g.resolve("B").unwrap(), tip.id());
    }

    #[tokio::test]
    async fn local_fallback_completes_creation_history() {
        // A new reference built on `old`, which only the receiver holds.
        let old = Object::new("old", vec![]);
        let topic = Object::new("topic", vec![old.id()]);
        let lines = vec![update_line("topic", None, topic.id())];

        let strict_graph = local(&[&old], "main", old.id());
        let mut strict =
            session_with_requests(&strict_graph, SyncConfig::default(), lines.clone()).await;
        let report = strict.validate_transfer(&mut vec![topic.clone()]).await.unwrap();
        assert!(matches!(
            report.outcomes[0].result,
            Err(SyncError::OrphanedAncestor { id, .. }) if id == old.id()
        ));
        assert!(strict_graph.read_reference("topic").unwrap().is_none());

        let config = SyncConfig {
            local_fallback: true,
            ..SyncConfig::default()
        };
        let layered_graph = local(&[&old], "main", old.id());
        let mut layered = session_with_requests(&layered_graph, config, lines).await;
        let report = layered.validate_transfer(&mut vec![topic.clone()]).await.unwrap();
        assert!(report.outcomes[0].is_applied());
        assert_eq!(layered_graph.resolve("topic").unwrap(), topic.id());
    }

    /// Object store that counts how transferred objects arrive.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryObjectStore,
        single_writes: AtomicUsize,
        batch_writes: AtomicUsize,
    }

    impl ObjectReader for CountingStore {
        fn read_object(&self, id: &ObjectId) -> dac_store::StoreResult<Object> {
            self.inner.read_object(id)
        }
    }

    impl ObjectWriter for CountingStore {
        fn write_object(&self, object: &Object) -> dac_store::StoreResult<()> {
            self.single_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write_object(object)
        }

        fn write_objects(&self, objects: &[Object]) -> dac_store::StoreResult<()> {
            self.batch_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write_objects(objects)
        }
    }

    #[tokio::test]
    async fn transfer_is_stored_in_one_batch() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let c = Object::new("C", vec![b.id()]);
        let store = CountingStore::default();
        store.inner.write_object(&a).unwrap();
        let g = Graph::new(store, InMemoryRefStore::new());
        g.bind_reference(a.id(), "main").unwrap();
        g.bind_reference(a.id(), "other").unwrap();

        let mut session = ReceiveSession::new(&g, SyncConfig::default());
        let (mut adv, _adv_rx) = line_queue(8);
        session.advertise(&mut adv).await.unwrap();
        let (mut tx, mut rx) = line_queue(8);
        tx.send_line(update_line("main", Some(a.id()), c.id())).await.unwrap();
        tx.send_line(update_line("other", Some(a.id()), b.id())).await.unwrap();
        tx.send_line(ProtoLine::flush()).await.unwrap();
        session.await_updates(&mut rx).await.unwrap();

        let report = session
            .validate_transfer(&mut vec![c.clone(), b.clone()])
            .await
            .unwrap();
        assert_eq!(report.applied().count(), 2);
        assert_eq!(g.objects().batch_writes.load(Ordering::SeqCst), 1);
        assert_eq!(g.objects().single_writes.load(Ordering::SeqCst), 0);
        assert_eq!(g.resolve("main").unwrap(), c.id());
    }

    #[tokio::test]
    async fn phases_must_run_in_order() {
        let g = graph();
        let mut session = ReceiveSession::new(&g, SyncConfig::default());
        let (_tx, mut rx) = line_queue(1);
        let err = session.await_updates(&mut rx).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::PhaseViolation {
                expected: Phase::AwaitingUpdates,
                actual: Phase::Idle
            }
        ));

        let (mut sink, _rx) = line_queue(4);
        session.advertise(&mut sink).await.unwrap();
        let (mut again, _again_rx) = line_queue(4);
        assert!(matches!(
            session.advertise(&mut again).await,
            Err(SyncError::PhaseViolation { .. })
        ));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let g = graph();
        let config = SyncConfig::default().with_phase_timeout(Duration::from_millis(30));
        let mut session = ReceiveSession::new(&g, config);
        let (mut sink, _adv_rx) = line_queue(4);
        session.advertise(&mut sink).await.unwrap();

        let (_tx, mut rx) = line_queue(4);
        let err = session.await_updates(&mut rx).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { phase: Phase::AwaitingUpdates }));
        assert_eq!(session.phase(), Phase::Aborted);
    }

    #[tokio::test]
    async fn closed_queue_before_flush_aborts() {
        let a = Object::new("A", vec![]);
        let g = graph();
        let mut session = ReceiveSession::new(&g, SyncConfig::default());
        let (mut sink, _adv_rx) = line_queue(4);
        session.advertise(&mut sink).await.unwrap();

        let (mut tx, mut rx) = line_queue(4);
        tx.send_line(update_line("B", None, a.id())).await.unwrap();
        tx.close();
        let err = session.await_updates(&mut rx).await.unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedEof { .. }));
    }

    #[tokio::test]
    async fn status_report_lines() {
        let a = Object::new("A", vec![]);
        let b = Object::new("B", vec![a.id()]);
        let island = Object::new("island", vec![]);
        let g = local(&[&a], "B", a.id());
        g.bind_reference(a.id(), "C").unwrap();

        let mut session = session_with_requests(
            &g,
            SyncConfig::default(),
            vec![
                update_line("B", Some(a.id()), b.id()),
                update_line("C", Some(a.id()), island.id()),
            ],
        )
        .await;
        let report = session
            .validate_transfer(&mut vec![b.clone(), island.clone()])
            .await
            .unwrap();

        let (mut sink, mut rx) = line_queue(8);
        session.report_status(&mut sink, &report).await.unwrap();
        assert_eq!(session.phase(), Phase::Done);

        assert_eq!(rx.recv().await.unwrap(), ProtoLine::new("ok", "B"));
        let ng = rx.recv().await.unwrap();
        assert_eq!(ng.command, "ng");
        assert!(ng.payload_str().unwrap().starts_with("C not a fast-forward"));
        assert!(rx.recv().await.unwrap().is_flush());
        assert!(rx.recv().await.is_none());
    }
}
