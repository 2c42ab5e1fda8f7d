//! The weave node: wires the resolver, the consensus engine and the
//! collaborators together and runs the background tasks.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use weave_consensus::{
    ConsensusEngine, ConsensusEvent, EngineConfig, EventFilter, MediatorSchedule, Subscription,
};
use weave_dag::{
    create_genesis_unit, genesis_transactions, ChainIndex, DagError, GenesisConfig, Insertion,
    MainChainResolver, SyncLayer, TxPool, Unit, WitnessSchedule,
};
use weave_types::{AssetId, Hash, Timestamp};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::pending::{PendingEntry, PendingUnits, Waiter};
use crate::processor;
use crate::producer::UnitProducer;
use crate::shutdown::ShutdownController;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on the authoring loop period.
const AUTHORING_TICK: Duration = Duration::from_secs(1);

/// Where a unit stands after ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Accepted(ChainIndex),
    /// Parked until these parents arrive.
    Queued(Vec<Hash>),
}

type Ready = VecDeque<(Unit, Vec<Waiter>)>;

struct NodeInner {
    config: NodeConfig,
    resolver: MainChainResolver,
    engine: ConsensusEngine,
    sync: Arc<dyn SyncLayer>,
    pending: Mutex<PendingUnits>,
    /// Parents with a fetch task running.
    fetching: Mutex<HashSet<Hash>>,
    producer: Option<UnitProducer>,
    txpool: Arc<dyn TxPool>,
    metrics: Option<NodeMetrics>,
    shutdown: ShutdownController,
}

/// A running weave node.
pub struct WeaveNode {
    inner: Arc<NodeInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WeaveNode {
    /// Bootstrap from a genesis document. Any invalid input aborts here.
    pub fn new(
        config: NodeConfig,
        genesis: &GenesisConfig,
        sync: Arc<dyn SyncLayer>,
        txpool: Arc<dyn TxPool>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        genesis.validate()?;

        let schedule = MediatorSchedule::from_genesis(genesis, config.majority_bps)?;
        let engine = ConsensusEngine::new(
            schedule,
            EngineConfig {
                event_buffer: config.event_buffer,
                gas_price: config.gas_price,
            },
        );
        let genesis_unit = create_genesis_unit(genesis, genesis_transactions(genesis)?)?;
        let resolver =
            MainChainResolver::new(genesis_unit, &engine)?.with_txpool(Arc::clone(&txpool));

        let producer = config
            .mediator_keypair()?
            .map(|keypair| UnitProducer::new(keypair, config.max_parents, config.gas_limit));
        if let Some(producer) = &producer {
            if !engine.is_authorized(producer.address()) {
                tracing::warn!(
                    mediator = %producer.address(),
                    "configured mediator is not in the active set; it will not author"
                );
            }
        }
        let metrics = if config.enable_metrics {
            Some(NodeMetrics::new()?)
        } else {
            None
        };

        tracing::info!(
            genesis = %resolver.genesis_hash(),
            chain_id = genesis.chain_id,
            mediators = engine.active_mediators().len(),
            authoring = producer.is_some(),
            "weave node initialised"
        );

        let pending = PendingUnits::new(config.max_pending_units);
        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                resolver,
                engine,
                sync,
                pending: Mutex::new(pending),
                fetching: Mutex::new(HashSet::new()),
                producer,
                txpool,
                metrics,
                shutdown: ShutdownController::new(),
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Bootstrap from the genesis document at `config.genesis_path`.
    pub fn load(
        config: NodeConfig,
        sync: Arc<dyn SyncLayer>,
        txpool: Arc<dyn TxPool>,
    ) -> Result<Self, NodeError> {
        let genesis = GenesisConfig::from_json_file(&config.genesis_path)?;
        Self::new(config, &genesis, sync, txpool)
    }

    /// Start the engine and the background tasks. Must run inside a tokio
    /// runtime.
    pub fn start(&self) -> Result<(), NodeError> {
        if self.inner.shutdown.is_triggered() {
            return Err(NodeError::ShuttingDown);
        }
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Ok(());
        }
        self.inner.engine.start()?;

        tasks.push(spawn_sweeper(Arc::clone(&self.inner)));
        tasks.push(spawn_round_ticker(Arc::clone(&self.inner)));
        if self.inner.producer.is_some() {
            tasks.push(spawn_authoring_loop(Arc::clone(&self.inner)));
        }
        tracing::info!(tasks = tasks.len(), "weave node started");
        Ok(())
    }

    /// Stop everything. Pending submitters get `ShuttingDown`. Idempotent.
    pub async fn stop(&self) {
        if !self.inner.shutdown.shutdown() {
            return;
        }
        self.inner.engine.stop();

        let drained = self.inner.pending.lock().drain();
        for entry in drained {
            entry.fail(|| NodeError::ShuttingDown);
        }

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }
        tracing::info!("weave node stopped");
    }

    /// Network entry point. The outcome is only logged and published.
    pub fn on_unit_received(&self, unit: Unit) {
        let hash = unit.hash();
        match self.inner.ingest(unit, None) {
            Ok(Admission::Accepted(index)) => {
                tracing::trace!(hash = %hash, index = index.index, "received unit accepted")
            }
            Ok(Admission::Queued(missing)) => {
                tracing::trace!(hash = %hash, missing = missing.len(), "received unit queued")
            }
            Err(e) => tracing::debug!(hash = %hash, error = %e, "received unit not admitted"),
        }
    }

    /// Ingest `unit` and wait until it is settled: its chain index once
    /// admitted, the rejection, or `OrphanTimeout` if its parents never
    /// arrive.
    pub async fn submit_unit(&self, unit: Unit) -> Result<ChainIndex, NodeError> {
        if self.inner.shutdown.is_triggered() {
            return Err(NodeError::ShuttingDown);
        }
        let (tx, rx) = oneshot::channel();
        match self.inner.ingest(unit, Some(tx))? {
            Admission::Accepted(index) => Ok(index),
            Admission::Queued(_) => rx.await.unwrap_or(Err(NodeError::ShuttingDown)),
        }
    }

    /// Ingest several units: signatures and hashes are checked in parallel,
    /// insertion then follows input order.
    pub fn process_batch(&self, units: Vec<Unit>) -> Vec<Result<Admission, NodeError>> {
        let mut results: Vec<Option<Result<Admission, NodeError>>> = Vec::with_capacity(units.len());
        let mut fresh = Vec::new();
        for (i, unit) in units.into_iter().enumerate() {
            self.inner.metric(|m| m.units_processed.inc());
            if self.inner.resolver.contains(&unit.hash()) {
                results.push(Some(Err(DagError::Duplicate(unit.hash()).into())));
            } else {
                results.push(None);
                fresh.push((i, unit));
            }
        }

        let (indices, units): (Vec<usize>, Vec<Unit>) = fresh.into_iter().unzip();
        for (i, (unit, verdict)) in indices.into_iter().zip(processor::verify_batch(units)) {
            let outcome = match verdict {
                Ok(()) => self.inner.admit_verified(unit, None),
                Err(e) => {
                    self.inner.reject(unit.hash(), &e, Vec::new());
                    Err(e)
                }
            };
            results[i] = Some(outcome.map_err(NodeError::from));
        }
        results.into_iter().flatten().collect()
    }

    /// Author a unit for the slot containing `now` if it is ours, admit it
    /// locally and broadcast it.
    pub async fn author_at(&self, now: Timestamp) -> Result<Option<Unit>, NodeError> {
        self.inner.author_at(now).await
    }

    /// Evict overdue pending units now. Returns how many were evicted.
    pub fn sweep_orphans(&self) -> usize {
        self.inner.sweep(Instant::now())
    }

    pub fn subscribe(&self, filter: EventFilter) -> Result<Subscription, NodeError> {
        Ok(self.inner.engine.subscribe(filter)?)
    }

    pub fn resolver(&self) -> &MainChainResolver {
        &self.inner.resolver
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.inner.engine
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> Option<&NodeMetrics> {
        self.inner.metrics.as_ref()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_pending(&self, hash: &Hash) -> bool {
        self.inner.pending.lock().contains(hash)
    }
}

impl Drop for WeaveNode {
    fn drop(&mut self) {
        self.inner.shutdown.shutdown();
        self.inner.engine.stop();
    }
}

impl NodeInner {
    fn metric(&self, f: impl FnOnce(&NodeMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    /// Full pipeline: duplicate check, integrity and signature, then
    /// resolver insertion.
    fn ingest(self: &Arc<Self>, unit: Unit, waiter: Option<Waiter>) -> Result<Admission, DagError> {
        let hash = unit.hash();
        self.metric(|m| m.units_processed.inc());
        if self.resolver.contains(&hash) {
            let err = DagError::Duplicate(hash);
            if let Some(waiter) = waiter {
                let _ = waiter.send(Err(err.clone().into()));
            }
            return Err(err);
        }
        let waiter = match self.join_pending(&hash, waiter) {
            Ok(missing) => return Ok(Admission::Queued(missing)),
            Err(waiter) => waiter,
        };
        if let Err(e) = processor::verify_unit(&unit) {
            self.reject(hash, &e, waiter.into_iter().collect());
            return Err(e);
        }
        self.admit_verified(unit, waiter)
    }

    fn admit_verified(
        self: &Arc<Self>,
        unit: Unit,
        waiter: Option<Waiter>,
    ) -> Result<Admission, DagError> {
        let waiter = match self.join_pending(&unit.hash(), waiter) {
            Ok(missing) => return Ok(Admission::Queued(missing)),
            Err(waiter) => waiter,
        };
        let mut ready = Ready::new();
        let first = self.insert_one(unit, waiter.into_iter().collect(), &mut ready);
        // dependents released by each admission, breadth first
        while let Some((unit, waiters)) = ready.pop_front() {
            let _ = self.insert_one(unit, waiters, &mut ready);
        }
        first
    }

    /// If `hash` is already parked, wait along with it.
    fn join_pending(&self, hash: &Hash, waiter: Option<Waiter>) -> Result<Vec<Hash>, Option<Waiter>> {
        let mut pending = self.pending.lock();
        let Some(missing) = pending.missing_of(hash) else {
            return Err(waiter);
        };
        if let Some(waiter) = waiter {
            let _ = pending.attach(hash, waiter);
        }
        Ok(missing)
    }

    fn insert_one(
        self: &Arc<Self>,
        unit: Unit,
        waiters: Vec<Waiter>,
        ready: &mut Ready,
    ) -> Result<Admission, DagError> {
        let hash = unit.hash();
        let started = std::time::Instant::now();
        match self.resolver.insert_unit(unit.clone(), &self.engine) {
            Ok(insertion) => {
                self.metric(|m| {
                    m.unit_process_time_ms
                        .observe(started.elapsed().as_secs_f64() * 1_000.0)
                });
                self.on_accepted(&unit, &insertion);
                for waiter in waiters {
                    let _ = waiter.send(Ok(insertion.chain_index));
                }
                let released = self.pending.lock().resolve(&hash);
                for entry in released {
                    ready.push_back((entry.unit, entry.waiters));
                }
                self.update_gauges();
                Ok(Admission::Accepted(insertion.chain_index))
            }
            Err(DagError::MissingParents(missing)) => self.park(unit, missing, waiters, ready),
            Err(DagError::Duplicate(_)) => {
                // admitted concurrently by another path
                if let Some(index) = self.resolver.chain_index(&hash) {
                    for waiter in waiters {
                        let _ = waiter.send(Ok(index));
                    }
                }
                Err(DagError::Duplicate(hash))
            }
            Err(e) => {
                self.reject(hash, &e, waiters);
                Err(e)
            }
        }
    }

    fn park(
        self: &Arc<Self>,
        unit: Unit,
        missing: Vec<Hash>,
        waiters: Vec<Waiter>,
        ready: &mut Ready,
    ) -> Result<Admission, DagError> {
        let hash = unit.hash();
        let deadline = Instant::now() + self.config.orphan_timeout();
        let (missing, evicted) = {
            let mut pending = self.pending.lock();
            // a parent admitted since the insertion attempt has already
            // released its dependents, so re-check under the lock
            let missing: Vec<Hash> = missing
                .into_iter()
                .filter(|p| !self.resolver.contains(p))
                .collect();
            if missing.is_empty() {
                drop(pending);
                return self.insert_one(unit, waiters, ready);
            }
            let evicted = pending.insert(unit, missing.iter().copied(), deadline, waiters);
            (missing, evicted)
        };

        tracing::debug!(hash = %hash, missing = missing.len(), "unit queued for missing parents");
        self.engine.publish(ConsensusEvent::UnitQueued {
            hash,
            missing: missing.clone(),
        });
        if let Some(entry) = evicted {
            self.orphan(entry, true);
        }
        for parent in &missing {
            self.request_parent(*parent);
        }
        self.update_gauges();
        Ok(Admission::Queued(missing))
    }

    fn on_accepted(&self, unit: &Unit, insertion: &Insertion) {
        let hash = insertion.hash;
        self.metric(|m| {
            m.units_accepted.inc();
            m.units_stable.inc_by(insertion.stabilized.len() as u64);
        });
        tracing::debug!(
            hash = %hash,
            index = insertion.chain_index.index,
            is_main = insertion.chain_index.is_main,
            "unit accepted"
        );
        self.engine.publish(ConsensusEvent::UnitAccepted {
            hash,
            chain_index: insertion.chain_index,
        });
        if let (Some(existing), Some(author)) = (insertion.double_authored, unit.author()) {
            self.engine.publish(ConsensusEvent::DoubleAuthoring {
                author: author.address.clone(),
                existing,
                incoming: hash,
            });
        }
        for (index, main) in &insertion.joined_main {
            self.engine.publish(ConsensusEvent::MainChainExtended {
                asset: index.asset_id,
                index: index.index,
                hash: *main,
            });
        }
        for (index, stable) in &insertion.stabilized {
            tracing::debug!(hash = %stable, index = index.index, "unit stable");
            self.engine.publish(ConsensusEvent::UnitStable {
                asset: index.asset_id,
                index: index.index,
                hash: *stable,
            });
        }
    }

    fn reject(&self, hash: Hash, err: &DagError, waiters: Vec<Waiter>) {
        self.metric(|m| m.units_rejected.inc());
        tracing::warn!(hash = %hash, error = %err, "unit rejected");
        self.engine.publish(ConsensusEvent::UnitRejected {
            hash,
            reason: err.to_string(),
        });
        for waiter in waiters {
            let _ = waiter.send(Err(err.clone().into()));
        }
    }

    /// Discard a pending unit whose parents did not arrive in time.
    fn orphan(&self, entry: PendingEntry, evicted_for_room: bool) {
        let hash = entry.hash();
        let missing: Vec<Hash> = entry.missing.iter().copied().collect();
        self.metric(|m| m.units_orphaned.inc());
        tracing::warn!(
            hash = %hash,
            missing = missing.len(),
            evicted_for_room,
            "pending unit evicted"
        );
        self.engine
            .publish(ConsensusEvent::OrphanTimeout { hash, missing });
        if evicted_for_room {
            entry.fail(|| NodeError::PendingEvicted(hash));
        } else {
            entry.fail(|| NodeError::OrphanTimeout(hash));
        }
    }

    fn sweep(&self, now: Instant) -> usize {
        let expired = self.pending.lock().expire(now);
        let count = expired.len();
        for entry in expired {
            self.orphan(entry, false);
        }
        if count > 0 {
            self.update_gauges();
        }
        count
    }

    fn update_gauges(&self) {
        self.metric(|m| {
            m.pending_units.set(self.pending.lock().len() as i64);
            m.main_chain_length
                .set(self.resolver.main_chain_len(&AssetId::PTN) as i64);
            m.events_dropped.set(self.engine.dropped_events() as i64);
        });
    }

    /// Start a fetch task for `hash` unless one is running.
    fn request_parent(self: &Arc<Self>, hash: Hash) {
        if self.shutdown.is_triggered() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(hash = %hash, "no runtime to fetch a missing parent on");
            return;
        };
        if !self.fetching.lock().insert(hash) {
            return;
        }
        let inner = Arc::clone(self);
        runtime.spawn(async move { inner.fetch_parent(hash).await });
    }

    async fn fetch_parent(self: Arc<Self>, hash: Hash) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let attempts = self.config.max_fetch_attempts;
        for attempt in 1..=attempts {
            if self.shutdown.is_triggered()
                || self.resolver.contains(&hash)
                || !self.pending.lock().is_wanted(&hash)
            {
                break;
            }
            let fetched =
                tokio::time::timeout(self.config.fetch_timeout(), self.sync.fetch_unit(&hash)).await;
            match fetched {
                Ok(Ok(Some(unit))) if unit.hash() == hash => {
                    tracing::debug!(hash = %hash, attempt, "fetched missing parent");
                    let _ = self.ingest(unit, None);
                    break;
                }
                Ok(Ok(Some(unit))) => tracing::warn!(
                    requested = %hash,
                    received = %unit.hash(),
                    "sync layer answered with a different unit"
                ),
                Ok(Ok(None)) => tracing::trace!(hash = %hash, attempt, "parent not found"),
                Ok(Err(e)) => tracing::debug!(hash = %hash, attempt, error = %e, "fetch failed"),
                Err(_) => tracing::debug!(hash = %hash, attempt, "fetch timed out"),
            }
            if attempt < attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.fetch_retry_interval()) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
        }
        self.fetching.lock().remove(&hash);
    }

    async fn author_at(self: &Arc<Self>, now: Timestamp) -> Result<Option<Unit>, NodeError> {
        let Some(producer) = &self.producer else {
            return Ok(None);
        };
        if !self.engine.is_running() {
            return Ok(None);
        }
        let Some(unit) =
            producer.produce(now, &self.resolver, &self.engine, self.txpool.as_ref())?
        else {
            return Ok(None);
        };

        match self.admit_verified(unit.clone(), None)? {
            Admission::Accepted(chain_index) => {
                self.metric(|m| m.units_authored.inc());
                self.engine.publish(ConsensusEvent::UnitAuthored {
                    hash: unit.hash(),
                    author: producer.address().clone(),
                    chain_index,
                });
                self.sync.broadcast_unit(&unit).await;
                Ok(Some(unit))
            }
            Admission::Queued(missing) => {
                tracing::warn!(
                    hash = %unit.hash(),
                    missing = missing.len(),
                    "locally authored unit references unknown parents"
                );
                Ok(None)
            }
        }
    }
}

fn spawn_sweeper(inner: Arc<NodeInner>) -> JoinHandle<()> {
    let mut shutdown_rx = inner.shutdown.subscribe();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(inner.config.sweep_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    let evicted = inner.sweep(Instant::now());
                    if evicted > 0 {
                        tracing::debug!(evicted, "orphan sweep");
                    }
                }
            }
        }
        tracing::debug!("orphan sweeper stopped");
    })
}

fn spawn_round_ticker(inner: Arc<NodeInner>) -> JoinHandle<()> {
    let mut shutdown_rx = inner.shutdown.subscribe();
    let period = Duration::from_secs(inner.engine.schedule().interval());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    inner.engine.advance_round(Timestamp::now());
                }
            }
        }
        tracing::debug!("round ticker stopped");
    })
}

fn spawn_authoring_loop(inner: Arc<NodeInner>) -> JoinHandle<()> {
    let mut shutdown_rx = inner.shutdown.subscribe();
    let period = AUTHORING_TICK.min(Duration::from_secs(inner.engine.schedule().interval()));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    if let Err(e) = inner.author_at(Timestamp::now()).await {
                        tracing::warn!(error = %e, "authoring failed");
                    }
                }
            }
        }
        tracing::debug!("authoring loop stopped");
    })
}
