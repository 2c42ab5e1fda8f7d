//! Integration tests exercising the full unit pipeline:
//! verification → resolver insertion → pending parents → events.
//!
//! The node is wired to nullable collaborators, so every fetch and
//! broadcast is scripted and observable.

use std::sync::Arc;

use weave_consensus::{ConsensusEvent, EngineState, EventFilter, EventTopic};
use weave_crypto::{derive_address, keypair_from_seed};
use weave_dag::{DagError, GenesisConfig, Header, Transaction, Unit, WitnessSchedule};
use weave_node::{Admission, NodeConfig, NodeError, WeaveNode};
use weave_nullables::{NullSyncLayer, NullTxPool};
use weave_types::{Address, AssetId, Hash, KeyPair, Timestamp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn mediator_key(i: u8) -> KeyPair {
    keypair_from_seed(&[i; 32])
}

fn mediator(i: u8) -> Address {
    derive_address(&mediator_key(i).public)
}

fn genesis_config() -> GenesisConfig {
    let mut genesis = GenesisConfig::example(mediator(1).as_str());
    genesis.initial_mediator_candidates = (1..=3).map(|i| mediator(i).to_string()).collect();
    genesis
}

struct Harness {
    node: Arc<WeaveNode>,
    sync: Arc<NullSyncLayer>,
    txpool: Arc<NullTxPool>,
}

impl Harness {
    fn new(config: NodeConfig) -> Self {
        let sync = Arc::new(NullSyncLayer::new());
        let txpool = Arc::new(NullTxPool::new());
        let node = WeaveNode::new(config, &genesis_config(), sync.clone(), txpool.clone())
            .expect("node bootstraps");
        Self {
            node: Arc::new(node),
            sync,
            txpool,
        }
    }

    fn genesis(&self) -> Hash {
        self.node.resolver().genesis_hash()
    }

    /// A unit signed by mediator `i` over `parents`.
    fn unit(&self, i: u8, parents: Vec<Hash>, nonce: u64) -> Unit {
        let mut header =
            Header::new(parents, vec![AssetId::PTN], 1_000, 0, nonce.to_le_bytes().to_vec())
                .unwrap();
        header.witnesses = self.node.engine().witnesses();
        header.sign(&mediator_key(i));
        Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::new(nonce))
    }
}

fn test_config() -> NodeConfig {
    NodeConfig {
        orphan_timeout_secs: 2,
        sweep_interval_ms: 100,
        max_fetch_attempts: 1,
        ..NodeConfig::default()
    }
}

fn drain(sub: &mut weave_consensus::Subscription) -> Vec<ConsensusEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitted_unit_joins_main_chain_and_is_announced() {
    let h = Harness::new(test_config());
    let mut sub = h.node.subscribe(EventFilter::all()).unwrap();

    let a = h.unit(1, vec![h.genesis()], 1);
    let index = h.node.submit_unit(a.clone()).await.unwrap();
    assert_eq!(index.index, 1);
    assert!(index.is_main);
    assert_eq!(h.node.resolver().main_chain(&AssetId::PTN), vec![h.genesis(), a.hash()]);

    let events = drain(&mut sub);
    assert!(matches!(
        events.first(),
        Some(ConsensusEvent::UnitAccepted { hash, .. }) if *hash == a.hash()
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        ConsensusEvent::MainChainExtended { index: 1, hash, .. } if *hash == a.hash()
    )));
    assert_eq!(h.txpool.confirmed_units(), vec![a.hash()]);

    let metrics = h.node.metrics().expect("metrics enabled by default");
    assert_eq!(metrics.units_accepted.get(), 1);
    assert_eq!(metrics.main_chain_length.get(), 2);
}

#[tokio::test]
async fn duplicate_submission_is_rejected() {
    let h = Harness::new(test_config());
    let a = h.unit(1, vec![h.genesis()], 1);
    h.node.submit_unit(a.clone()).await.unwrap();

    let err = h.node.submit_unit(a.clone()).await.unwrap_err();
    assert!(matches!(err, NodeError::Dag(DagError::Duplicate(x)) if x == a.hash()));
}

#[tokio::test]
async fn tampered_signature_is_rejected_with_event() {
    let h = Harness::new(test_config());
    let mut sub = h
        .node
        .subscribe(EventFilter::only(&[EventTopic::Unit]))
        .unwrap();

    let mut header = h.unit(1, vec![h.genesis()], 1).header().clone();
    if let Some(author) = header.author.as_mut() {
        author.authentifier.0[0] ^= 0xFF;
    }
    let bad = Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::new(1));

    let err = h.node.submit_unit(bad.clone()).await.unwrap_err();
    assert!(err.is_rejection());
    assert!(!h.node.resolver().contains(&bad.hash()));
    assert!(matches!(
        sub.try_recv(),
        Some(ConsensusEvent::UnitRejected { hash, .. }) if hash == bad.hash()
    ));
}

#[tokio::test]
async fn outsider_unit_is_rejected() {
    let h = Harness::new(test_config());
    let key = keypair_from_seed(&[42; 32]);
    let mut header =
        Header::new(vec![h.genesis()], vec![AssetId::PTN], 1_000, 0, vec![]).unwrap();
    header.sign(&key);
    let unit = Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::new(1));

    let err = h.node.submit_unit(unit).await.unwrap_err();
    assert!(matches!(err, NodeError::Dag(DagError::UnauthorizedAuthor(_))));
}

// ---------------------------------------------------------------------------
// Missing parents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_parent_is_fetched_and_dependent_admitted() {
    let h = Harness::new(test_config());
    let a = h.unit(1, vec![h.genesis()], 1);
    let b = h.unit(2, vec![a.hash()], 2);
    h.sync.offer(a.clone());

    let index = h.node.submit_unit(b.clone()).await.unwrap();
    assert_eq!(index.index, 2);
    assert!(h.node.resolver().contains(&a.hash()));
    assert_eq!(h.sync.fetch_requests(), vec![a.hash()]);
    assert_eq!(h.node.pending_count(), 0);
}

#[tokio::test]
async fn parent_arriving_later_releases_parked_units() {
    let h = Harness::new(test_config());
    let a = h.unit(1, vec![h.genesis()], 1);
    let b = h.unit(2, vec![a.hash()], 2);
    let c = h.unit(3, vec![b.hash()], 3);

    h.node.on_unit_received(c.clone());
    h.node.on_unit_received(b.clone());
    assert!(h.node.is_pending(&b.hash()));
    assert!(h.node.is_pending(&c.hash()));

    h.node.on_unit_received(a.clone());
    assert_eq!(h.node.pending_count(), 0);
    assert_eq!(
        h.node.resolver().main_chain(&AssetId::PTN),
        vec![h.genesis(), a.hash(), b.hash(), c.hash()]
    );
}

#[tokio::test(start_paused = true)]
async fn unit_with_absent_parent_times_out() {
    let h = Harness::new(test_config());
    let mut sub = h
        .node
        .subscribe(EventFilter::only(&[EventTopic::Unit, EventTopic::Orphan]))
        .unwrap();
    h.node.start().unwrap();

    let absent = Hash::new([9; 32]);
    let orphan = h.unit(1, vec![absent], 1);
    let err = h.node.submit_unit(orphan.clone()).await.unwrap_err();
    assert!(matches!(err, NodeError::OrphanTimeout(x) if x == orphan.hash()));
    assert_eq!(h.node.pending_count(), 0);
    assert!(!h.node.resolver().contains(&orphan.hash()));

    let events = drain(&mut sub);
    assert!(matches!(
        events.first(),
        Some(ConsensusEvent::UnitQueued { hash, missing }) if *hash == orphan.hash() && *missing == vec![absent]
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        ConsensusEvent::OrphanTimeout { hash, .. } if *hash == orphan.hash()
    )));
    assert_eq!(h.node.metrics().unwrap().units_orphaned.get(), 1);

    h.node.stop().await;
}

#[tokio::test]
async fn full_pending_table_evicts_oldest() {
    let h = Harness::new(NodeConfig {
        max_pending_units: 1,
        ..test_config()
    });
    let first = h.unit(1, vec![Hash::new([7; 32])], 1);
    let second = h.unit(2, vec![Hash::new([8; 32])], 2);

    let node = h.node.clone();
    let submitted = first.clone();
    let waiting = tokio::spawn(async move { node.submit_unit(submitted).await });
    while !h.node.is_pending(&first.hash()) {
        tokio::task::yield_now().await;
    }

    h.node.on_unit_received(second.clone());
    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, NodeError::PendingEvicted(x) if x == first.hash()));
    assert!(h.node.is_pending(&second.hash()));
    assert_eq!(h.node.pending_count(), 1);
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_is_verified_then_admitted_in_order() {
    let h = Harness::new(test_config());
    let a = h.unit(1, vec![h.genesis()], 1);
    let b = h.unit(2, vec![a.hash()], 2);
    let orphan = h.unit(3, vec![Hash::new([7; 32])], 3);
    let unsigned = Unit::new_at(
        &Header::new(vec![h.genesis()], vec![AssetId::PTN], 1_000, 0, vec![]).unwrap(),
        Vec::<Transaction>::new(),
        Timestamp::new(4),
    );

    let results = h
        .node
        .process_batch(vec![a.clone(), b.clone(), orphan.clone(), unsigned, a.clone()]);
    assert_eq!(results.len(), 5);
    assert!(matches!(&results[0], Ok(Admission::Accepted(i)) if i.index == 1));
    assert!(matches!(&results[1], Ok(Admission::Accepted(i)) if i.index == 2));
    assert!(matches!(&results[2], Ok(Admission::Queued(m)) if *m == vec![Hash::new([7; 32])]));
    assert!(matches!(&results[3], Err(e) if e.is_rejection()));
    assert!(matches!(&results[4], Err(NodeError::Dag(DagError::Duplicate(_)))));
}

// ---------------------------------------------------------------------------
// Authoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mediator_authors_and_broadcasts_in_its_slot() {
    let h = Harness::new(NodeConfig {
        mediator_seed: Some(hex::encode([1u8; 32])),
        ..test_config()
    });
    let mut sub = h
        .node
        .subscribe(EventFilter::only(&[EventTopic::Unit]))
        .unwrap();
    h.node.engine().start().unwrap();

    let own = mediator(1);
    let slot_time = (0..100)
        .map(Timestamp::new)
        .find(|t| h.node.engine().scheduled_author(*t) == own)
        .unwrap();
    let foreign_time = (0..100)
        .map(Timestamp::new)
        .find(|t| h.node.engine().scheduled_author(*t) != own)
        .unwrap();

    assert!(h.node.author_at(foreign_time).await.unwrap().is_none());

    let unit = h.node.author_at(slot_time).await.unwrap().expect("own slot");
    assert_eq!(unit.parents(), &[h.genesis()]);
    assert!(h.node.resolver().contains(&unit.hash()));
    assert_eq!(h.sync.broadcasts(), vec![unit.clone()]);
    assert!(drain(&mut sub).iter().any(|e| matches!(
        e,
        ConsensusEvent::UnitAuthored { hash, author, .. } if *hash == unit.hash() && *author == own
    )));

    // one unit per slot
    assert!(h.node.author_at(slot_time).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_fails_waiting_submitters() {
    let h = Harness::new(NodeConfig {
        orphan_timeout_secs: 600,
        ..test_config()
    });
    h.node.start().unwrap();

    let orphan = h.unit(1, vec![Hash::new([9; 32])], 1);
    let node = h.node.clone();
    let submitted = orphan.clone();
    let waiting = tokio::spawn(async move { node.submit_unit(submitted).await });
    while !h.node.is_pending(&orphan.hash()) {
        tokio::task::yield_now().await;
    }

    h.node.stop().await;
    h.node.stop().await;

    assert!(matches!(waiting.await.unwrap(), Err(NodeError::ShuttingDown)));
    assert_eq!(h.node.engine().state(), EngineState::Stopped);
    assert!(matches!(
        h.node.submit_unit(h.unit(1, vec![h.genesis()], 2)).await,
        Err(NodeError::ShuttingDown)
    ));
    assert!(h.node.start().is_err());
    assert!(h.node.subscribe(EventFilter::all()).is_err());
}

#[tokio::test]
async fn loads_genesis_from_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genesis.json");
    std::fs::write(&path, genesis_config().to_json_pretty()).unwrap();

    let config = NodeConfig {
        genesis_path: path,
        enable_metrics: false,
        ..NodeConfig::default()
    };
    let node = WeaveNode::load(
        config,
        Arc::new(NullSyncLayer::new()),
        Arc::new(NullTxPool::new()),
    )
    .unwrap();
    assert_eq!(node.resolver().unit_count(), 1);
    assert_eq!(node.engine().active_mediators().len(), 3);
    assert!(node.metrics().is_none());

    let missing = NodeConfig {
        genesis_path: dir.path().join("absent.json"),
        ..NodeConfig::default()
    };
    assert!(WeaveNode::load(
        missing,
        Arc::new(NullSyncLayer::new()),
        Arc::new(NullTxPool::new())
    )
    .is_err());
}
