//! Events published on the consensus bus.

use std::collections::BTreeSet;
use weave_dag::ChainIndex;
use weave_types::{Address, AssetId, Hash};

/// Coarse grouping of events, used by subscribers to filter the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventTopic {
    Engine,
    Unit,
    MainChain,
    Orphan,
    Round,
}

impl EventTopic {
    pub const ALL: [EventTopic; 5] = [
        EventTopic::Engine,
        EventTopic::Unit,
        EventTopic::MainChain,
        EventTopic::Orphan,
        EventTopic::Round,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsensusEvent {
    EngineStarted,
    /// Last event a subscriber sees before its feed closes.
    EngineStopped,
    /// The local mediator produced a unit.
    UnitAuthored {
        hash: Hash,
        author: Address,
        chain_index: ChainIndex,
    },
    UnitAccepted {
        hash: Hash,
        chain_index: ChainIndex,
    },
    /// Held until its missing parents arrive.
    UnitQueued {
        hash: Hash,
        missing: Vec<Hash>,
    },
    UnitRejected {
        hash: Hash,
        reason: String,
    },
    MainChainExtended {
        asset: AssetId,
        index: u64,
        hash: Hash,
    },
    UnitStable {
        asset: AssetId,
        index: u64,
        hash: Hash,
    },
    /// Two units by one author over the same parent set. Both are kept.
    DoubleAuthoring {
        author: Address,
        existing: Hash,
        incoming: Hash,
    },
    /// A pending unit was evicted because its parents never arrived.
    OrphanTimeout {
        hash: Hash,
        missing: Vec<Hash>,
    },
    RoundAdvanced {
        round: u64,
        slot: u64,
        scheduled: Address,
    },
    MediatorsUpdated {
        mediators: Vec<Address>,
    },
    GasPriceChanged {
        previous: u64,
        current: u64,
    },
}

impl ConsensusEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::EngineStarted
            | Self::EngineStopped
            | Self::MediatorsUpdated { .. }
            | Self::GasPriceChanged { .. } => EventTopic::Engine,
            Self::UnitAuthored { .. }
            | Self::UnitAccepted { .. }
            | Self::UnitQueued { .. }
            | Self::UnitRejected { .. }
            | Self::DoubleAuthoring { .. } => EventTopic::Unit,
            Self::MainChainExtended { .. } | Self::UnitStable { .. } => EventTopic::MainChain,
            Self::OrphanTimeout { .. } => EventTopic::Orphan,
            Self::RoundAdvanced { .. } => EventTopic::Round,
        }
    }

    /// Short name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EngineStarted => "engine_started",
            Self::EngineStopped => "engine_stopped",
            Self::UnitAuthored { .. } => "unit_authored",
            Self::UnitAccepted { .. } => "unit_accepted",
            Self::UnitQueued { .. } => "unit_queued",
            Self::UnitRejected { .. } => "unit_rejected",
            Self::MainChainExtended { .. } => "main_chain_extended",
            Self::UnitStable { .. } => "unit_stable",
            Self::DoubleAuthoring { .. } => "double_authoring",
            Self::OrphanTimeout { .. } => "orphan_timeout",
            Self::RoundAdvanced { .. } => "round_advanced",
            Self::MediatorsUpdated { .. } => "mediators_updated",
            Self::GasPriceChanged { .. } => "gas_price_changed",
        }
    }
}

/// Which topics a subscription receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter {
    topics: BTreeSet<EventTopic>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self {
            topics: EventTopic::ALL.into_iter().collect(),
        }
    }

    pub fn only(topics: &[EventTopic]) -> Self {
        Self {
            topics: topics.iter().copied().collect(),
        }
    }

    pub fn matches(&self, event: &ConsensusEvent) -> bool {
        self.topics.contains(&event.topic())
    }

    pub fn topics(&self) -> impl Iterator<Item = EventTopic> + '_ {
        self.topics.iter().copied()
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}
