//! Several execution contexts sharing nothing but a slot store.

use std::sync::Arc;

use trailmark::{
    Config, ContextIdentity, ContextProfile, ControllerDeps, EpochRecord, ManualClock,
    MemoryStore, RecordingTransport, SessionController, SlotRecord, SlotStore,
};

use super::fixtures::test_clock;

pub struct World {
    pub clock: Arc<ManualClock>,
    pub store: Arc<dyn SlotStore>,
    pub transport: RecordingTransport,
    pub config: Config,
}

impl World {
    pub fn new(config: Config) -> Self {
        let clock = test_clock();
        let store = Arc::new(MemoryStore::new(clock.clone()));
        Self::with_store(clock, store, config)
    }

    pub fn with_store(clock: Arc<ManualClock>, store: Arc<dyn SlotStore>, config: Config) -> Self {
        Self {
            clock,
            store,
            transport: RecordingTransport::new(),
            config,
        }
    }

    pub fn deps(&self) -> ControllerDeps {
        ControllerDeps {
            store: self.store.clone(),
            transport: Arc::new(self.transport.clone()),
            clock: self.clock.clone(),
        }
    }

    /// Start a new context with no carried identity
    pub fn open(&self) -> SessionController {
        self.reopen(None)
    }

    /// Start a context that carries `identity` across a reload
    pub fn reopen(&self, identity: Option<ContextIdentity>) -> SessionController {
        SessionController::init(
            self.config.clone(),
            self.deps(),
            ContextProfile::default(),
            identity,
        )
        .expect("Failed to start context")
    }

    pub fn slot(&self, index: u32) -> Option<SlotRecord> {
        self.store
            .read(&self.config.slot_key(index))
            .expect("Failed to read slot")
            .and_then(|raw| SlotRecord::parse(&raw))
    }

    pub fn epoch(&self) -> EpochRecord {
        let raw = self
            .store
            .read(&self.config.epoch_key())
            .expect("Failed to read epoch")
            .expect("Epoch record missing");
        EpochRecord::parse(&raw).expect("Malformed epoch record")
    }

    /// Every slot payload the collector has received so far
    pub fn delivered(&self) -> Vec<SlotRecord> {
        self.transport
            .delivered_records()
            .iter()
            .map(|raw| SlotRecord::parse(raw).expect("Malformed delivered record"))
            .collect()
    }
}
