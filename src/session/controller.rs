//! Per-context session state machine.
//!
//! Slot states as seen by the owning context:
//! `unclaimed -> active -> stored -> archived -> (deleted)`.
//!
//! Every write to shared state is preceded by a read of the epoch record. A
//! changed epoch is never an error: the context drops its local session and
//! follows the shared one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::epoch::{EpochCoordinator, EpochStamp};
use super::error::SessionError;
use super::merge::{has_open_continuation, partial_of, suffix_beyond_common, terminate_continuation};
use super::slot::{DeviceClass, Lifecycle, OriginClass, SlotRecord};
use crate::codec::{ActionDescriptor, Aliases};
use crate::config::Config;
use crate::store::SlotStore;
use crate::trace::TraceBuilder;
use crate::transport::Transport;
use crate::util::Clock;

/// Collaborators shared with sibling contexts.
#[derive(Clone)]
pub struct ControllerDeps {
    pub store: Arc<dyn SlotStore>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
}

/// Classification fields stamped on every slot this context writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextProfile {
    pub device: DeviceClass,
    pub origin: OriginClass,
}

/// What a context carries across reloads to find its slot again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextIdentity {
    pub slot: u32,
    pub epoch: EpochStamp,
}

/// One normalized event from the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Space(String),
    Action(ActionDescriptor),
    Position(String),
    Value(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// A sibling context is still active and carries the journey.
    Handoff,
    /// No sibling is active; archival waits for termination.
    LastStanding,
}

/// The owned slot as this context last wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub index: u32,
    pub lifecycle: Lifecycle,
    pub coarse: u32,
    pub fine: u32,
}

impl SlotView {
    fn fresh(index: u32) -> Self {
        Self {
            index,
            lifecycle: Lifecycle::Active,
            coarse: 0,
            fine: 0,
        }
    }
}

pub struct SessionController {
    config: Config,
    store: Arc<dyn SlotStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    aliases: Arc<Aliases>,
    coordinator: EpochCoordinator,
    profile: ContextProfile,
    epoch: EpochStamp,
    slot: Option<SlotView>,
    trace: TraceBuilder,
    closed: bool,
}

impl SessionController {
    /// Attach a starting context: restore the carried slot if it is still
    /// live, otherwise claim one.
    pub fn init(
        config: Config,
        deps: ControllerDeps,
        profile: ContextProfile,
        identity: Option<ContextIdentity>,
    ) -> Result<Self, SessionError> {
        let coordinator = EpochCoordinator::new(
            deps.store.clone(),
            deps.clock.clone(),
            config.epoch_key(),
            config.epoch_ttl,
        );
        let epoch = coordinator.ensure()?.stamp;
        let aliases = Arc::new(config.aliases.clone());
        let trace = TraceBuilder::new(deps.clock.clone(), aliases.clone(), config.tick_ms);

        let mut controller = Self {
            config,
            store: deps.store,
            transport: deps.transport,
            clock: deps.clock,
            aliases,
            coordinator,
            profile,
            epoch,
            slot: None,
            trace,
            closed: false,
        };

        let restored = match identity {
            Some(identity) if identity.epoch == controller.epoch => {
                controller.try_attach(identity.slot)?
            }
            _ => false,
        };
        if !restored {
            controller.claim()?;
        }
        Ok(controller)
    }

    /// Record one event into the owned slot.
    ///
    /// If the grown slot would exceed the configured ceiling, the slot is
    /// stored as it was and the event lands in a newly claimed slot.
    pub fn record(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.sync_epoch()?;

        let snapshot = (self.trace.clone(), self.slot.clone());
        self.apply(&event);

        if self.encoded_len() > self.config.slot_capacity_bytes {
            let (trace, slot) = snapshot;
            self.trace = trace;
            self.slot = slot;
            self.rotate_for_capacity()?;
            self.apply(&event);
            if self.encoded_len() > self.config.slot_capacity_bytes {
                warn!(
                    slot = self.slot_index(),
                    bytes = self.encoded_len(),
                    "Single event exceeds slot capacity"
                );
            }
        }

        self.save()
    }

    /// Context lost visibility.
    pub fn suspend(&mut self) -> Result<SuspendOutcome, SessionError> {
        self.ensure_open()?;
        self.sync_epoch()?;

        let own = self.slot_index();
        let head = self.coordinator.read()?.and_then(|record| record.head());
        if head == Some(own) && !has_open_continuation(&self.trace.serialize()) {
            self.trace.mark_continuation();
        }
        self.set_lifecycle(Lifecycle::Stored);
        self.save()?;

        let outcome = if self.active_siblings()? > 0 {
            SuspendOutcome::Handoff
        } else {
            SuspendOutcome::LastStanding
        };
        debug!(slot = own, outcome = ?outcome, "Suspended");
        Ok(outcome)
    }

    /// Context regained visibility: re-attach to shared state, then take
    /// over the handoff chain.
    pub fn focus(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.sync_epoch()? {
            let own = self.slot_index();
            if !self.try_attach(own)? {
                info!(slot = own, "Owned slot no longer live; claiming");
                self.claim()?;
            }
        }
        self.handoff()
    }

    /// Roll the whole journey forward: archive and collect every slot, mint
    /// a new epoch and take slot 1.
    pub fn rotate_epoch(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.sync_epoch()?;
        let index = self.roll_journey()?;
        self.take_slot(index)
    }

    /// Context is terminating. The last active context archives the pool.
    pub fn teardown(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.sync_epoch()?;
        self.set_lifecycle(Lifecycle::Stored);
        self.save()?;

        let siblings = self.active_siblings()?;
        if siblings > 0 {
            debug!(siblings, "Deferring archival to active siblings");
        } else {
            self.archive_all()?;
        }

        self.slot = None;
        self.closed = true;
        Ok(())
    }

    pub fn identity(&self) -> Option<ContextIdentity> {
        self.slot.as_ref().map(|slot| ContextIdentity {
            slot: slot.index,
            epoch: self.epoch.clone(),
        })
    }

    pub fn epoch(&self) -> &EpochStamp {
        &self.epoch
    }

    pub fn slot(&self) -> Option<&SlotView> {
        self.slot.as_ref()
    }

    pub fn profile(&self) -> ContextProfile {
        self.profile
    }

    /// The owned trace as it would be written now.
    pub fn trace(&self) -> String {
        self.trace.serialize()
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn slot_index(&self) -> u32 {
        self.slot.as_ref().map(|slot| slot.index).unwrap_or(1)
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        if let Some(slot) = self.slot.as_mut() {
            slot.lifecycle = lifecycle;
        }
    }

    fn apply(&mut self, event: &SessionEvent) {
        let Some(slot) = self.slot.as_mut() else {
            return;
        };
        slot.lifecycle = Lifecycle::Active;
        match event {
            SessionEvent::Space(identifier) => self.trace.record_space(identifier),
            SessionEvent::Action(descriptor) => {
                self.trace.record_action(descriptor);
                slot.coarse += 1;
            }
            SessionEvent::Position(value) => {
                self.trace.record_position(value);
                slot.fine += 1;
            }
            SessionEvent::Value(value) => {
                self.trace.record_value(value);
                slot.fine += 1;
            }
        }
    }

    fn current_record(&self) -> Option<SlotRecord> {
        self.slot.as_ref().map(|slot| SlotRecord {
            lifecycle: slot.lifecycle,
            epoch: self.epoch.clone(),
            device: self.profile.device,
            origin: self.profile.origin,
            coarse: slot.coarse,
            fine: slot.fine,
            duration_ticks: self.trace.elapsed_ticks(),
            trace: self.trace.serialize(),
        })
    }

    fn encoded_len(&self) -> usize {
        self.current_record()
            .map(|record| record.to_string().len())
            .unwrap_or(0)
    }

    /// Write the owned slot and keep the epoch record alive with it.
    fn save(&self) -> Result<(), SessionError> {
        if let (Some(slot), Some(record)) = (self.slot.as_ref(), self.current_record()) {
            self.store.write(
                &self.config.slot_key(slot.index),
                &record.to_string(),
                self.config.slot_ttl,
            )?;
            if !self.coordinator.touch()? {
                debug!(epoch = %self.epoch, "Epoch record expired before refresh");
            }
        }
        Ok(())
    }

    fn read_slot(&self, index: u32) -> Result<Option<SlotRecord>, SessionError> {
        let key = self.config.slot_key(index);
        let Some(raw) = self.store.read(&key)? else {
            return Ok(None);
        };
        let parsed = SlotRecord::parse(&raw);
        if parsed.is_none() {
            warn!(key = %key, "Treating malformed slot as absent");
        }
        Ok(parsed)
    }

    fn pool(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.config.pool_size
    }

    /// Re-read the epoch record. Returns true if the epoch moved and local
    /// state was replaced by a freshly claimed slot.
    fn sync_epoch(&mut self) -> Result<bool, SessionError> {
        let record = match self.coordinator.read()? {
            Some(record) => record,
            None => self.coordinator.mint(None)?,
        };
        if record.stamp == self.epoch {
            return Ok(false);
        }

        info!(
            from = %self.epoch,
            to = %record.stamp,
            "Epoch changed; following shared epoch"
        );
        self.epoch = record.stamp;
        self.slot = None;
        self.trace = self.fresh_trace();
        self.claim()?;
        Ok(true)
    }

    fn fresh_trace(&self) -> TraceBuilder {
        TraceBuilder::new(self.clock.clone(), self.aliases.clone(), self.config.tick_ms)
    }

    /// Adopt slot `index` if it holds a live, non-archived record of the
    /// current epoch.
    fn try_attach(&mut self, index: u32) -> Result<bool, SessionError> {
        if !self.pool().contains(&index) {
            return Ok(false);
        }
        let Some(record) = self.read_slot(index)? else {
            return Ok(false);
        };
        if !record.belongs_to(&self.epoch) || record.lifecycle == Lifecycle::Archived {
            return Ok(false);
        }

        self.trace.resume(&record.trace, record.duration_ticks);
        self.slot = Some(SlotView {
            index,
            lifecycle: Lifecycle::Active,
            coarse: record.coarse,
            fine: record.fine,
        });
        self.save()?;
        debug!(slot = index, "Attached to existing slot");
        Ok(true)
    }

    fn claim(&mut self) -> Result<(), SessionError> {
        self.sweep_stale()?;
        self.collect()?;
        let index = match self.first_free()? {
            Some(index) => index,
            None => {
                info!(pool = self.config.pool_size, "Slot pool exhausted; rolling journey");
                self.roll_journey()?
            }
        };
        self.take_slot(index)
    }

    fn take_slot(&mut self, index: u32) -> Result<(), SessionError> {
        self.trace = self.fresh_trace();
        self.slot = Some(SlotView::fresh(index));
        self.save()?;
        info!(slot = index, epoch = %self.epoch, "Claimed slot");
        Ok(())
    }

    fn first_free(&self) -> Result<Option<u32>, SessionError> {
        for index in self.pool() {
            if self.read_slot(index)?.is_none() {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn rotate_for_capacity(&mut self) -> Result<(), SessionError> {
        let old = self.slot_index();
        self.set_lifecycle(Lifecycle::Stored);
        self.save()?;
        let was_head = self.coordinator.read()?.and_then(|r| r.head()) == Some(old);
        let successor = self.trace.successor();

        self.claim()?;
        self.trace = successor;
        let new = self.slot_index();
        if was_head && new != old {
            self.coordinator.append_handoff(new)?;
        }
        info!(from = old, to = new, "Slot full; rotated");
        Ok(())
    }

    fn archive_all(&mut self) -> Result<(), SessionError> {
        for index in self.pool() {
            if let Some(record) = self.read_slot(index)? {
                if record.lifecycle != Lifecycle::Archived {
                    self.archive_slot(index, record)?;
                }
            }
        }
        Ok(())
    }

    /// Slots from an older epoch go to the archival pipeline before any new
    /// slot is written.
    fn sweep_stale(&mut self) -> Result<(), SessionError> {
        for index in self.pool() {
            if let Some(record) = self.read_slot(index)? {
                if !record.belongs_to(&self.epoch) && record.lifecycle != Lifecycle::Archived {
                    debug!(slot = index, epoch = %record.epoch, "Archiving stale slot");
                    self.archive_slot(index, record)?;
                }
            }
        }
        Ok(())
    }

    fn archive_slot(&self, index: u32, mut record: SlotRecord) -> Result<(), SessionError> {
        let key = self.config.slot_key(index);
        if record.coarse < self.config.delete_threshold {
            self.store.delete(&key)?;
            debug!(slot = index, coarse = record.coarse, "Deleted short slot");
        } else {
            record.lifecycle = Lifecycle::Archived;
            self.store
                .write(&key, &record.to_string(), self.config.slot_ttl)?;
            debug!(slot = index, "Archived slot");
        }
        Ok(())
    }

    /// Hand the backlog and every archived slot to the transport and delete
    /// them on success.
    fn collect(&self) -> Result<usize, SessionError> {
        let backlog_key = self.config.backlog_key();
        let backlog = self.store.read(&backlog_key)?.unwrap_or_default();
        let prefix = self.config.slot_prefix();
        let mut archived: Vec<(u32, String, String)> = self
            .store
            .scan_all(&prefix)?
            .into_iter()
            .filter_map(|(key, raw)| {
                let index = key.strip_prefix(&prefix)?.parse().ok()?;
                let record = SlotRecord::parse(&raw)?;
                (record.lifecycle == Lifecycle::Archived).then_some((index, key, raw))
            })
            .collect();
        archived.sort_by_key(|(index, _, _)| *index);

        let payloads: Vec<&str> = backlog
            .lines()
            .filter(|line| !line.is_empty())
            .chain(archived.iter().map(|(_, _, raw)| raw.as_str()))
            .collect();
        if payloads.is_empty() {
            return Ok(0);
        }
        let count = payloads.len();
        if let Err(e) = self.transport.deliver(payloads.join("\n")) {
            warn!(error = %e, slots = count, "Delivery failed; slots stay archived");
            return Ok(0);
        }

        if !backlog.is_empty() {
            self.store.delete(&backlog_key)?;
        }
        for (_, key, _) in &archived {
            self.store.delete(key)?;
        }
        info!(slots = count, "Collected archived slots");
        Ok(count)
    }

    /// Move an undelivered archived slot to the backlog so its slot can be
    /// reused.
    fn park_slot(&self, index: u32) -> Result<(), SessionError> {
        let key = self.config.slot_key(index);
        let Some(raw) = self.store.read(&key)? else {
            return Ok(());
        };
        let backlog_key = self.config.backlog_key();
        let backlog = match self.store.read(&backlog_key)? {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{raw}"),
            _ => raw,
        };
        self.store
            .write(&backlog_key, &backlog, self.config.slot_ttl)?;
        self.store.delete(&key)?;
        warn!(slot = index, "Parked undelivered slot in backlog");
        Ok(())
    }

    /// Archive everything, collect, and mint the next epoch. Returns the slot
    /// to take under the new epoch: slot 1 unless undelivered archives remain,
    /// which are never overwritten.
    fn roll_journey(&mut self) -> Result<u32, SessionError> {
        self.archive_all()?;
        self.collect()?;
        let record = self.coordinator.mint(Some(&self.epoch))?;
        self.epoch = record.stamp;
        match self.first_free()? {
            Some(index) => Ok(index),
            None => {
                self.park_slot(1)?;
                Ok(1)
            }
        }
    }

    fn active_siblings(&self) -> Result<usize, SessionError> {
        let own = self.slot.as_ref().map(|slot| slot.index);
        let mut count = 0;
        for index in self.pool() {
            if Some(index) == own {
                continue;
            }
            if let Some(record) = self.read_slot(index)? {
                if record.belongs_to(&self.epoch) && record.lifecycle == Lifecycle::Active {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn handoff(&mut self) -> Result<(), SessionError> {
        let own = self.slot_index();
        self.set_lifecycle(Lifecycle::Active);
        let previous = self.coordinator.append_handoff(own)?;
        match previous {
            Some(previous) if previous != own => self.merge_from(previous, own)?,
            _ => {
                // Nobody took over while hidden.
                self.trace.reopen();
            }
        }
        self.save()
    }

    /// Terminate the previous owner's open continuation and drop the part of
    /// this trace both contexts already recorded.
    fn merge_from(&mut self, previous: u32, own: u32) -> Result<(), SessionError> {
        let Some(mut record) = self.read_slot(previous)? else {
            return Ok(());
        };
        if !record.belongs_to(&self.epoch) || !has_open_continuation(&record.trace) {
            return Ok(());
        }

        let partial = partial_of(&record.trace).to_string();
        record.trace = terminate_continuation(&record.trace, own);
        self.store.write(
            &self.config.slot_key(previous),
            &record.to_string(),
            self.config.slot_ttl,
        )?;

        let own_trace = self.trace.serialize();
        let suffix = suffix_beyond_common(&partial, &own_trace);
        if suffix.len() < own_trace.len() {
            debug!(
                from = previous,
                dropped = own_trace.len() - suffix.len(),
                "Dropped prefix shared with previous owner"
            );
            let suffix = suffix.to_string();
            let elapsed = self.trace.elapsed_ticks();
            self.trace.resume(&suffix, elapsed);
        }
        debug!(from = previous, to = own, "Took over journey");
        Ok(())
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("epoch", &self.epoch)
            .field("slot", &self.slot)
            .field("closed", &self.closed)
            .finish()
    }
}
