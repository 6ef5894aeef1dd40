//! Session synchronization across execution contexts.
//!
//! Contexts share nothing but a [`SlotStore`](crate::store::SlotStore). Each
//! runs one [`SessionController`] that claims a slot from a fixed pool,
//! follows the shared epoch, hands the journey off to siblings and archives
//! finished slots for collection.

mod controller;
mod epoch;
mod error;
mod merge;
mod slot;

pub use controller::{
    ContextIdentity, ContextProfile, ControllerDeps, SessionController, SessionEvent, SlotView,
    SuspendOutcome,
};
pub use epoch::{EpochCoordinator, EpochRecord, EpochStamp, EMPTY_BITFIELD};
pub use error::SessionError;
pub use merge::{common_prefix_len, suffix_beyond_common, OPEN_MARKER};
pub use slot::{DeviceClass, Lifecycle, OriginClass, SlotRecord};
