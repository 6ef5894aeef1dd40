pub mod codec;
pub mod config;
pub mod session;
pub mod store;
pub mod trace;
pub mod transport;
pub mod util;

pub use codec::{decode, hash_identifier, tokenize, ActionDescriptor, Aliases, Token, TraceEvent};
pub use config::Config;
pub use session::{
    ContextIdentity, ContextProfile, ControllerDeps, DeviceClass, EpochRecord, EpochStamp,
    Lifecycle, OriginClass, SessionController, SessionError, SessionEvent, SlotRecord, SlotView,
    SuspendOutcome,
};
pub use store::{MemoryStore, SlotStore, SqliteStore, StoreError};
pub use trace::TraceBuilder;
pub use transport::{BeaconTransport, RecordingTransport, Transport, TransportError};
pub use util::{Clock, ManualClock, SystemClock};
