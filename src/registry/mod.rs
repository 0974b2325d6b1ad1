//! Subscriber registry: typed model, subscription gate and persistence.

mod gate;
mod model;
mod shared;
mod store;
mod subject;
mod tracked;

pub use gate::is_entitled;
pub use model::{OwnerId, Registry};
pub use shared::SharedRegistry;
pub use store::{RegistryStore, StoreError};
pub use subject::{MAX_SUBJECT_LEN, Subject};
pub use tracked::{BanOutcome, TrackedUser, WatchOutcome};
