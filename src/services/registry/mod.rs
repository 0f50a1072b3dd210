//! Registry module
//!
//! - `types`: wire types shared by the registry and registered services
//! - `error`: registry and delivery errors
//! - `store`: the registration store and its add/remove protocol

pub mod error;
pub mod store;
pub mod types;

pub use error::{DeliveryError, RegistryError};
pub use store::RegistrationStore;
pub use types::{Patch, PatchEntry, Registration, ServiceName};
