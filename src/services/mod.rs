pub mod broadcast;
pub mod client;
pub mod heartbeat;
pub mod registry;
pub mod router;
pub mod transport;

pub use broadcast::{BroadcastStats, PatchBroadcaster};
pub use heartbeat::{HealthState, HeartbeatConfig, HeartbeatMonitor};
pub use registry::{
    DeliveryError, Patch, PatchEntry, Registration, RegistrationStore, RegistryError, ServiceName,
};
pub use router::ControlPlane;
pub use transport::{HttpTransport, ServiceTransport};
