pub mod broadcaster;
pub mod types;

pub use broadcaster::PatchBroadcaster;
pub use types::BroadcastStats;
