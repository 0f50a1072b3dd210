pub mod config;
pub mod error;
pub mod host;
pub mod providers;
pub mod registry_client;
pub mod surface;

pub use config::RegistryClientConfig;
pub use error::RegistryClientError;
pub use host::ServiceHost;
pub use providers::Providers;
pub use registry_client::RegistryClient;
pub use surface::DependencySurface;
