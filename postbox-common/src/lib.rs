pub mod address;
pub mod logging;

pub use tracing;

/// Control-plane signal broadcast to every long-running component.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Stop accepting new work and tear down.
    Shutdown,
    /// A component has finished tearing down.
    Finalised,
}
