pub mod address;
pub mod config;
pub mod logging;
pub mod model;

/// Control signal broadcast to every long-running task in the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
