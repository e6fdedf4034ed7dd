//! The SMTP face of the gateway.
//!
//! A [`server::SmtpServer`] accepts connections and hands each one to a
//! [`session::Session`], which walks the client through the protocol with a
//! small state machine. The session only sequences commands; everything
//! that needs routing knowledge or storage goes through the [`Gateway`].

pub mod command;
pub mod gateway;
pub mod server;
pub mod session;
pub mod state;
pub mod status;

pub use gateway::Gateway;
pub use server::SmtpServer;
