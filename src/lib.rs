//! # bearer-dispatch
//!
//! Protocol engine between a modem-side IMS stack and the platform's bearer
//! management.
//!
//! The peer sends fixed-layout binary requests (default bearer activation,
//! bearer deactivation, dedicated bearer activation and modification, and
//! P-CSCF discovery) over a stream socket. The engine drives them through
//! pluggable backends and answers each request with exactly one response or
//! reject. It also forwards unsolicited notifications (bearer loss,
//! network-initiated dedicated bearers, global addresses) to the peer.
//!
//! ## Architecture
//!
//! - **Wire** ([`protocol`], [`codec`], [`message`], [`model`]): 8-byte
//!   header framing plus the C-struct payload layouts
//! - **Engine** ([`engine`]): one dispatch task owning all state; frames and
//!   [`BackendEvent`]s are handled in arrival order
//! - **Backends** ([`backend`]): traits for bearer control, connectivity,
//!   DHCP SIP discovery and the ISIM
//!
//! ## Example
//!
//! ```ignore
//! use bearer_dispatch::{EngineBuilder, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> bearer_dispatch::Result<()> {
//!     let socket = tokio::net::UnixStream::connect("/dev/socket/ims_bearer").await?;
//!     let handle = EngineBuilder::new(bearer_backend, network_backend)
//!         .sip_discovery(sip_backend)
//!         .config(EngineConfig::from_path("/etc/bearer-dispatch.json")?)
//!         .start(socket);
//!     handle.enable()?;
//!     handle.wait_for_shutdown().await
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod pcscf;
pub mod protocol;
pub mod transaction;
pub mod writer;

pub use config::EngineConfig;
pub use engine::{Backends, EngineBuilder, EngineHandle};
pub use error::{EngineError, Result};
pub use event::{BackendEvent, EventSender, PcoCompletion};
