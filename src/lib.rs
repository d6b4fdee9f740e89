//! # debugbus
//!
//! Wire protocol and broker for an on-chip debug interconnect.
//!
//! Debug-capable hardware modules and host-side debug tools exchange compact,
//! bit-packed binary packets over a shared debug bus. This crate provides:
//!
//! - **Packet codec** ([`packet`]): allocation, decoding, encoding and header
//!   access for debug packets, 16-bit-word oriented with a variable payload
//!   length.
//! - **Host controller broker** ([`broker`]): a long-running broker that binds
//!   a bus endpoint, accepts connections from modules and tools, and relays
//!   packets between them by destination address.
//! - **Transport** ([`transport`]): length-prefixed framing over in-process
//!   (`inproc://`) and Unix-domain-socket (`ipc://`) endpoints.
//!
//! ## Example
//!
//! ```ignore
//! use debugbus::broker::HostController;
//!
//! #[tokio::main]
//! async fn main() -> debugbus::Result<()> {
//!     let mut hostctrl = HostController::new("ipc:///tmp/debugbus.sock");
//!     hostctrl.start().await?;
//!     assert!(hostctrl.is_running());
//!     // ... modules and tools connect and exchange packets ...
//!     hostctrl.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod error;
pub mod packet;
pub mod transport;

pub use broker::HostController;
pub use error::{BusError, Result};
pub use packet::{Packet, PacketType, RegSubtype};
