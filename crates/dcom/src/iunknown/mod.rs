//! IUnknown (opnums 0-2)
//!
//! Root of every DCOM interface chain. Derived interfaces embed
//! [`UnknownClient`] and forward opnums below their own range to
//! [`unknown_server_handle`].

mod client;
mod protocol;
mod server;

pub use client::UnknownClient;
pub use protocol::*;
pub use server::{
    register_unknown_server, unknown_server_handle, UnimplementedUnknownServer, UnknownServer,
    UnknownServerHandle,
};
