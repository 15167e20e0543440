//! IRemUnknown (MS-DCOM 3.1.1.5.6)
//!
//! Remote reference counting and interface queries, derived from IUnknown:
//! - RemQueryInterface (opnum 3)
//! - RemAddRef (opnum 4)
//! - RemRelease (opnum 5)

mod client;
mod protocol;
mod server;

pub use client::RemUnknownClient;
pub use protocol::*;
pub use server::{
    register_rem_unknown_server, rem_unknown_server_handle, RemUnknownServer,
    RemUnknownServerHandle, UnimplementedRemUnknownServer,
};
