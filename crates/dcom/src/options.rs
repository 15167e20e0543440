//! Construction options shared by every DCOM client and server

use crate::types::Ipid;
use dcerpc::Binding;

/// Options for building an interface client.
///
/// With `superclass` set the client reuses that binding instead of binding
/// its own syntax; derived clients pass their binding down this way to the
/// base client they embed.
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    pub superclass: Option<Binding>,
    /// Object the client talks to. Calls fail with `MissingIdentity` until
    /// one is set.
    pub ipid: Option<Ipid>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn superclass(binding: Binding) -> Self {
        Self {
            superclass: Some(binding),
            ipid: None,
        }
    }

    pub fn with_ipid(mut self, ipid: Ipid) -> Self {
        self.ipid = Some(ipid);
        self
    }
}

/// Options for registering an interface server.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    /// Also route calls carrying this object id to the server. Calls bound
    /// to an interface the server does not derive from are rejected.
    pub ipid: Option<Ipid>,
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ipid(mut self, ipid: Ipid) -> Self {
        self.ipid = Some(ipid);
        self
    }
}
