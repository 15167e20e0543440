//! IUnknown wire protocol
//!
//! Opnums 0-2 of every DCOM interface. They are never sent on the wire by
//! conforming clients (IRemUnknown carries reference counting instead) but
//! every derived interface inherits their slots.

use crate::types::{Iid, InterfacePointer, OrpcThat, OrpcThis};
use dcerpc::{
    run_hook, Direction, InterfaceDescriptor, Operation, OperationRequest, OperationResponse,
    PrepareHook, Result, SyntaxId, Uuid,
};
use midl_ndr::{NdrReader, NdrWriter, UniquePtr};

pub const IUNKNOWN_UUID: Uuid = Uuid::from_u128(0x00000000_0000_0000_c000_000000000046);

/// IUnknown v0.0, root of every DCOM interface chain
pub static IUNKNOWN: InterfaceDescriptor = InterfaceDescriptor {
    name: "IUnknown",
    syntax: SyntaxId::new(IUNKNOWN_UUID, 0, 0),
    first_opnum: 0,
    opnum_count: 3,
    base: None,
};

pub mod opnum {
    pub const QUERY_INTERFACE: u16 = 0;
    pub const ADD_REF: u16 = 1;
    pub const RELEASE: u16 = 2;
}

/// `HRESULT QueryInterface([in] REFIID riid, [out, iid_is(riid)] void** ppvObject)`
#[derive(Debug, Default)]
pub struct QueryInterfaceOperation {
    pub this: OrpcThis,
    pub that: OrpcThat,
    pub iid: Iid,
    pub object: UniquePtr<InterfacePointer>,
    pub return_value: i32,
    pub hook: Option<PrepareHook<Self>>,
}

impl QueryInterfaceOperation {
    pub const NAME: &'static str = "/IUnknown/v0/QueryInterface";
}

impl Operation for QueryInterfaceOperation {
    fn opnum(&self) -> u16 {
        opnum::QUERY_INTERFACE
    }

    fn op_name(&self) -> &'static str {
        Self::NAME
    }

    fn prepare_request(&mut self) -> Result<()> {
        run_hook(self.hook.clone(), self, Direction::Request)
    }

    fn prepare_response(&mut self) -> Result<()> {
        run_hook(self.hook.clone(), self, Direction::Response)
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.this)?;
        w.encode(&self.iid)?;
        Ok(())
    }

    fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()> {
        self.this = r.decode()?;
        self.iid = r.decode()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.that)?;
        w.encode(&self.object)?;
        w.write_i32(self.return_value);
        Ok(())
    }

    fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()> {
        self.that = r.decode()?;
        self.object = r.decode()?;
        self.return_value = r.read_i32()?;
        Ok(())
    }

    fn status(&self) -> i32 {
        self.return_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryInterfaceRequest {
    pub this: OrpcThis,
    pub iid: Iid,
}

impl OperationRequest for QueryInterfaceRequest {
    type Op = QueryInterfaceOperation;

    fn into_op(self) -> QueryInterfaceOperation {
        QueryInterfaceOperation {
            this: self.this,
            iid: self.iid,
            ..Default::default()
        }
    }

    fn from_op(op: &QueryInterfaceOperation) -> Self {
        Self {
            this: op.this.clone(),
            iid: op.iid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryInterfaceResponse {
    pub that: OrpcThat,
    pub object: Option<InterfacePointer>,
    pub return_value: i32,
}

impl OperationResponse for QueryInterfaceResponse {
    type Op = QueryInterfaceOperation;

    fn into_op(self, op: &mut QueryInterfaceOperation) {
        op.that = self.that;
        op.object = self.object.into();
        op.return_value = self.return_value;
    }

    fn from_op(op: QueryInterfaceOperation) -> Self {
        Self {
            that: op.that,
            object: op.object.into_inner(),
            return_value: op.return_value,
        }
    }
}

/// AddRef and Release share one shape: `ULONG Method(void)`.
///
/// The returned count is not a status word; these calls always succeed at
/// the RPC level.
macro_rules! ref_count_operation {
    ($op:ident, $req:ident, $resp:ident, $opnum:expr, $name:literal) => {
        #[derive(Debug, Default)]
        pub struct $op {
            pub this: OrpcThis,
            pub that: OrpcThat,
            pub return_value: u32,
            pub hook: Option<PrepareHook<Self>>,
        }

        impl $op {
            pub const NAME: &'static str = $name;
        }

        impl Operation for $op {
            fn opnum(&self) -> u16 {
                $opnum
            }

            fn op_name(&self) -> &'static str {
                Self::NAME
            }

            fn prepare_request(&mut self) -> Result<()> {
                run_hook(self.hook.clone(), self, Direction::Request)
            }

            fn prepare_response(&mut self) -> Result<()> {
                run_hook(self.hook.clone(), self, Direction::Response)
            }

            fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.encode(&self.this)?;
                Ok(())
            }

            fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()> {
                self.this = r.decode()?;
                Ok(())
            }

            fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.encode(&self.that)?;
                w.write_u32(self.return_value);
                Ok(())
            }

            fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()> {
                self.that = r.decode()?;
                self.return_value = r.read_u32()?;
                Ok(())
            }
        }

        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $req {
            pub this: OrpcThis,
        }

        impl OperationRequest for $req {
            type Op = $op;

            fn into_op(self) -> $op {
                $op {
                    this: self.this,
                    ..Default::default()
                }
            }

            fn from_op(op: &$op) -> Self {
                Self {
                    this: op.this.clone(),
                }
            }
        }

        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $resp {
            pub that: OrpcThat,
            /// Reference count after the call
            pub return_value: u32,
        }

        impl OperationResponse for $resp {
            type Op = $op;

            fn into_op(self, op: &mut $op) {
                op.that = self.that;
                op.return_value = self.return_value;
            }

            fn from_op(op: $op) -> Self {
                Self {
                    that: op.that,
                    return_value: op.return_value,
                }
            }
        }
    };
}

ref_count_operation!(
    AddRefOperation,
    AddRefRequest,
    AddRefResponse,
    opnum::ADD_REF,
    "/IUnknown/v0/AddRef"
);

ref_count_operation!(
    ReleaseOperation,
    ReleaseRequest,
    ReleaseResponse,
    opnum::RELEASE,
    "/IUnknown/v0/Release"
);
