//! IRemUnknown wire protocol

use crate::iunknown::IUNKNOWN;
use crate::types::{Iid, Ipid, OrpcThat, OrpcThis, RemInterfaceRef, RemQiResult};
use dcerpc::{
    run_hook, Direction, InterfaceDescriptor, Operation, OperationRequest, OperationResponse,
    PrepareHook, Result, SyntaxId, Uuid,
};
use midl_ndr::{ConformantArray, NdrError, NdrReader, NdrWriter, UniquePtr};

pub const IREMUNKNOWN_UUID: Uuid = Uuid::from_u128(0x00000131_0000_0000_c000_000000000046);

/// IRemUnknown v0.0
pub static IREMUNKNOWN: InterfaceDescriptor = InterfaceDescriptor {
    name: "IRemUnknown",
    syntax: SyntaxId::new(IREMUNKNOWN_UUID, 0, 0),
    first_opnum: 3,
    opnum_count: 3,
    base: Some(&IUNKNOWN),
};

pub mod opnum {
    pub const REM_QUERY_INTERFACE: u16 = 3;
    pub const REM_ADD_REF: u16 = 4;
    pub const REM_RELEASE: u16 = 5;
}

/// Fill a zero `count` from `items`, then pad or cut `items` to `count`.
fn correlate<T: Clone + Default>(
    count: &mut u16,
    items: &mut ConformantArray<T>,
    field: &'static str,
) -> Result<()> {
    if *count == 0 && !items.is_empty() {
        *count = u16::try_from(items.len()).map_err(|_| NdrError::IntegerOverflow(field))?;
    }
    items.resize(usize::from(*count), T::default());
    Ok(())
}

/// Reject an array whose length disagrees with its `size_is` field.
fn check_correlation(count: u16, len: usize) -> Result<()> {
    if len != usize::from(count) {
        return Err(NdrError::ConformanceMismatch {
            max_count: u32::try_from(len).unwrap_or(u32::MAX),
            actual_count: u32::from(count),
        }
        .into());
    }
    Ok(())
}

/// `HRESULT RemQueryInterface([in] REFIPID ripid, [in] ULONG cRefs,
/// [in] unsigned short cIids, [in, size_is(cIids)] IID* iids,
/// [out, size_is(,cIids)] REMQIRESULT** ppQIResults)`
#[derive(Debug, Default)]
pub struct RemQueryInterfaceOperation {
    pub this: OrpcThis,
    pub that: OrpcThat,
    pub ipid: Ipid,
    pub refs: u32,
    pub iids_count: u16,
    pub iids: ConformantArray<Iid>,
    pub qi_results: UniquePtr<ConformantArray<RemQiResult>>,
    pub return_value: i32,
    pub hook: Option<PrepareHook<Self>>,
}

impl RemQueryInterfaceOperation {
    pub const NAME: &'static str = "/IRemUnknown/v0/RemQueryInterface";
}

impl Operation for RemQueryInterfaceOperation {
    fn opnum(&self) -> u16 {
        opnum::REM_QUERY_INTERFACE
    }

    fn op_name(&self) -> &'static str {
        Self::NAME
    }

    fn prepare_request(&mut self) -> Result<()> {
        correlate(&mut self.iids_count, &mut self.iids, "cIids")?;
        run_hook(self.hook.clone(), self, Direction::Request)
    }

    fn prepare_response(&mut self) -> Result<()> {
        if let Some(results) = self.qi_results.get_mut() {
            results.resize(usize::from(self.iids_count), RemQiResult::default());
        }
        run_hook(self.hook.clone(), self, Direction::Response)
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        check_correlation(self.iids_count, self.iids.len())?;
        w.encode(&self.this)?;
        w.encode(&self.ipid)?;
        w.write_u32(self.refs);
        w.write_u16(self.iids_count);
        w.encode(&self.iids)?;
        Ok(())
    }

    fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()> {
        self.this = r.decode()?;
        self.ipid = r.decode()?;
        self.refs = r.read_u32()?;
        self.iids_count = r.read_u16()?;
        self.iids = r.decode()?;
        check_correlation(self.iids_count, self.iids.len())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.that)?;
        w.encode(&self.qi_results)?;
        w.write_i32(self.return_value);
        Ok(())
    }

    fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()> {
        self.that = r.decode()?;
        self.qi_results = r.decode()?;
        self.return_value = r.read_i32()?;
        Ok(())
    }

    fn status(&self) -> i32 {
        self.return_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemQueryInterfaceRequest {
    pub this: OrpcThis,
    /// Object to query
    pub ipid: Ipid,
    /// Public references requested on each returned interface
    pub refs: u32,
    /// Filled from `iids` when zero
    pub iids_count: u16,
    pub iids: Vec<Iid>,
}

impl OperationRequest for RemQueryInterfaceRequest {
    type Op = RemQueryInterfaceOperation;

    fn into_op(self) -> RemQueryInterfaceOperation {
        RemQueryInterfaceOperation {
            this: self.this,
            ipid: self.ipid,
            refs: self.refs,
            iids_count: self.iids_count,
            iids: self.iids.into(),
            ..Default::default()
        }
    }

    fn from_op(op: &RemQueryInterfaceOperation) -> Self {
        Self {
            this: op.this.clone(),
            ipid: op.ipid,
            refs: op.refs,
            iids_count: op.iids_count,
            iids: op.iids.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemQueryInterfaceResponse {
    pub that: OrpcThat,
    /// One result per requested IID; empty when the server sent none
    pub qi_results: Vec<RemQiResult>,
    pub return_value: i32,
}

impl OperationResponse for RemQueryInterfaceResponse {
    type Op = RemQueryInterfaceOperation;

    fn into_op(self, op: &mut RemQueryInterfaceOperation) {
        op.that = self.that;
        op.qi_results = if self.qi_results.is_empty() {
            UniquePtr::null()
        } else {
            UniquePtr::new(self.qi_results.into())
        };
        op.return_value = self.return_value;
    }

    fn from_op(op: RemQueryInterfaceOperation) -> Self {
        Self {
            that: op.that,
            qi_results: op
                .qi_results
                .into_inner()
                .map(ConformantArray::into_inner)
                .unwrap_or_default(),
            return_value: op.return_value,
        }
    }
}

/// `HRESULT RemAddRef([in] unsigned short cInterfaceRefs,
/// [in, size_is(cInterfaceRefs)] REMINTERFACEREF InterfaceRefs[],
/// [out, size_is(cInterfaceRefs)] HRESULT* pResults)`
#[derive(Debug, Default)]
pub struct RemAddRefOperation {
    pub this: OrpcThis,
    pub that: OrpcThat,
    pub interface_refs_count: u16,
    pub interface_refs: ConformantArray<RemInterfaceRef>,
    pub results: ConformantArray<i32>,
    pub return_value: i32,
    pub hook: Option<PrepareHook<Self>>,
}

impl RemAddRefOperation {
    pub const NAME: &'static str = "/IRemUnknown/v0/RemAddRef";
}

impl Operation for RemAddRefOperation {
    fn opnum(&self) -> u16 {
        opnum::REM_ADD_REF
    }

    fn op_name(&self) -> &'static str {
        Self::NAME
    }

    fn prepare_request(&mut self) -> Result<()> {
        correlate(
            &mut self.interface_refs_count,
            &mut self.interface_refs,
            "cInterfaceRefs",
        )?;
        run_hook(self.hook.clone(), self, Direction::Request)
    }

    fn prepare_response(&mut self) -> Result<()> {
        self.results
            .resize(usize::from(self.interface_refs_count), 0);
        run_hook(self.hook.clone(), self, Direction::Response)
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        check_correlation(self.interface_refs_count, self.interface_refs.len())?;
        w.encode(&self.this)?;
        w.write_u16(self.interface_refs_count);
        w.encode(&self.interface_refs)?;
        Ok(())
    }

    fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()> {
        self.this = r.decode()?;
        self.interface_refs_count = r.read_u16()?;
        self.interface_refs = r.decode()?;
        check_correlation(self.interface_refs_count, self.interface_refs.len())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.that)?;
        w.encode(&self.results)?;
        w.write_i32(self.return_value);
        Ok(())
    }

    fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()> {
        self.that = r.decode()?;
        self.results = r.decode()?;
        self.return_value = r.read_i32()?;
        Ok(())
    }

    fn status(&self) -> i32 {
        self.return_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemAddRefRequest {
    pub this: OrpcThis,
    /// Filled from `interface_refs` when zero
    pub interface_refs_count: u16,
    pub interface_refs: Vec<RemInterfaceRef>,
}

impl OperationRequest for RemAddRefRequest {
    type Op = RemAddRefOperation;

    fn into_op(self) -> RemAddRefOperation {
        RemAddRefOperation {
            this: self.this,
            interface_refs_count: self.interface_refs_count,
            interface_refs: self.interface_refs.into(),
            ..Default::default()
        }
    }

    fn from_op(op: &RemAddRefOperation) -> Self {
        Self {
            this: op.this.clone(),
            interface_refs_count: op.interface_refs_count,
            interface_refs: op.interface_refs.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemAddRefResponse {
    pub that: OrpcThat,
    /// Per-reference HRESULTs
    pub results: Vec<i32>,
    pub return_value: i32,
}

impl OperationResponse for RemAddRefResponse {
    type Op = RemAddRefOperation;

    fn into_op(self, op: &mut RemAddRefOperation) {
        op.that = self.that;
        op.results = self.results.into();
        op.return_value = self.return_value;
    }

    fn from_op(op: RemAddRefOperation) -> Self {
        Self {
            that: op.that,
            results: op.results.into_inner(),
            return_value: op.return_value,
        }
    }
}

/// `HRESULT RemRelease([in] unsigned short cInterfaceRefs,
/// [in, size_is(cInterfaceRefs)] REMINTERFACEREF InterfaceRefs[])`
#[derive(Debug, Default)]
pub struct RemReleaseOperation {
    pub this: OrpcThis,
    pub that: OrpcThat,
    pub interface_refs_count: u16,
    pub interface_refs: ConformantArray<RemInterfaceRef>,
    pub return_value: i32,
    pub hook: Option<PrepareHook<Self>>,
}

impl RemReleaseOperation {
    pub const NAME: &'static str = "/IRemUnknown/v0/RemRelease";
}

impl Operation for RemReleaseOperation {
    fn opnum(&self) -> u16 {
        opnum::REM_RELEASE
    }

    fn op_name(&self) -> &'static str {
        Self::NAME
    }

    fn prepare_request(&mut self) -> Result<()> {
        correlate(
            &mut self.interface_refs_count,
            &mut self.interface_refs,
            "cInterfaceRefs",
        )?;
        run_hook(self.hook.clone(), self, Direction::Request)
    }

    fn prepare_response(&mut self) -> Result<()> {
        run_hook(self.hook.clone(), self, Direction::Response)
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        check_correlation(self.interface_refs_count, self.interface_refs.len())?;
        w.encode(&self.this)?;
        w.write_u16(self.interface_refs_count);
        w.encode(&self.interface_refs)?;
        Ok(())
    }

    fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()> {
        self.this = r.decode()?;
        self.interface_refs_count = r.read_u16()?;
        self.interface_refs = r.decode()?;
        check_correlation(self.interface_refs_count, self.interface_refs.len())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.that)?;
        w.write_i32(self.return_value);
        Ok(())
    }

    fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()> {
        self.that = r.decode()?;
        self.return_value = r.read_i32()?;
        Ok(())
    }

    fn status(&self) -> i32 {
        self.return_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemReleaseRequest {
    pub this: OrpcThis,
    /// Filled from `interface_refs` when zero
    pub interface_refs_count: u16,
    pub interface_refs: Vec<RemInterfaceRef>,
}

impl OperationRequest for RemReleaseRequest {
    type Op = RemReleaseOperation;

    fn into_op(self) -> RemReleaseOperation {
        RemReleaseOperation {
            this: self.this,
            interface_refs_count: self.interface_refs_count,
            interface_refs: self.interface_refs.into(),
            ..Default::default()
        }
    }

    fn from_op(op: &RemReleaseOperation) -> Self {
        Self {
            this: op.this.clone(),
            interface_refs_count: op.interface_refs_count,
            interface_refs: op.interface_refs.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemReleaseResponse {
    pub that: OrpcThat,
    pub return_value: i32,
}

impl OperationResponse for RemReleaseResponse {
    type Op = RemReleaseOperation;

    fn into_op(self, op: &mut RemReleaseOperation) {
        op.that = self.that;
        op.return_value = self.return_value;
    }

    fn from_op(op: RemReleaseOperation) -> Self {
        Self {
            that: op.that,
            return_value: op.return_value,
        }
    }
}
