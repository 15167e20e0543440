//! Well-known HRESULT status words
//!
//! A DCOM method returns its HRESULT as the trailing status word of the
//! response. Values are the signed 32-bit wire form.

pub const S_OK: i32 = 0;
pub const S_FALSE: i32 = 1;

pub const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;
pub const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;
pub const E_POINTER: i32 = 0x8000_4003_u32 as i32;
pub const E_ABORT: i32 = 0x8000_4004_u32 as i32;
pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;
pub const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;
pub const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;
pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
/// The object exporter does not know the IPID
pub const RPC_E_INVALID_OBJECT: i32 = 0x8001_0114_u32 as i32;

pub fn succeeded(hr: i32) -> bool {
    hr >= 0
}

pub fn failed(hr: i32) -> bool {
    hr < 0
}

/// Symbolic name of a well-known code.
pub fn name(hr: i32) -> Option<&'static str> {
    Some(match hr {
        S_OK => "S_OK",
        S_FALSE => "S_FALSE",
        E_NOTIMPL => "E_NOTIMPL",
        E_NOINTERFACE => "E_NOINTERFACE",
        E_POINTER => "E_POINTER",
        E_ABORT => "E_ABORT",
        E_FAIL => "E_FAIL",
        E_UNEXPECTED => "E_UNEXPECTED",
        E_ACCESSDENIED => "E_ACCESSDENIED",
        E_OUTOFMEMORY => "E_OUTOFMEMORY",
        E_INVALIDARG => "E_INVALIDARG",
        RPC_E_INVALID_OBJECT => "RPC_E_INVALID_OBJECT",
        _ => return None,
    })
}
