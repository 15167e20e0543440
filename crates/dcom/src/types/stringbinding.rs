//! String binding and dual string array types (MS-DCOM 2.2.19)
//!
//! A DUALSTRINGARRAY is a flat run of 16-bit entries: NUL-separated string
//! bindings, an empty entry, then NUL-separated security bindings and a
//! final empty entry. `security_offset` is the index of the first security
//! binding.

use super::error::{DcomError, Result};
use midl_ndr::{NdrDecode, NdrEncode, NdrError, NdrLayout, NdrReader, NdrWriter};
use std::fmt;

/// Protocol tower identifiers
pub mod protocol_id {
    pub const NCACN_IP_TCP: u16 = 0x07;
    pub const NCACN_NP: u16 = 0x0F;
    pub const NCALRPC: u16 = 0x10;
    pub const NCACN_HTTP: u16 = 0x1F;
}

/// Authentication services
pub mod authn_svc {
    pub const NONE: u16 = 0;
    pub const GSS_NEGOTIATE: u16 = 9;
    /// NTLM
    pub const WINNT: u16 = 10;
    pub const GSS_KERBEROS: u16 = 16;
}

/// String binding (MS-DCOM 2.2.19.3)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringBinding {
    pub tower_id: u16,
    pub network_addr: String,
}

impl StringBinding {
    pub fn new(tower_id: u16, network_addr: impl Into<String>) -> Self {
        Self {
            tower_id,
            network_addr: network_addr.into(),
        }
    }

    pub fn tcp(addr: &str) -> Self {
        Self::new(protocol_id::NCACN_IP_TCP, addr)
    }

    pub fn named_pipe(pipe_name: &str) -> Self {
        Self::new(protocol_id::NCACN_NP, pipe_name)
    }

    fn push_entries(&self, out: &mut Vec<u16>) {
        out.push(self.tower_id);
        out.extend(self.network_addr.encode_utf16());
        out.push(0);
    }
}

impl fmt::Display for StringBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let proto = match self.tower_id {
            protocol_id::NCACN_IP_TCP => "ncacn_ip_tcp",
            protocol_id::NCACN_NP => "ncacn_np",
            protocol_id::NCACN_HTTP => "ncacn_http",
            protocol_id::NCALRPC => "ncalrpc",
            _ => "unknown",
        };
        write!(f, "{}:{}", proto, self.network_addr)
    }
}

/// Security binding (MS-DCOM 2.2.19.4)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityBinding {
    pub authn_svc: u16,
    /// Reserved, 0xFFFF on the wire
    pub authz_svc: u16,
    pub principal_name: String,
}

impl SecurityBinding {
    pub fn new(authn_svc: u16, principal_name: impl Into<String>) -> Self {
        Self {
            authn_svc,
            authz_svc: 0xFFFF,
            principal_name: principal_name.into(),
        }
    }

    fn push_entries(&self, out: &mut Vec<u16>) {
        out.push(self.authn_svc);
        out.push(self.authz_svc);
        out.extend(self.principal_name.encode_utf16());
        out.push(0);
    }
}

/// Dual String Array (MS-DCOM 2.2.19.2)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DualStringArray {
    pub string_bindings: Vec<StringBinding>,
    pub security_bindings: Vec<SecurityBinding>,
}

impl DualStringArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tcp_binding(addr: &str) -> Self {
        Self {
            string_bindings: vec![StringBinding::tcp(addr)],
            security_bindings: Vec::new(),
        }
    }

    /// Flatten into `(security_offset, entries)`.
    fn entries(&self) -> Result<(u16, Vec<u16>)> {
        let mut entries = Vec::new();
        for binding in &self.string_bindings {
            binding.push_entries(&mut entries);
        }
        if self.string_bindings.is_empty() {
            entries.push(0);
        }
        entries.push(0);
        let security_offset = entries.len();
        for binding in &self.security_bindings {
            binding.push_entries(&mut entries);
        }
        if self.security_bindings.is_empty() {
            entries.push(0);
        }
        entries.push(0);

        let too_long = |_| DcomError::InvalidStringBinding("array exceeds 65535 entries".into());
        u16::try_from(entries.len()).map_err(too_long)?;
        let security_offset = u16::try_from(security_offset).map_err(too_long)?;
        Ok((security_offset, entries))
    }

    fn from_entries(security_offset: u16, entries: &[u16]) -> Result<Self> {
        let split = usize::from(security_offset);
        if split > entries.len() {
            return Err(DcomError::InvalidStringBinding(format!(
                "security offset {} beyond {} entries",
                split,
                entries.len()
            )));
        }
        let (strings, security) = entries.split_at(split);

        let mut string_bindings = Vec::new();
        let mut rest = strings;
        while let Some((&tower_id, tail)) = rest.split_first() {
            if tower_id == 0 {
                break;
            }
            let (addr, tail) = take_wstr(tail)?;
            string_bindings.push(StringBinding::new(tower_id, addr));
            rest = tail;
        }

        let mut security_bindings = Vec::new();
        let mut rest = security;
        while let Some((&authn_svc, tail)) = rest.split_first() {
            if authn_svc == 0 {
                break;
            }
            let Some((&authz_svc, tail)) = tail.split_first() else {
                return Err(DcomError::InvalidStringBinding(
                    "security binding cut short".into(),
                ));
            };
            let (principal_name, tail) = take_wstr(tail)?;
            security_bindings.push(SecurityBinding {
                authn_svc,
                authz_svc,
                principal_name,
            });
            rest = tail;
        }

        Ok(Self {
            string_bindings,
            security_bindings,
        })
    }

    /// Write the unprefixed form embedded in an OBJREF.
    pub fn write_raw(&self, w: &mut NdrWriter<'_>) -> Result<()> {
        let (security_offset, entries) = self.entries()?;
        w.write_u16(entries.len() as u16);
        w.write_u16(security_offset);
        for entry in entries {
            w.write_u16(entry);
        }
        Ok(())
    }

    /// Read the unprefixed form embedded in an OBJREF.
    pub fn read_raw(r: &mut NdrReader) -> Result<Self> {
        let num_entries = r.read_u16()?;
        let security_offset = r.read_u16()?;
        let entries = read_entries(r, u32::from(num_entries))?;
        Self::from_entries(security_offset, &entries)
    }
}

/// Consume a NUL-terminated UTF-16 string from the front of `entries`.
fn take_wstr(entries: &[u16]) -> Result<(String, &[u16])> {
    let end = entries
        .iter()
        .position(|&c| c == 0)
        .ok_or_else(|| DcomError::InvalidStringBinding("missing terminator".into()))?;
    let s = String::from_utf16(&entries[..end])
        .map_err(|_| DcomError::InvalidStringBinding("invalid UTF-16 string".into()))?;
    Ok((s, &entries[end + 1..]))
}

fn read_entries(r: &mut NdrReader, count: u32) -> midl_ndr::Result<Vec<u16>> {
    let count = r.check_count(u64::from(count), 2)?;
    (0..count).map(|_| r.read_u16()).collect()
}

impl NdrLayout for DualStringArray {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 8;
}

/// Conformant form used as an RPC parameter: max_count, then the raw form.
impl NdrEncode for DualStringArray {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let (security_offset, entries) = self
            .entries()
            .map_err(|e| NdrError::InvalidString(e.to_string()))?;
        w.write_conformance(entries.len())?;
        w.write_u16(entries.len() as u16);
        w.write_u16(security_offset);
        for entry in entries {
            w.write_u16(entry);
        }
        Ok(())
    }
}

impl NdrDecode for DualStringArray {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        let max_count = r.read_conformance()?;
        let num_entries = r.read_u16()?;
        let security_offset = r.read_u16()?;
        if u32::from(num_entries) != max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: u32::from(num_entries),
            });
        }
        let entries = read_entries(r, max_count)?;
        Self::from_entries(security_offset, &entries)
            .map_err(|e| NdrError::InvalidString(e.to_string()))
    }
}
