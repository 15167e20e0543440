//! NDR (Network Data Representation) runtime library
//!
//! This crate implements the NDR20 wire format used by DCE RPC, MSRPC and
//! DCOM payloads, as consumed by per-interface stubs.
//!
//! # NDR Wire Format
//!
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes), relative
//!   to the start of the marshaling unit
//! - Structures align to their largest member
//! - Unique and full pointers are a 4-byte referent ID (0 = null); the
//!   pointee is deferred until the enclosing construct is complete
//! - Conformant data (arrays with runtime-determined size) carries its
//!   counts on the wire; those counts are validated before allocation
//! - Strings are conformant varying arrays with a NUL terminator
//!
//! # Example
//!
//! ```
//! use midl_ndr::{ConformantArray, NdrReader, NdrWriter, UniquePtr};
//!
//! let value = UniquePtr::new(ConformantArray::new(vec![1u32, 2, 3]));
//! let mut w = NdrWriter::new();
//! w.encode(&value).unwrap();
//! let bytes = w.finish().unwrap();
//!
//! let decoded: UniquePtr<ConformantArray<u32>> = NdrReader::new(bytes).decode().unwrap();
//! assert_eq!(decoded, value);
//! ```

mod arrays;
mod context;
mod decode;
mod encode;
mod error;
mod pointers;
mod primitives;
mod strings;
mod union;

pub use arrays::{ConformantArray, ConformantArrayNd, ConformantVaryingArray, SizeInfo, VaryingArray};
pub use context::NdrContext;
pub use decode::{NdrDecode, NdrReader, MAX_NDR_NESTING};
pub use encode::{max_align, NdrEncode, NdrLayout, NdrWriter, FIRST_REFERENT_ID};
pub use error::{ErrorKind, NdrError, Result, MAX_NDR_ARRAY_ELEMENTS};
pub use pointers::{FullPtr, NdrPtr, RefPtr, UniquePtr};
pub use primitives::Guid;
pub use strings::{NdrString, NdrWString, UnicodeString};
pub use union::{Encapsulated, NdrSelector, NdrUnion};

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};
