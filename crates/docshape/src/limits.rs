//! Default bounds applied when decoding encoded models.
//!
//! Encoded models may come from storage written by other processes, so the
//! decoder refuses inputs beyond these sizes. Callers can tighten or relax
//! them through [`DecodeOptions`](crate::codec::DecodeOptions).

/// Maximum nesting of encoded model cases.
pub const MAX_DECODE_DEPTH: usize = 512;

/// Maximum length of a recursion label, struct field, union case, enum
/// symbol or annotation tag, in bytes.
pub const MAX_NAME_LEN: usize = 1024;
