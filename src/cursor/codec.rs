//! Opaque pagination cursors
//!
//! A cursor is the (sort value, identifier) position of the last row of a
//! page. Tokens are URL-safe base64 of a `;`-separated payload:
//!
//! ```text
//! 1;<scope hex | ->;<id>;<sort value>
//! ```
//!
//! Sort values are tagged: `-` absent, `n` null, `t`/`f` booleans,
//! `i<decimal>` integers, `d<16 hex digits>` float bits, `s<text>` text.
//! Text is the last component, so it may contain `;` freely.
//!
//! The scope is a short fingerprint of the list, sort field and paging
//! direction that produced the cursor. Decoding never needs it; queries use
//! it to detect a cursor replayed against another list.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::{AccessError, AccessResult};
use crate::filter::SortDirection;
use crate::model::{EntryId, Value};

const TOKEN_VERSION: &str = "1";

/// Fingerprint of the list shape a cursor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorScope([u8; 4]);

impl CursorScope {
    /// Scope of a list paged in `paging` direction, ordered by `sort_field`.
    pub fn of(list: &str, sort_field: Option<&str>, paging: SortDirection) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(list.as_bytes());
        hasher.update([0u8]);
        hasher.update(sort_field.unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(paging.as_str().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }

    fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 8 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for CursorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A decoded position in a sorted list
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Sort value of the last delivered row; `None` for unsorted lists
    pub sort_value: Option<Value>,
    /// Identifier of the last delivered row
    pub id: EntryId,
    /// Scope the cursor was produced for, if recorded
    pub scope: Option<CursorScope>,
}

impl Cursor {
    pub fn new(sort_value: Option<Value>, id: EntryId) -> Self {
        Self {
            sort_value,
            id,
            scope: None,
        }
    }

    pub fn scoped(mut self, scope: CursorScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Encodes and decodes cursor tokens
pub struct OffsetCodec;

impl OffsetCodec {
    /// Encodes an unscoped cursor.
    pub fn encode(sort_value: Option<&Value>, id: EntryId) -> String {
        Self::encode_cursor(&Cursor::new(sort_value.cloned(), id))
    }

    pub fn encode_cursor(cursor: &Cursor) -> String {
        let scope = cursor
            .scope
            .map(CursorScope::to_hex)
            .unwrap_or_else(|| "-".to_string());
        let payload = format!(
            "{};{};{};{}",
            TOKEN_VERSION,
            scope,
            cursor.id.value(),
            encode_sort(cursor.sort_value.as_ref())
        );
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    }

    /// Decodes a token. Fails with `InvalidCursor` on any malformed input.
    pub fn decode(token: &str) -> AccessResult<Cursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AccessError::cursor("not a cursor token"))?;
        let payload =
            String::from_utf8(bytes).map_err(|_| AccessError::cursor("not a cursor token"))?;

        let mut parts = payload.splitn(4, ';');
        let (version, scope, id, sort) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(v), Some(s), Some(i), Some(o)) => (v, s, i, o),
            _ => return Err(AccessError::cursor("truncated cursor token")),
        };

        if version != TOKEN_VERSION {
            return Err(AccessError::cursor(format!(
                "unsupported cursor version '{}'",
                version
            )));
        }

        let scope = match scope {
            "-" => None,
            hex => Some(
                CursorScope::from_hex(hex).ok_or_else(|| AccessError::cursor("malformed scope"))?,
            ),
        };

        let id = id
            .parse::<u64>()
            .map(EntryId::new)
            .map_err(|_| AccessError::cursor("malformed identifier"))?;

        Ok(Cursor {
            sort_value: decode_sort(sort)?,
            id,
            scope,
        })
    }
}

fn encode_sort(value: Option<&Value>) -> String {
    match value {
        None => "-".to_string(),
        Some(Value::Null) => "n".to_string(),
        Some(Value::Bool(true)) => "t".to_string(),
        Some(Value::Bool(false)) => "f".to_string(),
        Some(Value::Int(i)) => format!("i{}", i),
        Some(Value::Float(x)) => format!("d{:016x}", x.to_bits()),
        Some(Value::Text(s)) => format!("s{}", s),
    }
}

fn decode_sort(raw: &str) -> AccessResult<Option<Value>> {
    if raw == "-" {
        return Ok(None);
    }

    let mut chars = raw.chars();
    let tag = chars.next();
    let body = chars.as_str();

    let value = match (tag, body) {
        (Some('n'), "") => Value::Null,
        (Some('t'), "") => Value::Bool(true),
        (Some('f'), "") => Value::Bool(false),
        (Some('i'), digits) => Value::Int(
            digits
                .parse()
                .map_err(|_| AccessError::cursor("malformed integer sort value"))?,
        ),
        (Some('d'), bits) if bits.len() == 16 => Value::Float(f64::from_bits(
            u64::from_str_radix(bits, 16)
                .map_err(|_| AccessError::cursor("malformed float sort value"))?,
        )),
        (Some('s'), text) => Value::Text(text.to_string()),
        _ => return Err(AccessError::cursor("unknown sort value encoding")),
    };
    Ok(Some(value))
}
