//! Pagination cursors

mod codec;

pub use codec::{Cursor, CursorScope, OffsetCodec};
