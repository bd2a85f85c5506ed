//! Message vocabulary, JSON codec and wire framing for parmirror.
//!
//! Every message is a single JSON object tagged with a `"type"` field,
//! carried in a length-prefixed frame:
//! - A 2-byte magic number ("PM") for stream synchronization
//! - A 4-byte little-endian payload length
//! - The JSON payload
//!
//! Decoding is deliberately forgiving: unrecognized `"type"` values
//! decode into [`Message::Unknown`] rather than failing, and callers
//! drop malformed frames instead of tearing the connection down.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod reader;
pub mod value;
pub mod writer;

pub use codec::{decode, encode, PROTOCOL_VERSION};
pub use error::{DecodeError, Result, WireError};
pub use frame::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC};
pub use message::Message;
pub use reader::MessageReader;
pub use value::{ParamValue, ValueKind};
pub use writer::MessageWriter;
