//! DataPack, a binary container carrying a prefix, pack level metadata and
//! any number of parts, each with its own headers, properties and bytes.
//! A pack may be signed, the signature covering everything after the
//! envelope.
pub mod buf;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod format;
pub mod hash;
pub mod pack;
pub mod scratch;
pub mod window;

pub use crate::error::{PackError, Result};
pub use crate::format::materialize::{Attached, Detached, Materialize};
pub use crate::format::reader::DataPackReader;
pub use crate::format::writer::DataPackWriter;
pub use crate::pack::{DataContent, DataPack, DataPair, DataPart, Headers, Properties, SignInfo};
