//! DataPack stream format
//!
//! A pack is written once, front to back, into a seekable stream. The
//! reader walks four metadata sections then uses the part directory to
//! reach each part's metadata and data directly. Unless otherwise noted
//! every integer is unsigned and stored in Little Endian.
//!
//! # Top Level
//!
//! | Type    | Name     | Description |
//! | ------: | -------- | ----------- |
//! | u8      | prefix size | Length of the prefix, 0 to 255 |
//! | [u8; N] | prefix   | Application defined tag, checked on read |
//! | u8      | sign flag | `0` unsigned, `1` signed |
//! | u32     | protected size | Only when signed, see [Signing](#signing) |
//! | u32     | sign size | Only when signed |
//! | section | implicit | `DateCreate` and `Description` |
//! | section | headers  | Pack headers, in order |
//! | section | properties | Pack properties |
//! | section | directory | One entry per part |
//! | data    | data     | Part metadata and bytes |
//! | [u8; N] | signature | Only when signed, `sign size` bytes |
//!
//! ## Info Section
//!
//! | Type    | Name    | Description |
//! | ------: | ------- | ----------- |
//! | u8      | marker  | `0x01` |
//! | u32     | size    | Bytes after this field to the end of the section |
//! | u16     | count   | Number of records (or directory entries) |
//! | [u8; N] | records | `count` records, see [`record`] |
//!
//! ## Directory Entry
//!
//! The directory section holds `count` fixed 28 byte entries.
//!
//! | Type | Name    | Description |
//! | ---: | ------- | ----------- |
//! | u32  | headers address | `0` when there are no headers |
//! | u16  | headers count | |
//! | u32  | headers size | |
//! | u32  | properties address | `0` when there are no properties |
//! | u16  | properties count | |
//! | u32  | properties size | |
//! | u32  | data address | `0` when the data is empty |
//! | u32  | data size | |
//!
//! Addresses count from the prefix size byte of the pack as if the pack
//! was unsigned. A reader of a signed pack adds the 8 bytes of the sign
//! envelope. This way signing or unsigning a pack never touches the
//! directory.
//!
//! ## Data Section
//!
//! | Type    | Name    | Description |
//! | ------: | ------- | ----------- |
//! | u8      | marker  | `0x02` |
//! | u32     | size    | Bytes after this field to the end of the section |
//! | [u8; N] | parts   | Per part: header records, property records, data |
//!
//! # Signing
//!
//! The protected region starts right after the `sign size` field and runs
//! to the end of the data section, `protected size` is its length. The
//! signature over that region is appended after it.
//!
//! The wire layout of a record is the protobuf encoding of
//! `{ 1: string name, 2: optional string value }` behind a base 128
//! varint length.
pub mod materialize;
pub mod raw;
pub mod reader;
pub mod record;
pub mod sign;
pub mod writer;

use std::fmt;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub const INFO_SECTION: u8 = 0x01;
pub const DATA_SECTION: u8 = 0x02;

pub const UNSIGNED: u8 = 0x00;
pub const SIGNED: u8 = 0x01;

// protected size + sign size
pub const SIGN_ENVELOPE: u64 = 8;
// 6 x u32 + 2 x u16
pub const ENTRY_SIZE: u64 = 28;

pub const DATE_CREATE: &str = "DateCreate";
pub const DESCRIPTION: &str = "Description";

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Implicit,
    Headers,
    Properties,
    Directory,
    Data,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Implicit => write!(f, "implicit properties"),
            Section::Headers => write!(f, "headers"),
            Section::Properties => write!(f, "properties"),
            Section::Directory => write!(f, "part directory"),
            Section::Data => write!(f, "data"),
        }
    }
}
