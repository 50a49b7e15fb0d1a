//! In memory model of a pack: prefix, metadata and an ordered list of parts.
pub mod content;
pub mod headers;
pub mod pair;
pub mod properties;

use std::io::{Read, Write};

use time::{PrimitiveDateTime, Time};

use crate::buf::{BufferPool, HeapPool};
use crate::clock::Clock;
use crate::error::{PackError, Result};

pub use content::DataContent;
pub use headers::Headers;
pub use pair::DataPair;
pub use properties::Properties;

/// One blob plus its own metadata.
#[derive(Debug)]
pub struct DataPart {
    pub headers: Headers,
    pub properties: Properties,
    content: DataContent,
}

impl DataPart {
    pub fn new(content: impl Into<DataContent>) -> Self {
        DataPart {
            headers: Headers::new(),
            properties: Properties::new(),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &DataContent {
        &self.content
    }

    pub fn open(&self) -> Result<Box<dyn Read>> {
        self.content.open()
    }

    pub fn copy_to(&self, dest: &mut dyn Write, pool: &dyn BufferPool) -> Result<u64> {
        self.content.copy_to(dest, pool)
    }

    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_to(&mut out, &HeapPool::default())?;
        Ok(out)
    }
}

/// Sizes found in the sign envelope of a pack that was read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignInfo {
    pub protected_size: u32,
    pub sign_size: u32,
}

#[derive(Debug, Default)]
pub struct DataPack {
    prefix: Vec<u8>,
    pub date_create: Option<PrimitiveDateTime>,
    pub description: Option<String>,
    pub headers: Headers,
    pub properties: Properties,
    pub parts: Vec<DataPart>,
    sign_info: Option<SignInfo>,
}

impl DataPack {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.len() > u8::MAX as usize {
            return Err(PackError::PrefixTooLong(prefix.len()));
        }
        Ok(DataPack {
            prefix,
            ..Default::default()
        })
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn prefix_size(&self) -> u8 {
        // Bounded by the constructor
        self.prefix.len() as u8
    }

    pub fn is_prefix_match(&self, prefix: &[u8]) -> bool {
        self.prefix == prefix
    }

    /// Envelope sizes, only set on packs that were read from a signed stream.
    pub fn sign_info(&self) -> Option<SignInfo> {
        self.sign_info
    }

    pub(crate) fn set_sign_info(&mut self, info: Option<SignInfo>) {
        self.sign_info = info;
    }

    /// Sets `date_create` to the clock's time, cut down to what the wire keeps.
    pub fn stamp(&mut self, clock: &dyn Clock) -> Result<()> {
        let now = clock.now();
        let time = Time::from_hms_milli(now.hour(), now.minute(), now.second(), now.millisecond())?;
        self.date_create = Some(PrimitiveDateTime::new(now.date(), time));
        Ok(())
    }

    pub fn add_part(&mut self, part: DataPart) -> &mut DataPart {
        self.parts.push(part);
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }
}

#[cfg(test)]
mod test_pack {
    use super::*;
    use crate::clock::FixedClock;
    use time::macros::datetime;

    #[test]
    fn prefix_limits() {
        assert_eq!(DataPack::new(vec![7u8; 255]).unwrap().prefix_size(), 255);
        assert!(matches!(DataPack::new(vec![7u8; 256]), Err(PackError::PrefixTooLong(256))));
    }

    #[test]
    fn prefix_match_includes_length() {
        let pack = DataPack::new("ABC").unwrap();
        assert!(pack.is_prefix_match(b"ABC"));
        assert!(!pack.is_prefix_match(b"AB"));
        assert!(!pack.is_prefix_match(b"ABCD"));
    }

    #[test]
    fn stamp_truncates_to_millis() {
        let mut pack = DataPack::default();
        pack.stamp(&FixedClock(datetime!(2024-02-29 13:14:15.123_456_789))).unwrap();
        assert_eq!(pack.date_create, Some(datetime!(2024-02-29 13:14:15.123)));
    }

    #[test]
    fn add_part_returns_handle() {
        let mut pack = DataPack::default();
        pack.add_part(DataPart::new(b"abc".to_vec())).properties.set("FileName", "a.txt").unwrap();

        assert_eq!(pack.parts[0].properties.value("FileName"), Some("a.txt"));
        assert_eq!(pack.parts[0].read_to_vec().unwrap(), b"abc");
    }
}
