use std::io::{Read, Seek};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use log::debug;
use time::PrimitiveDateTime;

use crate::error::{PackError, Result};
use crate::format::materialize::{Detached, Materialize};
use crate::format::raw::{read_directory, read_info_section, read_region, read_section_header, DirEntry};
use crate::format::{Section, DATA_SECTION, DATE_CREATE, DATE_FORMAT, DESCRIPTION, INFO_SECTION, SIGNED, SIGN_ENVELOPE, UNSIGNED};
use crate::pack::{DataContent, DataPack, DataPart, SignInfo};

/// Parses a pack back out of a seekable stream.
///
/// Reading starts at the current stream position. The signature is not
/// checked here, see [`crate::format::sign::is_sign_match`].
pub struct DataPackReader<M = Detached> {
    materializer: M,
}

impl DataPackReader {
    pub fn new() -> Self {
        DataPackReader {
            materializer: Detached::new(),
        }
    }
}

impl Default for DataPackReader {
    fn default() -> Self {
        DataPackReader::new()
    }
}

impl<M> DataPackReader<M> {
    pub fn with(materializer: M) -> Self {
        DataPackReader { materializer }
    }

    /// Without an expected prefix any prefix is accepted and recorded.
    pub fn read<S>(&self, source: &mut S, expected: Option<&[u8]>) -> Result<DataPack>
    where
        S: Read + Seek,
        M: Materialize<S>,
    {
        let base = source.stream_position()?;

        let prefix_size = source.read_u8()?;
        let mut prefix = vec![0u8; prefix_size as usize];
        source.read_exact(&mut prefix)?;

        if let Some(expected) = expected {
            if expected != prefix.as_slice() {
                return Err(PackError::WrongPrefix {
                    expected: expected.to_vec(),
                    found: prefix,
                });
            }
        }
        let mut pack = DataPack::new(prefix)?;

        let sign_info = match source.read_u8()? {
            UNSIGNED => None,
            SIGNED => Some(SignInfo {
                protected_size: source.read_u32::<LittleEndian>()?,
                sign_size: source.read_u32::<LittleEndian>()?,
            }),
            x => return Err(PackError::UnknownSignFlag(x)),
        };
        pack.set_sign_info(sign_info);
        let origin = base + if sign_info.is_some() { SIGN_ENVELOPE } else { 0 };

        for pair in read_info_section(source, INFO_SECTION, Section::Implicit)? {
            match pair.name() {
                DATE_CREATE => {
                    let text = pair.value().ok_or(PackError::Malformed("DateCreate without a value"))?;
                    pack.date_create = Some(PrimitiveDateTime::parse(text, DATE_FORMAT)?);
                },
                DESCRIPTION => pack.description = pair.value().map(str::to_string),
                other => debug!("ignoring implicit property {:?}", other),
            }
        }

        pack.headers.extend(read_info_section(source, INFO_SECTION, Section::Headers)?);
        pack.properties.extend(read_info_section(source, INFO_SECTION, Section::Properties)?);

        let entries = read_directory(source, INFO_SECTION)?;
        let data_size = read_section_header(source, DATA_SECTION, Section::Data)?;
        debug!("{} parts over {} data bytes", entries.len(), data_size);

        for entry in entries {
            pack.parts.push(self.part(source, origin, &entry)?);
        }
        Ok(pack)
    }

    /// Same as [`DataPackReader::read`] with the prefix given as text.
    pub fn read_str<S>(&self, source: &mut S, expected: Option<&str>) -> Result<DataPack>
    where
        S: Read + Seek,
        M: Materialize<S>,
    {
        self.read(source, expected.map(str::as_bytes))
    }

    fn part<S>(&self, source: &mut S, origin: u64, entry: &DirEntry) -> Result<DataPart>
    where
        S: Read + Seek,
        M: Materialize<S>,
    {
        let content = if entry.data_size == 0 {
            DataContent::Memory(Bytes::new())
        } else {
            self.materializer
                .content(source, origin + entry.data_address as u64, entry.data_size as u64)?
        };
        let mut part = DataPart::new(content);

        if entry.headers_count > 0 {
            part.headers.extend(read_region(
                source,
                origin + entry.headers_address as u64,
                entry.headers_size as u64,
                entry.headers_count,
            )?);
        }
        if entry.properties_count > 0 {
            part.properties.extend(read_region(
                source,
                origin + entry.properties_address as u64,
                entry.properties_size as u64,
                entry.properties_count,
            )?);
        }
        Ok(part)
    }
}
