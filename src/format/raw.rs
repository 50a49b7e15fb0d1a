use std::io::{BufReader, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::error::{PackError, Result};
use crate::format::record::read_pairs;
use crate::format::{Section, ENTRY_SIZE};
use crate::pack::DataPair;
use crate::window::Window;

/// Fixed size directory entry locating one part.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub headers_address: u32,
    pub headers_count: u16,
    pub headers_size: u32,
    pub properties_address: u32,
    pub properties_count: u16,
    pub properties_size: u32,
    pub data_address: u32,
    pub data_size: u32,
}

impl DirEntry {
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.headers_address)?;
        writer.write_u16::<LittleEndian>(self.headers_count)?;
        writer.write_u32::<LittleEndian>(self.headers_size)?;
        writer.write_u32::<LittleEndian>(self.properties_address)?;
        writer.write_u16::<LittleEndian>(self.properties_count)?;
        writer.write_u32::<LittleEndian>(self.properties_size)?;
        writer.write_u32::<LittleEndian>(self.data_address)?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Self> {
        Ok(DirEntry {
            headers_address: reader.read_u32::<LittleEndian>()?,
            headers_count: reader.read_u16::<LittleEndian>()?,
            headers_size: reader.read_u32::<LittleEndian>()?,
            properties_address: reader.read_u32::<LittleEndian>()?,
            properties_count: reader.read_u16::<LittleEndian>()?,
            properties_size: reader.read_u32::<LittleEndian>()?,
            data_address: reader.read_u32::<LittleEndian>()?,
            data_size: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Checks the marker byte and returns the section size that follows it.
pub fn read_section_header<R: Read + ?Sized>(reader: &mut R, marker: u8, section: Section) -> Result<u32> {
    let found = reader.read_u8()?;
    if found != marker {
        debug!("expected marker {:#04x} for {}, found {:#04x}", marker, section, found);
        return Err(PackError::SectionNotFound(section));
    }
    Ok(reader.read_u32::<LittleEndian>()?)
}

/// Decodes `count` records from `[start, start + size)`, each read bounded
/// by that window. Leaves the stream where it was.
pub fn read_region<S: Read + Seek>(source: &mut S, start: u64, size: u64, count: u16) -> Result<Vec<DataPair>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let window = Window::new(&mut *source, start, size)?;
    read_pairs(&mut BufReader::new(window), count)
}

/// Reads a whole info section of records and leaves the stream at its end.
pub fn read_info_section<S: Read + Seek>(source: &mut S, marker: u8, section: Section) -> Result<Vec<DataPair>> {
    let size = read_section_header(source, marker, section)? as u64;
    if size < 2 {
        return Err(PackError::Malformed("info section shorter than its count field"));
    }
    let count = source.read_u16::<LittleEndian>()?;

    let start = source.stream_position()?;
    let body = size - 2;
    let pairs = read_region(source, start, body, count)?;

    source.seek(SeekFrom::Start(start + body))?;
    Ok(pairs)
}

/// Reads the part directory and leaves the stream at its end.
pub fn read_directory<R: Read + ?Sized>(reader: &mut R, marker: u8) -> Result<Vec<DirEntry>> {
    let size = read_section_header(reader, marker, Section::Directory)? as u64;
    let count = reader.read_u16::<LittleEndian>()?;
    if size != 2 + ENTRY_SIZE * count as u64 {
        return Err(PackError::Malformed("directory size disagrees with its part count"));
    }

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(DirEntry::read_from(reader)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod test_raw {
    use super::*;
    use crate::format::record::write_pair;
    use crate::format::INFO_SECTION;
    use std::io::Cursor;

    fn section(pairs: &[DataPair], trailer: &[u8]) -> Cursor<Vec<u8>> {
        let mut body = Vec::new();
        for pair in pairs {
            write_pair(&mut body, pair).unwrap();
        }

        let mut data = vec![INFO_SECTION];
        data.extend_from_slice(&(2 + body.len() as u32).to_le_bytes());
        data.extend_from_slice(&(pairs.len() as u16).to_le_bytes());
        data.extend_from_slice(&body);
        data.extend_from_slice(trailer);
        Cursor::new(data)
    }

    #[test]
    fn entry_is_twenty_eight_bytes() {
        let entry = DirEntry {
            headers_address: 1,
            headers_count: 2,
            headers_size: 3,
            properties_address: 4,
            properties_count: 5,
            properties_size: 6,
            data_address: 7,
            data_size: 8,
        };
        let mut data = Vec::new();
        entry.write_to(&mut data).unwrap();

        assert_eq!(data.len() as u64, ENTRY_SIZE);
        assert_eq!(&data[..6], &[1, 0, 0, 0, 2, 0]);
        assert_eq!(DirEntry::read_from(&mut &data[..]).unwrap(), entry);
    }

    #[test]
    fn info_section_stops_at_its_end() {
        let pairs = vec![DataPair::with_value("a", "1").unwrap(), DataPair::named("b").unwrap()];
        let mut data = section(&pairs, &[0xEE]);

        assert_eq!(read_info_section(&mut data, INFO_SECTION, Section::Headers).unwrap(), pairs);
        assert_eq!(data.read_u8().unwrap(), 0xEE);
    }

    #[test]
    fn wrong_marker() {
        let mut data = Cursor::new(vec![0x02, 2, 0, 0, 0, 0, 0]);
        assert!(matches!(
            read_info_section(&mut data, INFO_SECTION, Section::Properties),
            Err(PackError::SectionNotFound(Section::Properties))
        ));
    }

    #[test]
    fn records_cannot_escape_section() {
        // Count claims two records but the section only holds one
        let mut data = section(&[DataPair::named("a").unwrap()], &[0x03, 0x0A, 0x01, b'z']);
        let bytes = data.get_mut();
        bytes[5] = 2;

        assert!(matches!(
            read_info_section(&mut data, INFO_SECTION, Section::Headers),
            Err(PackError::IOError(_))
        ));
    }

    #[test]
    fn directory_size_checked() {
        let mut data = Cursor::new(vec![INFO_SECTION, 3, 0, 0, 0, 0, 0]);
        assert!(matches!(read_directory(&mut data, INFO_SECTION), Err(PackError::Malformed(_))));
    }
}
