use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::buf::{BufferPool, HeapPool};
use crate::crypto::SignAlgorithm;
use crate::error::{PackError, Result};
use crate::format::raw::DirEntry;
use crate::format::record::write_pair;
use crate::format::sign::seal;
use crate::format::{
    DATA_SECTION, DATE_CREATE, DATE_FORMAT, DESCRIPTION, ENTRY_SIZE, INFO_SECTION, SIGNED, SIGN_ENVELOPE, UNSIGNED,
};
use crate::pack::{DataPack, DataPair};

fn count_u16(what: &'static str, count: usize) -> Result<u16> {
    u16::try_from(count).map_err(|_| PackError::TooMany { what, count })
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| PackError::AddressOverflow(value))
}

// Values that are only known after the forward pass
enum Patch {
    U32(u32),
    Entry(DirEntry),
}

#[derive(Default)]
struct Backpatch(Vec<(u64, Patch)>);

impl Backpatch {
    fn push(&mut self, at: u64, patch: Patch) {
        self.0.push((at, patch));
    }

    // Leaves the stream at `end`
    fn apply<W: Write + Seek>(self, dest: &mut W, end: u64) -> Result<()> {
        for (at, patch) in self.0 {
            dest.seek(SeekFrom::Start(at))?;
            match patch {
                Patch::U32(value) => dest.write_u32::<LittleEndian>(value)?,
                Patch::Entry(entry) => entry.write_to(dest)?,
            }
        }
        dest.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

// Stream positions relative to the start of the pack as if it were unsigned
struct Origin {
    base: u64,
    shift: u64,
}

impl Origin {
    fn address(&self, pos: u64) -> Result<u32> {
        to_u32(pos - self.base - self.shift)
    }
}

/// Serializes a [`DataPack`] into a seekable stream.
///
/// The destination is borrowed and never closed. It has to be readable as
/// well when signing, the signature is computed by reading the payload back.
pub struct DataPackWriter<P: BufferPool = HeapPool> {
    pool: P,
}

impl DataPackWriter {
    pub fn new() -> Self {
        DataPackWriter {
            pool: HeapPool::default(),
        }
    }
}

impl Default for DataPackWriter {
    fn default() -> Self {
        DataPackWriter::new()
    }
}

impl<P: BufferPool> DataPackWriter<P> {
    pub fn with_pool(pool: P) -> Self {
        DataPackWriter { pool }
    }

    /// Returns the number of bytes written.
    pub fn write<W>(&self, pack: &DataPack, dest: &mut W, algorithm: Option<&dyn SignAlgorithm>) -> Result<u64>
    where
        W: Read + Write + Seek,
    {
        check_counts(pack)?;
        let implicit = implicit_pairs(pack)?;

        let base = dest.stream_position()?;
        let mut patches = Backpatch::default();

        dest.write_u8(pack.prefix_size())?;
        dest.write_all(pack.prefix())?;

        let envelope = match algorithm {
            Some(_) => {
                dest.write_u8(SIGNED)?;
                let at = dest.stream_position()?;
                dest.write_u32::<LittleEndian>(0)?;
                dest.write_u32::<LittleEndian>(0)?;
                Some(at)
            },
            None => {
                dest.write_u8(UNSIGNED)?;
                None
            },
        };
        let origin = Origin {
            base,
            shift: if envelope.is_some() { SIGN_ENVELOPE } else { 0 },
        };

        write_info_section(dest, "implicit properties", implicit.iter(), implicit.len(), &mut patches)?;
        write_info_section(dest, "headers", pack.headers.iter(), pack.headers.len(), &mut patches)?;
        write_info_section(dest, "properties", pack.properties.iter(), pack.properties.len(), &mut patches)?;

        // Directory, zero filled until the data section is laid out
        let part_count = count_u16("parts", pack.parts.len())?;
        dest.write_u8(INFO_SECTION)?;
        dest.write_u32::<LittleEndian>(to_u32(2 + ENTRY_SIZE * part_count as u64)?)?;
        dest.write_u16::<LittleEndian>(part_count)?;
        let directory = dest.stream_position()?;
        let empty = DirEntry::default();
        for _ in 0..part_count {
            empty.write_to(dest)?;
        }

        dest.write_u8(DATA_SECTION)?;
        let data_size_at = dest.stream_position()?;
        dest.write_u32::<LittleEndian>(0)?;
        let data_start = dest.stream_position()?;

        for (idx, part) in pack.parts.iter().enumerate() {
            let mut entry = DirEntry::default();

            let (count, start, size) = write_records(dest, "part headers", part.headers.iter(), part.headers.len())?;
            if count > 0 {
                entry.headers_address = origin.address(start)?;
                entry.headers_count = count;
                entry.headers_size = to_u32(size)?;
            }

            let (count, start, size) =
                write_records(dest, "part properties", part.properties.iter(), part.properties.len())?;
            if count > 0 {
                entry.properties_address = origin.address(start)?;
                entry.properties_count = count;
                entry.properties_size = to_u32(size)?;
            }

            let start = dest.stream_position()?;
            let size = part.copy_to(dest, &self.pool)?;
            if size > 0 {
                entry.data_address = origin.address(start)?;
                entry.data_size = to_u32(size)?;
            }

            patches.push(directory + ENTRY_SIZE * idx as u64, Patch::Entry(entry));
        }

        let end = dest.stream_position()?;
        patches.push(data_size_at, Patch::U32(to_u32(end - data_start)?));
        patches.apply(dest, end)?;

        if let (Some(at), Some(algorithm)) = (envelope, algorithm) {
            seal(dest, at, algorithm)?;
        }

        let written = dest.stream_position()? - base;
        debug!("wrote pack with {} parts in {} bytes", part_count, written);
        Ok(written)
    }
}

// Every count has to fit its u16 field, checked before anything is written
fn check_counts(pack: &DataPack) -> Result<()> {
    count_u16("headers", pack.headers.len())?;
    count_u16("properties", pack.properties.len())?;
    count_u16("parts", pack.parts.len())?;
    for part in &pack.parts {
        count_u16("part headers", part.headers.len())?;
        count_u16("part properties", part.properties.len())?;
    }
    Ok(())
}

fn implicit_pairs(pack: &DataPack) -> Result<Vec<DataPair>> {
    let mut pairs = Vec::new();
    if let Some(date) = pack.date_create {
        pairs.push(DataPair::with_value(DATE_CREATE, date.format(DATE_FORMAT)?)?);
    }
    if let Some(description) = &pack.description {
        pairs.push(DataPair::with_value(DESCRIPTION, description.as_str())?);
    }
    Ok(pairs)
}

// Returns (count, start, size) of the records written
fn write_records<'a, W, I>(dest: &mut W, what: &'static str, pairs: I, len: usize) -> Result<(u16, u64, u64)>
where
    W: Write + Seek,
    I: Iterator<Item = &'a DataPair>,
{
    let count = count_u16(what, len)?;
    let start = dest.stream_position()?;
    let mut size = 0;
    for pair in pairs {
        size += write_pair(dest, pair)?;
    }
    Ok((count, start, size))
}

fn write_info_section<'a, W, I>(dest: &mut W, what: &'static str, pairs: I, len: usize, patches: &mut Backpatch) -> Result<()>
where
    W: Write + Seek,
    I: Iterator<Item = &'a DataPair>,
{
    dest.write_u8(INFO_SECTION)?;
    let size_at = dest.stream_position()?;
    dest.write_u32::<LittleEndian>(0)?;

    let count = count_u16(what, len)?;
    dest.write_u16::<LittleEndian>(count)?;
    let (_, _, size) = write_records(dest, what, pairs, len)?;

    patches.push(size_at, Patch::U32(to_u32(2 + size)?));
    Ok(())
}

#[cfg(test)]
mod test_writer {
    use super::*;
    use crate::pack::DataPart;
    use std::io::Cursor;

    fn write(pack: &DataPack) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DataPackWriter::new().write(pack, &mut out, None).unwrap();
        out.into_inner()
    }

    fn entry(data: &[u8], at: usize) -> DirEntry {
        DirEntry::read_from(&mut &data[at..at + ENTRY_SIZE as usize]).unwrap()
    }

    #[test]
    fn empty_pack() {
        let data = write(&DataPack::default());
        assert_eq!(
            data,
            vec![
                0x00, 0x00, // prefix size, sign flag
                0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, // implicit
                0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, // headers
                0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, // properties
                0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, // directory
                0x02, 0x00, 0x00, 0x00, 0x00, // data
            ]
        );
        assert_eq!(data.len(), 35);
    }

    #[test]
    fn single_part() {
        let mut pack = DataPack::default();
        pack.parts.push(DataPart::new(vec![1u8, 2, 3, 4, 5]));
        let data = write(&pack);

        // 2 + 3 * 7 + directory (7 + 28) + data header 5 + 5 bytes
        assert_eq!(data.len(), 68);
        let entry = entry(&data, 30);
        assert_eq!(entry.data_size, 5);
        assert_eq!(entry.data_address, 63);
        assert_eq!((entry.headers_address, entry.headers_size), (0, 0));
        assert_eq!((entry.properties_address, entry.properties_size), (0, 0));

        // data section size
        assert_eq!(data[58], DATA_SECTION);
        assert_eq!(&data[59..63], &[5, 0, 0, 0]);
        assert_eq!(&data[63..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn directory_entries_are_contiguous() {
        let mut pack = DataPack::default();
        pack.parts.push(DataPart::new(b"a".to_vec()));
        pack.parts.push(DataPart::new(b"bc".to_vec()));
        let data = write(&pack);

        // directory size, then two entries back to back before the data marker
        assert_eq!(&data[24..28], &(2 + 2 * ENTRY_SIZE as u32).to_le_bytes());
        let data_marker = 30 + 2 * ENTRY_SIZE as usize;
        assert_eq!(data[data_marker], DATA_SECTION);
        assert_eq!(&data[data_marker + 1..data_marker + 5], &[3, 0, 0, 0]);

        let first = entry(&data, 30);
        let second = entry(&data, 30 + ENTRY_SIZE as usize);
        assert_eq!((first.data_address as usize, first.data_size), (data_marker + 5, 1));
        assert_eq!((second.data_address as usize, second.data_size), (data_marker + 6, 2));
        assert_eq!(&data[data_marker + 5..], b"abc");
    }

    #[test]
    fn too_many_writes_nothing() {
        let mut pack = DataPack::default();
        for _ in 0..=u16::MAX as usize {
            pack.parts.push(DataPart::new(Vec::new()));
        }
        let mut out = Cursor::new(Vec::new());
        let err = DataPackWriter::new().write(&pack, &mut out, None).unwrap_err();

        assert!(matches!(err, PackError::TooMany { what: "parts", count: 65536 }));
        assert!(out.get_ref().is_empty());

        let mut pack = DataPack::default();
        let part = pack.add_part(DataPart::new(b"x".to_vec()));
        for _ in 0..=u16::MAX as usize {
            part.headers.add("h", "v").unwrap();
        }
        let err = DataPackWriter::new().write(&pack, &mut out, None).unwrap_err();

        assert!(matches!(err, PackError::TooMany { what: "part headers", .. }));
        assert!(out.get_ref().is_empty());
    }

    #[test]
    fn empty_part_has_zero_address() {
        let mut pack = DataPack::default();
        pack.parts.push(DataPart::new(Vec::new()));
        let data = write(&pack);

        assert_eq!(entry(&data, 30), DirEntry::default());
    }

    #[test]
    fn part_metadata_addresses() {
        let mut pack = DataPack::new("P").unwrap();
        let part = pack.add_part(DataPart::new(b"xyz".to_vec()));
        part.headers.add("h", "1").unwrap();
        part.properties.set("p", "2").unwrap();
        let data = write(&pack);

        // prefix 2 bytes, flag, 3 empty sections, directory header 7
        let entry = entry(&data, 31);
        let records = 31 + ENTRY_SIZE as usize + 5;
        assert_eq!(entry.headers_address as usize, records);
        assert_eq!(entry.headers_count, 1);
        assert_eq!(entry.headers_size, 7);
        assert_eq!(entry.properties_address as usize, records + 7);
        assert_eq!(entry.properties_size, 7);
        assert_eq!(entry.data_address as usize, records + 14);
        assert_eq!(&data[records + 14..], b"xyz");
    }

    #[test]
    fn writes_at_offset() {
        let mut out = Cursor::new(vec![0xAA; 10]);
        out.seek(SeekFrom::End(0)).unwrap();
        let written = DataPackWriter::new().write(&DataPack::default(), &mut out, None).unwrap();

        assert_eq!(written, 35);
        assert_eq!(out.get_ref().len(), 45);
        assert_eq!(out.position(), 45);
    }

    #[test]
    fn implicit_records() {
        let mut pack = DataPack::default();
        pack.description = Some("hi".to_string());
        let data = write(&pack);

        // 0x01, size = 2 + record, count = 1, record
        let record = [0x11, 0x0A, 0x0B, b'D', b'e', b's', b'c', b'r', b'i', b'p', b't', b'i', b'o', b'n', 0x12, 0x02, b'h', b'i'];
        assert_eq!(&data[2..9], &[0x01, 20, 0, 0, 0, 1, 0]);
        assert_eq!(&data[9..9 + record.len()], &record);
    }
}
