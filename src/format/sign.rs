//! Wrapping, checking and stripping the sign envelope.
//!
//! All functions take the pack's prefix size since the envelope sits right
//! after the prefix, and treat the current stream position as the first
//! byte of the pack.
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::buf::{copy_buffered, copy_exact, HeapPool};
use crate::crypto::SignAlgorithm;
use crate::error::{PackError, Result};
use crate::format::{SIGNED, SIGN_ENVELOPE, UNSIGNED};
use crate::window::Window;

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| PackError::AddressOverflow(value))
}

fn check_flag(flag: u8) -> Result<bool> {
    match flag {
        UNSIGNED => Ok(false),
        SIGNED => Ok(true),
        x => Err(PackError::UnknownSignFlag(x)),
    }
}

// Prefix size byte plus the prefix itself
fn copy_prefix<R: Read, W: Write>(prefix_size: u8, source: &mut R, dest: &mut W) -> Result<()> {
    let found = source.read_u8()?;
    if found != prefix_size {
        return Err(PackError::Malformed("prefix size byte does not match the expected prefix size"));
    }
    dest.write_u8(prefix_size)?;
    copy_exact(source, dest, prefix_size as u64, &HeapPool::new(256))?;
    Ok(())
}

/// Fills in the envelope at `envelope` for everything between it and the
/// current position, then appends the signature there. The stream is left
/// after the signature.
pub(crate) fn seal<S: Read + Write + Seek>(dest: &mut S, envelope: u64, algorithm: &dyn SignAlgorithm) -> Result<()> {
    let protected_start = envelope + SIGN_ENVELOPE;
    let end = dest.stream_position()?;
    let protected = end - protected_start;

    dest.seek(SeekFrom::Start(envelope))?;
    dest.write_u32::<LittleEndian>(to_u32(protected)?)?;

    let signature = {
        let mut window = Window::new(&mut *dest, protected_start, protected)?;
        algorithm.sign(&mut window)?
    };

    dest.seek(SeekFrom::Start(end))?;
    dest.write_all(&signature)?;

    dest.seek(SeekFrom::Start(envelope + 4))?;
    dest.write_u32::<LittleEndian>(to_u32(signature.len() as u64)?)?;
    dest.seek(SeekFrom::Start(end + signature.len() as u64))?;

    debug!("sealed {} protected bytes with a {} byte signature", protected, signature.len());
    Ok(())
}

/// Copies an unsigned pack from `source` into `dest`, signed.
pub fn sign<R, W>(prefix_size: u8, algorithm: &dyn SignAlgorithm, source: &mut R, dest: &mut W) -> Result<()>
where
    R: Read,
    W: Read + Write + Seek,
{
    copy_prefix(prefix_size, source, dest)?;
    if check_flag(source.read_u8()?)? {
        return Err(PackError::AlreadySigned);
    }

    dest.write_u8(SIGNED)?;
    let envelope = dest.stream_position()?;
    dest.write_u32::<LittleEndian>(0)?;
    dest.write_u32::<LittleEndian>(0)?;

    copy_buffered(source, dest, &HeapPool::default())?;
    seal(dest, envelope, algorithm)
}

pub fn is_signed<S: Read + Seek>(prefix_size: u8, stream: &mut S) -> Result<bool> {
    let pos = stream.stream_position()?;
    let flag = stream
        .seek(SeekFrom::Current(1 + prefix_size as i64))
        .and_then(|_| stream.read_u8());
    stream.seek(SeekFrom::Start(pos))?;

    check_flag(flag?)
}

fn check_sign<S: Read + Seek>(prefix_size: u8, algorithm: &dyn SignAlgorithm, stream: &mut S) -> Result<bool> {
    stream.seek(SeekFrom::Current(1 + prefix_size as i64))?;
    if !check_flag(stream.read_u8()?)? {
        return Err(PackError::NotSigned);
    }

    let protected = stream.read_u32::<LittleEndian>()? as u64;
    let sign_size = stream.read_u32::<LittleEndian>()? as u64;
    let data_start = stream.stream_position()?;

    let mut signature = Vec::new();
    Window::new(&mut *stream, data_start + protected, sign_size)?.read_to_end(&mut signature)?;

    let mut data = Window::new(&mut *stream, data_start, protected)?;
    algorithm.verify(&mut data, &signature)
}

/// Checks the signature of a signed pack, the stream position is restored.
pub fn is_sign_match<S: Read + Seek>(prefix_size: u8, algorithm: &dyn SignAlgorithm, stream: &mut S) -> Result<bool> {
    let pos = stream.stream_position()?;
    let result = check_sign(prefix_size, algorithm, stream);
    stream.seek(SeekFrom::Start(pos))?;
    result
}

/// Copies a signed pack from `source` into `dest` without its envelope.
pub fn remove_sign<R: Read, W: Write>(prefix_size: u8, source: &mut R, dest: &mut W) -> Result<()> {
    copy_prefix(prefix_size, source, dest)?;
    if !check_flag(source.read_u8()?)? {
        return Err(PackError::NotSigned);
    }

    let protected = source.read_u32::<LittleEndian>()? as u64;
    let _sign_size = source.read_u32::<LittleEndian>()?;

    dest.write_u8(UNSIGNED)?;
    copy_exact(source, dest, protected, &HeapPool::default())?;
    Ok(())
}

#[cfg(test)]
mod test_sign {
    use super::*;
    use crate::crypto::Ed25519SignAlgorithm;
    use std::io::Cursor;

    fn key() -> Ed25519SignAlgorithm {
        Ed25519SignAlgorithm::from_key_pair(&Ed25519SignAlgorithm::generate_key_pair().unwrap()).unwrap()
    }

    // Prefix "AB", unsigned flag, then an opaque payload
    fn unsigned() -> Vec<u8> {
        let mut data = vec![2, b'A', b'B', UNSIGNED];
        data.extend((0u8..=200).collect::<Vec<u8>>());
        data
    }

    fn signed(algo: &Ed25519SignAlgorithm) -> Cursor<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        sign(2, algo, &mut Cursor::new(unsigned()), &mut out).unwrap();
        out.set_position(0);
        out
    }

    #[test]
    fn envelope_layout() {
        let algo = key();
        let data = signed(&algo).into_inner();

        assert_eq!(&data[..4], &[2, b'A', b'B', SIGNED]);
        assert_eq!(u32::from_le_bytes(data[4..8].try_into().unwrap()), 201);
        assert_eq!(u32::from_le_bytes(data[8..12].try_into().unwrap()), 64);
        assert_eq!(data.len(), 12 + 201 + 64);
        assert_eq!(&data[12..213], &unsigned()[4..]);
    }

    #[test]
    fn remove_restores_original() {
        let algo = key();
        let mut data = signed(&algo);
        assert!(is_signed(2, &mut data).unwrap());
        assert_eq!(data.position(), 0);

        let mut out = Cursor::new(Vec::new());
        remove_sign(2, &mut data, &mut out).unwrap();
        out.set_position(0);

        assert!(!is_signed(2, &mut out).unwrap());
        assert_eq!(out.into_inner(), unsigned());
    }

    #[test]
    fn verify_and_tamper() {
        let algo = key();
        let mut data = signed(&algo);
        data.set_position(0);
        assert!(is_sign_match(2, &algo, &mut data).unwrap());
        assert_eq!(data.position(), 0);

        assert!(!is_sign_match(2, &key(), &mut data).unwrap());

        data.get_mut()[100] ^= 0xFF;
        assert!(!is_sign_match(2, &algo, &mut data).unwrap());
    }

    #[test]
    fn double_sign_rejected() {
        let algo = key();
        let mut data = signed(&algo);
        let mut out = Cursor::new(Vec::new());

        assert!(matches!(sign(2, &algo, &mut data, &mut out), Err(PackError::AlreadySigned)));
    }

    #[test]
    fn unsigned_checks() {
        let mut data = Cursor::new(unsigned());
        assert!(matches!(is_sign_match(2, &key(), &mut data), Err(PackError::NotSigned)));
        assert_eq!(data.position(), 0);

        let mut out = Vec::new();
        assert!(matches!(remove_sign(2, &mut data, &mut out), Err(PackError::NotSigned)));
    }

    #[test]
    fn unknown_flag() {
        let mut data = Cursor::new(vec![0, 7, 1, 2, 3]);
        assert!(matches!(is_signed(0, &mut data), Err(PackError::UnknownSignFlag(7))));
    }

    #[test]
    fn prefix_size_mismatch() {
        let mut out = Cursor::new(Vec::new());
        let err = sign(3, &key(), &mut Cursor::new(unsigned()), &mut out).unwrap_err();
        assert!(matches!(err, PackError::Malformed(_)));
    }
}
