use std::io::{copy, Read};

use blake3::Hash;
use blake3::Hasher;

// To encapsulate the hash engine used
pub fn digest<R: Read + ?Sized>(data: &mut R) -> Result<Hash, std::io::Error> {
    let mut hash = Hasher::new();
    copy(data, &mut hash)?;
    Ok(hash.finalize())
}

pub fn to_hex(hash: &Hash) -> String {
    hash.to_hex().to_string()
}

#[cfg(test)]
mod test_digest {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn matches_oneshot() {
        let mut data = Cursor::new(b"Hello World!".to_vec());
        assert_eq!(digest(&mut data).unwrap(), blake3::hash(b"Hello World!"));
    }

    #[test]
    fn hex_is_lowercase() {
        let hex = to_hex(&blake3::hash(b""));
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, hex.to_lowercase());
    }
}
