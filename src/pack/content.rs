use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;

use bytes::Bytes;

use crate::buf::{copy_buffered, BufferPool};
use crate::error::{PackError, Result};
use crate::scratch::ScratchBlob;
use crate::window::LiveWindow;

pub type SourceFn = Box<dyn Fn() -> io::Result<Box<dyn Read>>>;
pub type PushFn = Box<dyn Fn(&mut dyn Write) -> io::Result<()>>;

/// Where the bytes of a part come from.
pub enum DataContent {
    Memory(Bytes),
    File(PathBuf),
    /// Builds a fresh reader on every call.
    Source(SourceFn),
    /// Can only push its bytes into a destination.
    Push(PushFn),
    /// Detached copy made while reading a pack.
    Scratch(ScratchBlob),
    /// Live view into the stream the pack was read from.
    Window(LiveWindow),
}

impl DataContent {
    pub fn source<F>(f: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Read>> + 'static,
    {
        DataContent::Source(Box::new(f))
    }

    pub fn push<F>(f: F) -> Self
    where
        F: Fn(&mut dyn Write) -> io::Result<()> + 'static,
    {
        DataContent::Push(Box::new(f))
    }

    pub fn open(&self) -> Result<Box<dyn Read>> {
        match self {
            DataContent::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            DataContent::File(path) => Ok(Box::new(File::open(path)?)),
            DataContent::Source(f) => Ok(f()?),
            DataContent::Push(_) => Err(PackError::PushOnly),
            DataContent::Scratch(blob) => Ok(Box::new(blob.open()?)),
            DataContent::Window(live) => Ok(Box::new(live.open()?)),
        }
    }

    /// Writes every byte into `dest`, returns the count.
    pub fn copy_to(&self, dest: &mut dyn Write, pool: &dyn BufferPool) -> Result<u64> {
        match self {
            DataContent::Memory(bytes) => {
                dest.write_all(bytes)?;
                Ok(bytes.len() as u64)
            },
            DataContent::Push(f) => {
                let mut counter = CountingWriter { inner: dest, count: 0 };
                f(&mut counter)?;
                Ok(counter.count)
            },
            _ => {
                let mut reader = self.open()?;
                Ok(copy_buffered(&mut reader, dest, pool)?)
            },
        }
    }
}

impl fmt::Debug for DataContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataContent::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            DataContent::File(path) => write!(f, "File({:?})", path),
            DataContent::Source(_) => write!(f, "Source"),
            DataContent::Push(_) => write!(f, "Push"),
            DataContent::Scratch(blob) => write!(f, "Scratch({} bytes)", blob.len()),
            DataContent::Window(live) => write!(f, "Window({} bytes)", live.len()),
        }
    }
}

impl From<Bytes> for DataContent {
    fn from(bytes: Bytes) -> Self {
        DataContent::Memory(bytes)
    }
}

impl From<Vec<u8>> for DataContent {
    fn from(bytes: Vec<u8>) -> Self {
        DataContent::Memory(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for DataContent {
    fn from(bytes: &'static [u8]) -> Self {
        DataContent::Memory(Bytes::from_static(bytes))
    }
}

impl From<PathBuf> for DataContent {
    fn from(path: PathBuf) -> Self {
        DataContent::File(path)
    }
}

struct CountingWriter<'a> {
    inner: &'a mut dyn Write,
    count: u64,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.inner.write(buf)?;
        self.count += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod test_content {
    use super::*;
    use crate::buf::HeapPool;
    use crate::window::SharedSource;

    fn drain(content: &DataContent) -> Vec<u8> {
        let mut out = Vec::new();
        content.copy_to(&mut out, &HeapPool::new(4)).unwrap();
        out
    }

    #[test]
    fn memory_and_source() {
        let mem = DataContent::from(b"hello".to_vec());
        assert_eq!(drain(&mem), b"hello");

        let src = DataContent::source(|| Ok(Box::new(Cursor::new(b"world".to_vec())) as Box<dyn Read>));
        assert_eq!(drain(&src), b"world");
        assert_eq!(drain(&src), b"world");
    }

    #[test]
    fn push_only() {
        let push = DataContent::push(|w| w.write_all(b"pushed"));

        assert!(matches!(push.open(), Err(PackError::PushOnly)));
        let mut out = Vec::new();
        assert_eq!(push.copy_to(&mut out, &HeapPool::default()).unwrap(), 6);
        assert_eq!(out, b"pushed");
    }

    #[test]
    fn file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"on disk").unwrap();

        let content = DataContent::from(tmp.path().to_path_buf());
        assert_eq!(drain(&content), b"on disk");
    }

    #[test]
    fn window() {
        let source = SharedSource::new(Cursor::new(b"0123456789".to_vec()));
        let content = DataContent::Window(LiveWindow::new(source, 3, 4).unwrap());

        assert_eq!(drain(&content), b"3456");
        assert_eq!(format!("{:?}", content), "Window(4 bytes)");
    }
}
