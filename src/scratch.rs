use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use bytes::Bytes;
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::buf::{copy_buffered, BufferPool};
use crate::error::Result;
use crate::window::ReadSeek;

/// Creates independent copies of part data.
pub trait ScratchProvider {
    fn store(&self, data: &mut dyn Read, pool: &dyn BufferPool) -> Result<ScratchBlob>;
}

/// A copy owned by a part, released when dropped.
#[derive(Debug)]
pub enum ScratchBlob {
    File(TempBlob),
    Memory(Bytes),
}

impl ScratchBlob {
    pub fn len(&self) -> u64 {
        match self {
            ScratchBlob::File(blob) => blob.len,
            ScratchBlob::Memory(bytes) => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open(&self) -> Result<Box<dyn ReadSeek>> {
        match self {
            ScratchBlob::File(blob) => blob.open(),
            ScratchBlob::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
        }
    }
}

#[derive(Debug)]
pub struct TempBlob {
    file: Option<NamedTempFile>,
    len: u64,
}

impl TempBlob {
    fn open(&self) -> Result<Box<dyn ReadSeek>> {
        match &self.file {
            Some(file) => Ok(Box::new(file.reopen()?)),
            None => Ok(Box::new(Cursor::new(Vec::new()))),
        }
    }
}

impl Drop for TempBlob {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                warn!("unable to remove scratch file {:?}: {}", path, e);
            }
        }
    }
}

/// Named temporary files, in `dir` or the system temp directory.
#[derive(Debug, Clone)]
pub struct TempFileScratch {
    dir: Option<PathBuf>,
    prefix: String,
}

impl TempFileScratch {
    pub fn new(dir: Option<PathBuf>) -> Self {
        TempFileScratch {
            dir,
            prefix: String::from("datapack-"),
        }
    }
}

impl Default for TempFileScratch {
    fn default() -> Self {
        TempFileScratch::new(None)
    }
}

impl ScratchProvider for TempFileScratch {
    fn store(&self, data: &mut dyn Read, pool: &dyn BufferPool) -> Result<ScratchBlob> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix);
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let len = copy_buffered(data, &mut file, pool)?;
        file.flush()?;
        debug!("scratch {:?} holds {} bytes", file.path(), len);

        Ok(ScratchBlob::File(TempBlob {
            file: Some(file),
            len,
        }))
    }
}

/// Keeps copies on the heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryScratch;

impl ScratchProvider for MemoryScratch {
    fn store(&self, data: &mut dyn Read, pool: &dyn BufferPool) -> Result<ScratchBlob> {
        let mut out = Vec::new();
        copy_buffered(data, &mut out, pool)?;
        Ok(ScratchBlob::Memory(Bytes::from(out)))
    }
}
