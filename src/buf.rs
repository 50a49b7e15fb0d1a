use std::cell::RefCell;
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

// 64Kb copy buffer
pub const BUFFER_SIZE: usize = 64 * 1024;

// Upper bound on idle buffers kept around by the heap pool
const POOL_KEEP: usize = 8;

pub fn fill_buf<R: Read + ?Sized>(data: &mut R, buf: &mut [u8]) -> std::io::Result<(bool, usize)> {
    let mut buf_read = 0;

    while buf_read < buf.len() {
        match data.read(&mut buf[buf_read..]) {
            Ok(0) => return Ok((true, buf_read)),
            Ok(x) => buf_read += x,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
    }
    Ok((false, buf_read))
}

/// Source of reusable copy buffers.
pub trait BufferPool {
    fn take(&self) -> Vec<u8>;
    fn give_back(&self, buf: Vec<u8>);
}

/// A buffer borrowed from a [`BufferPool`], handed back on drop.
pub struct Lease<'a> {
    pool: &'a dyn BufferPool,
    buf: Vec<u8>,
}

pub fn lease(pool: &dyn BufferPool) -> Lease<'_> {
    Lease {
        pool,
        buf: pool.take(),
    }
}

impl Deref for Lease<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

/// Heap backed pool of fixed size buffers.
pub struct HeapPool {
    size: usize,
    free: RefCell<Vec<Vec<u8>>>,
}

impl HeapPool {
    pub fn new(size: usize) -> Self {
        HeapPool {
            size: size.max(1),
            free: RefCell::new(Vec::new()),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.size
    }
}

impl Default for HeapPool {
    fn default() -> Self {
        HeapPool::new(BUFFER_SIZE)
    }
}

impl BufferPool for HeapPool {
    fn take(&self) -> Vec<u8> {
        self.free
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.size])
    }

    fn give_back(&self, buf: Vec<u8>) {
        let mut free = self.free.borrow_mut();
        if buf.len() == self.size && free.len() < POOL_KEEP {
            free.push(buf);
        }
    }
}

/// Copy all of `reader` into `writer` through a pooled buffer.
pub fn copy_buffered<R, W>(reader: &mut R, writer: &mut W, pool: &dyn BufferPool) -> std::io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = lease(pool);
    let mut total = 0;

    loop {
        match fill_buf(reader, &mut buf)? {
            (true, 0) => break,
            (eof, len) => {
                writer.write_all(&buf[..len])?;
                total += len as u64;
                if eof {
                    break;
                }
            },
        }
    }
    Ok(total)
}

/// Copy exactly `len` bytes, failing with `UnexpectedEof` if the reader runs dry.
pub fn copy_exact<R, W>(reader: &mut R, writer: &mut W, len: u64, pool: &dyn BufferPool) -> std::io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let copied = copy_buffered(&mut (&mut *reader).take(len), writer, pool)?;
    if copied != len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, stream ended after {}", len, copied),
        ));
    }
    Ok(copied)
}
