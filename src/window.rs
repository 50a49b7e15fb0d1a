//! Bounded, read-only views over a range of a seekable stream.
//!
//! A [`Window`] maps its position `p` to `start + p` in the inner stream and
//! never reads past `start + length`. The inner stream is re-seeked before
//! every read, so any number of windows may be opened over one stream, one
//! after the other or overlapping, without disturbing each other.
use std::cell::RefCell;
use std::cmp;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use crate::error::{PackError, Result};

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

pub struct Window<S> {
    inner: S,
    start: u64,
    length: u64,
    pos: u64,
}

// Length of a stream without moving its cursor
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let cur = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if cur != len {
        stream.seek(SeekFrom::Start(cur))?;
    }
    Ok(len)
}

impl<S: Read + Seek> Window<S> {
    pub fn new(mut inner: S, start: u64, length: u64) -> Result<Self> {
        let available = stream_len(&mut inner)?;
        let fits = start
            .checked_add(length)
            .map_or(false, |end| start <= available && end <= available);

        if !fits {
            return Err(PackError::WindowOutOfBounds {
                start,
                length,
                available,
            });
        }

        Ok(Window {
            inner,
            start,
            length,
            pos: 0,
        })
    }
}

impl<S> Window<S> {
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Clamps into `[0, len]`.
    pub fn set_position(&mut self, pos: i64) {
        self.pos = cmp::min(cmp::max(pos, 0) as u64, self.length);
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Seek> Read for Window<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length - self.pos;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = cmp::min(buf.len() as u64, remaining) as usize;
        self.inner.seek(SeekFrom::Start(self.start + self.pos))?;
        let read = self.inner.read(&mut buf[..want])?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl<S> Seek for Window<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => self.length as i128 + d as i128,
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the window",
            ));
        }

        self.pos = if target > self.length as i128 {
            self.length
        } else {
            target as u64
        };
        Ok(self.pos)
    }
}

impl<S> Write for Window<S> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "window is read-only"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reference counted handle to a stream that outlives the reader call,
/// used by attached parts to keep reading from the source.
#[derive(Clone)]
pub struct SharedSource(Rc<RefCell<dyn ReadSeek>>);

impl SharedSource {
    pub fn new<S: Read + Seek + 'static>(stream: S) -> Self {
        SharedSource(Rc::new(RefCell::new(stream)))
    }

    fn busy() -> io::Error {
        io::Error::new(io::ErrorKind::WouldBlock, "shared source is already borrowed")
    }
}

impl Read for SharedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_borrow_mut().map_err(|_| Self::busy())?.read(buf)
    }
}

impl Seek for SharedSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.try_borrow_mut().map_err(|_| Self::busy())?.seek(pos)
    }
}

/// A window description over a [`SharedSource`] that can be opened any
/// number of times.
#[derive(Clone)]
pub struct LiveWindow {
    source: SharedSource,
    start: u64,
    length: u64,
}

impl LiveWindow {
    pub fn new(mut source: SharedSource, start: u64, length: u64) -> Result<Self> {
        // Bounds check up front, the window itself is rebuilt on open
        Window::new(&mut source, start, length)?;
        Ok(LiveWindow {
            source,
            start,
            length,
        })
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn open(&self) -> Result<Window<SharedSource>> {
        Window::new(self.source.clone(), self.start, self.length)
    }
}

#[cfg(test)]
mod test_window {
    use super::*;
    use std::io::Cursor;

    fn hundred() -> Cursor<Vec<u8>> {
        Cursor::new((0u8..100).collect())
    }

    #[test]
    fn reads_stop_at_window_end() {
        let mut data = hundred();
        let mut window = Window::new(&mut data, 10, 5).unwrap();

        window.set_position(4);
        let mut buf = [0u8; 8];
        assert_eq!(window.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 14);

        window.set_position(5);
        assert_eq!(window.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_whole_window() {
        let mut data = hundred();
        let mut window = Window::new(&mut data, 10, 5).unwrap();

        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn out_of_bounds() {
        let mut data = hundred();
        assert!(matches!(
            Window::new(&mut data, 96, 5),
            Err(PackError::WindowOutOfBounds { start: 96, length: 5, available: 100 })
        ));
        assert!(Window::new(&mut data, 101, 0).is_err());
        assert!(Window::new(&mut data, u64::MAX, 2).is_err());
        assert!(Window::new(&mut data, 100, 0).is_ok());
    }

    #[test]
    fn construction_keeps_inner_position() {
        let mut data = hundred();
        data.set_position(42);
        Window::new(&mut data, 0, 10).unwrap();
        assert_eq!(data.position(), 42);
    }

    #[test]
    fn position_clamps() {
        let mut data = hundred();
        let mut window = Window::new(&mut data, 10, 5).unwrap();

        window.set_position(50);
        assert_eq!(window.position(), 5);
        window.set_position(-3);
        assert_eq!(window.position(), 0);

        assert_eq!(window.seek(SeekFrom::Start(99)).unwrap(), 5);
        assert_eq!(window.seek(SeekFrom::End(-2)).unwrap(), 3);
        assert_eq!(window.seek(SeekFrom::Current(-1)).unwrap(), 2);
    }

    #[test]
    fn negative_seek_fails() {
        let mut data = hundred();
        let mut window = Window::new(&mut data, 10, 5).unwrap();

        let err = window.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn write_unsupported() {
        let mut data = hundred();
        let mut window = Window::new(&mut data, 10, 5).unwrap();

        let err = window.write(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn overlapping_shared_windows() {
        let source = SharedSource::new(hundred());
        let mut a = Window::new(source.clone(), 20, 10).unwrap();
        let mut b = Window::new(source.clone(), 25, 10).unwrap();

        let mut buf = [0u8; 3];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [20, 21, 22]);
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [25, 26, 27]);
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [23, 24, 25]);

        drop(a);
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [28, 29, 30]);
    }

    #[test]
    fn live_window_reopens() {
        let live = LiveWindow::new(SharedSource::new(hundred()), 90, 10).unwrap();

        for _ in 0..2 {
            let mut out = Vec::new();
            live.open().unwrap().read_to_end(&mut out).unwrap();
            assert_eq!(out, (90u8..100).collect::<Vec<u8>>());
        }
        assert!(LiveWindow::new(SharedSource::new(hundred()), 95, 10).is_err());
    }
}
