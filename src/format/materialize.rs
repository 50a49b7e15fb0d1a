//! Turning a part's data region into content.
//!
//! [`Detached`] copies the bytes out while the source is at hand, the part
//! stays usable once the source is gone. [`Attached`] keeps a live window
//! into a [`SharedSource`], cheap but tied to that source staying intact.
use std::io::{Read, Seek};

use log::debug;

use crate::buf::{BufferPool, HeapPool};
use crate::error::Result;
use crate::pack::DataContent;
use crate::scratch::{ScratchProvider, TempFileScratch};
use crate::window::{LiveWindow, SharedSource, Window};

pub trait Materialize<S> {
    /// `start` is an absolute offset in `source`.
    fn content(&self, source: &mut S, start: u64, length: u64) -> Result<DataContent>;
}

pub struct Detached<P: ScratchProvider = TempFileScratch, B: BufferPool = HeapPool> {
    scratch: P,
    pool: B,
}

impl Detached {
    pub fn new() -> Self {
        Detached {
            scratch: TempFileScratch::default(),
            pool: HeapPool::default(),
        }
    }
}

impl Default for Detached {
    fn default() -> Self {
        Detached::new()
    }
}

impl<P: ScratchProvider, B: BufferPool> Detached<P, B> {
    pub fn with(scratch: P, pool: B) -> Self {
        Detached { scratch, pool }
    }
}

impl<S: Read + Seek, P: ScratchProvider, B: BufferPool> Materialize<S> for Detached<P, B> {
    fn content(&self, source: &mut S, start: u64, length: u64) -> Result<DataContent> {
        let mut window = Window::new(&mut *source, start, length)?;
        let blob = self.scratch.store(&mut window, &self.pool)?;
        debug!("detached {} bytes at {}", blob.len(), start);
        Ok(DataContent::Scratch(blob))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Attached;

impl Materialize<SharedSource> for Attached {
    fn content(&self, source: &mut SharedSource, start: u64, length: u64) -> Result<DataContent> {
        Ok(DataContent::Window(LiveWindow::new(source.clone(), start, length)?))
    }
}
