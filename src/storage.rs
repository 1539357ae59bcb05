//! Database byte storage
//!
//! A database is either memory-mapped from disk or held as an owned buffer.
//! Both are read-only once created and expose the same bounds-checked
//! accessors.
//!
//! # Safety
//!
//! Memory-mapped files are inherently unsafe (file contents can change if
//! another process rewrites the file). This module keeps the public API safe
//! by never handing out raw pointers and bounds-checking every access. A
//! file rewritten underneath a mapping yields garbage data, not undefined
//! behavior in this crate's own code paths.

use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// How a database file is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Memory-map the file (shared, lazily paged in)
    #[default]
    Mmap,
    /// Read the whole file into an owned buffer
    Memory,
}

impl FromStr for OpenMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mmap" => Ok(OpenMode::Mmap),
            "memory" | "mem" => Ok(OpenMode::Memory),
            other => Err(format!("unknown open mode '{}' (expected mmap or memory)", other)),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Mmap => f.write_str("mmap"),
            OpenMode::Memory => f.write_str("memory"),
        }
    }
}

/// Storage for database data - either owned or memory-mapped
pub enum Storage {
    /// Owned buffer
    Owned(Vec<u8>),
    /// Read-only mapping of a file
    Mmap(Mmap),
}

impl Storage {
    /// Load a file with the requested mode
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> io::Result<Self> {
        match mode {
            OpenMode::Mmap => {
                let file = File::open(path.as_ref())?;
                // SAFETY: the mapping is read-only and never outlives `Storage`;
                // all access goes through bounds-checked slices.
                let mmap = unsafe { Mmap::map(&file)? };
                Ok(Storage::Mmap(mmap))
            }
            OpenMode::Memory => Ok(Storage::Owned(std::fs::read(path.as_ref())?)),
        }
    }

    /// Get a slice of the entire buffer
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }

    /// Total size in bytes
    pub fn size(&self) -> usize {
        self.as_slice().len()
    }

    /// Mode this storage was created with
    pub fn mode(&self) -> OpenMode {
        match self {
            Storage::Owned(_) => OpenMode::Memory,
            Storage::Mmap(_) => OpenMode::Mmap,
        }
    }

    /// Get a slice at a specific offset with bounds checking.
    ///
    /// Returns `None` if the offset + length would exceed the buffer size.
    pub fn get_slice(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        self.as_slice().get(offset..end)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("mode", &self.mode())
            .field("size", &self.size())
            .finish()
    }
}
