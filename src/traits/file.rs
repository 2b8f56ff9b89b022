//! File handles returned by [`Location::open`](crate::Location::open).

use std::fmt;
use std::io::{Read, Seek, Write};

/// Byte-stream access to an open file.
///
/// Automatically implemented for anything that reads, writes and seeks, so
/// `std::fs::File` and the in-memory handle both qualify.
pub trait FileIo: Read + Write + Seek + Send + fmt::Debug {}

impl<T: Read + Write + Seek + Send + fmt::Debug> FileIo for T {}

/// An open file of any backend.
pub type FileHandle = Box<dyn FileIo>;
