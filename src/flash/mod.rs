use core::fmt;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

pub mod file;
pub mod mem;
mod mtd;

#[cfg(test)]
mod test;

pub const ERASED: u8 = 0xFF;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PartitionInfo
{
	pub size: usize,
}

/// Raw access to whole flash partitions. Every call opens the partition, does its work and
/// releases it again before returning, on success and on failure.
pub trait Partitions
{
	fn info(&self, path: &Path) -> Result<PartitionInfo, IoError>;

	// always from offset zero
	fn read(&self, path: &Path, size: usize) -> Result<Vec<u8>, IoError>;

	fn erase(&mut self, path: &Path) -> Result<(), IoError>;

	// erase the full partition, rewind, then write `data`
	fn write(&mut self, path: &Path, data: &[u8]) -> Result<(), IoError>;

	// write without erasing first, so it can only clear bits
	fn program(&mut self, path: &Path, offset: usize, data: &[u8]) -> Result<(), IoError>;

	fn read_all(&self, path: &Path) -> Result<Vec<u8>, IoError>
	{
		let info = self.info(path)?;
		self.read(path, info.size)
	}
}

impl<T: Partitions + ?Sized> Partitions for &mut T
{
	fn info(&self, path: &Path) -> Result<PartitionInfo, IoError>
	{
		(**self).info(path)
	}

	fn read(&self, path: &Path, size: usize) -> Result<Vec<u8>, IoError>
	{
		(**self).read(path, size)
	}

	fn erase(&mut self, path: &Path) -> Result<(), IoError>
	{
		(**self).erase(path)
	}

	fn write(&mut self, path: &Path, data: &[u8]) -> Result<(), IoError>
	{
		(**self).write(path, data)
	}

	fn program(&mut self, path: &Path, offset: usize, data: &[u8]) -> Result<(), IoError>
	{
		(**self).program(path, offset, data)
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoOp
{
	Open,
	Info,
	Read,
	Erase,
	Seek,
	Write,
	Close,
}

impl fmt::Display for IoOp
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.write_str(match self
		{
			Self::Open => "open",
			Self::Info => "query",
			Self::Read => "read",
			Self::Erase => "erase",
			Self::Seek => "seek",
			Self::Write => "write",
			Self::Close => "close",
		})
	}
}

#[derive(Debug)]
pub struct IoError
{
	pub path: PathBuf,
	pub op: IoOp,
	pub source: io::Error,
}

impl IoError
{
	pub fn new(path: &Path, op: IoOp, source: io::Error) -> Self
	{
		Self{path: path.to_path_buf(), op, source}
	}

	pub(crate) fn wrap(path: &Path, op: IoOp) -> impl FnOnce(io::Error) -> Self + '_
	{
		move |source| Self::new(path, op, source)
	}
}

impl fmt::Display for IoError
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		write!(f, "could not {} {}", self.op, self.path.display())
	}
}

impl Error for IoError
{
	fn source(&self) -> Option<&(dyn Error + 'static)>
	{
		Some(&self.source)
	}
}
