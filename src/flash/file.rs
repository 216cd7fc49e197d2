use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::trace;

use crate::flash::{mtd, IoError, IoOp, PartitionInfo, Partitions, ERASED};

const FILL_CHUNK: usize = 4096;

/// Partitions backed by device nodes or plain image files. Raw MTD devices are erased through
/// the driver; anything else is erased by filling it with 0xFF.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFlash;

impl FileFlash
{
	pub fn new() -> Self
	{
		Self
	}

	fn open(path: &Path, write: bool) -> Result<File, IoError>
	{
		OpenOptions::new().read(true).write(write).open(path).map_err(IoError::wrap(path, IoOp::Open))
	}

	// device nodes report a zero length in their metadata, seeking to the end works for both
	fn size_of(file: &mut File, path: &Path) -> Result<usize, IoError>
	{
		let end = file.seek(SeekFrom::End(0)).map_err(IoError::wrap(path, IoOp::Info))?;
		usize::try_from(end).map_err(|_| IoError::new(path, IoOp::Info, io::Error::new(io::ErrorKind::InvalidData, "partition too large")))
	}

	// the size, and whether this is a raw mtd device
	fn geometry(file: &mut File, path: &Path) -> Result<(usize, bool), IoError>
	{
		match mtd::size(file).map_err(IoError::wrap(path, IoOp::Info))?
		{
			Some(size) => Ok((size, true)),
			None => Ok((Self::size_of(file, path)?, false)),
		}
	}

	fn clear(file: &mut File, path: &Path, size: usize, raw: bool) -> Result<(), IoError>
	{
		if raw
		{
			mtd::erase(file, size).map_err(IoError::wrap(path, IoOp::Erase))
		}
		else
		{
			Self::fill(file, path, size)
		}
	}

	fn fill(file: &mut File, path: &Path, size: usize) -> Result<(), IoError>
	{
		file.seek(SeekFrom::Start(0)).map_err(IoError::wrap(path, IoOp::Seek))?;
		let chunk = [ERASED; FILL_CHUNK];
		let mut left = size;
		while left > 0
		{
			let len = left.min(FILL_CHUNK);
			file.write_all(&chunk[..len]).map_err(IoError::wrap(path, IoOp::Erase))?;
			left -= len;
		}
		Ok(())
	}

	fn close(mut file: File, path: &Path) -> Result<(), IoError>
	{
		file.flush().map_err(IoError::wrap(path, IoOp::Close))
	}
}

impl Partitions for FileFlash
{
	fn info(&self, path: &Path) -> Result<PartitionInfo, IoError>
	{
		let mut file = Self::open(path, false)?;
		let (size, _) = Self::geometry(&mut file, path)?;
		Ok(PartitionInfo{size})
	}

	fn read(&self, path: &Path, size: usize) -> Result<Vec<u8>, IoError>
	{
		let mut file = Self::open(path, false)?;
		file.seek(SeekFrom::Start(0)).map_err(IoError::wrap(path, IoOp::Seek))?;
		let mut buff = vec![0u8; size];
		file.read_exact(&mut buff).map_err(IoError::wrap(path, IoOp::Read))?;
		Ok(buff)
	}

	fn erase(&mut self, path: &Path) -> Result<(), IoError>
	{
		let mut file = Self::open(path, true)?;
		let (size, raw) = Self::geometry(&mut file, path)?;
		trace!("erasing {} ({size} bytes)", path.display());
		Self::clear(&mut file, path, size, raw)?;
		Self::close(file, path)
	}

	fn write(&mut self, path: &Path, data: &[u8]) -> Result<(), IoError>
	{
		let mut file = Self::open(path, true)?;
		let (size, raw) = Self::geometry(&mut file, path)?;
		if data.len() > size
		{
			return Err(IoError::new(path, IoOp::Write, io::Error::new(io::ErrorKind::InvalidInput,
				format!("{} bytes do not fit a {size} byte partition", data.len()))));
		}
		trace!("writing {} bytes to {}", data.len(), path.display());
		Self::clear(&mut file, path, size, raw)?;
		file.seek(SeekFrom::Start(0)).map_err(IoError::wrap(path, IoOp::Seek))?;
		file.write_all(data).map_err(IoError::wrap(path, IoOp::Write))?;
		Self::close(file, path)
	}

	fn program(&mut self, path: &Path, offset: usize, data: &[u8]) -> Result<(), IoError>
	{
		let mut file = Self::open(path, true)?;
		let (size, _) = Self::geometry(&mut file, path)?;
		if offset.checked_add(data.len()).map_or(true, |end| end > size)
		{
			return Err(IoError::new(path, IoOp::Write, io::Error::new(io::ErrorKind::InvalidInput,
				format!("{} bytes at offset {offset} exceed a {size} byte partition", data.len()))));
		}
		file.seek(SeekFrom::Start(offset as u64)).map_err(IoError::wrap(path, IoOp::Seek))?;
		file.write_all(data).map_err(IoError::wrap(path, IoOp::Write))?;
		Self::close(file, path)
	}
}
