use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::flash::{IoError, IoOp, PartitionInfo, Partitions, ERASED};

// what the next matching operation on a partition should do instead of succeeding
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fault
{
	// fails before anything is touched; read faults stay until cleared
	Read,
	Erase,
	Program,
	// the erase goes through, the data never arrives
	Write,
	// the erase and the first n bytes go through
	TornWrite(usize),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Access
{
	Erase(PathBuf),
	Write(PathBuf, usize),
	Program(PathBuf, usize, usize),
}

/// In-memory partitions for tests and simulations, starting out erased.
#[derive(Clone, Debug, Default)]
pub struct MemFlash
{
	parts: HashMap<PathBuf, Vec<u8>>,
	faults: Vec<(PathBuf, Fault)>,
	log: Vec<Access>,
}

impl MemFlash
{
	pub fn new() -> Self
	{
		Self::default()
	}

	pub fn add(&mut self, path: impl Into<PathBuf>, size: usize)
	{
		self.parts.insert(path.into(), vec![ERASED; size]);
	}

	pub fn with(mut self, path: impl Into<PathBuf>, size: usize) -> Self
	{
		self.add(path, size);
		self
	}

	// fills the start of a partition directly, bypassing faults and the access log
	pub fn load(&mut self, path: impl AsRef<Path>, data: &[u8])
	{
		if let Some(part) = self.parts.get_mut(path.as_ref())
		{
			let len = data.len().min(part.len());
			part[..len].copy_from_slice(&data[..len]);
		}
	}

	pub fn contents(&self, path: impl AsRef<Path>) -> Option<&[u8]>
	{
		self.parts.get(path.as_ref()).map(Vec::as_slice)
	}

	pub fn contents_mut(&mut self, path: impl AsRef<Path>) -> Option<&mut [u8]>
	{
		self.parts.get_mut(path.as_ref()).map(Vec::as_mut_slice)
	}

	pub fn inject(&mut self, path: impl Into<PathBuf>, fault: Fault)
	{
		self.faults.push((path.into(), fault));
	}

	pub fn clear_faults(&mut self)
	{
		self.faults.clear();
	}

	pub fn log(&self) -> &[Access]
	{
		&self.log
	}

	pub fn clear_log(&mut self)
	{
		self.log.clear();
	}

	fn take_fault(&mut self, path: &Path, matches: impl Fn(Fault) -> bool) -> Option<Fault>
	{
		let pos = self.faults.iter().position(|(p, f)| p == path && matches(*f))?;
		Some(self.faults.remove(pos).1)
	}

	fn part(&self, path: &Path) -> Result<&Vec<u8>, IoError>
	{
		self.parts.get(path).ok_or_else(|| IoError::new(path, IoOp::Open, io::ErrorKind::NotFound.into()))
	}

	fn part_mut(&mut self, path: &Path) -> Result<&mut Vec<u8>, IoError>
	{
		self.parts.get_mut(path).ok_or_else(|| IoError::new(path, IoOp::Open, io::ErrorKind::NotFound.into()))
	}
}

fn injected(path: &Path, op: IoOp) -> IoError
{
	IoError::new(path, op, io::Error::new(io::ErrorKind::Other, "injected fault"))
}

impl Partitions for MemFlash
{
	fn info(&self, path: &Path) -> Result<PartitionInfo, IoError>
	{
		Ok(PartitionInfo{size: self.part(path)?.len()})
	}

	fn read(&self, path: &Path, size: usize) -> Result<Vec<u8>, IoError>
	{
		if self.faults.iter().any(|(p, f)| p == path && *f == Fault::Read)
		{
			return Err(injected(path, IoOp::Read));
		}
		let part = self.part(path)?;
		if size > part.len()
		{
			return Err(IoError::new(path, IoOp::Read, io::ErrorKind::UnexpectedEof.into()));
		}
		Ok(part[..size].to_vec())
	}

	fn erase(&mut self, path: &Path) -> Result<(), IoError>
	{
		self.part(path)?;
		if self.take_fault(path, |f| f == Fault::Erase).is_some()
		{
			return Err(injected(path, IoOp::Erase));
		}
		self.part_mut(path)?.fill(ERASED);
		self.log.push(Access::Erase(path.to_path_buf()));
		Ok(())
	}

	fn write(&mut self, path: &Path, data: &[u8]) -> Result<(), IoError>
	{
		let size = self.part(path)?.len();
		if data.len() > size
		{
			return Err(IoError::new(path, IoOp::Write, io::ErrorKind::InvalidInput.into()));
		}
		if self.take_fault(path, |f| f == Fault::Erase).is_some()
		{
			return Err(injected(path, IoOp::Erase));
		}
		let fault = self.take_fault(path, |f| matches!(f, Fault::Write | Fault::TornWrite(..)));
		let part = self.part_mut(path)?;
		part.fill(ERASED);
		match fault
		{
			Some(Fault::TornWrite(len)) =>
			{
				let len = len.min(data.len());
				part[..len].copy_from_slice(&data[..len]);
				Err(injected(path, IoOp::Write))
			},
			Some(..) => Err(injected(path, IoOp::Write)),
			None =>
			{
				part[..data.len()].copy_from_slice(data);
				self.log.push(Access::Write(path.to_path_buf(), data.len()));
				Ok(())
			},
		}
	}

	fn program(&mut self, path: &Path, offset: usize, data: &[u8]) -> Result<(), IoError>
	{
		let size = self.part(path)?.len();
		if offset.checked_add(data.len()).map_or(true, |end| end > size)
		{
			return Err(IoError::new(path, IoOp::Write, io::ErrorKind::InvalidInput.into()));
		}
		if self.take_fault(path, |f| f == Fault::Program).is_some()
		{
			return Err(injected(path, IoOp::Write));
		}
		let part = self.part_mut(path)?;
		// flash programming can only pull bits low
		part[offset..offset + data.len()].iter_mut().zip(data).for_each(|(dst, &src)| *dst &= src);
		self.log.push(Access::Program(path.to_path_buf(), offset, data.len()));
		Ok(())
	}
}
