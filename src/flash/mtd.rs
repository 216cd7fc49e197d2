//! Raw MTD character devices (`/dev/mtdN`). Flash cells there can only be cleared by writing, so
//! they have to be erased through the driver before new contents go in.

use std::fs::File;
use std::io;

#[cfg(target_os = "linux")]
mod sys
{
	use std::fs::File;
	use std::io;
	use std::os::fd::AsRawFd;

	use nix::errno::Errno;

	// `struct mtd_info_user` from <mtd/mtd-abi.h>
	#[repr(C)]
	#[derive(Default)]
	#[allow(dead_code)]
	pub struct MtdInfoUser
	{
		pub kind: u8,
		pub flags: u32,
		pub size: u32,
		pub erase_size: u32,
		pub write_size: u32,
		pub oob_size: u32,
		pub padding: u64,
	}

	// `struct erase_info_user`
	#[repr(C)]
	pub struct EraseInfoUser
	{
		pub start: u32,
		pub length: u32,
	}

	nix::ioctl_read!(mem_get_info, b'M', 1, MtdInfoUser);
	nix::ioctl_write_ptr!(mem_erase, b'M', 2, EraseInfoUser);

	pub fn size(file: &File) -> io::Result<Option<usize>>
	{
		let mut info = MtdInfoUser::default();
		// SAFETY: the descriptor is open for the lifetime of `file` and `info` matches the kernel layout
		match unsafe {mem_get_info(file.as_raw_fd(), &mut info)}
		{
			Ok(..) => Ok(Some(info.size as usize)),
			// regular files and block devices do not know the request
			Err(Errno::ENOTTY | Errno::EINVAL | Errno::EOPNOTSUPP) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	pub fn erase(file: &File, length: u32) -> io::Result<()>
	{
		let request = EraseInfoUser{start: 0, length};
		// SAFETY: as above, `request` is only read by the kernel
		unsafe {mem_erase(file.as_raw_fd(), &request)}?;
		Ok(())
	}
}

/// The partition size as the MTD driver reports it, or `None` when `file` is not an MTD
/// character device.
pub fn size(file: &File) -> io::Result<Option<usize>>
{
	#[cfg(target_os = "linux")]
	{
		sys::size(file)
	}
	#[cfg(not(target_os = "linux"))]
	{
		let _ = file;
		Ok(None)
	}
}

/// Erases the first `size` bytes, which have to cover whole erase blocks.
pub fn erase(file: &File, size: usize) -> io::Result<()>
{
	let length = u32::try_from(size).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "partition too large to erase"))?;
	#[cfg(target_os = "linux")]
	{
		sys::erase(file, length)
	}
	#[cfg(not(target_os = "linux"))]
	{
		let _ = (file, length);
		Err(io::Error::new(io::ErrorKind::Unsupported, "mtd devices need linux"))
	}
}
