use std::io::ErrorKind;
use std::path::Path;

use super::*;
use crate::flash::file::FileFlash;
use crate::flash::mem::{Access, Fault, MemFlash};

const PART: &str = "/dev/mtd4";

fn mem() -> MemFlash
{
	MemFlash::new().with(PART, 16)
}

#[test]
fn mem_starts_erased()
{
	let flash = mem();
	assert_eq!(flash.info(Path::new(PART)).unwrap(), PartitionInfo{size: 16});
	assert_eq!(flash.read_all(Path::new(PART)).unwrap(), vec![ERASED; 16]);
	assert_eq!(flash.read(Path::new(PART), 4).unwrap(), vec![ERASED; 4]);
}

#[test]
fn mem_unknown_partition()
{
	let mut flash = mem();
	let err = flash.read_all(Path::new("/dev/mtd9")).unwrap_err();
	assert_eq!(err.op, IoOp::Open);
	assert_eq!(err.source.kind(), ErrorKind::NotFound);
	assert!(flash.write(Path::new("/dev/mtd9"), b"x").is_err());
	assert_eq!(err.to_string(), "could not open /dev/mtd9");
}

#[test]
fn mem_write_replaces_everything()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.write(path, b"0123456789").unwrap();
	flash.write(path, b"ab").unwrap();
	let mut expect = vec![ERASED; 16];
	expect[..2].copy_from_slice(b"ab");
	assert_eq!(flash.contents(path).unwrap(), &expect[..]);
	assert_eq!(flash.log(), &[Access::Write(path.to_path_buf(), 10), Access::Write(path.to_path_buf(), 2)]);
	// too large for the partition, nothing happens
	assert!(flash.write(path, &[0u8; 17]).is_err());
	assert_eq!(flash.contents(path).unwrap(), &expect[..]);
}

#[test]
fn mem_program_clears_bits()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.write(path, &[0xF0, 0x0F, 0xFF, 0xFF]).unwrap();
	flash.program(path, 0, &[0x3C, 0x3C]).unwrap();
	assert_eq!(&flash.contents(path).unwrap()[..4], &[0x30, 0x0C, 0xFF, 0xFF]);
	flash.program(path, 2, &[0, 0]).unwrap();
	assert_eq!(&flash.contents(path).unwrap()[..4], &[0x30, 0x0C, 0x00, 0x00]);
	assert!(flash.program(path, 15, &[0, 0]).is_err());
	assert!(flash.program(path, usize::MAX, &[0]).is_err());
}

#[test]
fn mem_erase()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.load(path, b"abcd");
	assert!(flash.log().is_empty());
	flash.erase(path).unwrap();
	assert_eq!(flash.contents(path).unwrap(), &[ERASED; 16][..]);
	assert_eq!(flash.log(), &[Access::Erase(path.to_path_buf())]);
	flash.clear_log();
	assert!(flash.log().is_empty());
}

#[test]
fn fault_erase_leaves_contents()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.load(path, b"keep");
	flash.inject(PART, Fault::Erase);
	assert_eq!(flash.write(path, b"lost").unwrap_err().op, IoOp::Erase);
	assert_eq!(&flash.contents(path).unwrap()[..4], b"keep");
	// one shot
	flash.write(path, b"next").unwrap();
	assert_eq!(&flash.contents(path).unwrap()[..4], b"next");
}

#[test]
fn fault_write_leaves_erased()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.load(path, b"keep");
	flash.inject(PART, Fault::Write);
	assert_eq!(flash.write(path, b"lost").unwrap_err().op, IoOp::Write);
	assert_eq!(flash.contents(path).unwrap(), &[ERASED; 16][..]);
	assert!(flash.log().is_empty());
}

#[test]
fn fault_torn_write()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.inject(PART, Fault::TornWrite(3));
	assert!(flash.write(path, b"abcdef").is_err());
	let mut expect = vec![ERASED; 16];
	expect[..3].copy_from_slice(b"abc");
	assert_eq!(flash.contents(path).unwrap(), &expect[..]);
}

#[test]
fn fault_program()
{
	let mut flash = mem();
	let path = Path::new(PART);
	flash.inject(PART, Fault::Program);
	assert!(flash.program(path, 0, &[0]).is_err());
	assert_eq!(flash.contents(path).unwrap(), &[ERASED; 16][..]);
	flash.program(path, 0, &[0]).unwrap();
	assert_eq!(flash.contents(path).unwrap()[0], 0);
}

#[test]
fn fault_read_persists()
{
	let mut flash = mem().with("/dev/mtd5", 16);
	flash.inject(PART, Fault::Read);
	assert_eq!(flash.read_all(Path::new(PART)).unwrap_err().op, IoOp::Read);
	assert_eq!(flash.read_all(Path::new(PART)).unwrap_err().op, IoOp::Read);
	// other partitions are unaffected
	assert!(flash.read_all(Path::new("/dev/mtd5")).is_ok());
	flash.clear_faults();
	assert!(flash.read_all(Path::new(PART)).is_ok());
}

#[test]
fn fault_only_hits_its_partition()
{
	let mut flash = mem().with("/dev/mtd5", 16);
	flash.inject("/dev/mtd5", Fault::Write);
	flash.write(Path::new(PART), b"fine").unwrap();
	assert!(flash.write(Path::new("/dev/mtd5"), b"fail").is_err());
}

#[test]
fn through_mut_ref()
{
	fn fill(mut flash: impl Partitions, path: &Path)
	{
		flash.write(path, b"via ref").unwrap();
	}

	let mut flash = mem();
	fill(&mut flash, Path::new(PART));
	assert_eq!(&flash.contents(PART).unwrap()[..7], b"via ref");
}

fn image_file(size: usize) -> tempfile::NamedTempFile
{
	let file = tempfile::NamedTempFile::new().unwrap();
	file.as_file().set_len(size as u64).unwrap();
	file
}

#[test]
fn file_info_and_read()
{
	let file = image_file(8192 + 100);
	let flash = FileFlash::new();
	assert_eq!(flash.info(file.path()).unwrap().size, 8292);
	assert_eq!(flash.read(file.path(), 10).unwrap(), vec![0u8; 10]);
	assert_eq!(flash.read(file.path(), 9000).unwrap_err().op, IoOp::Read);
}

#[test]
fn file_write_fills_partition()
{
	let file = image_file(8192 + 100);
	let mut flash = FileFlash::new();
	flash.write(file.path(), b"hello").unwrap();
	let data = flash.read_all(file.path()).unwrap();
	// the file never grows or shrinks
	assert_eq!(data.len(), 8292);
	assert_eq!(&data[..5], b"hello");
	assert!(data[5..].iter().all(|&b| b == ERASED));
	let err = flash.write(file.path(), &vec![0u8; 8293]).unwrap_err();
	assert_eq!(err.op, IoOp::Write);
	assert_eq!(err.source.kind(), ErrorKind::InvalidInput);
	assert_eq!(&flash.read_all(file.path()).unwrap()[..5], b"hello");
}

#[test]
fn file_erase_and_program()
{
	let file = image_file(64);
	let mut flash = FileFlash::new();
	flash.erase(file.path()).unwrap();
	assert_eq!(flash.read_all(file.path()).unwrap(), vec![ERASED; 64]);
	flash.program(file.path(), 4, &[0, 0, 0, 0]).unwrap();
	let data = flash.read_all(file.path()).unwrap();
	assert_eq!(&data[..8], &[ERASED, ERASED, ERASED, ERASED, 0, 0, 0, 0]);
	assert!(flash.program(file.path(), 62, &[0, 0, 0, 0]).is_err());
}

#[test]
fn file_missing()
{
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("mtd7");
	let err = FileFlash::new().info(&path).unwrap_err();
	assert_eq!(err.op, IoOp::Open);
	assert_eq!(err.path, path);
	assert!(err.source().is_some());
}

#[test]
fn plain_files_are_not_mtd()
{
	let file = image_file(64);
	assert_eq!(mtd::size(file.as_file()).unwrap(), None);
	// so a write falls back to the 0xFF fill and nothing of the old contents survives
	let mut flash = FileFlash::new();
	flash.write(file.path(), &[0u8; 64]).unwrap();
	flash.write(file.path(), b"new").unwrap();
	let data = flash.read_all(file.path()).unwrap();
	assert_eq!(&data[..3], b"new");
	assert!(data[3..].iter().all(|&b| b == ERASED));
}

#[cfg(target_os = "linux")]
#[test]
fn other_char_devices_are_not_mtd()
{
	let null = std::fs::File::open("/dev/null").unwrap();
	assert_eq!(mtd::size(&null).unwrap(), None);
}
