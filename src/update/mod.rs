use core::fmt;
use std::error::Error;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::env::EnvError;
use crate::envelope::DecodeError;
use crate::flash::{IoError, Partitions};
use crate::select::{Bank, NoValidBank};

pub mod image;
pub mod param;


pub use image::ImageBanks;
pub use param::ParamBanks;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BankInfo
{
	pub sequence: u32,
	pub description: String,
}

// what `info` reports for a pair of banks; an invalid bank has no entry
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Report
{
	pub a: Option<BankInfo>,
	pub b: Option<BankInfo>,
	pub selected: Option<Bank>,
}

impl Report
{
	pub fn bank(&self, bank: Bank) -> Option<&BankInfo>
	{
		match bank
		{
			Bank::A => self.a.as_ref(),
			Bank::B => self.b.as_ref(),
		}
	}
}

// where an update went
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Outcome
{
	pub bank: Bank,
	pub sequence: u32,
}

fn pick(paths: &[PathBuf; 2], bank: Bank) -> &Path
{
	match bank
	{
		Bank::A => &paths[0],
		Bank::B => &paths[1],
	}
}

// erase-and-write `data` into a partition that must be able to hold it
pub(crate) fn store<F: Partitions + ?Sized>(flash: &mut F, path: &Path, data: &[u8]) -> Result<(), UpdateError>
{
	let have = flash.info(path).map_err(UpdateError::Io)?.size;
	if data.len() > have
	{
		return Err(UpdateError::TooLarge{need: data.len(), have});
	}
	flash.write(path, data).map_err(UpdateError::WriteFailed)
}

/// Reads a sequence number the way C's `strtoul(s, NULL, 0)` does: leading blanks and a sign are
/// skipped, `0x` selects hex and a leading `0` octal, and parsing stops at the first character
/// that is not a digit. Nothing parsable gives 0, values too large saturate.
pub fn parse_sequence(s: &str) -> u32
{
	let s = s.trim_start();
	let (negative, s) = match s.as_bytes().first()
	{
		Some(b'-') => (true, &s[1..]),
		Some(b'+') => (false, &s[1..]),
		_ => (false, s),
	};
	let (radix, digits) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
	{
		// "0x" without hex digits is just the zero
		if rest.starts_with(|c: char| c.is_ascii_hexdigit()) {(16, rest)} else {(10, "0")}
	}
	else if s.starts_with('0') {(8, s)}
	else {(10, s)};
	let mut value = 0u32;
	for d in digits.chars().map_while(|c| c.to_digit(radix))
	{
		value = match value.checked_mul(radix).and_then(|v| v.checked_add(d))
		{
			Some(v) => v,
			None => return u32::MAX,
		};
	}
	if negative {value.wrapping_neg()} else {value}
}

#[derive(Debug)]
pub enum UpdateError
{
	Input(DecodeError),
	NoValidBank,
	TooLarge{need: usize, have: usize},
	Io(IoError),
	WriteFailed(IoError),
	Environment(EnvError),
}

impl From<NoValidBank> for UpdateError
{
	fn from(_: NoValidBank) -> Self
	{
		Self::NoValidBank
	}
}

impl From<EnvError> for UpdateError
{
	fn from(value: EnvError) -> Self
	{
		Self::Environment(value)
	}
}

impl fmt::Display for UpdateError
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		match self
		{
			Self::Input(..) => f.write_str("invalid input"),
			Self::NoValidBank => f.write_str("can't determine the selected bank"),
			Self::TooLarge{need, have} => write!(f, "input does not fit the partition ({need} > {have} bytes)"),
			Self::Io(..) => f.write_str("could not read bank"),
			Self::WriteFailed(..) => f.write_str("could not write bank"),
			Self::Environment(..) => f.write_str("environment update failed"),
		}
	}
}

impl Error for UpdateError
{
	fn source(&self) -> Option<&(dyn Error + 'static)>
	{
		match self
		{
			Self::Input(e) => Some(e),
			Self::Io(e) | Self::WriteFailed(e) => Some(e),
			Self::Environment(e) => Some(e),
			Self::NoValidBank | Self::TooLarge{..} => None,
		}
	}
}
