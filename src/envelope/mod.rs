use core::fmt;
use std::error::Error;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

pub mod env;
pub mod image;
pub mod param;

#[cfg(test)]
mod test;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrder
{
	#[default]
	Big,
	Little,
}

impl WordOrder
{
	pub fn read_u32(self, src: &[u8]) -> u32
	{
		match self
		{
			Self::Big => BigEndian::read_u32(src),
			Self::Little => LittleEndian::read_u32(src),
		}
	}

	pub fn write_u32(self, dst: &mut [u8], value: u32)
	{
		match self
		{
			Self::Big => BigEndian::write_u32(dst, value),
			Self::Little => LittleEndian::write_u32(dst, value),
		}
	}
}

pub(crate) fn be_word(src: &[u8], pos: usize) -> u32
{
	BigEndian::read_u32(&src[pos..pos + 4])
}

pub(crate) fn put_be_word(dst: &mut [u8], pos: usize, value: u32)
{
	BigEndian::write_u32(&mut dst[pos..pos + 4], value);
}

// reads up to the first NUL (or the end of `src`), replacing invalid UTF-8
pub(crate) fn c_string(src: &[u8]) -> String
{
	let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
	String::from_utf8_lossy(&src[..end]).into_owned()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError
{
	Underflow{need: usize, have: usize},
	BadMagic{expect: u32, have: u32},
	BadChecksum{expect: u32, have: u32},
	BadTable{table: &'static str, offset: u32, size: u32},
}

impl fmt::Display for DecodeError
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		match self
		{
			Self::Underflow{need, have} => write!(f, "input buffer underflow (need {need}, got {have})"),
			Self::BadMagic{expect, have} => write!(f, "magic number is wrong (0x{have:08x} != 0x{expect:08x})"),
			Self::BadChecksum{expect, have} => write!(f, "bad checksum (stored 0x{expect:08x}, computed 0x{have:08x})"),
			Self::BadTable{table, offset, size} => write!(f, "{table} table out of bounds (offset {offset}, {size} words)"),
		}
	}
}

impl Error for DecodeError {}
