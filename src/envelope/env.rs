use std::borrow::Cow;
use std::iter::FusedIterator;

use crate::crc::crc32;
use crate::envelope::{DecodeError, WordOrder};

pub const HEADER_LEN: usize = 8;
pub const FLAG_ACTIVE: u32 = 1;
pub const FLAG_OBSOLETE: u32 = 0;
pub const FLAGS_POS: usize = 4;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvironmentEnvelope
{
	pub checksum: u32,
	pub flags: u32,
	// always exactly `partition size - 8` bytes
	pub payload: Vec<u8>,
}

impl EnvironmentEnvelope
{
	pub fn empty(capacity: usize) -> Self
	{
		let payload = vec![0u8; capacity];
		Self{checksum: crc32(&payload), flags: FLAG_ACTIVE, payload}
	}

	pub fn decode(src: &[u8], order: WordOrder) -> Result<Self, DecodeError>
	{
		if src.len() < HEADER_LEN
		{
			return Err(DecodeError::Underflow{need: HEADER_LEN, have: src.len()});
		}
		let checksum = order.read_u32(&src[0..4]);
		let flags = order.read_u32(&src[FLAGS_POS..FLAGS_POS + 4]);
		let payload = &src[HEADER_LEN..];
		let computed = crc32(payload);
		if computed != checksum
		{
			return Err(DecodeError::BadChecksum{expect: checksum, have: computed});
		}
		Ok(Self{checksum, flags, payload: payload.to_vec()})
	}

	pub fn capacity(&self) -> usize
	{
		self.payload.len()
	}

	pub fn is_active(&self) -> bool
	{
		self.flags != FLAG_OBSOLETE
	}

	pub fn seal(&mut self)
	{
		self.checksum = crc32(&self.payload);
	}

	pub fn encode(&self, order: WordOrder) -> Vec<u8>
	{
		let mut dst = vec![0u8; HEADER_LEN + self.payload.len()];
		order.write_u32(&mut dst[0..4], self.checksum);
		order.write_u32(&mut dst[FLAGS_POS..FLAGS_POS + 4], self.flags);
		dst[HEADER_LEN..].copy_from_slice(&self.payload);
		dst
	}

	pub fn entries(&self) -> Entries<'_>
	{
		Entries::new(&self.payload)
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry<'l>
{
	line: &'l [u8],
}

impl<'l> Entry<'l>
{
	pub fn as_bytes(&self) -> &'l [u8]
	{
		self.line
	}

	pub fn name(&self) -> &'l [u8]
	{
		match self.line.iter().position(|&b| b == b'=')
		{
			Some(pos) => &self.line[..pos],
			None => self.line,
		}
	}

	pub fn value(&self) -> Option<&'l [u8]>
	{
		let pos = self.line.iter().position(|&b| b == b'=')?;
		Some(&self.line[pos + 1..])
	}

	pub fn to_str(&self) -> Cow<'l, str>
	{
		String::from_utf8_lossy(self.line)
	}
}

// walks NUL-terminated strings until the first empty one, never past the end of the payload
#[derive(Clone, Debug)]
pub struct Entries<'l>
{
	data: &'l [u8],
	pos: usize,
}

impl<'l> Entries<'l>
{
	pub fn new(data: &'l [u8]) -> Self
	{
		Self{data, pos: 0}
	}

	// offset of the terminating empty entry (or the end of the payload)
	pub fn position(&self) -> usize
	{
		self.pos
	}
}

impl<'l> Iterator for Entries<'l>
{
	type Item = Entry<'l>;

	fn next(&mut self) -> Option<Self::Item>
	{
		let rest = self.data.get(self.pos..)?;
		if rest.first().map_or(true, |&b| b == 0)
		{
			return None;
		}
		match rest.iter().position(|&b| b == 0)
		{
			Some(len) =>
			{
				self.pos += len + 1;
				Some(Entry{line: &rest[..len]})
			},
			None =>
			{
				// unterminated tail, stop after it
				self.pos = self.data.len();
				Some(Entry{line: rest})
			},
		}
	}
}

impl<'l> FusedIterator for Entries<'l> {}

// bytes in use, not counting the terminating empty entry
pub fn used_len(data: &[u8]) -> usize
{
	let mut iter = Entries::new(data);
	iter.by_ref().for_each(drop);
	iter.position()
}
