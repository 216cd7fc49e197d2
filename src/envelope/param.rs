use serde::Serialize;

use crate::crc::crc32;
use crate::envelope::{be_word, c_string, put_be_word, DecodeError};

pub const MAGIC: u32 = 0x12AF34EC;
pub const HEADER_LEN: usize = 76;
// the checksum covers everything after itself: [12, size)
pub const CHECKSUM_START: usize = 12;
const CHECKSUM_POS: usize = 8;
const TABLES_POS: usize = 20;

const GLOBAL_RANGES: usize = 16;
const GLOBAL_SEQUENCE_POS: usize = 12 + 4 * GLOBAL_RANGES;
const GLOBAL_DESCRIPTION_POS: usize = GLOBAL_SEQUENCE_POS + 4;
pub const DESCRIPTION_LEN: usize = 128;
pub const GLOBAL_LEN: usize = GLOBAL_DESCRIPTION_POS + DESCRIPTION_LEN;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table
{
	Global,
	PcieSrio,
	Voltage,
	Clocks,
	SystemMemory,
	ClassifierMemory,
	MemoryRetention,
}

impl Table
{
	pub const ALL: [Table; 7] = [
		Table::Global, Table::PcieSrio, Table::Voltage, Table::Clocks,
		Table::SystemMemory, Table::ClassifierMemory, Table::MemoryRetention,
	];

	pub fn name(self) -> &'static str
	{
		match self
		{
			Self::Global => "global",
			Self::PcieSrio => "pciesrio",
			Self::Voltage => "voltage",
			Self::Clocks => "clocks",
			Self::SystemMemory => "systemMemory",
			Self::ClassifierMemory => "classifierMemory",
			Self::MemoryRetention => "systemMemoryRetention",
		}
	}

	fn index(self) -> usize
	{
		self as usize
	}
}

// `offset` is in bytes from the start of the block, `size` in 32-bit words
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TableRef
{
	pub offset: u32,
	pub size: u32,
}

impl TableRef
{
	fn span(&self) -> Option<(usize, usize)>
	{
		let start = self.offset as usize;
		let len = (self.size as usize).checked_mul(4)?;
		Some((start, start.checked_add(len)?))
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ParamHeader
{
	pub size: u32,
	pub checksum: u32,
	pub version: u32,
	pub chip_type: u32,
	pub tables: [TableRef; 7],
}

impl ParamHeader
{
	pub fn table(&self, table: Table) -> TableRef
	{
		self.tables[table.index()]
	}

	fn read(src: &[u8]) -> Self
	{
		let mut tables = [TableRef::default(); 7];
		for (i, t) in tables.iter_mut().enumerate()
		{
			let pos = TABLES_POS + 8 * i;
			*t = TableRef{offset: be_word(src, pos), size: be_word(src, pos + 4)};
		}
		Self{
			size: be_word(src, 4),
			checksum: be_word(src, CHECKSUM_POS),
			version: be_word(src, 12),
			chip_type: be_word(src, 16),
			tables,
		}
	}
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct GlobalTable
{
	pub version: u32,
	pub flags: u32,
	pub baud_rate: u32,
	pub memory_ranges: [u32; GLOBAL_RANGES],
	pub sequence: u32,
	pub description: String,
}

impl GlobalTable
{
	fn read(src: &[u8]) -> Self
	{
		let mut memory_ranges = [0u32; GLOBAL_RANGES];
		for (i, r) in memory_ranges.iter_mut().enumerate()
		{
			*r = be_word(src, 12 + 4 * i);
		}
		let desc_end = src.len().min(GLOBAL_LEN);
		Self{
			version: be_word(src, 0),
			flags: be_word(src, 4),
			baud_rate: be_word(src, 8),
			memory_ranges,
			sequence: be_word(src, GLOBAL_SEQUENCE_POS),
			description: c_string(&src[GLOBAL_DESCRIPTION_POS..desc_end]),
		}
	}

	fn write(&self, dst: &mut [u8])
	{
		put_be_word(dst, 0, self.version);
		put_be_word(dst, 4, self.flags);
		put_be_word(dst, 8, self.baud_rate);
		for (i, &r) in self.memory_ranges.iter().enumerate()
		{
			put_be_word(dst, 12 + 4 * i, r);
		}
		put_be_word(dst, GLOBAL_SEQUENCE_POS, self.sequence);
		let desc = &mut dst[GLOBAL_DESCRIPTION_POS..GLOBAL_LEN];
		desc.fill(0);
		let len = self.description.len().min(DESCRIPTION_LEN - 1);
		desc[..len].copy_from_slice(&self.description.as_bytes()[..len]);
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SubTable
{
	pub version: u32,
	pub words: Vec<u32>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParameterBlock
{
	header: ParamHeader,
	global: GlobalTable,
	// wire bytes [0, size), only touched again by `with_sequence`
	raw: Vec<u8>,
}

impl ParameterBlock
{
	pub fn decode(src: &[u8]) -> Result<Self, DecodeError>
	{
		if src.len() < HEADER_LEN
		{
			return Err(DecodeError::Underflow{need: HEADER_LEN, have: src.len()});
		}
		let magic = be_word(src, 0);
		if magic != MAGIC
		{
			return Err(DecodeError::BadMagic{expect: MAGIC, have: magic});
		}
		let header = ParamHeader::read(src);
		let size = header.size as usize;
		if size < HEADER_LEN || size > src.len()
		{
			return Err(DecodeError::Underflow{need: size.max(HEADER_LEN), have: src.len().min(size)});
		}
		let computed = crc32(&src[CHECKSUM_START..size]);
		if computed != header.checksum
		{
			return Err(DecodeError::BadChecksum{expect: header.checksum, have: computed});
		}
		let global_ref = header.table(Table::Global);
		let start = global_ref.offset as usize;
		if start % 4 != 0 || start.checked_add(GLOBAL_DESCRIPTION_POS).map_or(true, |end| end > size)
		{
			return Err(DecodeError::BadTable{table: Table::Global.name(), offset: global_ref.offset, size: global_ref.size});
		}
		let global = GlobalTable::read(&src[start..size]);
		Ok(Self{header, global, raw: src[..size].to_vec()})
	}

	pub fn header(&self) -> &ParamHeader
	{
		&self.header
	}

	pub fn global(&self) -> &GlobalTable
	{
		&self.global
	}

	pub fn sequence(&self) -> u32
	{
		self.global.sequence
	}

	pub fn as_bytes(&self) -> &[u8]
	{
		&self.raw
	}

	// the first word of every table is its version tag
	pub fn table(&self, table: Table) -> Result<SubTable, DecodeError>
	{
		let tref = self.header.table(table);
		let bad = DecodeError::BadTable{table: table.name(), offset: tref.offset, size: tref.size};
		let (start, end) = tref.span().ok_or(bad)?;
		if tref.size == 0 || start % 4 != 0 || end > self.raw.len()
		{
			return Err(bad);
		}
		let version = be_word(&self.raw, start);
		let words = (start + 4..end).step_by(4).map(|pos| be_word(&self.raw, pos)).collect();
		Ok(SubTable{version, words})
	}

	// wire image with `sequence` stamped into the global table and the checksum regenerated
	pub fn with_sequence(&self, sequence: u32) -> Vec<u8>
	{
		let mut dst = self.raw.clone();
		let pos = self.header.table(Table::Global).offset as usize + GLOBAL_SEQUENCE_POS;
		put_be_word(&mut dst, pos, sequence);
		let checksum = crc32(&dst[CHECKSUM_START..]);
		put_be_word(&mut dst, CHECKSUM_POS, checksum);
		dst
	}
}

// lays out header, global table, then `tables` in order; tables left out get an empty reference
pub fn encode(version: u32, chip_type: u32, global: &GlobalTable, tables: &[(Table, u32, &[u32])]) -> Vec<u8>
{
	let mut refs = [TableRef::default(); 7];
	let mut dst = vec![0u8; HEADER_LEN + GLOBAL_LEN];
	refs[Table::Global.index()] = TableRef{offset: HEADER_LEN as u32, size: (GLOBAL_LEN / 4) as u32};
	global.write(&mut dst[HEADER_LEN..]);
	for &(table, version, words) in tables
	{
		if table == Table::Global {continue;}
		let offset = dst.len();
		refs[table.index()] = TableRef{offset: offset as u32, size: words.len() as u32 + 1};
		dst.extend_from_slice(&version.to_be_bytes());
		for w in words
		{
			dst.extend_from_slice(&w.to_be_bytes());
		}
	}
	let size = dst.len() as u32;
	put_be_word(&mut dst, 0, MAGIC);
	put_be_word(&mut dst, 4, size);
	put_be_word(&mut dst, 12, version);
	put_be_word(&mut dst, 16, chip_type);
	for (i, r) in refs.iter().enumerate()
	{
		put_be_word(&mut dst, TABLES_POS + 8 * i, r.offset);
		put_be_word(&mut dst, TABLES_POS + 8 * i + 4, r.size);
	}
	let checksum = crc32(&dst[CHECKSUM_START..]);
	put_be_word(&mut dst, CHECKSUM_POS, checksum);
	dst
}
