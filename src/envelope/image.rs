use serde::Serialize;

use crate::crc::crc32;
use crate::envelope::{be_word, c_string, put_be_word, DecodeError};
use crate::macros::numeric_enum;

pub const MAGIC: u32 = 0x27051956;
// signed images; the payload is opaque to us
pub const SECURE_MAGIC: u32 = 0x53424211;
pub const HEADER_LEN: usize = 64;
pub const NAME_LEN: usize = 32;
const HCRC_POS: usize = 0x04;
const NAME_POS: usize = 0x20;
const VERSION_MAX: usize = 256;

numeric_enum!
{
	pub enum Os: u8 => UnknownOs
	{
		Invalid = 0, OpenBsd = 1, NetBsd = 2, FreeBsd = 3, Linux = 5, VxWorks = 14, Qnx = 16, UBoot = 17, Rtems = 18,
		Integrity = 21, ArmTrustedFirmware = 25, Tee = 26, OpenSbi = 27, Efi = 28,
	}
}

numeric_enum!
{
	pub enum Arch: u8 => UnknownArch
	{
		Invalid = 0, Alpha = 1, Arm = 2, I386 = 3, Ia64 = 4, Mips = 5, Mips64 = 6, Ppc = 7, S390 = 8, Sh = 9, Sparc = 10,
		Sparc64 = 11, M68k = 12, MicroBlaze = 14, Nios2 = 15, Blackfin = 16, Avr32 = 17, Sandbox = 19, Nds32 = 20,
		OpenRisc = 21, Arm64 = 22, Arc = 23, Amd64 = 24, Xtensa = 25, RiscV = 26,
	}
}

numeric_enum!
{
	pub enum ImageType: u8 => UnknownImageType
	{
		Invalid = 0, Standalone = 1, Kernel = 2, Ramdisk = 3, Multi = 4, Firmware = 5, Script = 6, Filesystem = 7,
		FlatDt = 8, KernelNoLoad = 14, Loadable = 22,
	}
}

numeric_enum!
{
	pub enum Compression: u8 => UnknownCompression
	{
		None = 0, Gzip = 1, Bzip2 = 2, Lzma = 3, Lzo = 4, Lz4 = 5, Zstd = 6,
	}
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ImageHeader
{
	pub header_crc: u32,
	pub time: u32,
	pub size: u32,
	pub load: u32,
	pub entry: u32,
	pub data_crc: u32,
	pub os: u8,
	pub arch: u8,
	pub image_type: u8,
	pub comp: u8,
	pub name: [u8; NAME_LEN],
}

impl ImageHeader
{
	pub fn new(name: &str) -> Self
	{
		let mut header = Self::default();
		header.set_name(name);
		header
	}

	// truncates so the name always keeps its terminating NUL
	pub fn set_name(&mut self, name: &str)
	{
		let len = name.len().min(NAME_LEN - 1);
		self.name = [0u8; NAME_LEN];
		self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
	}

	pub fn name(&self) -> String
	{
		c_string(&self.name)
	}

	pub fn os(&self) -> Result<Os, UnknownOs>
	{
		Os::try_from(self.os)
	}

	pub fn arch(&self) -> Result<Arch, UnknownArch>
	{
		Arch::try_from(self.arch)
	}

	pub fn image_type(&self) -> Result<ImageType, UnknownImageType>
	{
		ImageType::try_from(self.image_type)
	}

	pub fn compression(&self) -> Result<Compression, UnknownCompression>
	{
		Compression::try_from(self.comp)
	}

	fn read(src: &[u8]) -> Self
	{
		let mut name = [0u8; NAME_LEN];
		name.copy_from_slice(&src[NAME_POS..HEADER_LEN]);
		Self{
			header_crc: be_word(src, 0x04),
			time: be_word(src, 0x08),
			size: be_word(src, 0x0C),
			load: be_word(src, 0x10),
			entry: be_word(src, 0x14),
			data_crc: be_word(src, 0x18),
			os: src[0x1C],
			arch: src[0x1D],
			image_type: src[0x1E],
			comp: src[0x1F],
			name,
		}
	}

	fn write(&self, dst: &mut [u8])
	{
		put_be_word(dst, 0x00, MAGIC);
		put_be_word(dst, 0x04, self.header_crc);
		put_be_word(dst, 0x08, self.time);
		put_be_word(dst, 0x0C, self.size);
		put_be_word(dst, 0x10, self.load);
		put_be_word(dst, 0x14, self.entry);
		put_be_word(dst, 0x18, self.data_crc);
		dst[0x1C] = self.os;
		dst[0x1D] = self.arch;
		dst[0x1E] = self.image_type;
		dst[0x1F] = self.comp;
		dst[NAME_POS..HEADER_LEN].copy_from_slice(&self.name);
	}
}

fn header_crc(header: &[u8]) -> u32
{
	let mut temp = [0u8; HEADER_LEN];
	temp.copy_from_slice(&header[..HEADER_LEN]);
	temp[HCRC_POS..HCRC_POS + 4].fill(0);
	crc32(&temp)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BootImage<'l>
{
	Legacy{header: ImageHeader, header_valid: bool, payload: &'l [u8]},
	Secure{size: u32, raw: &'l [u8]},
}

impl<'l> BootImage<'l>
{
	// `src` may be a whole partition, anything after the payload is ignored
	pub fn decode(src: &'l [u8]) -> Result<Self, DecodeError>
	{
		if src.len() < 4
		{
			return Err(DecodeError::Underflow{need: 4, have: src.len()});
		}
		match be_word(src, 0)
		{
			SECURE_MAGIC =>
			{
				if src.len() < 8
				{
					return Err(DecodeError::Underflow{need: 8, have: src.len()});
				}
				Ok(Self::Secure{size: be_word(src, 4), raw: src})
			},
			MAGIC =>
			{
				if src.len() < HEADER_LEN
				{
					return Err(DecodeError::Underflow{need: HEADER_LEN, have: src.len()});
				}
				let header = ImageHeader::read(src);
				let avail = src.len() - HEADER_LEN;
				if header.size as usize > avail
				{
					return Err(DecodeError::Underflow{need: HEADER_LEN.saturating_add(header.size as usize), have: src.len()});
				}
				let payload = &src[HEADER_LEN..HEADER_LEN + header.size as usize];
				let computed = crc32(payload);
				if computed != header.data_crc
				{
					return Err(DecodeError::BadChecksum{expect: header.data_crc, have: computed});
				}
				let header_valid = header_crc(src) == header.header_crc;
				Ok(Self::Legacy{header, header_valid, payload})
			},
			have => Err(DecodeError::BadMagic{expect: MAGIC, have}),
		}
	}

	pub fn is_secure(&self) -> bool
	{
		matches!(self, Self::Secure{..})
	}

	pub fn header(&self) -> Option<&ImageHeader>
	{
		match self
		{
			Self::Legacy{header, ..} => Some(header),
			Self::Secure{..} => None,
		}
	}

	pub fn size(&self) -> u32
	{
		match self
		{
			Self::Legacy{header, ..} => header.size,
			Self::Secure{size, ..} => *size,
		}
	}
}

// fills in size and both checksums, the rest of `header` is kept as given
pub fn encode(header: &ImageHeader, payload: &[u8]) -> Result<Vec<u8>, EncodeError>
{
	let size = u32::try_from(payload.len()).map_err(|_| EncodeError::PayloadSize(payload.len()))?;
	let mut header = header.clone();
	header.size = size;
	header.data_crc = crc32(payload);
	header.header_crc = 0;
	let mut dst = vec![0u8; HEADER_LEN + payload.len()];
	header.write(&mut dst);
	let hcrc = header_crc(&dst);
	put_be_word(&mut dst, HCRC_POS, hcrc);
	dst[HEADER_LEN..].copy_from_slice(payload);
	Ok(dst)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncodeError
{
	PayloadSize(usize),
}

impl core::fmt::Display for EncodeError
{
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result
	{
		match self
		{
			Self::PayloadSize(len) => write!(f, "payload too large for image header ({len} bytes)"),
		}
	}
}

impl std::error::Error for EncodeError {}

// locates a NUL-terminated version banner such as "u-boot_2019.04-..." anywhere in `src`
pub fn find_version(src: &[u8], key: &str) -> Option<String>
{
	let key = key.as_bytes();
	if key.is_empty() || src.len() < key.len() {return None;}
	let start = src.windows(key.len()).position(|w| w == key)?;
	let rest = &src[start..];
	let end = rest.iter().take(VERSION_MAX).position(|&b| b == 0 || !(b.is_ascii_graphic() || b == b' '))
		.unwrap_or(rest.len().min(VERSION_MAX));
	Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}
