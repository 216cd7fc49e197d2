use core::fmt;
use std::path::Path;

use serde::Serialize;

use crate::env::EnvError;
use crate::envelope::env::{used_len, EnvironmentEnvelope};
use crate::envelope::image::{find_version, BootImage, ImageHeader};
use crate::envelope::param::{GlobalTable, ParameterBlock, Table};
use crate::envelope::{DecodeError, WordOrder};
use crate::flash::Partitions;
use crate::layout::Family;
use crate::update::{store, UpdateError};

/// What a partition holds, and with it how its contents are checked, shown, written and removed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind
{
	// version banners are looked up with these prefixes
	BootImage{version_keys: &'static [&'static str]},
	ParameterBlock,
	Environment(WordOrder),
}

impl Kind
{
	pub fn spl(family: Family) -> Self
	{
		Self::BootImage{version_keys: family.spl_keys()}
	}

	pub fn uboot(family: Family) -> Self
	{
		Self::BootImage{version_keys: family.uboot_keys()}
	}

	pub fn validate_input(&self, input: &[u8]) -> Result<(), DecodeError>
	{
		match self
		{
			Self::BootImage{..} => BootImage::decode(input).map(drop),
			Self::ParameterBlock => ParameterBlock::decode(input).map(drop),
			Self::Environment(order) => EnvironmentEnvelope::decode(input, *order).map(drop),
		}
	}

	pub fn describe(&self, raw: &[u8]) -> Result<Description, DecodeError>
	{
		match self
		{
			Self::BootImage{version_keys} => Ok(match BootImage::decode(raw)?
			{
				BootImage::Legacy{header, header_valid, ..} =>
				{
					let versions = version_keys.iter().filter_map(|key| find_version(raw, key)).collect();
					Description::BootImage(ImageDescription::new(&header, header_valid, versions))
				},
				BootImage::Secure{size, ..} => Description::Secure{size},
			}),
			Self::ParameterBlock =>
			{
				let block = ParameterBlock::decode(raw)?;
				Ok(Description::ParameterBlock(ParamDescription::new(&block)))
			},
			Self::Environment(order) =>
			{
				let env = EnvironmentEnvelope::decode(raw, *order)?;
				Ok(Description::Environment{
					flags: env.flags,
					used: used_len(&env.payload),
					capacity: env.capacity(),
					entries: env.entries().map(|e| e.to_str().into_owned()).collect(),
				})
			},
		}
	}

	// an environment has to fill its partition exactly, or its checksum would not cover the tail
	pub fn write<F: Partitions + ?Sized>(&self, flash: &mut F, path: &Path, input: &[u8]) -> Result<(), UpdateError>
	{
		self.validate_input(input).map_err(UpdateError::Input)?;
		if let Self::Environment(..) = self
		{
			let size = flash.info(path).map_err(UpdateError::Io)?.size;
			if input.len() != size
			{
				return Err(EnvError::SizeMismatch{a: input.len(), b: size}.into());
			}
		}
		store(flash, path, input)
	}

	pub fn delete<F: Partitions + ?Sized>(&self, flash: &mut F, path: &Path) -> Result<(), UpdateError>
	{
		flash.erase(path).map_err(UpdateError::WriteFailed)
	}
}

impl fmt::Display for Kind
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.write_str(match self
		{
			Self::BootImage{..} => "boot image",
			Self::ParameterBlock => "parameter block",
			Self::Environment(..) => "environment",
		})
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Description
{
	BootImage(ImageDescription),
	Secure{size: u32},
	ParameterBlock(ParamDescription),
	Environment{flags: u32, used: usize, capacity: usize, entries: Vec<String>},
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ImageDescription
{
	pub name: String,
	pub header_crc: u32,
	pub header_valid: bool,
	pub data_crc: u32,
	pub time: u32,
	pub size: u32,
	pub load: u32,
	pub entry: u32,
	pub os: String,
	pub arch: String,
	pub image_type: String,
	pub compression: String,
	pub versions: Vec<String>,
}

// known tags by name, unknown ones by number
fn tag<T: fmt::Debug, E: fmt::Display>(value: Result<T, E>) -> String
{
	match value
	{
		Ok(v) => format!("{v:?}"),
		Err(e) => e.to_string(),
	}
}

impl ImageDescription
{
	fn new(header: &ImageHeader, header_valid: bool, versions: Vec<String>) -> Self
	{
		Self{
			name: header.name(),
			header_crc: header.header_crc,
			header_valid,
			data_crc: header.data_crc,
			time: header.time,
			size: header.size,
			load: header.load,
			entry: header.entry,
			os: tag(header.os()),
			arch: tag(header.arch()),
			image_type: tag(header.image_type()),
			compression: tag(header.compression()),
			versions,
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TableDescription
{
	pub table: Table,
	pub offset: u32,
	pub size: u32,
	// the leading version word, if the table is present and in bounds
	pub version: Option<u32>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ParamDescription
{
	pub size: u32,
	pub checksum: u32,
	pub version: u32,
	pub chip_type: u32,
	pub global: GlobalTable,
	pub tables: Vec<TableDescription>,
}

impl ParamDescription
{
	fn new(block: &ParameterBlock) -> Self
	{
		let header = block.header();
		let tables = Table::ALL.into_iter().map(|table|
		{
			let tref = header.table(table);
			TableDescription{table, offset: tref.offset, size: tref.size, version: block.table(table).ok().map(|t| t.version)}
		}).collect();
		Self{
			size: header.size,
			checksum: header.checksum,
			version: header.version,
			chip_type: header.chip_type,
			global: block.global().clone(),
			tables,
		}
	}
}

#[cfg(test)]
mod test
{
	use super::*;
	use crate::envelope::env::HEADER_LEN;
	use crate::envelope::image::{self, Os};
	use crate::envelope::param;
	use crate::flash::mem::MemFlash;

	fn sample_image() -> Vec<u8>
	{
		let mut header = ImageHeader::new("U-Boot SPL");
		header.os = Os::UBoot.into();
		header.arch = 99;
		image::encode(&header, b"..u-boot_2020.10-axxia..\0..atf_v2.3\0").unwrap()
	}

	#[test]
	fn describe_image()
	{
		let kind = Kind::spl(Family::Xlf);
		let Description::BootImage(desc) = kind.describe(&sample_image()).unwrap()
		else
		{
			panic!("expected an image");
		};
		assert_eq!(desc.name, "U-Boot SPL");
		assert!(desc.header_valid);
		assert_eq!(desc.os, "UBoot");
		assert_eq!(desc.arch, image::UnknownArch(99).to_string());
		assert_eq!(desc.versions, ["u-boot_2020.10-axxia..", "atf_v2.3"]);
		// the 55xx banner prefix is not there
		let Ok(Description::BootImage(desc)) = Kind::uboot(Family::Axxia55xx).describe(&sample_image())
		else
		{
			panic!("expected an image");
		};
		assert!(desc.versions.is_empty());
	}

	#[test]
	fn describe_secure()
	{
		let mut raw = image::SECURE_MAGIC.to_be_bytes().to_vec();
		raw.extend_from_slice(&64u32.to_be_bytes());
		assert_eq!(Kind::uboot(Family::Axxia56xx).describe(&raw).unwrap(), Description::Secure{size: 64});
	}

	#[test]
	fn describe_params()
	{
		let global = GlobalTable{sequence: 12, description: "board rev b".to_string(), ..GlobalTable::default()};
		let raw = param::encode(4, 2, &global, &[(Table::Clocks, 7, &[1, 2, 3][..])]);
		let Description::ParameterBlock(desc) = Kind::ParameterBlock.describe(&raw).unwrap()
		else
		{
			panic!("expected parameters");
		};
		assert_eq!(desc.version, 4);
		assert_eq!(desc.chip_type, 2);
		assert_eq!(desc.global.sequence, 12);
		assert_eq!(desc.tables.len(), 7);
		let clocks = desc.tables.iter().find(|t| t.table == Table::Clocks).unwrap();
		assert_eq!((clocks.size, clocks.version), (4, Some(7)));
		let voltage = desc.tables.iter().find(|t| t.table == Table::Voltage).unwrap();
		assert_eq!(voltage.version, None);
		let json = serde_json::to_value(Description::ParameterBlock(desc)).unwrap();
		assert_eq!(json["kind"], "parameter_block");
		assert_eq!(json["global"]["description"], "board rev b");
	}

	#[test]
	fn describe_environment()
	{
		let mut env = EnvironmentEnvelope::empty(32);
		env.payload[..8].copy_from_slice(b"a=1\0b=2\0");
		env.seal();
		let raw = env.encode(WordOrder::Little);
		let desc = Kind::Environment(WordOrder::Little).describe(&raw).unwrap();
		assert_eq!(desc, Description::Environment{flags: 1, used: 8, capacity: 32, entries: vec!["a=1".to_string(), "b=2".to_string()]});
		assert!(Kind::Environment(WordOrder::Big).describe(&raw).is_err());
	}

	#[test]
	fn validate()
	{
		assert!(Kind::ParameterBlock.validate_input(&sample_image()).is_err());
		assert!(Kind::uboot(Family::Xlf).validate_input(&sample_image()).is_ok());
		assert_eq!(Kind::ParameterBlock.validate_input(&[0; 8]), Err(DecodeError::Underflow{need: param::HEADER_LEN, have: 8}));
	}

	#[test]
	fn write_and_delete()
	{
		let mut flash = MemFlash::new().with("/dev/mtd0", 256).with("/dev/mtd4", 40);
		let path = Path::new("/dev/mtd0");
		let kind = Kind::spl(Family::Axxia55xx);
		kind.write(&mut flash, path, &sample_image()).unwrap();
		assert!(kind.describe(flash.contents(path).unwrap()).is_ok());
		assert!(matches!(kind.write(&mut flash, path, b"not an image"), Err(UpdateError::Input(..))));
		kind.delete(&mut flash, path).unwrap();
		assert!(kind.describe(flash.contents(path).unwrap()).is_err());

		let env = Kind::Environment(WordOrder::Big);
		let path = Path::new("/dev/mtd4");
		let short = EnvironmentEnvelope::empty(16).encode(WordOrder::Big);
		assert!(matches!(env.write(&mut flash, path, &short), Err(UpdateError::Environment(EnvError::SizeMismatch{a: 24, b: 40}))));
		let exact = EnvironmentEnvelope::empty(40 - HEADER_LEN).encode(WordOrder::Big);
		env.write(&mut flash, path, &exact).unwrap();
		assert_eq!(flash.contents(path).unwrap(), &exact[..]);
		assert_eq!(Kind::ParameterBlock.to_string(), "parameter block");
	}
}
