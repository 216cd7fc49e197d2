use core::fmt;
use core::str::FromStr;
use std::error::Error;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::envelope::WordOrder;
use crate::select::Bank;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Family
{
	#[serde(rename = "55xx")]
	Axxia55xx,
	#[serde(rename = "56xx")]
	Axxia56xx,
	#[serde(rename = "xlf")]
	Xlf,
}

impl Family
{
	pub const ALL: [Family; 3] = [Family::Axxia55xx, Family::Axxia56xx, Family::Xlf];

	pub const UBOOT_KEY: &'static str = "u-boot_";
	pub const UBOOT_KEY_55XX: &'static str = "lsi_axxia_u-boot_";
	pub const SPL_KEY: &'static str = "u-boot_";
	pub const SPL_KEY_55XX: &'static str = "lsi_";
	pub const ATF_KEY: &'static str = "atf_";

	pub fn name(self) -> &'static str
	{
		match self
		{
			Self::Axxia55xx => "55xx",
			Self::Axxia56xx => "56xx",
			Self::Xlf => "xlf",
		}
	}

	pub fn partitions(self) -> PartitionTable
	{
		fn mtd(n: u8) -> PathBuf
		{
			PathBuf::from(format!("/dev/mtd{n}"))
		}

		match self
		{
			// a single SPL partition, everything else moves down by one
			Self::Axxia55xx => PartitionTable{
				spl_a: mtd(0),
				spl_b: None,
				param_a: mtd(1),
				param_b: mtd(2),
				env_a: mtd(3),
				env_b: mtd(4),
				uboot_a: mtd(5),
				uboot_b: mtd(6),
			},
			Self::Axxia56xx | Self::Xlf => PartitionTable{
				spl_a: mtd(0),
				spl_b: Some(mtd(1)),
				param_a: mtd(2),
				param_b: mtd(3),
				env_a: mtd(4),
				env_b: mtd(5),
				uboot_a: mtd(6),
				uboot_b: mtd(7),
			},
		}
	}

	/// Byte order of the environment's checksum and flags words. U-Boot writes them in CPU order:
	/// the 55xx is a big-endian PowerPC, the 56xx and XLF are little-endian ARM.
	pub fn env_word_order(self) -> WordOrder
	{
		match self
		{
			Self::Axxia55xx => WordOrder::Big,
			Self::Axxia56xx | Self::Xlf => WordOrder::Little,
		}
	}

	// version banner prefixes searched for in the primary image
	pub fn uboot_keys(self) -> &'static [&'static str]
	{
		match self
		{
			Self::Axxia55xx => &[Self::UBOOT_KEY_55XX],
			Self::Axxia56xx | Self::Xlf => &[Self::UBOOT_KEY],
		}
	}

	// the 56xx/XLF loader also carries the ATF banner
	pub fn spl_keys(self) -> &'static [&'static str]
	{
		match self
		{
			Self::Axxia55xx => &[Self::SPL_KEY_55XX],
			Self::Axxia56xx | Self::Xlf => &[Self::SPL_KEY, Self::ATF_KEY],
		}
	}
}

impl fmt::Display for Family
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.write_str(self.name())
	}
}

impl FromStr for Family
{
	type Err = UnknownFamily;

	fn from_str(s: &str) -> Result<Self, Self::Err>
	{
		Self::ALL.into_iter().find(|f| f.name().eq_ignore_ascii_case(s)).ok_or_else(|| UnknownFamily(s.to_string()))
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownFamily(pub String);

impl fmt::Display for UnknownFamily
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		write!(f, "unknown hardware family {:?}", self.0)
	}
}

impl Error for UnknownFamily {}

// what a pair of partitions holds
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Area
{
	Spl,
	Param,
	Env,
	Uboot,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Role
{
	SplA,
	SplB,
	ParamA,
	ParamB,
	EnvA,
	EnvB,
	UbootA,
	UbootB,
}

impl Role
{
	pub const ALL: [Role; 8] = [Role::SplA, Role::SplB, Role::ParamA, Role::ParamB, Role::EnvA, Role::EnvB, Role::UbootA, Role::UbootB];

	pub fn new(area: Area, bank: Bank) -> Self
	{
		match (area, bank)
		{
			(Area::Spl, Bank::A) => Self::SplA,
			(Area::Spl, Bank::B) => Self::SplB,
			(Area::Param, Bank::A) => Self::ParamA,
			(Area::Param, Bank::B) => Self::ParamB,
			(Area::Env, Bank::A) => Self::EnvA,
			(Area::Env, Bank::B) => Self::EnvB,
			(Area::Uboot, Bank::A) => Self::UbootA,
			(Area::Uboot, Bank::B) => Self::UbootB,
		}
	}

	pub fn area(self) -> Area
	{
		match self
		{
			Self::SplA | Self::SplB => Area::Spl,
			Self::ParamA | Self::ParamB => Area::Param,
			Self::EnvA | Self::EnvB => Area::Env,
			Self::UbootA | Self::UbootB => Area::Uboot,
		}
	}

	pub fn bank(self) -> Bank
	{
		match self
		{
			Self::SplA | Self::ParamA | Self::EnvA | Self::UbootA => Bank::A,
			Self::SplB | Self::ParamB | Self::EnvB | Self::UbootB => Bank::B,
		}
	}
}

/// Partition paths for every role on one board. Only the boot loader may lack a second bank.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PartitionTable
{
	pub spl_a: PathBuf,
	#[serde(default)]
	pub spl_b: Option<PathBuf>,
	pub param_a: PathBuf,
	pub param_b: PathBuf,
	pub env_a: PathBuf,
	pub env_b: PathBuf,
	pub uboot_a: PathBuf,
	pub uboot_b: PathBuf,
}

impl PartitionTable
{
	pub fn from_json(src: &str) -> Result<Self, LayoutError>
	{
		let table: Self = serde_json::from_str(src).map_err(LayoutError::Parse)?;
		table.validate()?;
		Ok(table)
	}

	pub fn to_json(&self) -> Result<String, LayoutError>
	{
		serde_json::to_string_pretty(self).map_err(LayoutError::Parse)
	}

	// no partition may serve two roles
	pub fn validate(&self) -> Result<(), LayoutError>
	{
		let paths: Vec<(Role, &Path)> = Role::ALL.into_iter().filter_map(|r| Some((r, self.get(r)?))).collect();
		for (i, &(first, path)) in paths.iter().enumerate()
		{
			if let Some(&(second, _)) = paths[i + 1..].iter().find(|(_, p)| *p == path)
			{
				return Err(LayoutError::Shared{path: path.to_path_buf(), first, second});
			}
		}
		Ok(())
	}

	pub fn get(&self, role: Role) -> Option<&Path>
	{
		Some(match role
		{
			Role::SplA => &self.spl_a,
			Role::SplB => self.spl_b.as_ref()?,
			Role::ParamA => &self.param_a,
			Role::ParamB => &self.param_b,
			Role::EnvA => &self.env_a,
			Role::EnvB => &self.env_b,
			Role::UbootA => &self.uboot_a,
			Role::UbootB => &self.uboot_b,
		}.as_path())
	}

	pub fn path(&self, area: Area, bank: Bank) -> Option<&Path>
	{
		self.get(Role::new(area, bank))
	}

	// both banks, if the area has two
	pub fn pair(&self, area: Area) -> Option<[&Path; 2]>
	{
		Some([self.path(area, Bank::A)?, self.path(area, Bank::B)?])
	}
}

#[derive(Debug)]
pub enum LayoutError
{
	Parse(serde_json::Error),
	Shared{path: PathBuf, first: Role, second: Role},
}

impl fmt::Display for LayoutError
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		match self
		{
			Self::Parse(..) => f.write_str("could not parse partition table"),
			Self::Shared{path, first, second} => write!(f, "{} is used as both {first:?} and {second:?}", path.display()),
		}
	}
}

impl Error for LayoutError
{
	fn source(&self) -> Option<&(dyn Error + 'static)>
	{
		match self
		{
			Self::Parse(e) => Some(e),
			Self::Shared{..} => None,
		}
	}
}
