use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::env::Environment;
use crate::envelope::image::BootImage;
use crate::flash::Partitions;
use crate::select::{select, Bank, Freshness};
use crate::update::{parse_sequence, pick, store, BankInfo, Outcome, Report, UpdateError};

/// A pair of image banks whose sequence numbers live in the environment, under
/// `<name>_a_sequence` and `<name>_b_sequence`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageBanks
{
	name: String,
	paths: [PathBuf; 2],
}

impl ImageBanks
{
	pub fn new(name: impl Into<String>, a: impl Into<PathBuf>, b: impl Into<PathBuf>) -> Self
	{
		Self{name: name.into(), paths: [a.into(), b.into()]}
	}

	pub fn name(&self) -> &str
	{
		&self.name
	}

	pub fn path(&self, bank: Bank) -> &Path
	{
		pick(&self.paths, bank)
	}

	pub fn sequence_key(&self, bank: Bank) -> String
	{
		format!("{}_{}_sequence", self.name, bank.letter())
	}

	// a missing entry counts as zero
	pub fn sequence(&self, env: &Environment, bank: Bank) -> u32
	{
		let key = self.sequence_key(bank);
		match env.get(&key)
		{
			Some(value) => parse_sequence(&value),
			None =>
			{
				warn!("{key} is not set, assuming 0");
				0
			},
		}
	}

	// `Some(description)` for a valid image; secure images are taken as valid without checking
	fn probe<F: Partitions + ?Sized>(&self, flash: &F, bank: Bank) -> Result<Option<String>, UpdateError>
	{
		let path = self.path(bank);
		let raw = flash.read_all(path).map_err(UpdateError::Io)?;
		match BootImage::decode(&raw)
		{
			Ok(BootImage::Legacy{header, ..}) => Ok(Some(header.name())),
			Ok(BootImage::Secure{..}) => Ok(Some("Encrypted".to_string())),
			Err(e) =>
			{
				warn!("{} image {bank} ({}) is not valid: {e}", self.name, path.display());
				Ok(None)
			},
		}
	}

	pub fn select<F: Partitions + ?Sized>(&self, flash: &F, env: &Environment, watchdog: bool) -> Result<Bank, UpdateError>
	{
		let report = self.info(flash, env, watchdog)?;
		let bank = report.selected.ok_or(UpdateError::NoValidBank)?;
		debug!("selected {} image {bank}", self.name);
		Ok(bank)
	}

	pub fn info<F: Partitions + ?Sized>(&self, flash: &F, env: &Environment, watchdog: bool) -> Result<Report, UpdateError>
	{
		let mut banks = [None, None];
		for (slot, bank) in banks.iter_mut().zip(Bank::BOTH)
		{
			let description = self.probe(flash, bank)?;
			let sequence = self.sequence(env, bank);
			*slot = description.map(|description| BankInfo{sequence, description});
		}
		let key = |info: &Option<BankInfo>| info.as_ref().map(|i| i.sequence);
		let selected = select(key(&banks[0]), key(&banks[1]), watchdog).ok();
		let [a, b] = banks;
		Ok(Report{a, b, selected})
	}

	/// Validates `input` and writes it to `bank`. The environment is left alone.
	pub fn write<F: Partitions + ?Sized>(&self, flash: &mut F, bank: Bank, input: &[u8]) -> Result<(), UpdateError>
	{
		BootImage::decode(input).map_err(UpdateError::Input)?;
		let path = self.path(bank);
		store(flash, path, input)?;
		info!("wrote {} image {bank} ({}, {} bytes)", self.name, path.display(), input.len());
		Ok(())
	}

	/// Writes `input` to the standby bank, then records its new sequence in the environment and
	/// commits that. The sequence is only stored once the image is in place.
	pub fn update<F: Partitions + ?Sized>(&self, flash: &mut F, env: &mut Environment, input: &[u8]) -> Result<Outcome, UpdateError>
	{
		BootImage::decode(input).map_err(UpdateError::Input)?;
		let active = self.select(&*flash, env, false)?;
		let active_key = self.sequence_key(active);
		if env.get(&active_key).is_none()
		{
			env.add(&active_key, "0")?;
		}
		let sequence = self.sequence(env, active).next();
		let standby = active.other();
		self.write(flash, standby, input)?;
		env.set(&self.sequence_key(standby), &sequence.to_string())?;
		env.commit(flash)?;
		Ok(Outcome{bank: standby, sequence})
	}
}
