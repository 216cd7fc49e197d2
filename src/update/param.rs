use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::envelope::param::ParameterBlock;
use crate::flash::Partitions;
use crate::select::{select, Bank, Freshness};
use crate::update::{pick, store, BankInfo, Outcome, Report, UpdateError};

/// The loader parameter pair. Freshness is the sequence number kept in each block's global table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParamBanks
{
	paths: [PathBuf; 2],
}

impl ParamBanks
{
	pub fn new(a: impl Into<PathBuf>, b: impl Into<PathBuf>) -> Self
	{
		Self{paths: [a.into(), b.into()]}
	}

	pub fn path(&self, bank: Bank) -> &Path
	{
		pick(&self.paths, bank)
	}

	// `None` when the bank holds no valid block
	pub fn read<F: Partitions + ?Sized>(&self, flash: &F, bank: Bank) -> Result<Option<ParameterBlock>, UpdateError>
	{
		let path = self.path(bank);
		let raw = flash.read_all(path).map_err(UpdateError::Io)?;
		match ParameterBlock::decode(&raw)
		{
			Ok(block) => Ok(Some(block)),
			Err(e) =>
			{
				warn!("parameters {bank} ({}) are not valid: {e}", path.display());
				Ok(None)
			},
		}
	}

	fn read_both<F: Partitions + ?Sized>(&self, flash: &F) -> Result<[Option<ParameterBlock>; 2], UpdateError>
	{
		Ok([self.read(flash, Bank::A)?, self.read(flash, Bank::B)?])
	}

	pub fn select<F: Partitions + ?Sized>(&self, flash: &F, watchdog: bool) -> Result<Bank, UpdateError>
	{
		let [a, b] = self.read_both(flash)?;
		let bank = select(a.map(|p| p.sequence()), b.map(|p| p.sequence()), watchdog)?;
		debug!("selected parameters {bank}");
		Ok(bank)
	}

	pub fn info<F: Partitions + ?Sized>(&self, flash: &F, watchdog: bool) -> Result<Report, UpdateError>
	{
		let [a, b] = self.read_both(flash)?;
		let selected = select(a.as_ref().map(ParameterBlock::sequence), b.as_ref().map(ParameterBlock::sequence), watchdog).ok();
		let describe = |p: ParameterBlock| BankInfo{sequence: p.sequence(), description: p.global().description.clone()};
		Ok(Report{a: a.map(describe), b: b.map(describe), selected})
	}

	/// Validates `input`, stamps `sequence` into it and writes all of it to `bank`, whatever the
	/// other bank holds.
	pub fn write<F: Partitions + ?Sized>(&self, flash: &mut F, bank: Bank, sequence: u32, input: &[u8]) -> Result<(), UpdateError>
	{
		let block = ParameterBlock::decode(input).map_err(UpdateError::Input)?;
		// anything past the block goes out unchanged
		let mut data = block.with_sequence(sequence);
		data.extend_from_slice(&input[data.len()..]);
		let path = self.path(bank);
		store(flash, path, &data)?;
		info!("wrote parameters {bank} ({}), sequence {sequence}", path.display());
		Ok(())
	}

	/// Writes `input` to the standby bank with a sequence one past the active one, so it is
	/// selected from then on. The active bank is never written.
	pub fn update<F: Partitions + ?Sized>(&self, flash: &mut F, input: &[u8]) -> Result<Outcome, UpdateError>
	{
		ParameterBlock::decode(input).map_err(UpdateError::Input)?;
		let [a, b] = self.read_both(&*flash)?;
		let active = select(a.as_ref().map(ParameterBlock::sequence), b.as_ref().map(ParameterBlock::sequence), false)?;
		let current = match active {Bank::A => a, Bank::B => b}.ok_or(UpdateError::NoValidBank)?;
		let sequence = current.sequence().next();
		let standby = active.other();
		self.write(flash, standby, sequence, input)?;
		Ok(Outcome{bank: standby, sequence})
	}

	pub fn erase<F: Partitions + ?Sized>(&self, flash: &mut F, bank: Bank) -> Result<(), UpdateError>
	{
		let path = self.path(bank);
		flash.erase(path).map_err(UpdateError::WriteFailed)?;
		info!("erased parameters {bank} ({})", path.display());
		Ok(())
	}
}
