use core::fmt;
use std::error::Error;

use serde::{Deserialize, Serialize};


#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Bank
{
	A,
	B,
}

impl Bank
{
	pub const BOTH: [Bank; 2] = [Bank::A, Bank::B];

	pub fn other(self) -> Self
	{
		match self
		{
			Self::A => Self::B,
			Self::B => Self::A,
		}
	}

	pub fn letter(self) -> char
	{
		match self
		{
			Self::A => 'a',
			Self::B => 'b',
		}
	}
}

impl fmt::Display for Bank
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.write_str(match self {Self::A => "A", Self::B => "B"})
	}
}

// a value compared between banks, with a designated top value that wraps to zero
pub trait Freshness: Copy + Ord
{
	const MAX: Self;
	const ZERO: Self;

	fn next(self) -> Self;
}

impl Freshness for u32
{
	const MAX: Self = u32::MAX;
	const ZERO: Self = 0;

	fn next(self) -> Self
	{
		if self == Self::MAX {Self::ZERO} else {self + 1}
	}
}

/// Picks the authoritative bank from the freshness keys of the valid candidates (`None` marks an
/// invalid one). A wins every tie; B also wins when A sits at `MAX` and B has wrapped to zero.
/// `watchdog` flips the final answer so a failed boot falls back to the other bank.
pub fn select<K: Freshness>(a: Option<K>, b: Option<K>, watchdog: bool) -> Result<Bank, NoValidBank>
{
	let bank = match (a, b)
	{
		(None, None) => return Err(NoValidBank),
		(Some(..), None) => Bank::A,
		(None, Some(..)) => Bank::B,
		(Some(a), Some(b)) =>
		{
			if a == K::MAX && b == K::ZERO {Bank::B}
			else if b > a {Bank::B}
			else {Bank::A}
		},
	};
	Ok(if watchdog {bank.other()} else {bank})
}

// the environment only distinguishes active (nonzero) from obsolete (zero) flags
pub fn select_environment(a: Option<u32>, b: Option<u32>) -> Result<Bank, NoValidBank>
{
	match (a, b)
	{
		(None, None) => Err(NoValidBank),
		(Some(..), None) => Ok(Bank::A),
		(None, Some(..)) => Ok(Bank::B),
		(Some(a), Some(b)) =>
		{
			if a == b {Ok(Bank::A)}
			else if b == 0 {Ok(Bank::A)}
			else if a == 0 {Ok(Bank::B)}
			// two different active markers, neither can be trusted over the other
			else {Err(NoValidBank)}
		},
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NoValidBank;

impl fmt::Display for NoValidBank
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.write_str("no valid bank")
	}
}

impl Error for NoValidBank {}
