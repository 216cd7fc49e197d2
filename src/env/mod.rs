use core::fmt;
use std::borrow::Cow;
use std::error::Error;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

pub use crate::envelope::WordOrder;
use crate::envelope::env::{used_len, Entries, Entry, EnvironmentEnvelope, FLAGS_POS, FLAG_ACTIVE, FLAG_OBSOLETE, HEADER_LEN};
use crate::flash::{IoError, Partitions};
use crate::select::{select_environment, Bank};


/// An open environment: the decoded contents of the active partition plus the paths of both
/// partitions. Edits stay in memory until `commit` or `finalize` writes them to the other partition.
#[derive(Clone, Debug)]
pub struct Environment
{
	paths: [PathBuf; 2],
	order: WordOrder,
	active: Bank,
	envelope: EnvironmentEnvelope,
	dirty: bool,
}

impl Environment
{
	pub fn initialize<F: Partitions + ?Sized>(flash: &F, a: &Path, b: &Path, order: WordOrder) -> Result<Self, EnvError>
	{
		let size_a = flash.info(a).map_err(EnvError::Io)?.size;
		let size_b = flash.info(b).map_err(EnvError::Io)?.size;
		if size_a != size_b
		{
			return Err(EnvError::SizeMismatch{a: size_a, b: size_b});
		}
		let mut banks = [None, None];
		for (slot, path) in banks.iter_mut().zip([a, b])
		{
			let raw = flash.read(path, size_a).map_err(EnvError::Io)?;
			match EnvironmentEnvelope::decode(&raw, order)
			{
				Ok(envelope) => *slot = Some(envelope),
				Err(e) => warn!("environment in {} is not valid: {e}", path.display()),
			}
		}
		let flags = |env: &Option<EnvironmentEnvelope>| env.as_ref().map(|e| e.flags);
		let active = select_environment(flags(&banks[0]), flags(&banks[1])).map_err(|_| EnvError::NoValidEnvironment)?;
		let [env_a, env_b] = banks;
		let envelope = match active
		{
			Bank::A => env_a,
			Bank::B => env_b,
		}.ok_or(EnvError::NoValidEnvironment)?;
		debug!("using environment {active} ({} of {} bytes used)", used_len(&envelope.payload), envelope.capacity());
		Ok(Self{paths: [a.to_path_buf(), b.to_path_buf()], order, active, envelope, dirty: false})
	}

	pub fn active(&self) -> Bank
	{
		self.active
	}

	pub fn path(&self, bank: Bank) -> &Path
	{
		match bank
		{
			Bank::A => &self.paths[0],
			Bank::B => &self.paths[1],
		}
	}

	pub fn order(&self) -> WordOrder
	{
		self.order
	}

	pub fn is_dirty(&self) -> bool
	{
		self.dirty
	}

	pub fn capacity(&self) -> usize
	{
		self.envelope.capacity()
	}

	pub fn used(&self) -> usize
	{
		used_len(&self.envelope.payload)
	}

	pub fn entries(&self) -> Entries<'_>
	{
		self.envelope.entries()
	}

	// exact name match, the first one wins
	pub fn get(&self, name: &str) -> Option<Cow<'_, str>>
	{
		let value = self.entries().find(|e| e.name() == name.as_bytes())?.value()?;
		Some(String::from_utf8_lossy(value))
	}

	pub fn list<'l>(&'l self, prefix: &'l str) -> impl Iterator<Item = Entry<'l>> + Clone + 'l
	{
		self.entries().filter(move |e| e.name().starts_with(prefix.as_bytes()))
	}

	/// Appends `name=value` after the last entry, even if `name` is already present. Fails with
	/// `Overflow` and leaves the contents alone if the entry and terminator do not fit.
	pub fn add(&mut self, name: &str, value: &str) -> Result<(), EnvError>
	{
		check_entry(name, value)?;
		let used = self.used();
		let len = name.len() + 1 + value.len();
		let need = used + len + 2;
		if need > self.capacity()
		{
			return Err(EnvError::Overflow{need, have: self.capacity()});
		}
		let dst = &mut self.envelope.payload[used..need];
		dst[..name.len()].copy_from_slice(name.as_bytes());
		dst[name.len()] = b'=';
		dst[name.len() + 1..len].copy_from_slice(value.as_bytes());
		dst[len..].fill(0);
		self.dirty = true;
		Ok(())
	}

	// rebuilds the payload from every other well formed entry; returns whether `name` was present
	pub fn remove(&mut self, name: &str) -> bool
	{
		let (payload, found) = self.rebuild(|e| e.name() != name.as_bytes());
		if payload != self.envelope.payload
		{
			self.envelope.payload = payload;
			self.dirty = true;
		}
		found
	}

	// remove then add, undone entirely if the new entry does not fit
	pub fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError>
	{
		check_entry(name, value)?;
		let saved = (self.envelope.payload.clone(), self.dirty);
		self.remove(name);
		if let Err(e) = self.add(name, value)
		{
			(self.envelope.payload, self.dirty) = saved;
			return Err(e);
		}
		Ok(())
	}

	/// Replaces the whole contents with the `name=value` lines given, skipping lines without `=`
	/// and ignoring a trailing line break. A line ends at its first NUL. Returns the number of
	/// entries written; nothing changes unless all of them fit.
	pub fn replace_all<I>(&mut self, lines: I) -> Result<usize, EnvError>
		where I: IntoIterator, I::Item: AsRef<str>
	{
		let capacity = self.capacity();
		let saved = (std::mem::replace(&mut self.envelope.payload, vec![0u8; capacity]), self.dirty);
		let mut count = 0;
		for line in lines
		{
			let line = line.as_ref();
			let line = line.find('\0').map_or(line, |end| &line[..end]).trim_end_matches(['\n', '\r']);
			let Some((name, value)) = line.split_once('=') else {continue};
			if name.is_empty() {continue;}
			if let Err(e) = self.add(name, value)
			{
				(self.envelope.payload, self.dirty) = saved;
				return Err(e);
			}
			count += 1;
		}
		self.dirty = true;
		Ok(count)
	}

	fn rebuild(&self, mut keep: impl FnMut(&Entry<'_>) -> bool) -> (Vec<u8>, bool)
	{
		let mut payload = vec![0u8; self.capacity()];
		let mut pos = 0;
		let mut dropped = false;
		for entry in self.entries()
		{
			if entry.value().is_none()
			{
				continue;
			}
			if !keep(&entry)
			{
				dropped = true;
				continue;
			}
			let line = entry.as_bytes();
			// an unterminated tail has no room for its NUL
			let len = line.len().min(payload.len().saturating_sub(pos + 1));
			payload[pos..pos + len].copy_from_slice(&line[..len]);
			pos += len + 1;
		}
		(payload, dropped)
	}

	pub fn commit<F: Partitions + ?Sized>(&mut self, flash: &mut F) -> Result<(), EnvError>
	{
		if !self.dirty
		{
			return Ok(());
		}
		self.store(flash)
	}

	// consumes the session, writing it out only if `save` is set
	pub fn finalize<F: Partitions + ?Sized>(mut self, flash: &mut F, save: bool) -> Result<(), EnvError>
	{
		if save {self.store(flash)} else {Ok(())}
	}

	// the new copy must be complete before the old one is retired
	fn store<F: Partitions + ?Sized>(&mut self, flash: &mut F) -> Result<(), EnvError>
	{
		let old = self.active;
		let new = old.other();
		self.envelope.flags = FLAG_ACTIVE;
		self.envelope.seal();
		let data = self.envelope.encode(self.order);
		debug_assert_eq!(data.len(), HEADER_LEN + self.capacity());
		flash.write(self.path(new), &data).map_err(EnvError::WriteFailed)?;
		self.active = new;
		self.dirty = false;
		info!("environment written to {} ({})", self.path(new).display(), new);
		let mut obsolete = [0u8; 4];
		self.order.write_u32(&mut obsolete, FLAG_OBSOLETE);
		flash.program(self.path(old), FLAGS_POS, &obsolete).map_err(EnvError::WriteFailed)
	}
}

fn check_entry(name: &str, value: &str) -> Result<(), EnvError>
{
	if name.is_empty() || name.contains(['=', '\0']) || value.contains('\0')
	{
		return Err(EnvError::BadEntry(name.to_string()));
	}
	Ok(())
}

#[derive(Debug)]
pub enum EnvError
{
	NoValidEnvironment,
	SizeMismatch{a: usize, b: usize},
	Overflow{need: usize, have: usize},
	BadEntry(String),
	Io(IoError),
	WriteFailed(IoError),
}

impl fmt::Display for EnvError
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		match self
		{
			Self::NoValidEnvironment => f.write_str("no valid environment found"),
			Self::SizeMismatch{a, b} => write!(f, "environment partitions differ in size ({a} != {b})"),
			Self::Overflow{need, have} => write!(f, "environment full (need {need} bytes, have {have})"),
			Self::BadEntry(name) => write!(f, "invalid environment entry {name:?}"),
			Self::Io(..) => f.write_str("could not read environment"),
			Self::WriteFailed(..) => f.write_str("could not write environment"),
		}
	}
}

impl Error for EnvError
{
	fn source(&self) -> Option<&(dyn Error + 'static)>
	{
		match self
		{
			Self::Io(e) | Self::WriteFailed(e) => Some(e),
			_ => None,
		}
	}
}
