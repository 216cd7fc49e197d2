use proptest::prelude::*;

use super::*;
use crate::crc::crc32;
use crate::envelope::env::{used_len, EnvironmentEnvelope, Entries, FLAG_ACTIVE};
use crate::envelope::image::{self, BootImage, Compression, ImageHeader, Os};
use crate::envelope::param::{self, GlobalTable, ParameterBlock, Table};

fn sample_image() -> Vec<u8>
{
	let mut header = ImageHeader::new("U-Boot 2019.04 axxia");
	header.time = 0x5F00_0000;
	header.load = 0x0100_0000;
	header.entry = 0x0100_0040;
	header.os = Os::UBoot.into();
	header.arch = 22;
	header.image_type = 5;
	header.comp = Compression::None.into();
	image::encode(&header, b"\x00u-boot_2019.04-axxia-1.2\x00more firmware bytes").unwrap()
}

fn sample_global(sequence: u32) -> GlobalTable
{
	GlobalTable{
		version: 3,
		flags: 0x10,
		baud_rate: 115200,
		memory_ranges: [0x11; 16],
		sequence,
		description: "axxia parameters rev 7".to_string(),
	}
}

fn sample_params(sequence: u32) -> Vec<u8>
{
	param::encode(2, 9, &sample_global(sequence), &[
		(Table::Voltage, 1, &[1000, 1050][..]),
		(Table::Clocks, 4, &[0xAA, 0xBB, 0xCC][..]),
	])
}

#[test]
fn image_encode_decode()
{
	let raw = sample_image();
	let mut partition = raw.clone();
	// decoding a whole partition must ignore the erased tail
	partition.resize(4096, 0xFF);
	let decoded = BootImage::decode(&partition).unwrap();
	let BootImage::Legacy{header, header_valid, payload} = decoded
	else
	{
		panic!("expected a legacy image");
	};
	assert!(header_valid);
	assert_eq!(header.name(), "U-Boot 2019.04 axxia");
	assert_eq!(header.data_crc, crc32(payload));
	assert_eq!(header.os(), Ok(Os::UBoot));
	assert_eq!(header.compression(), Ok(Compression::None));
	assert_eq!(header.size as usize, raw.len() - image::HEADER_LEN);
	assert_eq!(payload, &raw[image::HEADER_LEN..]);
}

#[test]
fn image_unknown_tags()
{
	let mut header = ImageHeader::new("odd");
	header.os = 200;
	header.comp = 99;
	let raw = image::encode(&header, b"x").unwrap();
	let decoded = BootImage::decode(&raw).unwrap();
	let header = decoded.header().unwrap();
	assert_eq!(header.os(), Err(image::UnknownOs(200)));
	assert_eq!(header.compression(), Err(image::UnknownCompression(99)));
}

#[test]
fn image_bad_magic()
{
	let mut raw = sample_image();
	raw[0] ^= 0x01;
	assert!(matches!(BootImage::decode(&raw), Err(DecodeError::BadMagic{expect: image::MAGIC, ..})));
	assert!(matches!(BootImage::decode(&[0xFF; 64]), Err(DecodeError::BadMagic{have: 0xFFFFFFFF, ..})));
}

#[test]
fn image_bad_data_checksum()
{
	let mut raw = sample_image();
	let last = raw.len() - 1;
	raw[last] ^= 0x80;
	assert!(matches!(BootImage::decode(&raw), Err(DecodeError::BadChecksum{..})));
}

#[test]
fn image_truncated()
{
	let raw = sample_image();
	assert!(matches!(BootImage::decode(&raw[..raw.len() - 1]), Err(DecodeError::Underflow{..})));
	assert!(matches!(BootImage::decode(&raw[..10]), Err(DecodeError::Underflow{need: image::HEADER_LEN, have: 10})));
	assert!(matches!(BootImage::decode(&raw[..2]), Err(DecodeError::Underflow{need: 4, have: 2})));
}

#[test]
fn image_header_crc_is_reported_not_enforced()
{
	let mut raw = sample_image();
	// the timestamp is only covered by the header checksum
	raw[0x08] ^= 0x01;
	match BootImage::decode(&raw).unwrap()
	{
		BootImage::Legacy{header_valid, ..} => assert!(!header_valid),
		BootImage::Secure{..} => unreachable!(),
	}
}

#[test]
fn image_secure()
{
	let mut raw = vec![0u8; 32];
	put_be_word(&mut raw, 0, image::SECURE_MAGIC);
	put_be_word(&mut raw, 4, 0x1234);
	// garbage after the magic is never checked
	raw[8..].fill(0xA5);
	let decoded = BootImage::decode(&raw).unwrap();
	assert!(decoded.is_secure());
	assert_eq!(decoded.size(), 0x1234);
	assert!(decoded.header().is_none());
}

#[test]
fn image_find_version()
{
	let raw = sample_image();
	assert_eq!(image::find_version(&raw, "u-boot_").as_deref(), Some("u-boot_2019.04-axxia-1.2"));
	assert_eq!(image::find_version(&raw, "atf_"), None);
	assert_eq!(image::find_version(b"xxatf_v1.5", "atf_").as_deref(), Some("atf_v1.5"));
}

#[test]
fn image_name_truncated()
{
	let header = ImageHeader::new("a name that is far longer than thirty-two bytes");
	assert_eq!(header.name().len(), image::NAME_LEN - 1);
}

#[test]
fn param_decode()
{
	let raw = sample_params(41);
	let block = ParameterBlock::decode(&raw).unwrap();
	assert_eq!(block.sequence(), 41);
	assert_eq!(block.header().version, 2);
	assert_eq!(block.header().chip_type, 9);
	assert_eq!(block.header().size as usize, raw.len());
	assert_eq!(block.global(), &sample_global(41));
	let clocks = block.table(Table::Clocks).unwrap();
	assert_eq!(clocks.version, 4);
	assert_eq!(clocks.words, vec![0xAA, 0xBB, 0xCC]);
	let voltage = block.table(Table::Voltage).unwrap();
	assert_eq!(voltage.version, 1);
	assert_eq!(voltage.words, vec![1000, 1050]);
	assert_eq!(block.table(Table::Global).unwrap().version, 3);
	assert!(matches!(block.table(Table::PcieSrio), Err(DecodeError::BadTable{table: "pciesrio", ..})));
}

#[test]
fn param_trailing_partition_bytes_ignored()
{
	let raw = sample_params(1);
	let mut partition = raw.clone();
	partition.resize(8192, 0xFF);
	let block = ParameterBlock::decode(&partition).unwrap();
	assert_eq!(block.as_bytes(), raw.as_slice());
}

#[test]
fn param_bad_magic()
{
	let mut raw = sample_params(1);
	raw[3] = 0;
	assert!(matches!(ParameterBlock::decode(&raw), Err(DecodeError::BadMagic{expect: param::MAGIC, ..})));
}

#[test]
fn param_checksum_excludes_first_words()
{
	let raw = sample_params(1);
	// mutating the size word breaks the bounds, not the checksum
	let mut bigger = raw.clone();
	put_be_word(&mut bigger, 4, raw.len() as u32 + 4);
	assert!(matches!(ParameterBlock::decode(&bigger), Err(DecodeError::Underflow{..})));
	// a too-small size is caught before any checksum is computed
	let mut smaller = raw.clone();
	put_be_word(&mut smaller, 4, 8);
	assert!(matches!(ParameterBlock::decode(&smaller), Err(DecodeError::Underflow{..})));
}

#[test]
fn param_with_sequence()
{
	let block = ParameterBlock::decode(&sample_params(7)).unwrap();
	let next = block.with_sequence(8);
	let reread = ParameterBlock::decode(&next).unwrap();
	assert_eq!(reread.sequence(), 8);
	assert_ne!(reread.header().checksum, block.header().checksum);
	assert_eq!(reread.global().description, block.global().description);
	// the original wire bytes are left alone
	assert_eq!(block.sequence(), 7);
	assert_eq!(ParameterBlock::decode(block.as_bytes()).unwrap().sequence(), 7);
}

#[test]
fn param_global_out_of_bounds()
{
	let mut raw = sample_params(1);
	// point the global table past the end and fix up the checksum
	let size = raw.len() as u32;
	put_be_word(&mut raw, 20, size - 8);
	let checksum = crc32(&raw[param::CHECKSUM_START..]);
	put_be_word(&mut raw, 8, checksum);
	assert!(matches!(ParameterBlock::decode(&raw), Err(DecodeError::BadTable{table: "global", ..})));
}

#[test]
fn env_decode_encode()
{
	let mut envelope = EnvironmentEnvelope::empty(64);
	envelope.payload[..12].copy_from_slice(b"bootdelay=3\0");
	envelope.seal();
	for order in [WordOrder::Big, WordOrder::Little]
	{
		let raw = envelope.encode(order);
		assert_eq!(raw.len(), 72);
		let decoded = EnvironmentEnvelope::decode(&raw, order).unwrap();
		assert_eq!(decoded, envelope);
		assert!(decoded.is_active());
		assert_eq!(decoded.flags, FLAG_ACTIVE);
	}
}

#[test]
fn env_bad_checksum()
{
	let mut envelope = EnvironmentEnvelope::empty(32);
	envelope.payload[0] = b'a';
	let raw = envelope.encode(WordOrder::Big);
	assert!(matches!(EnvironmentEnvelope::decode(&raw, WordOrder::Big), Err(DecodeError::BadChecksum{..})));
	assert!(matches!(EnvironmentEnvelope::decode(&raw[..6], WordOrder::Big), Err(DecodeError::Underflow{..})));
}

#[test]
fn env_entries()
{
	let data = b"a=1\0bb=22\0novalue\0\0stale=1\0";
	let entries: Vec<_> = Entries::new(data).map(|e| e.to_str().into_owned()).collect();
	assert_eq!(entries, ["a=1", "bb=22", "novalue"]);
	let third = Entries::new(data).nth(2).unwrap();
	assert_eq!(third.name(), b"novalue");
	assert_eq!(third.value(), None);
	assert_eq!(used_len(data), 18);
	// an unterminated tail is yielded once and never read past
	let tail = b"x=1\0y=2";
	let entries: Vec<_> = Entries::new(tail).map(|e| e.as_bytes()).collect();
	assert_eq!(entries, [b"x=1".as_ref(), b"y=2".as_ref()]);
	assert_eq!(used_len(tail), tail.len());
	assert_eq!(Entries::new(b"").next(), None);
}

#[test]
fn env_entries_restartable()
{
	let envelope = EnvironmentEnvelope{checksum: 0, flags: 1, payload: b"k=v\0j=w\0\0".to_vec()};
	let first: Vec<_> = envelope.entries().collect();
	let second: Vec<_> = envelope.entries().collect();
	assert_eq!(first, second);
	let mut iter = envelope.entries();
	iter.by_ref().for_each(drop);
	assert_eq!(iter.next(), None);
}

proptest!
{
	#[test]
	fn image_checksum_survives_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..512), time in any::<u32>(), load in any::<u32>())
	{
		let mut header = ImageHeader::new("prop");
		header.time = time;
		header.load = load;
		let raw = image::encode(&header, &payload).unwrap();
		let decoded = BootImage::decode(&raw).unwrap();
		let decoded = decoded.header().unwrap();
		prop_assert_eq!(decoded.data_crc, crc32(&payload));
		prop_assert_eq!(decoded.time, time);
		prop_assert_eq!(decoded.load, load);
	}

	#[test]
	fn param_any_flip_in_checksummed_range_fails(sequence in any::<u32>(), pos_seed in any::<usize>(), bit in 0u8..8)
	{
		let mut raw = sample_params(sequence);
		// anywhere in [12, size)
		let pos = param::CHECKSUM_START + pos_seed % (raw.len() - param::CHECKSUM_START);
		raw[pos] ^= 1 << bit;
		let caught = matches!(ParameterBlock::decode(&raw), Err(DecodeError::BadChecksum{..}));
		prop_assert!(caught);
	}

	#[test]
	fn env_any_flip_in_payload_fails(pos_seed in any::<usize>(), bit in 0u8..8)
	{
		let mut envelope = EnvironmentEnvelope::empty(128);
		envelope.payload[..8].copy_from_slice(b"ipaddr=\0");
		envelope.seal();
		let mut raw = envelope.encode(WordOrder::Big);
		let pos = env::HEADER_LEN + pos_seed % envelope.capacity();
		raw[pos] ^= 1 << bit;
		let caught = matches!(EnvironmentEnvelope::decode(&raw, WordOrder::Big), Err(DecodeError::BadChecksum{..}));
		prop_assert!(caught);
	}
}
