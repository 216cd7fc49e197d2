pub struct Crc(u32);

impl Crc
{
	// reflected form of 0x04C11DB7
	pub const POLYNOMIAL: u32 = 0xEDB88320;

	pub const TABLE: [u32; 256] = {
		let mut table = [0u32; 256];
		let mut pos = 0;
		while pos < 256
		{
			let mut curr = pos as u32;
			let mut bit = 0;
			while bit < 8
			{
				curr = (curr >> 1) ^ if (curr & 1) != 0 {Self::POLYNOMIAL} else {0};
				bit += 1;
			}
			table[pos] = curr;
			pos += 1;
		}
		table
	};

	pub fn new() -> Self
	{
		Self(0xFFFFFFFF)
	}

	pub fn update(&mut self, value: u8)
	{
		self.0 = (self.0 >> 8) ^ Self::TABLE[(value ^ self.0 as u8) as usize];
	}

	pub fn update_slice(&mut self, value: &[u8])
	{
		value.iter().for_each(|&v| self.update(v));
	}

	pub fn get_value(&self) -> u32
	{
		!self.0
	}
}

impl Default for Crc
{
	fn default() -> Self
	{
		Self::new()
	}
}

pub fn crc32(data: &[u8]) -> u32
{
	let mut crc = Crc::new();
	crc.update_slice(data);
	crc.get_value()
}
