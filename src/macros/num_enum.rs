// generates a fieldless enum over raw wire tag values, plus a `TryFrom` that reports unknown tags
macro_rules!numeric_enum
{
	{
		$vis:vis enum $tname:ident: $numeric:ty => $error:ident
		{
			$($var_name:ident = $var_val:literal),+ $(,)?
		}
	} =>
	{
		#[repr($numeric)]
		#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
		$vis enum $tname
		{
			$($var_name = $var_val,)+
		}

		impl TryFrom<$numeric> for $tname
		{
			type Error = $error;

			fn try_from(value: $numeric) -> Result<Self, $error>
			{
				match value
				{
					$($var_val => Ok(Self::$var_name),)+
					_ => Err($error(value)),
				}
			}
		}

		impl From<$tname> for $numeric
		{
			fn from(value: $tname) -> $numeric
			{
				value as $numeric
			}
		}

		#[derive(Copy, Clone, Debug, Eq, PartialEq)]
		$vis struct $error(pub $numeric);

		impl core::fmt::Display for $error
		{
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result
			{
				write!(f, "no variant of {} for value {}", stringify!($tname), self.0)
			}
		}

		impl std::error::Error for $error {}
	};
}
pub(crate) use numeric_enum;
