pub mod crc;
pub mod env;
pub mod envelope;
pub mod flash;
pub mod kind;
pub mod layout;
pub(crate) mod macros;
pub mod select;
pub mod update;

#[cfg(test)]
pub(crate) fn test_logger()
{
	let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Trace).try_init();
}
