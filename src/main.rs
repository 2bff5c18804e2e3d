use crate::audit::audit;
use crate::config::SETUP;
use crate::header::parse;
use crate::header::render;
use crate::model::Setup;
use anyhow::Context;
use log::info;
use log::trace;
use log::warn;
use std::env::var_os;
use std::fs::read_to_string;
use std::io::Write;
use std::io::stdout;
use std::path::PathBuf;

#[macro_use]
mod macros;
mod audit;
mod config;
mod header;
mod model;

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum OutputMode {
	Header,
	Summary,
}

fn load_setup(path: Option<PathBuf>) -> anyhow::Result<Setup> {
	let Some(path) = path else {
		info!("#[setup] built-in");
		return Ok(SETUP);
	};

	info!("#[setup] load {:?}", path);
	let text = read_to_string(&path).with_context(|| format!("read {:?}", path))?;
	let defines = parse(&text).with_context(|| format!("parse {:?}", path))?;
	trace!("#[setup] {} symbols", defines.len());

	Setup::from_defines(&defines).with_context(|| format!("setup {:?}", path))
}

fn log_summary(setup: &Setup) {
	let (width, height) = setup.resolution();

	info!("setup: {}", setup.info.as_deref().unwrap_or("<unnamed>"));
	info!("driver: {}, {}x{}", setup.driver.symbol(), width, height);
	for (name, pin) in setup.pins.named() {
		match pin {
			Some(pin) => info!("#[pin, {}] {}", name, pin.raw()),
			None => trace!("#[pin, {}] undefined", name),
		}
	}
	if let Some(level) = setup.backlight_on {
		info!("backlight on: {}", level.value());
	}
	info!(
		"fonts: {:?}, smooth: {}",
		setup.fonts.symbols().collect::<Vec<_>>(),
		setup.smooth_font
	);
	info!(
		"spi: {:?}, write: {:?}hz, read: {:?}hz, touch: {:?}hz",
		setup.spi_port, setup.clocks.write, setup.clocks.read, setup.clocks.touch
	);
	info!("inversion: {:?}", setup.inversion);
	for define in setup.extra.iter() {
		info!("extra: {} {}", define.name, define.value.as_deref().unwrap_or(""));
	}
}

fn main() -> anyhow::Result<()> {
	env_logger::try_init()?;
	info!("tft_user_setup: ");

	let output_mode = match var_os("SETUP_OUTPUT").as_deref() {
		Some(a) if a == osstr!("SUMMARY") || a == osstr!("S") => OutputMode::Summary,
		Some(a) if a == osstr!("HEADER") || a == osstr!("H") => OutputMode::Header,
		Some(a) => {
			warn!("unknown SETUP_OUTPUT={:?}, using HEADER", a);
			OutputMode::Header
		}
		None => OutputMode::Header,
	};
	info!("output: {:?}", output_mode);

	let setup = load_setup(var_os("SETUP_FILE").map(PathBuf::from))?;

	let findings = audit(&setup);
	for finding in findings.iter() {
		warn!("#[audit] {}", finding);
	}
	if findings.is_empty() {
		info!("#[audit] ok");
	}

	match output_mode {
		OutputMode::Header => {
			let text = render(&setup.to_defines());
			let mut out = stdout().lock();
			out.write_all(text.as_bytes())?;
			out.flush()?;
		}
		OutputMode::Summary => log_summary(&setup),
	}

	Ok(())
}
