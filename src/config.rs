use std::borrow::Cow;

use crate::model::BacklightLevel;
use crate::model::Clocks;
use crate::model::DriverTag;
use crate::model::Fonts;
use crate::model::Pin;
use crate::model::Pins;
use crate::model::Setup;
use crate::model::SpiPort;

pub const USER_SETUP_INFO: &str = "User_Setup"; // Setup name reported by the driver library.

pub const DRIVER: DriverTag = DriverTag::Ili9341_2;

pub const TFT_WIDTH: u16 = 240; // Panel width in pixels.
pub const TFT_HEIGHT: u16 = 320; // Panel height in pixels.

pub const TFT_BL: Pin = Pin::Gpio(21); // Backlight control.
pub const TFT_BACKLIGHT_ON: BacklightLevel = BacklightLevel::High;

pub const TFT_MISO: Pin = Pin::Gpio(12);
pub const TFT_MOSI: Pin = Pin::Gpio(13);
pub const TFT_SCLK: Pin = Pin::Gpio(14);
pub const TFT_CS: Pin = Pin::Gpio(15); // Chip select.
pub const TFT_DC: Pin = Pin::Gpio(2); // Data/command.
// No hardware reset line, the driver issues a software reset instead.
pub const TFT_RST: Pin = Pin::NotConnected;
pub const TOUCH_CS: Pin = Pin::Gpio(33); // Touch controller chip select.

// Each font costs flash; fonts left out are unavailable at runtime.
pub const FONTS: Fonts = Fonts::GLCD
	.with(Fonts::FONT2)
	.with(Fonts::FONT4)
	.with(Fonts::FONT6)
	.with(Fonts::FONT7)
	.with(Fonts::FONT8)
	.with(Fonts::GFXFF);
pub const SMOOTH_FONT: bool = true; // Anti-aliased glyphs.

pub const SPI_FREQUENCY: u32 = 55_000_000; // Pixel/command writes, Hz.
pub const SPI_READ_FREQUENCY: u32 = 20_000_000; // Panel reads, Hz.
pub const SPI_TOUCH_FREQUENCY: u32 = 2_500_000; // Touch controller, Hz.

// Upper limit of the ESP32 SPI peripheral clock.
pub const MAX_SPI_FREQUENCY: u32 = 80_000_000;

// HSPI keeps the panel off the default VSPI bus used by other peripherals.
pub const SPI_PORT: SpiPort = SpiPort::Hspi;

// With the native polarity fillScreen gave swapped white/black backgrounds.
// Re-check on other panel revisions before copying.
pub const TFT_INVERSION_ON: bool = true;

pub const SETUP: Setup = Setup {
	info: Some(Cow::Borrowed(USER_SETUP_INFO)),
	driver: DRIVER,
	width: Some(TFT_WIDTH),
	height: Some(TFT_HEIGHT),
	pins: Pins {
		bl: Some(TFT_BL),
		miso: Some(TFT_MISO),
		mosi: Some(TFT_MOSI),
		sclk: Some(TFT_SCLK),
		cs: Some(TFT_CS),
		dc: Some(TFT_DC),
		rst: Some(TFT_RST),
		touch_cs: Some(TOUCH_CS),
	},
	backlight_on: Some(TFT_BACKLIGHT_ON),
	fonts: FONTS,
	smooth_font: SMOOTH_FONT,
	clocks: Clocks {
		write: Some(SPI_FREQUENCY),
		read: Some(SPI_READ_FREQUENCY),
		touch: Some(SPI_TOUCH_FREQUENCY),
	},
	spi_port: SPI_PORT,
	inversion: Some(TFT_INVERSION_ON),
	extra: Vec::new(),
};

#[cfg(test)]
#[test]
fn pins_non_negative_except_reset() {
	for (name, pin) in SETUP.pins.named() {
		let pin = pin.unwrap();
		if name == Pins::RST {
			assert_eq!(pin.raw(), -1);
		} else {
			assert!(pin.raw() >= 0, "{} = {}", name, pin.raw());
		}
	}
}

#[cfg(test)]
#[test]
fn resolution_matches_driver() {
	assert_eq!(SETUP.driver, DriverTag::Ili9341_2);
	assert_eq!(SETUP.resolution(), (240, 320));
	assert_eq!(SETUP.resolution(), DRIVER.native_resolution());
}

#[cfg(test)]
#[test]
fn one_backlight_polarity() {
	let count = SETUP
		.to_defines()
		.iter()
		.filter(|a| a.name == BacklightLevel::SYMBOL)
		.count();
	assert_eq!(count, 1);
}

#[cfg(test)]
#[test]
fn clock_ordering() {
	assert!(SPI_FREQUENCY >= SPI_READ_FREQUENCY);
	assert!(SPI_FREQUENCY >= SPI_TOUCH_FREQUENCY);
	assert!(SPI_FREQUENCY <= MAX_SPI_FREQUENCY);
}

#[cfg(test)]
#[test]
fn reserialize_idempotent() {
	use crate::header::parse;
	use crate::header::render;

	let first = parse(&render(&SETUP.to_defines())).unwrap();
	let second = parse(&render(&first)).unwrap();
	assert_eq!(first, second);

	let reloaded = Setup::from_defines(&second).unwrap();
	assert_eq!(reloaded, SETUP);
}

#[cfg(test)]
#[test]
fn matches_shipped_header() {
	use crate::header::parse;
	use crate::header::render;

	let shipped = include_str!("../User_Setup.h");
	assert_eq!(render(&SETUP.to_defines()), shipped);
	assert_eq!(parse(shipped).unwrap(), SETUP.to_defines());
	assert_eq!(Setup::from_defines(&parse(shipped).unwrap()).unwrap(), SETUP);
}

#[cfg(test)]
#[test]
fn ili9341_2_no_reset_inverted_is_clean() {
	assert_eq!(SETUP.pins.rst, Some(Pin::NotConnected));
	assert_eq!(SETUP.inversion, Some(true));
	assert!(crate::audit::audit(&SETUP).is_empty());
}
