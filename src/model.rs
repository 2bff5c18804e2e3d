use std::borrow::Cow;

use anyhow::Context;
use anyhow::bail;
use log::trace;
use log::warn;

use crate::header::Define;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTag {
	Ili9341,
	Ili9341_2,
	Ili9342,
	St7735,
	Ili9163,
	S6d02a1,
	RpiIli9486,
	Hx8357b,
	Hx8357c,
	Hx8357d,
	Ili9481,
	Ili9486,
	Ili9488,
	St7789,
	St7789_2,
	R61581,
	Rm68140,
	St7796,
	Ssd1351,
	Ssd1963_480,
	Ssd1963_800,
	Ssd1963_800Alt,
	Ssd1963_800Bd,
	Gc9a01,
	Ili9225,
}

impl DriverTag {
	pub const ALL: [Self; 25] = [
		Self::Ili9341,
		Self::Ili9341_2,
		Self::Ili9342,
		Self::St7735,
		Self::Ili9163,
		Self::S6d02a1,
		Self::RpiIli9486,
		Self::Hx8357b,
		Self::Hx8357c,
		Self::Hx8357d,
		Self::Ili9481,
		Self::Ili9486,
		Self::Ili9488,
		Self::St7789,
		Self::St7789_2,
		Self::R61581,
		Self::Rm68140,
		Self::St7796,
		Self::Ssd1351,
		Self::Ssd1963_480,
		Self::Ssd1963_800,
		Self::Ssd1963_800Alt,
		Self::Ssd1963_800Bd,
		Self::Gc9a01,
		Self::Ili9225,
	];

	pub const fn symbol(self) -> &'static str {
		match self {
			Self::Ili9341 => "ILI9341_DRIVER",
			Self::Ili9341_2 => "ILI9341_2_DRIVER",
			Self::Ili9342 => "ILI9342_DRIVER",
			Self::St7735 => "ST7735_DRIVER",
			Self::Ili9163 => "ILI9163_DRIVER",
			Self::S6d02a1 => "S6D02A1_DRIVER",
			Self::RpiIli9486 => "RPI_ILI9486_DRIVER",
			Self::Hx8357b => "HX8357B_DRIVER",
			Self::Hx8357c => "HX8357C_DRIVER",
			Self::Hx8357d => "HX8357D_DRIVER",
			Self::Ili9481 => "ILI9481_DRIVER",
			Self::Ili9486 => "ILI9486_DRIVER",
			Self::Ili9488 => "ILI9488_DRIVER",
			Self::St7789 => "ST7789_DRIVER",
			Self::St7789_2 => "ST7789_2_DRIVER",
			Self::R61581 => "R61581_DRIVER",
			Self::Rm68140 => "RM68140_DRIVER",
			Self::St7796 => "ST7796_DRIVER",
			Self::Ssd1351 => "SSD1351_DRIVER",
			Self::Ssd1963_480 => "SSD1963_480_DRIVER",
			Self::Ssd1963_800 => "SSD1963_800_DRIVER",
			Self::Ssd1963_800Alt => "SSD1963_800ALT_DRIVER",
			Self::Ssd1963_800Bd => "SSD1963_800BD_DRIVER",
			Self::Gc9a01 => "GC9A01_DRIVER",
			Self::Ili9225 => "ILI9225_DRIVER",
		}
	}

	pub fn from_symbol(symbol: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|a| a.symbol() == symbol)
	}

	/// Portrait (width, height) of the controller's usual panel.
	pub const fn native_resolution(self) -> (u16, u16) {
		match self {
			Self::Ili9341 | Self::Ili9341_2 | Self::St7789 | Self::St7789_2 => (240, 320),
			Self::Ili9342 => (320, 240),
			Self::St7735 | Self::Ili9163 | Self::S6d02a1 => (128, 160),
			Self::RpiIli9486
			| Self::Hx8357b
			| Self::Hx8357c
			| Self::Hx8357d
			| Self::Ili9481
			| Self::Ili9486
			| Self::Ili9488
			| Self::R61581
			| Self::Rm68140
			| Self::St7796 => (320, 480),
			Self::Ssd1351 => (128, 128),
			Self::Ssd1963_480 => (480, 272),
			Self::Ssd1963_800 | Self::Ssd1963_800Alt | Self::Ssd1963_800Bd => (800, 480),
			Self::Gc9a01 => (240, 240),
			Self::Ili9225 => (176, 220),
		}
	}
}

/// GPIO line; the header encodes `NotConnected` as -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
	Gpio(u8),
	NotConnected,
}

impl Pin {
	pub const NOT_CONNECTED_RAW: i32 = -1;

	pub const fn from_raw(raw: i32) -> Option<Self> {
		match raw {
			Self::NOT_CONNECTED_RAW => Some(Self::NotConnected),
			0..=255 => Some(Self::Gpio(raw as u8)),
			_ => None,
		}
	}

	#[inline]
	pub const fn raw(self) -> i32 {
		match self {
			Self::Gpio(a) => a as i32,
			Self::NotConnected => Self::NOT_CONNECTED_RAW,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pins {
	pub bl: Option<Pin>,
	pub miso: Option<Pin>,
	pub mosi: Option<Pin>,
	pub sclk: Option<Pin>,
	pub cs: Option<Pin>,
	pub dc: Option<Pin>,
	pub rst: Option<Pin>,
	pub touch_cs: Option<Pin>,
}

impl Pins {
	pub const BL: &'static str = "TFT_BL";
	pub const RST: &'static str = "TFT_RST";

	/// (symbol, pin) pairs in header order.
	pub const fn named(&self) -> [(&'static str, Option<Pin>); 8] {
		[
			(Self::BL, self.bl),
			("TFT_MISO", self.miso),
			("TFT_MOSI", self.mosi),
			("TFT_SCLK", self.sclk),
			("TFT_CS", self.cs),
			("TFT_DC", self.dc),
			(Self::RST, self.rst),
			("TOUCH_CS", self.touch_cs),
		]
	}

	fn slot(&mut self, symbol: &str) -> Option<&mut Option<Pin>> {
		match symbol {
			Self::BL => Some(&mut self.bl),
			"TFT_MISO" => Some(&mut self.miso),
			"TFT_MOSI" => Some(&mut self.mosi),
			"TFT_SCLK" => Some(&mut self.sclk),
			"TFT_CS" => Some(&mut self.cs),
			"TFT_DC" => Some(&mut self.dc),
			Self::RST => Some(&mut self.rst),
			"TOUCH_CS" => Some(&mut self.touch_cs),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklightLevel {
	High,
	Low,
}

impl BacklightLevel {
	pub const SYMBOL: &'static str = "TFT_BACKLIGHT_ON";

	pub const fn value(self) -> &'static str {
		match self {
			Self::High => "HIGH",
			Self::Low => "LOW",
		}
	}

	pub fn from_value(value: &str) -> Option<Self> {
		match value {
			"HIGH" | "1" => Some(Self::High),
			"LOW" | "0" => Some(Self::Low),
			_ => None,
		}
	}
}

/// Set of bundled fonts, one bit per `LOAD_*` symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fonts(u16);

impl Fonts {
	pub const NONE: Self = Self(0);
	pub const GLCD: Self = Self(1 << 0);
	pub const FONT2: Self = Self(1 << 1);
	pub const FONT4: Self = Self(1 << 2);
	pub const FONT6: Self = Self(1 << 3);
	pub const FONT7: Self = Self(1 << 4);
	pub const FONT8: Self = Self(1 << 5);
	pub const FONT8N: Self = Self(1 << 6);
	/// Scalable Adafruit GFX free fonts.
	pub const GFXFF: Self = Self(1 << 7);

	const TABLE: [(Self, &'static str); 8] = [
		(Self::GLCD, "LOAD_GLCD"),
		(Self::FONT2, "LOAD_FONT2"),
		(Self::FONT4, "LOAD_FONT4"),
		(Self::FONT6, "LOAD_FONT6"),
		(Self::FONT7, "LOAD_FONT7"),
		(Self::FONT8, "LOAD_FONT8"),
		(Self::FONT8N, "LOAD_FONT8N"),
		(Self::GFXFF, "LOAD_GFXFF"),
	];

	#[inline]
	pub const fn with(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}

	#[inline]
	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	#[allow(dead_code)]
	#[inline]
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	pub fn from_symbol(symbol: &str) -> Option<Self> {
		Self::TABLE
			.into_iter()
			.find(|(_, a)| *a == symbol)
			.map(|(font, _)| font)
	}

	pub fn symbols(self) -> impl Iterator<Item = &'static str> {
		Self::TABLE
			.into_iter()
			.filter(move |(font, _)| self.contains(*font))
			.map(|(_, a)| a)
	}
}

/// Three independent SPI clock domains, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clocks {
	pub write: Option<u32>,
	pub read: Option<u32>,
	pub touch: Option<u32>,
}

impl Clocks {
	pub const WRITE: &'static str = "SPI_FREQUENCY";
	pub const READ: &'static str = "SPI_READ_FREQUENCY";
	pub const TOUCH: &'static str = "SPI_TOUCH_FREQUENCY";
}

/// Hardware SPI peripheral driving the panel. `Vspi` is the library default
/// and has no symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiPort {
	#[default]
	Vspi,
	Hspi,
	Fspi,
}

impl SpiPort {
	pub const fn symbol(self) -> Option<&'static str> {
		match self {
			Self::Vspi => None,
			Self::Hspi => Some("USE_HSPI_PORT"),
			Self::Fspi => Some("USE_FSPI_PORT"),
		}
	}

	pub fn from_symbol(symbol: &str) -> Option<Self> {
		match symbol {
			"USE_HSPI_PORT" => Some(Self::Hspi),
			"USE_FSPI_PORT" => Some(Self::Fspi),
			_ => None,
		}
	}
}

const INFO: &str = "USER_SETUP_INFO";
const WIDTH: &str = "TFT_WIDTH";
const HEIGHT: &str = "TFT_HEIGHT";
const SMOOTH_FONT: &str = "SMOOTH_FONT";
const INVERSION_ON: &str = "TFT_INVERSION_ON";
const INVERSION_OFF: &str = "TFT_INVERSION_OFF";
const INVERSION_NOTE: &str =
	"white/black background swapped with native polarity, re-check on other panels";

/// Whole configuration surface. `None` fields are left undefined so the
/// driver library falls back to its own default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
	pub info: Option<Cow<'static, str>>,
	pub driver: DriverTag,
	pub width: Option<u16>,
	pub height: Option<u16>,
	pub pins: Pins,
	pub backlight_on: Option<BacklightLevel>,
	pub fonts: Fonts,
	pub smooth_font: bool,
	pub clocks: Clocks,
	pub spi_port: SpiPort,
	pub inversion: Option<bool>,

	/// Symbols without a typed field, kept verbatim.
	pub extra: Vec<Define>,
}

impl Setup {
	pub fn resolution(&self) -> (u16, u16) {
		let (native_w, native_h) = self.driver.native_resolution();
		(
			self.width.unwrap_or(native_w),
			self.height.unwrap_or(native_h),
		)
	}

	pub fn to_defines(&self) -> Vec<Define> {
		let mut defines = Vec::with_capacity(32);

		if let Some(info) = &self.info {
			defines.push(Define::value(INFO, format!("\"{}\"", info)));
		}
		defines.push(Define::flag(self.driver.symbol()));

		if let Some(width) = self.width {
			defines.push(Define::value(WIDTH, width.to_string()));
		}
		if let Some(height) = self.height {
			defines.push(Define::value(HEIGHT, height.to_string()));
		}

		for (symbol, pin) in self.pins.named() {
			match pin {
				Some(Pin::NotConnected) if symbol == Pins::RST => defines.push(
					Define::value(symbol, "-1").with_comment("no reset line, software reset"),
				),
				Some(pin) => defines.push(Define::value(symbol, pin.raw().to_string())),
				None => {}
			}
			if symbol == Pins::BL {
				if let Some(level) = self.backlight_on {
					defines.push(Define::value(BacklightLevel::SYMBOL, level.value()));
				}
			}
		}

		defines.extend(self.fonts.symbols().map(Define::flag));
		if self.smooth_font {
			defines.push(Define::flag(SMOOTH_FONT));
		}

		for (symbol, hz) in [
			(Clocks::WRITE, self.clocks.write),
			(Clocks::READ, self.clocks.read),
			(Clocks::TOUCH, self.clocks.touch),
		] {
			if let Some(hz) = hz {
				defines.push(Define::value(symbol, hz.to_string()));
			}
		}

		if let Some(symbol) = self.spi_port.symbol() {
			defines.push(Define::flag(symbol));
		}

		match self.inversion {
			Some(true) => defines.push(Define::flag(INVERSION_ON).with_comment(INVERSION_NOTE)),
			Some(false) => defines.push(Define::flag(INVERSION_OFF)),
			None => {}
		}

		defines.extend(self.extra.iter().cloned());
		defines
	}

	pub fn from_defines(defines: &[Define]) -> anyhow::Result<Self> {
		let mut info = None;
		let mut driver = None;
		let mut width = None;
		let mut height = None;
		let mut pins = Pins::default();
		let mut backlight_on = None;
		let mut fonts = Fonts::NONE;
		let mut smooth_font = false;
		let mut clocks = Clocks::default();
		let mut spi_port = None;
		let mut inversion = None;
		let mut extra = Vec::new();

		for define in defines {
			let name = define.name.as_str();

			if let Some(tag) = DriverTag::from_symbol(name) {
				if let Some(prev) = driver.replace(tag) {
					bail!("two driver tags selected: {} and {}", prev.symbol(), name);
				}
				continue;
			}
			if let Some(font) = Fonts::from_symbol(name) {
				fonts = fonts.with(font);
				continue;
			}
			if let Some(port) = SpiPort::from_symbol(name) {
				if let Some(prev) = spi_port.replace(port) {
					if prev != port {
						bail!("conflicting SPI port selection: {:?} and {:?}", prev, port);
					}
				}
				continue;
			}
			if let Some(slot) = pins.slot(name) {
				let raw = define.int(name)?;
				let pin = i32::try_from(raw)
					.ok()
					.and_then(Pin::from_raw)
					.with_context(|| format!("{}: pin {} out of range", name, raw))?;
				*slot = Some(pin);
				continue;
			}

			match name {
				INFO => {
					let value = define.required(name)?;
					info = Some(Cow::Owned(value.trim_matches('"').to_string()));
				}
				WIDTH => width = Some(define.int_as::<u16>(name)?),
				HEIGHT => height = Some(define.int_as::<u16>(name)?),
				BacklightLevel::SYMBOL => {
					let value = define.required(name)?;
					backlight_on = Some(
						BacklightLevel::from_value(value)
							.with_context(|| format!("{}: unknown level {:?}", name, value))?,
					);
				}
				SMOOTH_FONT => smooth_font = true,
				Clocks::WRITE => clocks.write = Some(define.int_as::<u32>(name)?),
				Clocks::READ => clocks.read = Some(define.int_as::<u32>(name)?),
				Clocks::TOUCH => clocks.touch = Some(define.int_as::<u32>(name)?),
				INVERSION_ON => inversion = Some(true),
				INVERSION_OFF => inversion = Some(false),
				_ => {
					trace!("#[setup] untyped symbol {}", name);
					extra.push(define.clone());
				}
			}
		}

		let Some(driver) = driver else {
			let unknown = extra
				.iter()
				.filter(|a| a.name.ends_with("_DRIVER") && a.name != "SPI_18BIT_DRIVER")
				.map(|a| a.name.as_str())
				.collect::<Vec<_>>();
			if !unknown.is_empty() {
				warn!("#[setup] unknown driver tags: {:?}", unknown);
				bail!("no known driver tag selected, found {}", unknown.join(", "));
			}
			bail!("no driver tag selected");
		};

		Ok(Self {
			info,
			driver,
			width,
			height,
			pins,
			backlight_on,
			fonts,
			smooth_font,
			clocks,
			spi_port: spi_port.unwrap_or_default(),
			inversion,
			extra,
		})
	}
}

impl Define {
	fn required(&self, name: &str) -> anyhow::Result<&str> {
		self.value
			.as_deref()
			.with_context(|| format!("{}: missing value", name))
	}

	/// Decimal or `0x` hex, C integer suffixes allowed.
	fn int(&self, name: &str) -> anyhow::Result<i64> {
		let value = self.required(name)?;
		let digits = value.trim_end_matches(['u', 'U', 'l', 'L']);
		let (negative, digits) = match digits.strip_prefix('-') {
			Some(a) => (true, a),
			None => (false, digits),
		};
		let parsed = match digits
			.strip_prefix("0x")
			.or_else(|| digits.strip_prefix("0X"))
		{
			Some(hex) => i64::from_str_radix(hex, 16),
			None => digits.parse::<i64>(),
		}
		.with_context(|| format!("{}: not an integer: {:?}", name, value))?;

		Ok(if negative { -parsed } else { parsed })
	}

	fn int_as<T: TryFrom<i64>>(&self, name: &str) -> anyhow::Result<T> {
		let raw = self.int(name)?;
		T::try_from(raw)
			.ok()
			.with_context(|| format!("{}: {} out of range", name, raw))
	}
}

#[cfg(test)]
#[test]
fn driver_symbols() {
	for tag in DriverTag::ALL {
		assert_eq!(DriverTag::from_symbol(tag.symbol()), Some(tag));
	}
	assert_eq!(DriverTag::from_symbol("ILI9341"), None);
	assert_eq!(DriverTag::Ili9341_2.native_resolution(), (240, 320));
}

#[cfg(test)]
#[test]
fn pin_sentinel() {
	assert_eq!(Pin::from_raw(-1), Some(Pin::NotConnected));
	assert_eq!(Pin::from_raw(33), Some(Pin::Gpio(33)));
	assert_eq!(Pin::from_raw(-2), None);
	assert_eq!(Pin::from_raw(256), None);
	assert_eq!(Pin::NotConnected.raw(), -1);
}

#[cfg(test)]
#[test]
fn fonts_additive() {
	let fonts = Fonts::GLCD.with(Fonts::FONT4).with(Fonts::GFXFF);
	assert!(fonts.contains(Fonts::FONT4));
	assert!(!fonts.contains(Fonts::FONT2));
	assert_eq!(
		fonts.symbols().collect::<Vec<_>>(),
		["LOAD_GLCD", "LOAD_FONT4", "LOAD_GFXFF"]
	);
	assert!(Fonts::NONE.is_empty());
}

#[cfg(test)]
#[test]
fn from_defines_errors() {
	let no_driver = [Define::value("TFT_WIDTH", "240")];
	assert!(Setup::from_defines(&no_driver).is_err());

	let two_drivers = [
		Define::flag("ILI9341_DRIVER"),
		Define::flag("ST7789_DRIVER"),
	];
	assert!(Setup::from_defines(&two_drivers).is_err());

	let bad_pin = [Define::flag("ILI9341_DRIVER"), Define::value("TFT_CS", "-7")];
	assert!(Setup::from_defines(&bad_pin).is_err());

	let bad_clock = [
		Define::flag("ILI9341_DRIVER"),
		Define::value("SPI_FREQUENCY", "fast"),
	];
	assert!(Setup::from_defines(&bad_clock).is_err());

	let ports = [
		Define::flag("ILI9341_DRIVER"),
		Define::flag("USE_HSPI_PORT"),
		Define::flag("USE_FSPI_PORT"),
	];
	assert!(Setup::from_defines(&ports).is_err());
}

#[cfg(test)]
#[test]
fn from_defines_minimal() {
	let defines = [
		Define::flag("ST7789_DRIVER"),
		Define::value("TFT_DC", "0x10"),
		Define::value("SPI_FREQUENCY", "40000000UL"),
		Define::value("TFT_BACKLIGHT_ON", "LOW"),
		Define::flag("SPI_18BIT_DRIVER"),
	];
	let setup = Setup::from_defines(&defines).unwrap();

	assert_eq!(setup.driver, DriverTag::St7789);
	assert_eq!(setup.resolution(), (240, 320));
	assert_eq!(setup.pins.dc, Some(Pin::Gpio(16)));
	assert_eq!(setup.pins.rst, None);
	assert_eq!(setup.clocks.write, Some(40_000_000));
	assert_eq!(setup.backlight_on, Some(BacklightLevel::Low));
	assert_eq!(setup.spi_port, SpiPort::Vspi);
	assert_eq!(setup.inversion, None);
	assert_eq!(setup.extra, [Define::flag("SPI_18BIT_DRIVER")]);
}

#[cfg(test)]
#[test]
fn from_defines_unknown_driver() {
	let defines = [
		Define::flag("ILI9999_DRIVER"),
		Define::value("TFT_WIDTH", "240"),
	];
	let err = Setup::from_defines(&defines).unwrap_err();
	assert!(err.to_string().contains("ILI9999_DRIVER"), "{}", err);

	let defines = [Define::flag("HX8357C_DRIVER"), Define::flag("SPI_18BIT_DRIVER")];
	let setup = Setup::from_defines(&defines).unwrap();
	assert_eq!(setup.driver, DriverTag::Hx8357c);
	assert_eq!(setup.resolution(), (320, 480));
	assert_eq!(DriverTag::from_symbol("SSD1963_800_DRIVER"), Some(DriverTag::Ssd1963_800));
	assert_eq!(DriverTag::Ili9342.native_resolution(), (320, 240));
}

#[cfg(test)]
#[test]
fn inversion_keeps_note() {
	let setup = Setup {
		inversion: Some(true),
		..crate::config::SETUP
	};
	let inversion = setup
		.to_defines()
		.into_iter()
		.find(|a| a.name == INVERSION_ON)
		.unwrap();
	assert_eq!(inversion.comment.as_deref(), Some(INVERSION_NOTE));

	let setup = Setup {
		inversion: Some(false),
		..crate::config::SETUP
	};
	assert!(
		setup
			.to_defines()
			.iter()
			.any(|a| a.name == INVERSION_OFF && a.comment.is_none())
	);
}
