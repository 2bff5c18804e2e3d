use std::fmt;

use crate::config::MAX_SPI_FREQUENCY;
use crate::model::DriverTag;
use crate::model::Pin;
use crate::model::Pins;
use crate::model::Setup;

/// Something the driver library would only reveal as a hardware symptom.
/// Findings are reported, never enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
	PinNotConnected {
		name: &'static str,
	},
	SharedPin {
		first: &'static str,
		second: &'static str,
		gpio: u8,
	},
	ResolutionMismatch {
		driver: DriverTag,
		expected: (u16, u16),
		actual: (u16, u16),
	},
	BacklightPolarityMissing,
	ClockOrdering {
		write: u32,
		other: &'static str,
		hz: u32,
	},
	ClockAboveLimit {
		write: u32,
		limit: u32,
	},
}

impl fmt::Display for Finding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::PinNotConnected { name } => write!(f, "{} is not connected (-1)", name),
			Self::SharedPin {
				first,
				second,
				gpio,
			} => write!(f, "{} and {} share GPIO{}", first, second, gpio),
			Self::ResolutionMismatch {
				driver,
				expected,
				actual,
			} => write!(
				f,
				"{}x{} does not match {} ({}x{})",
				actual.0,
				actual.1,
				driver.symbol(),
				expected.0,
				expected.1
			),
			Self::BacklightPolarityMissing => {
				write!(f, "{} set without a backlight polarity", Pins::BL)
			}
			Self::ClockOrdering { write, other, hz } => {
				write!(f, "write clock {}Hz is below {} {}Hz", write, other, hz)
			}
			Self::ClockAboveLimit { write, limit } => {
				write!(f, "write clock {}Hz exceeds the {}Hz bus limit", write, limit)
			}
		}
	}
}

pub fn audit(setup: &Setup) -> Vec<Finding> {
	let mut findings = Vec::new();
	let pins = setup.pins.named();

	for (i, &(name, pin)) in pins.iter().enumerate() {
		match pin {
			Some(Pin::NotConnected) if name != Pins::RST => {
				findings.push(Finding::PinNotConnected { name });
			}
			Some(Pin::Gpio(gpio)) => {
				let shared = pins[i + 1..]
					.iter()
					.find(|(_, a)| *a == Some(Pin::Gpio(gpio)));
				if let Some((second, _)) = shared {
					findings.push(Finding::SharedPin {
						first: name,
						second: *second,
						gpio,
					});
				}
			}
			_ => {}
		}
	}

	let expected = setup.driver.native_resolution();
	let actual = setup.resolution();
	if expected != actual {
		findings.push(Finding::ResolutionMismatch {
			driver: setup.driver,
			expected,
			actual,
		});
	}

	if matches!(setup.pins.bl, Some(Pin::Gpio(_))) && setup.backlight_on.is_none() {
		findings.push(Finding::BacklightPolarityMissing);
	}

	if let Some(write) = setup.clocks.write {
		for (other, hz) in [("read", setup.clocks.read), ("touch", setup.clocks.touch)] {
			if let Some(hz) = hz.filter(|hz| write < *hz) {
				findings.push(Finding::ClockOrdering { write, other, hz });
			}
		}
		if write > MAX_SPI_FREQUENCY {
			findings.push(Finding::ClockAboveLimit {
				write,
				limit: MAX_SPI_FREQUENCY,
			});
		}
	}

	findings
}

#[cfg(test)]
#[test]
fn audit_reports_without_rejecting() {
	let mut setup = crate::config::SETUP;
	setup.driver = DriverTag::St7735;
	setup.pins.cs = Some(Pin::NotConnected);
	setup.pins.touch_cs = Some(Pin::Gpio(2));
	setup.backlight_on = None;
	setup.clocks.write = Some(90_000_000);
	setup.clocks.touch = Some(100_000_000);

	let findings = audit(&setup);
	assert_eq!(
		findings,
		[
			Finding::PinNotConnected { name: "TFT_CS" },
			Finding::SharedPin {
				first: "TFT_DC",
				second: "TOUCH_CS",
				gpio: 2,
			},
			Finding::ResolutionMismatch {
				driver: DriverTag::St7735,
				expected: (128, 160),
				actual: (240, 320),
			},
			Finding::BacklightPolarityMissing,
			Finding::ClockOrdering {
				write: 90_000_000,
				other: "touch",
				hz: 100_000_000,
			},
			Finding::ClockAboveLimit {
				write: 90_000_000,
				limit: 80_000_000,
			},
		]
	);
	assert_eq!(findings[1].to_string(), "TFT_DC and TOUCH_CS share GPIO2");
}

#[cfg(test)]
#[test]
fn audit_read_clock_above_write() {
	let mut setup = crate::config::SETUP;
	setup.clocks.write = Some(10_000_000);
	setup.clocks.read = Some(20_000_000);

	let findings = audit(&setup);
	assert_eq!(
		findings,
		[Finding::ClockOrdering {
			write: 10_000_000,
			other: "read",
			hz: 20_000_000,
		}]
	);
	assert_eq!(
		findings[0].to_string(),
		"write clock 10000000Hz is below read 20000000Hz"
	);
}
