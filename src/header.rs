use anyhow::bail;
use log::trace;
use log::warn;

/// One `#define NAME [VALUE] [// comment]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
	pub name: String,
	pub value: Option<String>,
	pub comment: Option<String>,
}

impl Define {
	#[inline]
	pub fn flag(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: None,
			comment: None,
		}
	}

	#[inline]
	pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: Some(value.into()),
			comment: None,
		}
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}
}

/// Blank-line separated groups used when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
	Info,
	Driver,
	Geometry,
	Backlight,
	Pins,
	Fonts,
	SmoothFont,
	Clocks,
	Port,
	Color,
	Other,
}

impl Section {
	fn of(name: &str) -> Self {
		match name {
			"USER_SETUP_INFO" => Self::Info,
			"TFT_WIDTH" | "TFT_HEIGHT" => Self::Geometry,
			"TFT_BL" | "TFT_BACKLIGHT_ON" => Self::Backlight,
			"TFT_MISO" | "TFT_MOSI" | "TFT_SCLK" | "TFT_CS" | "TFT_DC" | "TFT_RST" | "TOUCH_CS" => {
				Self::Pins
			}
			"SMOOTH_FONT" => Self::SmoothFont,
			"TFT_INVERSION_ON" | "TFT_INVERSION_OFF" => Self::Color,
			a if a.ends_with("_DRIVER") => Self::Driver,
			a if a.starts_with("LOAD_") => Self::Fonts,
			a if a.starts_with("SPI_") && a.ends_with("FREQUENCY") => Self::Clocks,
			a if a.starts_with("USE_") && a.ends_with("_PORT") => Self::Port,
			_ => Self::Other,
		}
	}
}

pub fn render(defines: &[Define]) -> String {
	let mut out = String::with_capacity(defines.len() * 32);
	let mut section = None;

	for define in defines {
		let a_section = Section::of(&define.name);
		if section.is_some_and(|a| a != a_section) {
			out.push('\n');
		}
		section = Some(a_section);

		out.push_str("#define ");
		out.push_str(&define.name);
		if let Some(value) = &define.value {
			out.push(' ');
			out.push_str(value);
		}
		if let Some(comment) = &define.comment {
			out.push_str(" // ");
			out.push_str(comment);
		}
		out.push('\n');
	}

	out
}

pub fn parse(text: &str) -> anyhow::Result<Vec<Define>> {
	let mut defines: Vec<Define> = Vec::new();
	let mut in_block_comment = false;

	for (num, raw) in text.lines().enumerate() {
		let num = num + 1;
		let stripped = strip_block_comments(raw, &mut in_block_comment);
		let line = stripped.trim();

		if line.is_empty() || line.starts_with("//") {
			continue;
		}

		let Some(directive) = line.strip_prefix('#') else {
			bail!("line {}: expected a preprocessor directive: {:?}", num, line);
		};
		let directive = directive.trim_start();
		let Some(body) = directive.strip_prefix("define") else {
			trace!("#[header] line {}: skip {:?}", num, line);
			continue;
		};
		if !body.starts_with(char::is_whitespace) {
			bail!("line {}: malformed define: {:?}", num, line);
		}

		let (body, comment) = split_comment(body);
		let body = body.trim();
		let name_len = body
			.find(|a: char| !(a.is_ascii_alphanumeric() || a == '_'))
			.unwrap_or(body.len());
		let (name, value) = body.split_at(name_len);

		if name.is_empty() || name.starts_with(|a: char| a.is_ascii_digit()) {
			bail!("line {}: invalid symbol name in {:?}", num, line);
		}
		if value.starts_with('(') {
			bail!("line {}: function-like macro {} is not supported", num, name);
		}

		let value = value.trim();
		let define = Define {
			name: name.to_string(),
			value: (!value.is_empty()).then(|| value.to_string()),
			comment: comment.map(str::to_string),
		};

		match defines.iter_mut().find(|a| a.name == define.name) {
			Some(prev) => {
				warn!("#[header] line {}: {} redefined", num, define.name);
				*prev = define;
			}
			None => defines.push(define),
		}
	}

	if in_block_comment {
		bail!("unterminated block comment");
	}

	Ok(defines)
}

/// Drops `/* */` spans outside string literals. `in_block` carries an
/// unterminated span over to the next line.
fn strip_block_comments(line: &str, in_block: &mut bool) -> String {
	let mut out = String::with_capacity(line.len());
	let mut in_string = false;
	let mut escaped = false;
	let mut chars = line.char_indices().peekable();

	while let Some((i, a)) = chars.next() {
		let next = chars.peek().map(|&(_, b)| b);

		if *in_block {
			if a == '*' && next == Some('/') {
				chars.next();
				*in_block = false;
				out.push(' ');
			}
			continue;
		}

		match a {
			_ if escaped => escaped = false,
			'\\' if in_string => escaped = true,
			'"' => in_string = !in_string,
			'/' if !in_string && next == Some('*') => {
				chars.next();
				*in_block = true;
				continue;
			}
			'/' if !in_string && next == Some('/') => {
				out.push_str(&line[i..]);
				break;
			}
			_ => {}
		}
		out.push(a);
	}

	out
}

/// Splits a trailing `//` comment, ignoring `//` inside string literals.
fn split_comment(body: &str) -> (&str, Option<&str>) {
	let mut in_string = false;
	let mut escaped = false;
	let bytes = body.as_bytes();

	for (i, a) in bytes.iter().enumerate() {
		match a {
			_ if escaped => escaped = false,
			b'\\' if in_string => escaped = true,
			b'"' => in_string = !in_string,
			b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => {
				let comment = body[i + 2..].trim();
				return (&body[..i], (!comment.is_empty()).then_some(comment));
			}
			_ => {}
		}
	}

	(body, None)
}

#[cfg(test)]
#[test]
fn parse_lines() {
	let text = r#"
// leading comment
#ifndef USER_SETUP_LOADED
#define USER_SETUP_INFO "http://x//y"
/* block
   comment */
#  define TFT_RST  -1   // no reset line
#define LOAD_GLCD
#endif
"#;
	let defines = parse(text).unwrap();
	assert_eq!(
		defines,
		[
			Define::value("USER_SETUP_INFO", "\"http://x//y\""),
			Define::value("TFT_RST", "-1").with_comment("no reset line"),
			Define::flag("LOAD_GLCD"),
		]
	);
}

#[cfg(test)]
#[test]
fn parse_errors() {
	assert!(parse("TFT_CS 15").is_err());
	assert!(parse("#define MAX(a, b) a").is_err());
	assert!(parse("#define 9LIVES").is_err());
	assert!(parse("#defineX 1").is_err());
	assert!(parse("/* open").is_err());
}

#[cfg(test)]
#[test]
fn parse_redefined() {
	let defines = parse("#define TFT_CS 15\n#define TFT_DC 2\n#define TFT_CS 5\n").unwrap();
	assert_eq!(
		defines,
		[Define::value("TFT_CS", "5"), Define::value("TFT_DC", "2")]
	);
}

#[cfg(test)]
#[test]
fn render_sections() {
	let text = render(&[
		Define::flag("ILI9341_DRIVER"),
		Define::value("TFT_WIDTH", "240"),
		Define::value("TFT_HEIGHT", "320"),
		Define::flag("TFT_INVERSION_ON").with_comment("swapped background"),
	]);
	assert_eq!(
		text,
		"#define ILI9341_DRIVER\n\n#define TFT_WIDTH 240\n#define TFT_HEIGHT 320\n\n#define TFT_INVERSION_ON // swapped background\n"
	);
	assert_eq!(parse(&text).unwrap().len(), 4);
}

#[cfg(test)]
#[test]
fn reload_aligned_header() {
	let text = "#define TFT_WIDTH  240\n#define TFT_HEIGHT 320\n\n#define TFT_DC    2\n#define TFT_RST  -1\n#define TFT_INVERSION_ON //reversing fillscreen\n";
	let first = parse(text).unwrap();
	assert_eq!(first[2], Define::value("TFT_DC", "2"));
	assert_eq!(
		first[4],
		Define::flag("TFT_INVERSION_ON").with_comment("reversing fillscreen")
	);

	let second = parse(&render(&first)).unwrap();
	assert_eq!(first, second);
	assert_eq!(render(&first), render(&second));
}

#[cfg(test)]
#[test]
fn parse_block_comments_mid_line() {
	let defines = parse("#define ILI9341_DRIVER\n#define TFT_CS 15 /* chip select */\n").unwrap();
	assert_eq!(defines[1], Define::value("TFT_CS", "15"));

	let text = "#define TFT_CS 15 /* chip select,\n   see board */ #define TFT_DC 2\n#define TFT_RST /* none */ -1 // soft reset\n";
	let defines = parse(text).unwrap();
	assert_eq!(
		defines,
		[
			Define::value("TFT_CS", "15"),
			Define::value("TFT_DC", "2"),
			Define::value("TFT_RST", "-1").with_comment("soft reset"),
		]
	);

	let defines = parse("#define USER_SETUP_INFO \"a/*b*/c\" // x /* y\n#define LOAD_GLCD\n").unwrap();
	assert_eq!(
		defines,
		[
			Define::value("USER_SETUP_INFO", "\"a/*b*/c\"").with_comment("x /* y"),
			Define::flag("LOAD_GLCD"),
		]
	);
}
