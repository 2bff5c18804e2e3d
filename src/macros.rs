/// `&OsStr` literal for matching environment values.
macro_rules! osstr {
	($s:literal) => {
		std::ffi::OsStr::new($s)
	};
}
