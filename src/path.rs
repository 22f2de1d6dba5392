use alloc::string::String;
use core::fmt;

/// A `/` separated build path. Backslashes are normalized on construction.
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Path(String);

const SEP: char = '/';

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.0)
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Self(path.replace('\\', "/"))
    }
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `path`, unless it is absolute.
    pub fn join(&self, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        if path.starts_with(SEP) || self.0.is_empty() {
            return Self::from(path);
        }
        let mut joined = String::from(self.0.trim_end_matches(SEP));
        joined.push(SEP);
        joined.push_str(path);
        Self(joined)
    }

    pub fn file_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches(SEP);
        trimmed.rsplit(SEP).next().unwrap_or(trimmed)
    }

    /// The extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.file_name().rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }
}
