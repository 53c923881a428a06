//! Relative path handling shared by both backends.
//!
//! Relative paths inside the file source are always `/`-separated, with no
//! backslashes and no leading, trailing or doubled separators. Hosts hand us
//! whatever their platform produces; everything goes through `segments` first.

/// Extensions that identify theater files, matched case-insensitively.
pub const THEATER_EXTENSIONS: &[&str] = &[".mov", ".blf", ".film"];

/// Split a host-supplied path into its non-empty segments, accepting either
/// separator.
pub fn segments(raw: &str) -> Vec<&str> {
    raw.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

/// Whether a segment names an actual child rather than the directory itself
/// or its parent.
pub fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\0')
}

/// Normalize a host-supplied path to the canonical `/`-separated form.
pub fn normalize(raw: &str) -> String {
    segments(raw).join("/")
}

/// Append one name to a relative prefix.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Archive entry name for a file: `<game>/<relative path>`, forward slashes only.
pub fn entry_name(game_name: &str, relative_path: &str) -> String {
    format!("{}/{}", game_name, relative_path).replace('\\', "/")
}

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions(Vec<String>);

impl Extensions {
    /// Build an allow-list. A missing leading dot is added.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|e| {
                    let e = e.as_ref().trim().to_ascii_lowercase();
                    if e.starts_with('.') { e } else { format!(".{}", e) }
                })
                .filter(|e| e.len() > 1)
                .collect(),
        )
    }

    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.0.iter().any(|ext| lower.ends_with(ext.as_str()))
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new(THEATER_EXTENSIONS)
    }
}
