//! Replay metadata extraction.
//!
//! Theater files are opaque binary recordings. Only a handful of fields are
//! read out of them, each at a fixed offset or (for the scenario path in newer
//! files) at the first occurrence of a known path marker. Extraction never
//! fails: anything that cannot be read is simply absent.

use serde::Serialize;
use strum::{AsRefStr, Display};

/// Title, UTF-16LE.
pub const TITLE_OFFSET: usize = 0x00C0;
/// Session name, single-byte.
pub const SESSION_OFFSET: usize = 0x03D8;
/// Scenario path in the legacy layout, single-byte.
pub const LEGACY_SCENARIO_OFFSET: usize = 0x092C;
/// Player name in the legacy layout, UTF-16LE.
pub const LEGACY_PLAYER_OFFSET: usize = 0x0BD0;
/// Player name in the file header, single-byte. Fallback only.
pub const HEADER_PLAYER_OFFSET: usize = 0x0088;

/// Every scenario path starts with this.
pub const SCENARIO_MARKER: &str = "haloreach\\maps\\";

/// Placeholder appended by [`strip_session_pii`] when no replacement is configured.
pub const DEFAULT_PII_REPLACEMENT: &str = "HALO@RUNS";

/// Prefix length that covers every fixed offset above with room to spare.
pub const RECOMMENDED_PREFIX_BYTES: usize = 4096;

/// Which record shape a replay file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LayoutVariant {
    /// Scenario path at the fixed legacy offset.
    Legacy,
    /// Scenario path located by scanning for the marker.
    Extended,
    Unknown,
}

/// Fields read from the head of a replay file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMetadata {
    pub title: Option<String>,
    pub session_name: Option<String>,
    pub scenario_path_or_url: Option<String>,
    pub player_name: Option<String>,
    pub layout_variant: LayoutVariant,
    pub scenario_offset: Option<usize>,
}

/// Extract metadata from the leading bytes of a replay file.
///
/// Supply at least [`RECOMMENDED_PREFIX_BYTES`]; a shorter buffer just leaves
/// more fields absent.
pub fn extract(bytes: &[u8]) -> ReplayMetadata {
    let legacy_scenario = clean(read_asciiz(bytes, LEGACY_SCENARIO_OFFSET));
    let scenario_offset = resolve_scenario_offset(bytes, legacy_scenario.as_deref());

    let scenario = match scenario_offset {
        Some(offset) => clean(read_asciiz(bytes, offset)),
        None => legacy_scenario,
    };

    let mut player = clean(read_utf16z(bytes, LEGACY_PLAYER_OFFSET));
    if !player.as_deref().is_some_and(is_likely_player) {
        player = clean(read_asciiz(bytes, HEADER_PLAYER_OFFSET));
    }

    ReplayMetadata {
        title: clean(read_utf16z(bytes, TITLE_OFFSET)),
        session_name: clean(read_asciiz(bytes, SESSION_OFFSET)),
        scenario_path_or_url: scenario,
        player_name: player.map(|p| normalize_player_name(&p)),
        layout_variant: layout_variant_for(scenario_offset),
        scenario_offset,
    }
}

/// Determine the layout variant without reading any other field.
pub fn detect_layout_variant(bytes: &[u8]) -> LayoutVariant {
    let legacy_scenario = clean(read_asciiz(bytes, LEGACY_SCENARIO_OFFSET));
    layout_variant_for(resolve_scenario_offset(bytes, legacy_scenario.as_deref()))
}

/// Redact the user-identifying tail of a session name.
///
/// Keeps everything up to and including the second `@` and appends
/// `replacement`. Names with fewer than two `@` are returned unchanged.
///
/// ```
/// use theater_core::metadata::strip_session_pii;
///
/// assert_eq!(strip_session_pii("A@B@C", "X"), "A@B@X");
/// assert_eq!(strip_session_pii("only@one", "X"), "only@one");
/// ```
pub fn strip_session_pii(session_name: &str, replacement: &str) -> String {
    if session_name.trim().is_empty() {
        return session_name.to_string();
    }
    match session_name.match_indices('@').nth(1) {
        Some((second_at, _)) => format!("{}{}", &session_name[..=second_at], replacement),
        None => session_name.to_string(),
    }
}

fn resolve_scenario_offset(bytes: &[u8], legacy_scenario: Option<&str>) -> Option<usize> {
    if legacy_scenario.is_some_and(is_likely_scenario) {
        Some(LEGACY_SCENARIO_OFFSET)
    } else {
        find_marker(bytes, SCENARIO_MARKER.as_bytes())
    }
}

fn layout_variant_for(scenario_offset: Option<usize>) -> LayoutVariant {
    match scenario_offset {
        None => LayoutVariant::Unknown,
        Some(LEGACY_SCENARIO_OFFSET) => LayoutVariant::Legacy,
        Some(_) => LayoutVariant::Extended,
    }
}

/// NUL-terminated single-byte string. Non-ASCII bytes decode as `?`.
fn read_asciiz(bytes: &[u8], offset: usize) -> Option<String> {
    let tail = bytes.get(offset..).filter(|t| !t.is_empty())?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Some(
        tail[..end]
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect(),
    )
}

/// NUL-terminated UTF-16LE string. The terminator is an aligned `00 00` pair.
fn read_utf16z(bytes: &[u8], offset: usize) -> Option<String> {
    if offset.checked_add(1)? >= bytes.len() {
        return None;
    }
    let units: Vec<u16> = bytes[offset..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// Blank strings are absent.
fn clean(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_likely_scenario(value: &str) -> bool {
    value
        .get(..SCENARIO_MARKER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SCENARIO_MARKER))
}

fn is_likely_player(value: &str) -> bool {
    !value.trim().is_empty() && value.chars().count() >= 2
}

/// Trim, then unwrap `I name I` / `| name |` decorations.
fn normalize_player_name(value: &str) -> String {
    let trimmed = value.trim();
    let wrapped = trimmed.chars().count() >= 5
        && (trimmed.starts_with("I ") || trimmed.starts_with("| "))
        && (trimmed.ends_with(" I") || trimmed.ends_with(" |"));
    if !wrapped {
        return trimmed.to_string();
    }

    let inner = trimmed[2..trimmed.len() - 2].trim();
    if inner.is_empty() {
        trimmed.to_string()
    } else {
        inner.to_string()
    }
}

/// Offset of the first occurrence of `marker`.
fn find_marker(bytes: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || marker.len() > bytes.len() {
        return None;
    }
    bytes.windows(marker.len()).position(|window| window == marker)
}
