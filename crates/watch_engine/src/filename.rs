use std::fmt::Write;

use sha2::{Digest, Sha256};

const MAX_STEM_LEN: usize = 80;

/// Windows-safe, deterministic outbox filename: `{sanitized_subject}--{short_hash}.eml`.
///
/// The hash covers subject and body, so the same notification always maps to
/// the same file.
pub fn message_filename(subject: &str, body: &str) -> String {
    let stem = sanitize_stem(subject);
    let hash = short_hash(&[subject, body]);
    format!("{stem}--{hash}.eml")
}

fn sanitize_stem(input: &str) -> String {
    let mut stem = String::with_capacity(input.len());
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }
    let mut stem = stem.trim_matches(&['_', ' ', '.'][..]).to_string();
    if stem.is_empty() {
        stem = "notification".to_string();
    }
    if stem.len() > MAX_STEM_LEN {
        let mut cut = MAX_STEM_LEN;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    // COM1..COM9 and LPT1..LPT9 are reserved as well.
    matches!(upper.as_str(), "CON" | "PRN" | "AUX" | "NUL")
        || (upper.len() == 4
            && (upper.starts_with("COM") || upper.starts_with("LPT"))
            && matches!(upper.as_bytes()[3], b'1'..=b'9'))
}

fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
