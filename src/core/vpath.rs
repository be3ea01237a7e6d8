//! Virtual path helpers
//!
//! Provider URLs always use `/`; `\` is accepted on input and treated as a
//! separator.

pub const SEPARATOR: char = '/';

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Replace `\` with `/`
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Join two path fragments with exactly one separator
pub fn combine(base: &str, tail: &str) -> String {
    if base.is_empty() {
        return tail.to_string();
    }
    if tail.is_empty() {
        return base.to_string();
    }

    let base_ends = base.ends_with(is_separator);
    let tail_starts = tail.starts_with(is_separator);
    match (base_ends, tail_starts) {
        (false, false) => format!("{}{}{}", base, SEPARATOR, tail),
        (true, true) => format!("{}{}", base, &tail[1..]),
        _ => format!("{}{}", base, tail),
    }
}

/// Join any number of fragments
pub fn combine_all(parts: &[&str]) -> String {
    parts
        .iter()
        .fold(String::new(), |acc, part| combine(&acc, part))
}

/// Everything before the last separator, ignoring trailing separators
pub fn parent_folder(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    match trimmed.rfind(is_separator) {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Last path component
pub fn file_name(path: &str) -> &str {
    match path.rfind(is_separator) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Last path component without its final extension
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// `parent/stem` of a path: the path with its final extension removed
pub fn without_extension(path: &str) -> String {
    combine(parent_folder(path), file_stem(path))
}
