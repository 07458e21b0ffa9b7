use crate::error::JobError;

const COMPRESSIONS: [&str; 4] = ["bz2", "gz", "xz", "zst"];

/// Lowercases `value` and collapses every run of non-alphanumeric characters into a single dash.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Splits the file name of an url or path into its archive format and compression, e.g. `rootfs.tar.xz` gives
/// `(Some("tar"), Some("xz"))` and `Image` gives `(None, None)`.
pub fn compression(url: &str) -> (Option<&str>, Option<&str>) {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    if let Some(stem) = file_name.strip_suffix(".tgz") {
        if !stem.is_empty() {
            return (Some("tar"), Some("gz"));
        }
    }

    let parts: Vec<&str> = file_name.split('.').collect();
    match parts.as_slice() {
        [] | [_] => (None, None),
        [_, last] if COMPRESSIONS.contains(last) => (None, Some(*last)),
        [_, last] => (Some(*last), None),
        [.., format, last] if COMPRESSIONS.contains(last) => (Some(*format), Some(*last)),
        [.., last] => (Some(*last), None),
    }
}

/// Compression name as understood by LAVA deploy actions.
pub fn lava_compression(url: &str) -> Option<&'static str> {
    match compression(url).1 {
        Some("bz2") => Some("bz2"),
        Some("gz") => Some("gz"),
        Some("xz") => Some("xz"),
        Some("zst") => Some("zstd"),
        _ => None,
    }
}

/// Tokenizes shell-style arguments and joins them back with single spaces.
pub fn normalize_args(argument: &str, value: &str) -> Result<String, JobError> {
    let words = shlex::split(value).ok_or_else(|| JobError::invalid(format!("argument --{} is not a valid shell string", argument)))?;
    Ok(words.join(" "))
}

/// Quotes each command so the joined string is safe to pass to a shell.
pub fn quote_commands(commands: &[String]) -> Result<String, JobError> {
    shlex::try_join(commands.iter().map(String::as_str)).map_err(|e| JobError::invalid(format!("argument --commands is invalid: {}", e)))
}

/// Formats names as `'a', 'b' and 'c'`.
pub fn human_list(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| format!("'{}'", name)).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}
