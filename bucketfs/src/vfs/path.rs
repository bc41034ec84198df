//! Lexical path helpers. Keys are always `prefix + clean(path)`.

pub const SEPARATOR: char = '/';

/// Normalizes `.`/`..`, collapses repeated separators and strips leading
/// ones. `..` never climbs above the root.
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split(SEPARATOR) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Cleans a storage prefix and gives it a trailing separator when non-empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let cleaned = clean(prefix);
    if cleaned.is_empty() {
        cleaned
    } else {
        format!("{cleaned}{SEPARATOR}")
    }
}

pub fn join(parts: &[&str]) -> String {
    clean(&parts.join("/"))
}

/// Last segment of a cleaned path; `/` for the root.
pub fn base_name(path: &str) -> &str {
    match path.rsplit_once(SEPARATOR) {
        Some((_, name)) => name,
        None if path.is_empty() => "/",
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("/objects/pack/../info/./packs"), "objects/info/packs");
        assert_eq!(clean("refs//heads/"), "refs/heads");
        assert_eq!(clean("../../etc/passwd"), "etc/passwd");
        assert_eq!(clean("/"), "");
        assert_eq!(clean("."), "");
    }

    #[test]
    fn test_prefix_and_names() {
        assert_eq!(normalize_prefix("repos/42"), "repos/42/");
        assert_eq!(normalize_prefix("/repos/42/"), "repos/42/");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(join(&["refs", "heads", "main"]), "refs/heads/main");
        assert_eq!(base_name("refs/heads/main"), "main");
        assert_eq!(base_name("HEAD"), "HEAD");
        assert_eq!(base_name(""), "/");
    }
}
