//! Helpers over relative-POSIX repository paths.
//!
//! Directories are an emergent concept: a "folder" exists only as a shared
//! path prefix over tree entries, plus the `.gitkeep` placeholder
//! convention for otherwise-empty ones.

/// Placeholder blob name that makes an empty folder visible.
pub const GITKEEP: &str = ".gitkeep";

/// Join two relative path segments, tolerating an empty base.
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// The parent directory of a path ("" for top-level entries).
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// The final component of a path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Derive the sibling name used by duplicate: `"<base> (copy)<ext>"`.
///
/// The same name is produced every time; a repeated duplicate overwrites
/// the previous copy rather than probing for "(copy 2)".
pub fn duplicate_name(path: &str) -> String {
    let dir = parent(path);
    let name = file_name(path);
    let copy = match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let (base, ext) = name.split_at(idx);
            format!("{base} (copy){ext}")
        }
        _ => format!("{name} (copy)"),
    };
    join(dir, &copy)
}

/// Document id for the metadata store: `"{repo_full_name}:{path}"` with
/// separator characters replaced so the id is safe as a single key.
pub fn metadata_doc_id(repo_full_name: &str, path: &str) -> String {
    format!("{repo_full_name}:{path}").replace(['/', '\\', '#', '?'], "_")
}

/// True when `candidate` equals `prefix` or lives underneath it.
pub fn is_within(candidate: &str, prefix: &str) -> bool {
    candidate == prefix || candidate.starts_with(&format!("{prefix}/"))
}

/// Rewrite `old_prefix` to `new_prefix` at the front of `path`.
/// Returns `None` when `path` is outside `old_prefix`.
pub fn rewrite_prefix(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        return Some(new_prefix.to_string());
    }
    path.strip_prefix(&format!("{old_prefix}/"))
        .map(|suffix| format!("{new_prefix}/{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_empty_base() {
        assert_eq!(join("", "a.txt"), "a.txt");
        assert_eq!(join("docs", "a.txt"), "docs/a.txt");
        assert_eq!(join("docs/", "a.txt"), "docs/a.txt");
    }

    #[test]
    fn parent_and_file_name() {
        assert_eq!(parent("docs/notes/a.txt"), "docs/notes");
        assert_eq!(parent("a.txt"), "");
        assert_eq!(file_name("docs/a.txt"), "a.txt");
        assert_eq!(file_name("a.txt"), "a.txt");
    }

    #[test]
    fn duplicate_name_preserves_extension() {
        assert_eq!(duplicate_name("notes.txt"), "notes (copy).txt");
        assert_eq!(duplicate_name("docs/notes.txt"), "docs/notes (copy).txt");
        assert_eq!(duplicate_name("Makefile"), "Makefile (copy)");
        // A leading dot is not an extension separator.
        assert_eq!(duplicate_name(".env"), ".env (copy)");
    }

    #[test]
    fn duplicate_name_is_stable() {
        // Second duplicate derives the same target, so it overwrites.
        let first = duplicate_name("notes.txt");
        assert_eq!(duplicate_name("notes.txt"), first);
    }

    #[test]
    fn metadata_doc_id_is_sanitized() {
        assert_eq!(
            metadata_doc_id("acme/store", "docs/a.txt"),
            "acme_store:docs_a.txt"
        );
    }

    #[test]
    fn prefix_rewrite() {
        assert_eq!(
            rewrite_prefix("docs/a.txt", "docs", "archive").as_deref(),
            Some("archive/a.txt")
        );
        assert_eq!(
            rewrite_prefix("docs", "docs", "archive").as_deref(),
            Some("archive")
        );
        assert_eq!(rewrite_prefix("docs2/a.txt", "docs", "archive"), None);
        assert!(is_within("docs/a.txt", "docs"));
        assert!(!is_within("docs2/a.txt", "docs"));
    }
}
