//! Derived names for duplicated notes.
//!
//! `draft.md` copies to `draft-copy.md`, then `draft-copy-2.md`, and so on.
//! A title that already carries a `-copy[-N]` suffix continues its sequence
//! instead of stacking another suffix.

use once_cell::sync::Lazy;
use regex::Regex;

static COPY_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<base>.+?)-copy(?:-(?P<n>\d+))?$").expect("valid copy suffix regex")
});

/// Returns the `attempt`-th copy candidate for `title` (0-based).
///
/// Folder prefixes (`journal/`) and the file extension are preserved.
pub fn copy_title(title: &str, attempt: u32) -> String {
    let (dir, file) = match title.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, title),
    };
    let (stem, ext) = split_extension(file);

    let (base, first) = match COPY_SUFFIX_RE.captures(stem) {
        Some(caps) => {
            let base = caps.name("base").map_or(stem, |m| m.as_str());
            let current = caps
                .name("n")
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(1);
            (base, current.saturating_add(1))
        }
        None => (stem, 1),
    };

    let n = first.saturating_add(attempt);
    let name = if n == 1 {
        format!("{base}-copy{ext}")
    } else {
        format!("{base}-copy-{n}{ext}")
    };
    match dir {
        Some(dir) => format!("{dir}/{name}"),
        None => name,
    }
}

fn split_extension(file: &str) -> (&str, &str) {
    match file.rfind('.') {
        Some(idx) if idx > 0 => (&file[..idx], &file[idx..]),
        _ => (file, ""),
    }
}
