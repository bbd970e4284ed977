//! Path and category naming.
//!
//! Record files live at `<category dir>/<id>.<ext>`. The category directory
//! is the underscored form of the category name, with `/` separating
//! namespaces:
//!
//! ```text
//! nsync_test_foo/1.json        -> NsyncTestFoo, "1"
//! admin/audit_entry/7.json     -> Admin::AuditEntry, "7"
//! ```

use crate::category::Category;
use std::path::Path;

/// Repository bookkeeping file that is never treated as a record.
pub const IGNORE_FILE: &str = ".gitignore";

/// Converts a directory name into a category name.
///
/// Underscore-separated words are capitalized and joined; `/` becomes the
/// `::` namespace separator.
///
/// ```
/// use gitfeed_core::naming::camelize;
///
/// assert_eq!(camelize("foo_bar"), "FooBar");
/// assert_eq!(camelize("admin/foo_bar"), "Admin::FooBar");
/// ```
pub fn camelize(dir: &str) -> String {
    dir.split('/')
        .map(|segment| {
            segment
                .split('_')
                .filter(|word| !word.is_empty())
                .map(capitalize)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("::")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Converts a category name into its directory name. Inverse of
/// [`camelize`] for ordinary names.
///
/// ```
/// use gitfeed_core::naming::underscore;
///
/// assert_eq!(underscore("FooBar"), "foo_bar");
/// assert_eq!(underscore("Admin::FooBar"), "admin/foo_bar");
/// assert_eq!(underscore("HTMLParser"), "html_parser");
/// ```
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.replace("::", "/").chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary {
                out.push('_');
            }
        }
        if c == '-' {
            out.push('_');
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Splits a record path into its category and record id.
///
/// Returns `None` for the ignore file and for paths without a parent
/// directory; neither names a record.
pub fn category_and_id(path: &str) -> Option<(Category, String)> {
    if is_ignored(path) {
        return None;
    }
    let path = Path::new(path);
    let dir = path.parent()?.to_str()?;
    if dir.is_empty() {
        return None;
    }
    let id = path.file_stem()?.to_str()?;
    Some((Category::new(camelize(dir)), id.to_string()))
}

/// Returns true if `path` is the repository ignore file.
pub fn is_ignored(path: &str) -> bool {
    Path::new(path)
        .file_name()
        .is_some_and(|name| name == IGNORE_FILE)
}

/// Builds the relative path of a record file.
///
/// ```
/// use gitfeed_core::naming::record_file_name;
///
/// assert_eq!(record_file_name("NsyncTestFoo", "1", "json"), "nsync_test_foo/1.json");
/// ```
pub fn record_file_name(category: &str, id: &str, extension: &str) -> String {
    format!("{}/{}.{}", underscore(category), id, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn camelize_words_and_namespaces() {
        assert_eq!(camelize("nsync_test_foo"), "NsyncTestFoo");
        assert_eq!(camelize("bar"), "Bar");
        assert_eq!(camelize("admin/audit_entry"), "Admin::AuditEntry");
        assert_eq!(camelize("already_Capital"), "AlreadyCapital");
    }

    #[test]
    fn underscore_handles_digits() {
        assert_eq!(underscore("Api2Client"), "api2_client");
        assert_eq!(underscore("NsyncTestBar"), "nsync_test_bar");
    }

    #[test]
    fn category_and_id_from_paths() {
        let (category, id) = category_and_id("nsync_test_foo/1.json").unwrap();
        assert_eq!(category.as_str(), "NsyncTestFoo");
        assert_eq!(id, "1");

        let (category, id) = category_and_id("admin/audit_entry/abc.cbor").unwrap();
        assert_eq!(category.as_str(), "Admin::AuditEntry");
        assert_eq!(id, "abc");
    }

    #[test]
    fn paths_that_are_not_records() {
        assert!(category_and_id(".gitignore").is_none());
        assert!(category_and_id("foo/.gitignore").is_none());
        assert!(category_and_id("1.json").is_none());
    }

    #[test]
    fn ignore_file_must_be_final_component() {
        assert!(is_ignored(".gitignore"));
        assert!(is_ignored("docs/.gitignore"));
        assert!(!is_ignored(".gitignore_backup/1.json"));
    }

    proptest! {
        #[test]
        fn underscore_inverts_camelize(
            dir in "[a-z]{2,6}(_[a-z]{2,6}){0,3}(/[a-z]{2,6}(_[a-z]{2,6}){0,2}){0,2}"
        ) {
            prop_assert_eq!(underscore(&camelize(&dir)), dir);
        }
    }
}
