//! Key normalization shared by all backends.
//!
//! Keys are `/`-separated. Joining behaves like a lexical path join on a rooted
//! path: empty and `.` segments vanish, `..` drops the previous segment and can
//! never climb above the root of the key. The result never starts or ends with
//! `/` and never contains `//`.

pub(crate) const SEPARATOR: char = '/';

/// Join a storage-wide prefix and a caller key into one normalized key.
///
/// Prefix and key are normalized separately, so a key's `..` segments cannot
/// escape the prefix. An empty prefix is the identity join:
/// `join_key("", k) == normalize_key(k)`.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = normalize_key(prefix);
    let key = normalize_key(key);
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key,
        (false, true) => prefix,
        (false, false) => format!("{}{}{}", prefix, SEPARATOR, key),
    }
}

/// Normalize a single key without a prefix.
pub fn normalize_key(key: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_is_identity() {
        assert_eq!(join_key("", "users/123/file.txt"), "users/123/file.txt");
    }

    #[test]
    fn no_double_separators() {
        assert_eq!(join_key("someprefix/sub/", "/users/123"), "someprefix/sub/users/123");
        assert_eq!(join_key("a//b", "c///d/"), "a/b/c/d");
    }

    #[test]
    fn keeps_intermediate_segments() {
        assert_eq!(join_key("p", "a/b/c/d.txt"), "p/a/b/c/d.txt");
    }

    #[test]
    fn join_is_associative() {
        let left = join_key(&join_key("p", "a"), "b/c");
        let right = join_key("p", &join_key("a", "b/c"));
        assert_eq!(left, right);
        assert_eq!(left, "p/a/b/c");
    }

    #[test]
    fn dot_segments_are_resolved_lexically() {
        assert_eq!(normalize_key("a/./b/../c"), "a/c");
        assert_eq!(join_key("prefix", "../../etc/passwd"), "prefix/etc/passwd");
        assert_eq!(normalize_key("../x"), "x");
    }

    #[test]
    fn root_like_keys_normalize_to_empty() {
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key("/"), "");
        assert_eq!(normalize_key("./."), "");
        assert_eq!(join_key("", ""), "");
    }
}
