//! Topic names are `/` separated levels. Topic filters may additionally use
//! `+` to match exactly one level and a trailing `#` to match the parent level
//! and any number of levels below it. Topics starting with `$` are reserved for
//! the broker and are never matched by a filter starting with a wildcard.

const LEVEL_SEPARATOR: char = '/';
const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

/// Returns `true` if `topic` is matched by `filter`.
///
/// Both arguments are assumed to be syntactically valid; see
/// [`is_valid_filter`] and [`is_valid_name`].
///
/// ```rust
/// use mqtt_agent::network::application::mqtt::topic::matches;
///
/// assert!(matches("a/+/c", "a/b/c"));
/// assert!(!matches("a/+/c", "a/b/c/d"));
/// assert!(matches("a/#", "a"));
/// assert!(matches("a/#", "a/b/c"));
/// assert!(!matches("#", "$SYS/uptime"));
/// ```
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split(LEVEL_SEPARATOR);
    let mut topic_levels = topic.split(LEVEL_SEPARATOR);
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some(MULTI_LEVEL), _) => return true,
            (Some(SINGLE_LEVEL), Some(_)) => {}
            (Some(expected), Some(level)) if expected == level => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Returns `true` if `filter` is a well-formed topic filter.
///
/// A filter is well formed when it is non-empty, contains no NUL character,
/// every `+` occupies a whole level and `#` occupies the whole last level.
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() || filter.contains('\0') {
        return false;
    }

    let mut levels = filter.split(LEVEL_SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        let is_last = levels.peek().is_none();
        if level.contains('#') && (level != MULTI_LEVEL || !is_last) {
            return false;
        }
        if level.contains('+') && level != SINGLE_LEVEL {
            return false;
        }
    }
    true
}

/// Returns `true` if `topic` can be used as a publish topic name.
pub fn is_valid_name(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(|c| c == '+' || c == '#' || c == '\0')
}
