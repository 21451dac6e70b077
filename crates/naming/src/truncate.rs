/// Marker inserted where characters were dropped.
pub const SEPARATOR: &str = "___";

/// Separator between hierarchical name segments.
pub const PATH_SEPARATOR: char = '/';

/// Share of the budget (after the separator) given to the start of the name.
const START_SHARE_PERCENT: usize = 62;

/// Below this per-segment share, shortening every ancestor segment produces
/// noise; the prefix is cut as a whole instead.
const MIN_SEGMENT_CHARS: usize = 3;

/// Shorten `name` to at most `max_len` characters.
///
/// Hierarchical names (`a/b/c`) keep their final segment intact whenever it
/// fits on its own: earlier segments are shortened first, then the whole
/// prefix is cut and marked with [`SEPARATOR`]. Anything else keeps the start
/// and the end of the name around the separator.
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if char_len(name) <= max_len {
        return name.to_string();
    }
    if name.contains(PATH_SEPARATOR) {
        if let Some(kept) = truncate_path(name, max_len) {
            return kept;
        }
    }
    split_start_end(name, max_len)
}

fn truncate_path(name: &str, max_len: usize) -> Option<String> {
    let (prefix, last) = name.rsplit_once(PATH_SEPARATOR)?;
    let last_len = char_len(last);
    if last_len == 0 || last_len > max_len {
        return None;
    }

    // Room left for the prefix once the final segment and its `/` are placed.
    let available = max_len.saturating_sub(last_len + 1);
    let segments: Vec<&str> = prefix
        .split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect();
    if available == 0 || segments.is_empty() {
        return Some(last.to_string());
    }

    let slashes = segments.len() - 1;
    if available > slashes {
        let lengths: Vec<usize> = segments.iter().map(|s| char_len(s)).collect();
        let cap = fair_share_cap(&lengths, available - slashes);
        if cap >= MIN_SEGMENT_CHARS {
            let shortened: Vec<String> = segments.iter().map(|s| take_chars(s, cap)).collect();
            return Some(format!("{}{PATH_SEPARATOR}{last}", shortened.join("/")));
        }
    }

    if available > SEPARATOR.len() {
        let head = take_chars(prefix, available - SEPARATOR.len());
        return Some(format!("{head}{SEPARATOR}{PATH_SEPARATOR}{last}"));
    }

    Some(last.to_string())
}

/// Largest per-segment cap such that the capped lengths fit in `budget`.
/// Segments shorter than their share donate the remainder to longer ones.
fn fair_share_cap(lengths: &[usize], budget: usize) -> usize {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable();
    let mut remaining = budget;
    let mut left = sorted.len();
    for len in sorted {
        let share = remaining / left;
        if len > share {
            return share;
        }
        remaining -= len;
        left -= 1;
    }
    usize::MAX
}

fn split_start_end(name: &str, max_len: usize) -> String {
    if max_len <= SEPARATOR.len() {
        return take_chars(name, max_len);
    }
    let budget = max_len - SEPARATOR.len();
    let start_len = budget * START_SHARE_PERCENT / 100;
    let end_len = budget - start_len;

    let total = char_len(name);
    let start = take_chars(name, start_len);
    let end: String = name.chars().skip(total.saturating_sub(end_len)).collect();
    format!("{start}{SEPARATOR}{end}")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn take_chars(text: &str, count: usize) -> String {
    text.chars().take(count).collect()
}
