//! Centralized formatting for track summaries.
//!
//! Track stats lines, merge reports and log messages all go through this
//! module so that coordinates, spans and distances look the same everywhere.

/// Format a single coordinate, dropping the fraction for whole numbers.
///
/// # Examples
/// ```
/// use strider_types::formatting::format_coord;
/// assert_eq!(format_coord(12.0), "12");
/// assert_eq!(format_coord(12.3), "12.3");
/// assert_eq!(format_coord(-3.0), "-3");
/// ```
pub fn format_coord(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{}", v as i64)
    } else {
        format!("{:.1}", v)
    }
}

/// Format a point as `(x, y)`.
///
/// # Examples
/// ```
/// use strider_types::formatting::format_point;
/// assert_eq!(format_point(10.0, 20.5), "(10, 20.5)");
/// ```
pub fn format_point(x: f64, y: f64) -> String {
    format!("({}, {})", format_coord(x), format_coord(y))
}

/// Format an inclusive span as `(first, last)`.
///
/// # Examples
/// ```
/// use strider_types::formatting::format_span;
/// assert_eq!(format_span(&3, &120), "(3, 120)");
/// ```
pub fn format_span<T: std::fmt::Display>(first: &T, last: &T) -> String {
    format!("({}, {})", first, last)
}

/// Format a path length in whole pixels (truncated).
///
/// # Examples
/// ```
/// use strider_types::formatting::format_distance_px;
/// assert_eq!(format_distance_px(0.0), "0px");
/// assert_eq!(format_distance_px(1_234.9), "1,234px");
/// ```
pub fn format_distance_px(d: f64) -> String {
    format!("{}px", format_thousands(d.trunc() as i64))
}

/// Format a count with a singular/plural noun.
///
/// # Examples
/// ```
/// use strider_types::formatting::format_count;
/// assert_eq!(format_count(1, "point"), "1 point");
/// assert_eq!(format_count(0, "point"), "0 points");
/// assert_eq!(format_count(12_000, "track"), "12,000 tracks");
/// ```
pub fn format_count(n: usize, noun: &str) -> String {
    let plural = if n == 1 { "" } else { "s" };
    format!("{} {}{}", format_thousands(n as i64), noun, plural)
}

/// Format tags as a bracketed, comma separated list.
///
/// # Examples
/// ```
/// use strider_types::formatting::format_tag_list;
/// assert_eq!(format_tag_list(["car", "red"]), "[car, red]");
/// assert_eq!(format_tag_list(Vec::<&str>::new()), "[]");
/// ```
pub fn format_tag_list<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
    format!("[{}]", joined.join(", "))
}

/// Format an integer with thousands separators.
///
/// # Examples
/// ```
/// use strider_types::formatting::format_thousands;
/// assert_eq!(format_thousands(0), "0");
/// assert_eq!(format_thousands(1_500), "1,500");
/// assert_eq!(format_thousands(-1_500_000), "-1,500,000");
/// ```
pub fn format_thousands(n: i64) -> String {
    let s = n.unsigned_abs().to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3 + 1);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if n < 0 {
        result.insert(0, '-');
    }
    result
}
