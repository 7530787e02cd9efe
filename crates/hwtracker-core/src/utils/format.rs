use chrono::NaiveDate;

/// Maximum length for response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data.
/// Cuts on a character boundary at or below the limit.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

/// Due date for display, e.g. "Mon, Oct 19, 2026"
pub fn format_due_date(date: NaiveDate) -> String {
    date.format("%a, %b %-d, %Y").to_string()
}
