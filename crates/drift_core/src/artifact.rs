/// Content type of every rendered artifact.
pub const ARTIFACT_CONTENT_TYPE: &str = "text/html";

/// Storage key for one job's artifact: `drift-{prefix}-{stamp}-{run_id}.html`.
///
/// `stamp` is expected in `%Y%m%dT%H%M%SZ` form so keys sort by time;
/// `run_id` separates runs of the same prefix within one second.
pub fn artifact_key(prefix: &str, stamp: &str, run_id: &str) -> String {
    format!(
        "drift-{}-{stamp}-{}.html",
        sanitize_component(prefix),
        sanitize_component(run_id)
    )
}

/// Public retrieval URL, derived from the website base and the key alone.
pub fn artifact_url(website_base: &str, key: &str) -> String {
    format!("{}/{key}", website_base.trim_end_matches('/'))
}

fn sanitize_component(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        // Collapse runs of underscores
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        cleaned.push(c);
    }
    let mut trimmed = cleaned.trim_matches(&['_', '.', '-'][..]).to_string();
    if trimmed.is_empty() {
        trimmed = "job".to_string();
    }
    if trimmed.len() > 80 {
        let mut end = 80;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed.truncate(end);
    }
    trimmed
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '#' | '%' | '\0'..='\u{1F}'
    )
}
