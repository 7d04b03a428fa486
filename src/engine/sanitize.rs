//! Structural clean-up of generated section text.
//!
//! The backend writes one section body. Headings it adds must sit below the
//! section's own heading, a repeated section heading is dropped, and a fence
//! wrapping the whole response is removed.
use regex::Regex;
use std::sync::OnceLock;

const MAX_HEADING_DEPTH: usize = 6;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t#]*$").expect("regex for markdown headings")
    })
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Clean `raw` for a section rendered at `depth`. `None` when nothing is left.
pub fn sanitize(raw: &str, heading: &str, depth: usize) -> Option<String> {
    let text = strip_wrapping_fence(raw.trim());
    let text = drop_repeated_heading(text, heading);
    let text = demote_headings(text, depth);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn strip_wrapping_fence(text: &str) -> &str {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return text;
    }
    let first = lines[0].trim();
    let last = lines[lines.len() - 1].trim();
    let language = first.trim_start_matches('`').trim().to_lowercase();
    let fence_lines = lines.iter().filter(|line| is_fence(line)).count();
    if first.starts_with("```")
        && last == "```"
        && fence_lines == 2
        && matches!(language.as_str(), "" | "md" | "markdown")
    {
        let start = text.find('\n').map(|idx| idx + 1).unwrap_or(text.len());
        let end = text.rfind('\n').unwrap_or(start);
        return text[start..end.max(start)].trim();
    }
    text
}

fn normalize_heading(text: &str) -> String {
    text.trim()
        .trim_matches(|ch: char| ch == '*' || ch == '_' || ch == ':')
        .trim()
        .to_lowercase()
}

fn drop_repeated_heading<'a>(text: &'a str, heading: &str) -> &'a str {
    let mut lines = text.splitn(2, '\n');
    let first = lines.next().unwrap_or_default();
    let rest = lines.next().unwrap_or_default();
    let first_text = heading_re()
        .captures(first.trim())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or(first);
    if normalize_heading(first_text) == normalize_heading(heading) {
        rest.trim_start()
    } else {
        text
    }
}

/// Shift headings so the shallowest one sits one level below `depth`.
fn demote_headings(text: &str, depth: usize) -> String {
    let mut in_fence = false;
    let mut min_depth: Option<usize> = None;
    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = heading_re().captures(line) {
            let found = caps[1].len();
            min_depth = Some(min_depth.map_or(found, |current| current.min(found)));
        }
    }
    let Some(min_depth) = min_depth else {
        return text.to_string();
    };
    let shift = (depth + 1).saturating_sub(min_depth);
    if shift == 0 {
        return text.to_string();
    }

    let mut in_fence = false;
    let mut out = Vec::new();
    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        match heading_re().captures(line) {
            Some(caps) if !in_fence => {
                let new_depth = (caps[1].len() + shift).min(MAX_HEADING_DEPTH);
                out.push(format!("{} {}", "#".repeat(new_depth), &caps[2]));
            }
            _ => out.push(line.to_string()),
        }
    }
    out.join("\n")
}
