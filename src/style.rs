//! Visibility toggling on an inline `style` attribute.
//!
//! A style value is a `;`-separated list of `key:value` declarations. Only the
//! `display` declaration is touched; every other declaration keeps its text and
//! position.

pub const DISPLAY_NONE: &str = "display:none";
pub const DISPLAY_INLINE: &str = "display:inline";

/// Declaration written for the requested visibility.
pub fn display_declaration(hidden: bool) -> &'static str {
    if hidden { DISPLAY_NONE } else { DISPLAY_INLINE }
}

/// Return `style` with its `display` declaration set to `none` or `inline`.
///
/// Every existing `display` declaration is rewritten, not only the first. When
/// there is none, one is appended. Showing always restores `inline`, whatever
/// the element's original display value was.
pub fn with_display(style: &str, hidden: bool) -> String {
    let decl = display_declaration(hidden);

    let mut parts: Vec<&str> = if style.is_empty() {
        Vec::new()
    } else {
        style.split(';').collect()
    };

    let mut replaced = false;
    for part in parts.iter_mut() {
        if is_display_declaration(part) {
            *part = decl;
            replaced = true;
        }
    }

    if !replaced {
        // Reuse a trailing empty slot left by `a:b;` instead of producing `a:b;;display:none`.
        match parts.last_mut() {
            Some(last) if last.trim().is_empty() => *last = decl,
            _ => parts.push(decl),
        }
    }

    parts.join(";")
}

/// Value of the last `display` declaration, if any.
pub fn display_value(style: &str) -> Option<&str> {
    style
        .split(';')
        .filter_map(|part| part.split_once(':'))
        .filter(|(key, _)| key.trim() == "display")
        .map(|(_, value)| value.trim())
        .last()
}

fn is_display_declaration(part: &str) -> bool {
    part.split_once(':')
        .is_some_and(|(key, _)| key.trim() == "display")
}
