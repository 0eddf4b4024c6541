//! Alternate color-code translation for guild prefixes.
//!
//! Players type codes like `&6[Alpha]`; the game client renders `§6[Alpha]`.

/// The section sign the game client interprets as a formatting code.
pub const COLOR_CHAR: char = '§';

const CODE_CHARS: &str = "0123456789AaBbCcDdEeFfKkLlMmNnOoRrXx";

/// Replace every `alt` followed by a known code character with [`COLOR_CHAR`],
/// lowercasing the code. Anything else is copied verbatim.
pub fn translate(alt: char, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == alt {
            if let Some(&next) = chars.peek() {
                if CODE_CHARS.contains(next) {
                    out.push(COLOR_CHAR);
                    out.push(next.to_ascii_lowercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Remove translated color codes, leaving plain text for logs and terminals.
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == COLOR_CHAR {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Display form of a raw prefix: translated, with one trailing space.
pub fn display_prefix(alt: char, raw: &str) -> String {
    let mut prefix = translate(alt, raw);
    prefix.push(' ');
    prefix
}
