//! Best-effort repair of UTF-8 text that was decoded as Windows-1252/Latin-1
//!
//! `’` encoded as UTF-8 is `E2 80 99`; read back as Windows-1252 that becomes
//! `â€™`. Repair maps each character back to its single byte and re-decodes
//! runs that form valid UTF-8 sequences. A pass is kept only if it lowers the
//! number of marker characters, and passes repeat until nothing improves, so
//! doubly mangled text is unwound and `repair(repair(x)) == repair(x)`.

use std::borrow::Cow;

/// Characters that rarely appear in clean text but are typical of mojibake
const MARKERS: &[char] = &['Ã', 'Â', 'â', 'œ', 'ž', '¢', '€', '™', '\u{FFFD}'];

/// Windows-1252 characters for bytes 0x80..=0x9F (`None` where the code page
/// leaves the byte undefined and decoders fall back to the C1 control)
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Repair mojibake in `text`, returning it unchanged when no repair helps
pub fn repair(text: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(text);

    loop {
        let markers = marker_count(&current);
        if markers == 0 {
            return current;
        }
        match repair_pass(&current) {
            Some(candidate) if marker_count(&candidate) < markers => {
                current = Cow::Owned(candidate);
            }
            _ => return current,
        }
    }
}

fn marker_count(text: &str) -> usize {
    text.chars().filter(|c| MARKERS.contains(c)).count()
}

/// The byte a single-byte Western decoder would have produced `c` from
fn single_byte(c: char) -> Option<u8> {
    let code = u32::from(c);
    if code <= 0xFF {
        return Some(code as u8);
    }
    CP1252_HIGH
        .iter()
        .position(|mapped| *mapped == Some(c))
        .map(|offset| 0x80 + offset as u8)
}

fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// Decode the mis-read UTF-8 sequence starting at `chars[start]`, if any
fn decode_at(chars: &[char], start: usize) -> Option<(char, usize)> {
    let lead = single_byte(chars[start])?;
    let len = sequence_len(lead)?;
    let tail = chars.get(start + 1..start + len)?;

    let mut buf = [0u8; 4];
    buf[0] = lead;
    for (slot, &c) in buf[1..len].iter_mut().zip(tail) {
        let byte = single_byte(c)?;
        if !(0x80..=0xBF).contains(&byte) {
            return None;
        }
        *slot = byte;
    }

    let decoded = std::str::from_utf8(&buf[..len]).ok()?;
    decoded.chars().next().map(|c| (c, len))
}

fn repair_pass(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut i = 0;

    while i < chars.len() {
        match decode_at(&chars, i) {
            Some((c, consumed)) => {
                out.push(c);
                i += consumed;
                changed = true;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }

    changed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Produce mojibake the way a mis-configured decoder would
    fn mangle(text: &str) -> String {
        text.bytes()
            .map(|b| match b {
                0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)].unwrap_or(char::from(b)),
                _ => char::from(b),
            })
            .collect()
    }

    #[test]
    fn test_repairs_smart_quote() {
        assert_eq!(repair("donâ€™t"), "don’t");
    }

    #[test]
    fn test_repairs_latin_accents() {
        assert_eq!(repair("cafÃ©"), "café");
        assert_eq!(repair(&mangle("naïve résumé")), "naïve résumé");
    }

    #[test]
    fn test_repairs_four_byte_sequences() {
        assert_eq!(repair(&mangle("ok 😀")), "ok 😀");
    }

    #[test]
    fn test_repairs_double_encoding() {
        let twice = mangle(&mangle("café"));
        assert_eq!(repair(&twice), "café");
    }

    #[test]
    fn test_clean_text_is_untouched() {
        for text in ["hello world", "château", "naïve", "Привет", "東京", "", "€5"] {
            assert_eq!(repair(text), text);
        }
    }

    #[test]
    fn test_no_markers_borrows() {
        assert!(matches!(repair("plain ascii"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_mixed_clean_and_mangled_text() {
        let text = format!("日本 {}", mangle("—dash"));
        assert_eq!(repair(&text), "日本 —dash");
    }

    #[test]
    fn test_replacement_char_alone_is_kept() {
        assert_eq!(repair("bad \u{FFFD} byte"), "bad \u{FFFD} byte");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "donâ€™t".to_string(),
            mangle(&mangle("“quoted” — text")),
            "Ã".to_string(),
            "Ã©Ã".to_string(),
            "â€".to_string(),
            "plain".to_string(),
            mangle("emoji 🎉 and ü"),
            "\u{FFFD}Ã€".to_string(),
        ];
        for sample in &samples {
            let once = repair(sample).into_owned();
            let twice = repair(&once).into_owned();
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }
}
