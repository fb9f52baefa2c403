// ABOUTME: Text helpers shared by the tokenizer and tidy pass.
// ABOUTME: Whitespace folding, HTML entity decoding, and legacy percent-decoding of headwords.

use percent_encoding::percent_decode_str;

/// Characters trimmed from the edges of normalized text.
const EDGE_SPACE: &[char] = &['\r', '\n', '\t', ' '];

/// Named entities understood by [`decode_entities`].
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{00A0}"),
    ("ndash", "–"),
    ("mdash", "—"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("hellip", "…"),
    ("copy", "©"),
    ("reg", "®"),
    ("trade", "™"),
    ("bull", "•"),
    ("middot", "·"),
    ("deg", "°"),
    ("plusmn", "±"),
    ("times", "×"),
    ("divide", "÷"),
    ("frac12", "½"),
    ("frac14", "¼"),
    ("frac34", "¾"),
    ("euro", "€"),
    ("pound", "£"),
    ("yen", "¥"),
    ("cent", "¢"),
    ("sect", "§"),
    ("para", "¶"),
    ("laquo", "«"),
    ("raquo", "»"),
];

/// Longest entity body we bother looking up (`&#x10FFFF;` and the named table fit).
const MAX_ENTITY_LEN: usize = 10;

/// Folds tabs and non-breaking spaces into plain spaces, collapses space runs,
/// and trims the edges. Line breaks inside the text are kept.
pub fn strip_space(data: &str) -> String {
    let folded = data
        .replace('\u{00A0}', " ")
        .replace('\t', " ")
        .replace(" &nbsp; ", " ");

    let mut out = String::with_capacity(folded.len());
    let mut last_was_space = false;
    for c in folded.chars() {
        if c == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(c);
    }

    out.trim_matches(EDGE_SPACE).to_string()
}

/// Like [`strip_space`], but line breaks are turned into spaces first.
pub fn strip_space_more(data: &str) -> String {
    strip_space(&data.replace(['\r', '\n'], " "))
}

/// Returns true if the byte is one of the whitespace bytes the markup dialect recognises.
pub fn is_space_byte(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | b'\t' | b' ')
}

/// Decodes named and numeric HTML entities in a single left-to-right pass.
///
/// Unknown or malformed references are copied through unchanged, so the
/// output of one pass is never decoded a second time.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];

        let decoded = tail
            .find(';')
            .filter(|&semi| semi > 0 && semi <= MAX_ENTITY_LEN)
            .and_then(|semi| decode_reference(&tail[..semi]).map(|text| (text, semi)));

        match decoded {
            Some((text, semi)) => {
                out.push_str(&text);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);

    out
}

/// Resolves the body of one `&...;` reference.
fn decode_reference(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == body)
        .map(|(_, text)| (*text).to_string())
}

/// Query-string style unescape: `+` becomes a space and `%XX` is decoded.
///
/// Returns `None` when an escape is malformed or the result is not UTF-8,
/// in which case callers keep the original text.
pub fn percent_unescape(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .map(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .unwrap_or(false);
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let plus_free = s.replace('+', " ");
    percent_decode_str(&plus_free)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Undoes the double encoding left in headwords by older export stages.
pub fn decode_headword(s: &str) -> String {
    let mut value = if s.contains('&') {
        decode_entities(s)
    } else {
        s.to_string()
    };
    if value.contains('%') {
        if let Some(unescaped) = percent_unescape(&value) {
            value = unescaped;
        }
    }
    value
}
