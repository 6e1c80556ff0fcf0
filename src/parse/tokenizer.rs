// src/parse/tokenizer.rs

use tracing::warn;

/// Header row plus data rows of one CSV file.
///
/// Every row holds exactly `headers.len()` cells and rows made only of
/// blank cells have already been dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn is_empty(&self) -> bool {
        self.headers.iter().all(|h| h.is_empty())
    }
}

/// Split raw file text into a header row and data rows.
///
/// Single pass with an in-quotes flag:
/// - outside quotes `,` ends a field, `\n` / `\r\n` / lone `\r` end a row,
///   `"` opens quoting;
/// - inside quotes `""` is a literal quote, a lone `"` closes quoting and
///   anything else (commas, newlines) is kept verbatim.
pub fn tokenize(text: &str) -> ParsedTable {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                raw_rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    // no trailing newline
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        raw_rows.push(row);
    }

    let mut iter = raw_rows.into_iter();
    let headers: Vec<String> = match iter.next() {
        Some(h) => h.into_iter().map(|cell| cell.trim().to_string()).collect(),
        None => return ParsedTable::default(),
    };

    let width = headers.len();
    let rows = iter
        .enumerate()
        .filter(|(_, r)| !r.iter().all(|cell| cell.trim().is_empty()))
        .map(|(idx, mut r)| {
            if r.len() > width {
                warn!(
                    line = idx + 2,
                    cells = r.len(),
                    expected = width,
                    "row has more cells than headers, extra cells dropped"
                );
            }
            r.resize(width, String::new());
            r
        })
        .collect();

    ParsedTable { headers, rows }
}
