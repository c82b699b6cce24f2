//! CSV framing: converting between a logical row and one physical line.
//!
//! `needs_quoting` and `escape_field` are pure functions of the field and
//! the writer configuration so that framing policy can be tested without
//! a writer instance. `format_row` and `parse_line` are exact inverses
//! for any row with at least one field (P1).

// dependencies
use crate::writer::WriterConfig;

/// One logical CSV record: an ordered sequence of text fields.
/// No field is null; absence is the empty string.
pub type Row = Vec<String>;

/* ------------------------------------------------------------------
quoting policy
------------------------------------------------------------------ */
/// A field requires quoting iff it contains the delimiter, the quote
/// character, a newline or carriage return, has leading or trailing
/// space, or the configuration forces quoting.
pub fn needs_quoting(field: &str, config: &WriterConfig) -> bool {
    if config.always_quote {
        return true;
    }
    if field.is_empty() {
        return config.quote_empty_fields;
    }
    field.contains(config.delimiter)
        || field.contains(config.quote_char)
        || field.contains('\n')
        || field.contains('\r')
        || field.starts_with(' ')
        || field.ends_with(' ')
}

/// Escape a field for CSV output, quoting it and doubling any internal
/// quote character when the quoting policy requires it. Fields that do
/// not need quoting are returned unchanged.
pub fn escape_field(field: &str, config: &WriterConfig) -> String {
    if !needs_quoting(field, config) {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len() + 2);
    out.push(config.quote_char);
    for c in field.chars() {
        if c == config.quote_char {
            out.push(config.escape_char);
        }
        out.push(c);
    }
    out.push(config.quote_char);
    out
}

/* ------------------------------------------------------------------
row formatting and parsing
------------------------------------------------------------------ */
/// Format a row as one physical CSV line, without the line ending.
pub fn format_row(row: &[String], config: &WriterConfig) -> String {
    let mut line = String::new();
    for (i, field) in row.iter().enumerate() {
        if i > 0 {
            line.push(config.delimiter);
        }
        line.push_str(&escape_field(field, config));
    }
    line
}

/// Parse one physical CSV line back into its fields. A field surrounded
/// by the quote character may contain the delimiter, newlines, and a
/// doubled quote character standing for a literal quote; outside quotes
/// the delimiter terminates a field.
pub fn parse_line(line: &str, config: &WriterConfig) -> Row {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == config.quote_char {
                if chars.peek() == Some(&config.quote_char) {
                    chars.next(); // doubled quote is a literal
                    field.push(config.quote_char);
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == config.quote_char && field.is_empty() {
            in_quotes = true;
        } else if c == config.delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn quoting_follows_content() {
        let cfg = WriterConfig::default();
        assert!(!needs_quoting("simple", &cfg));
        assert!(needs_quoting("has,comma", &cfg));
        assert!(needs_quoting("has\"quote", &cfg));
        assert!(needs_quoting("has\nnewline", &cfg));
        assert!(needs_quoting(" padded", &cfg));
        assert!(!needs_quoting("", &cfg));
    }

    #[test]
    fn quote_empty_fields_option() {
        let cfg = WriterConfig {
            quote_empty_fields: true,
            ..WriterConfig::default()
        };
        assert!(needs_quoting("", &cfg));
        assert_eq!(escape_field("", &cfg), "\"\"");
    }

    #[test]
    fn format_matches_reference_line() {
        let cfg = WriterConfig::default();
        let r = row(&["simple", "has,comma", "has\"quote", "has\nnewline"]);
        assert_eq!(
            format_row(&r, &cfg),
            "simple,\"has,comma\",\"has\"\"quote\",\"has\nnewline\""
        );
    }

    #[test]
    fn parse_round_trips_format() {
        let cfg = WriterConfig::default();
        let rows = vec![
            row(&["a", "b", "c"]),
            row(&["", "", ""]),
            row(&["comma,inside", "quote\"inside", "new\nline", " spaced "]),
            row(&["only"]),
        ];
        for r in rows {
            assert_eq!(parse_line(&format_row(&r, &cfg), &cfg), r);
        }
    }

    #[test]
    fn parse_round_trips_always_quote() {
        let cfg = WriterConfig {
            always_quote: true,
            ..WriterConfig::default()
        };
        let r = row(&["a", "", "c,d"]);
        assert_eq!(parse_line(&format_row(&r, &cfg), &cfg), r);
    }

    #[test]
    fn parse_custom_delimiter() {
        let cfg = WriterConfig {
            delimiter: ';',
            ..WriterConfig::default()
        };
        assert_eq!(parse_line("a;b;c", &cfg), row(&["a", "b", "c"]));
        assert_eq!(parse_line("\"a;b\";c", &cfg), row(&["a;b", "c"]));
    }
}
