use crate::io::excel_read::SourceRow;

/// Zero-width code points that sneak into hand-maintained code cells.
const ZERO_WIDTH: [char; 3] = ['\u{200b}', '\u{200c}', '\u{200d}'];

/// What a single definition row asks the pipeline to do.
#[derive(Debug, Clone, PartialEq)]
pub enum RowIntent {
    /// No real series attached: the row names a grouping inside its board.
    CategoryMarker { board: String, name: String },
    /// The row repeats the immediately preceding row's code and is skipped.
    Duplicate { name: String, code: String },
    /// A concrete indicator definition to reconcile and sync.
    Indicator {
        board: String,
        name: String,
        english_name: String,
        code: String,
    },
}

/// Normalises a raw provider code: surrounding whitespace is trimmed and
/// zero-width space/non-joiner/joiner characters are stripped. Codes are only
/// compared after cleaning.
pub fn clean_code(raw: &str) -> String {
    raw.trim().chars().filter(|ch| !ZERO_WIDTH.contains(ch)).collect()
}

/// Classifies one row of the definition table.
///
/// `previous_code` is the previous row's cleaned code; the first row has no
/// predecessor and can never be a duplicate. The marker test runs before the
/// duplicate test, so a marker row whose code cell repeats its display name is
/// never mistaken for a duplicate.
pub fn classify(row: &SourceRow, previous_code: Option<&str>) -> RowIntent {
    let code = clean_code(&row.code);

    if code.is_empty() || code == row.name {
        return RowIntent::CategoryMarker {
            board: row.board.clone(),
            name: row.name.clone(),
        };
    }

    if previous_code == Some(code.as_str()) {
        return RowIntent::Duplicate {
            name: row.name.clone(),
            code,
        };
    }

    RowIntent::Indicator {
        board: row.board.clone(),
        name: row.name.clone(),
        english_name: row.english_name.clone(),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(board: &str, name: &str, code: &str) -> SourceRow {
        SourceRow {
            board: board.to_string(),
            name: name.to_string(),
            english_name: String::new(),
            code: code.to_string(),
        }
    }

    #[test]
    fn clean_code_strips_zero_width_characters() {
        assert_eq!(clean_code("  GDPC1\u{200b}\u{200c}\u{200d} "), "GDPC1");
    }

    #[test]
    fn empty_code_is_a_category_marker() {
        let intent = classify(&row("经济增长", "GDP", ""), None);
        assert_eq!(
            intent,
            RowIntent::CategoryMarker {
                board: "经济增长".to_string(),
                name: "GDP".to_string(),
            }
        );
    }

    #[test]
    fn code_equal_to_name_is_a_category_marker_even_after_a_duplicate_code() {
        // The marker test must win over the duplicate test.
        let intent = classify(&row("物价", "分项 CPI", "分项 CPI"), Some("分项 CPI"));
        assert!(matches!(intent, RowIntent::CategoryMarker { .. }));
    }

    #[test]
    fn repeated_cleaned_code_is_a_duplicate() {
        let intent = classify(&row("劳动力市场", "失业率", "UNRATE\u{200b}"), Some("UNRATE"));
        assert_eq!(
            intent,
            RowIntent::Duplicate {
                name: "失业率".to_string(),
                code: "UNRATE".to_string(),
            }
        );
    }

    #[test]
    fn first_row_is_never_a_duplicate() {
        let intent = classify(&row("劳动力市场", "失业率", "UNRATE"), None);
        assert!(matches!(intent, RowIntent::Indicator { .. }));
    }
}
