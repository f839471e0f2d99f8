use assert_matches::assert_matches;
use kira_isatab::error::IsaError;
use kira_isatab::tokenizer::{LineReader, QuotePolicy, SheetTokenizer, split_line};

#[test]
fn unquoted_cells_are_literal() {
    let cells = split_line("a\t\"b\tc", 1, QuotePolicy::None).unwrap();
    assert_eq!(cells, vec!["a", "\"b", "c"]);
}

#[test]
fn quoted_cells_keep_tabs_and_doubled_quotes() {
    let cells = split_line("\"a\tb\"\t\"say \"\"hi\"\"\"\tplain\t\"\"", 3, QuotePolicy::Char('"')).unwrap();
    assert_eq!(cells, vec!["a\tb", "say \"hi\"", "plain", ""]);
}

#[test]
fn trailing_tab_yields_empty_cell() {
    let cells = split_line("a\t", 1, QuotePolicy::Char('"')).unwrap();
    assert_eq!(cells, vec!["a", ""]);
}

#[test]
fn unterminated_quote_is_an_error() {
    let err = split_line("ok\t\"open", 7, QuotePolicy::Char('"')).unwrap_err();
    assert_matches!(err, IsaError::UnterminatedQuote { line: 7, cell: 2 });

    let err = split_line("\"closed\"junk", 2, QuotePolicy::Char('"')).unwrap_err();
    assert_matches!(err, IsaError::UnterminatedQuote { line: 2, cell: 1 });
}

#[test]
fn line_reader_skips_blank_lines_and_strips_bom() {
    let input = "\u{feff}Source Name\tSample Name\r\n\n\t\nsrc\tsmp\n";
    let rows: Vec<_> = LineReader::new(input.as_bytes(), QuotePolicy::None)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].cells, vec!["Source Name", "Sample Name"]);
    assert_eq!(rows[1].line, 4);
    assert_eq!(rows[1].cells, vec!["src", "smp"]);
}

#[test]
fn row_length_mismatch_stops_the_sheet() {
    let input = "Source Name\tSample Name\na\tb\nc\nd\te\n";
    let mut tokenizer = SheetTokenizer::new(input.as_bytes(), QuotePolicy::None).unwrap();
    assert_eq!(tokenizer.header(), ["Source Name", "Sample Name"]);
    assert!(tokenizer.next().unwrap().is_ok());
    assert_matches!(
        tokenizer.next(),
        Some(Err(IsaError::RowLength {
            line: 3,
            expected: 2,
            found: 1
        }))
    );
    assert!(tokenizer.next().is_none());
}

#[test]
fn empty_input_has_no_header() {
    let result = SheetTokenizer::new("\n\n".as_bytes(), QuotePolicy::None);
    assert_matches!(result, Err(IsaError::EmptySheet));
}
