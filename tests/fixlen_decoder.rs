//! Integration tests for the fixed-length decoders and the single-type parser.

use flatbeam::decoder::{DecoderMode, DecoderOptions, FixLenDecoder, RecordDecoder};
use flatbeam::error::ParseError;
use flatbeam::metadata::{FieldDescriptor, RecordType};
use flatbeam::parser::{FixLenParser, ParserSettings, ParserState};
use flatbeam::policy::{ExceptionPolicy, RecordProblem};
use flatbeam::reader::{InputReader, ReaderOptions};
use flatbeam::record::FieldValue;
use flatbeam::testing::*;
use std::io::Cursor;

fn source(data: &[u8]) -> Box<dyn std::io::Read> {
    Box::new(Cursor::new(data.to_vec()))
}

fn parser_over(record_type: RecordType, settings: ParserSettings, data: &[u8]) -> FixLenParser {
    let mut parser = FixLenParser::new(record_type, settings).expect("valid record type");
    parser.set_data_source(source(data)).expect("open parser");
    parser
}

fn char_settings(options: DecoderOptions) -> ParserSettings {
    ParserSettings::default()
        .with_mode(DecoderMode::Char)
        .with_decoder_options(options)
}

#[test]
fn test_exact_records_then_end_of_data() -> anyhow::Result<()> {
    let mut parser = parser_over(type_a(), ParserSettings::default(), b"abcdefgABCDEFG");

    let first = parser.get_next()?.expect("first record");
    assert_eq!(first.text(0), Some("abc"));
    assert_eq!(first.text(1), Some("defg"));
    let second = parser.get_next()?.expect("second record");
    assert_eq!(second.text(0), Some("ABC"));

    assert!(parser.get_next()?.is_none());
    assert_eq!(parser.record_index(), 2);
    assert_eq!(parser.position(), 14);
    assert!(parser.errors().is_empty());
    Ok(())
}

#[test]
fn test_partial_record_is_malformed_under_strict_policy() {
    let mut parser = parser_over(type_a(), ParserSettings::default(), b"abcdefgABC");
    assert!(parser.get_next().expect("first record").is_some());

    match parser.get_next() {
        Err(ParseError::Malformed(error)) => {
            assert_eq!(error.record, 1);
            assert_eq!(error.field, "a2");
            assert_eq!(error.message, "unexpected end of input: expected 4 bytes, found 0");
        }
        other => panic!("expected a malformed record, got {other:?}"),
    }
    assert_eq!(parser.state(), ParserState::Aborted);
    assert!(matches!(parser.get_next(), Err(ParseError::Aborted)));
}

#[test]
fn test_partial_record_is_reported_under_lenient_policy() -> anyhow::Result<()> {
    let settings = ParserSettings::default().with_policy(ExceptionPolicy::Lenient);
    let mut parser = parser_over(type_a(), settings, b"abcdefgABCDE");

    parser.get_next()?;
    let partial = parser.get_next()?.expect("partial record");
    assert_eq!(partial.text(0), Some("ABC"));
    assert!(partial.fields[1].is_invalid());
    assert!(!partial.is_valid());

    assert!(parser.get_next()?.is_none());
    assert_eq!(parser.record_index(), 2);
    assert_eq!(parser.errors().error_count(), 1);
    let reported: Vec<_> = parser.errors().field_errors().collect();
    assert_eq!(reported[0].raw, "DE");
    assert_eq!(reported[0].message, "unexpected end of input: expected 4 bytes, found 2");
    Ok(())
}

#[test]
fn test_skip_stops_at_end_of_input() -> anyhow::Result<()> {
    let mut parser = parser_over(type_a(), ParserSettings::default(), b"abcdefgABCDEFG");
    assert_eq!(parser.skip(5)?, 2);
    assert_eq!(parser.record_index(), 2);
    assert!(parser.reader().is_end_of_input());
    assert!(parser.get_next()?.is_none());
    Ok(())
}

#[test]
fn test_skip_then_read() -> anyhow::Result<()> {
    let mut parser = parser_over(type_a(), ParserSettings::default(), b"aaaaaaabbbbbbbccccccc");
    assert_eq!(parser.skip(1)?, 1);
    let record = parser.get_next()?.expect("second record");
    assert_eq!(record.text(0), Some("bbb"));
    assert_eq!(parser.record_index(), 2);
    Ok(())
}

#[test]
fn test_blank_fields() -> anyhow::Result<()> {
    let record_type = RecordType::new(
        "t",
        vec![FieldDescriptor::text("opt", 3), FieldDescriptor::text("req", 3).required()],
    );

    let mut parser = parser_over(record_type.clone(), ParserSettings::default(), b"   abc");
    let record = parser.get_next()?.expect("record");
    assert!(record.fields[0].is_null());
    assert_eq!(record.text(1), Some("abc"));

    let mut parser = parser_over(record_type.clone(), ParserSettings::default(), b"abc   ");
    assert!(matches!(
        parser.get_next(),
        Err(ParseError::Malformed(e)) if e.message == "field is not nullable"
    ));

    let lenient = ParserSettings::default().with_policy(ExceptionPolicy::Lenient);
    let mut parser = parser_over(record_type, lenient, b"abc   ");
    let record = parser.get_next()?.expect("record");
    assert!(record.fields[1].is_invalid());
    Ok(())
}

#[test]
fn test_byte_mode_keeps_padding_and_decodes_whole_fields() -> anyhow::Result<()> {
    let record_type = RecordType::new("t", vec![FieldDescriptor::text("name", 6)]);
    let data = "Käse ".as_bytes();
    assert_eq!(data.len(), 6);

    let mut parser = FixLenParser::new(record_type, ParserSettings::default())?;
    parser.set_data_source(Box::new(ChunkedSource::new(data.to_vec(), 2)))?;
    let record = parser.get_next()?.expect("record");
    assert_eq!(record.text(0), Some("Käse "));
    Ok(())
}

#[test]
fn test_byte_mode_invalid_sequence() -> anyhow::Result<()> {
    let record_type = RecordType::new("t", vec![FieldDescriptor::text("f", 3)]);
    let lenient = ParserSettings::default().with_policy(ExceptionPolicy::Lenient);
    let mut parser = parser_over(record_type, lenient, &[b'a', 0xff, b'c']);

    let record = parser.get_next()?.expect("record");
    match &record.fields[0] {
        FieldValue::Invalid(error) => {
            assert_eq!(error.message, "invalid UTF-8 byte sequence");
            assert_eq!(error.raw, "a\u{fffd}c");
        }
        other => panic!("expected an invalid field, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_binary_fields_are_raw() -> anyhow::Result<()> {
    let record_type = RecordType::new(
        "t",
        vec![
            FieldDescriptor::text("tag", 2),
            FieldDescriptor::binary("payload", 3),
            FieldDescriptor::text("tail", 2),
        ],
    );
    let data = b"AB\x00\xff\x10CD";

    for mode in [DecoderMode::Byte, DecoderMode::Char] {
        let settings = ParserSettings::default().with_mode(mode);
        let mut parser = parser_over(record_type.clone(), settings, data);
        let record = parser.get_next()?.expect("record");
        assert_eq!(record.text(0), Some("AB"), "{mode:?}");
        assert_eq!(record.fields[1].as_bytes(), Some(&[0x00, 0xff, 0x10][..]), "{mode:?}");
        assert_eq!(record.text(2), Some("CD"), "{mode:?}");
        assert!(parser.get_next()?.is_none());
    }
    Ok(())
}

#[test]
fn test_char_mode_counts_characters() -> anyhow::Result<()> {
    let data = "ÄÖÜabcdéèêfghi".as_bytes().to_vec();
    let mut parser = FixLenParser::new(type_a(), char_settings(DecoderOptions::default()))?;
    parser.set_data_source(Box::new(ChunkedSource::new(data.clone(), 1)))?;

    let records = collect_records(&mut parser)?;
    assert_texts(&records, &[&["ÄÖÜ", "abcd"], &["éèê", "fghi"]]);
    assert_eq!(parser.position(), data.len() as u64);
    Ok(())
}

#[test]
fn test_char_mode_with_single_byte_charset() -> anyhow::Result<()> {
    let settings = char_settings(DecoderOptions::default()).with_charset("windows-1252");
    let mut parser = parser_over(type_a(), settings, &[0x80, b'1', b'2', 0xe4, b'b', b'c', b'd']);
    let record = parser.get_next()?.expect("record");
    assert_eq!(record.text(0), Some("€12"));
    assert_eq!(record.text(1), Some("äbcd"));
    Ok(())
}

#[test]
fn test_char_mode_incomplete_final_record() -> anyhow::Result<()> {
    let options = DecoderOptions {
        enable_incomplete: true,
        ..DecoderOptions::default()
    };
    let mut parser = parser_over(type_a(), char_settings(options), b"abcdefgAB");

    parser.get_next()?;
    let last = parser.get_next()?.expect("incomplete record");
    assert_eq!(last.text(0), Some("AB"));
    assert!(last.fields[1].is_null());
    assert!(last.is_valid());
    assert!(parser.get_next()?.is_none());
    assert_eq!(parser.record_index(), 2);

    // without the option the same input is malformed
    let mut parser = parser_over(type_a(), char_settings(DecoderOptions::default()), b"abcdefgAB");
    parser.get_next()?;
    assert!(matches!(
        parser.get_next(),
        Err(ParseError::Malformed(e))
            if e.message == "unexpected end of input: expected 3 characters, found 2"
    ));
    Ok(())
}

#[test]
fn test_char_mode_skip_empty_records() -> anyhow::Result<()> {
    let options = DecoderOptions {
        skip_empty: true,
        ..DecoderOptions::default()
    };
    let mut parser = parser_over(type_a(), char_settings(options), b"abcdefg       ABCDEFG");

    let records = collect_records(&mut parser)?;
    assert_texts(&records, &[&["abc", "defg"], &["ABC", "DEFG"]]);
    assert_eq!(parser.record_index(), 2);
    Ok(())
}

#[test]
fn test_strict_skip_empty_drops_blank_required_fields() -> anyhow::Result<()> {
    let options = DecoderOptions {
        skip_empty: true,
        ..DecoderOptions::default()
    };
    let required = RecordType::new("tag", vec![FieldDescriptor::text("f", 3).required()]);
    let mut parser = parser_over(required.clone(), char_settings(options), b"   abc");

    let records = collect_records(&mut parser)?;
    assert_texts(&records, &[&["abc"]]);
    assert_eq!(parser.record_index(), 1);

    // a kept record still fails on its blank required field
    let mut parser = parser_over(required, char_settings(DecoderOptions::default()), b"   abc");
    assert!(matches!(
        parser.get_next(),
        Err(ParseError::Malformed(e)) if e.message == "field is not nullable"
    ));
    Ok(())
}

#[test]
fn test_char_mode_skip_counts_undecodable_bytes() -> anyhow::Result<()> {
    let mut data = vec![b'a', 0xff, b'c'];
    data.extend_from_slice(b"defgABCDEFG");
    let mut parser = parser_over(type_a(), char_settings(DecoderOptions::default()), &data);

    assert_eq!(parser.skip(1)?, 1);
    let record = parser.get_next()?.expect("record after the skipped one");
    assert_eq!(record.text(0), Some("ABC"));
    Ok(())
}

#[test]
fn test_char_mode_trimming_toggles() -> anyhow::Result<()> {
    let data = b" a  b         ";
    let mut parser = parser_over(type_a(), char_settings(DecoderOptions::default()), data);
    parser.decoder_mut().set_skip_leading_blanks(true);
    parser.decoder_mut().set_skip_trailing_blanks(true);
    parser.decoder_mut().set_skip_empty(true);
    assert!(parser.decoder().is_skip_leading_blanks());
    assert!(parser.decoder().is_skip_trailing_blanks());

    let record = parser.get_next()?.expect("record");
    assert_eq!(record.text(0), Some("a"));
    assert_eq!(record.text(1), Some("b"));
    // the blank second record is dropped
    assert!(parser.get_next()?.is_none());
    assert_eq!(parser.record_index(), 1);
    Ok(())
}

#[test]
fn test_collected_errors_export_and_clear() -> anyhow::Result<()> {
    let settings = ParserSettings::default().with_policy(ExceptionPolicy::Lenient);
    let mut parser = parser_over(type_a(), settings, b"abcdefgABCDE");
    collect_records(&mut parser)?;
    assert_eq!(parser.errors().error_count(), 1);

    let dir = TempDirPath::new()?;
    let report = dir.file_path("errors.json");
    parser.errors().write_to_file(&report)?;
    let json = std::fs::read_to_string(&report)?;
    assert!(json.contains("unexpected end of input"));
    assert!(json.contains("\"a2\""));

    parser.errors_mut().clear();
    assert!(parser.errors().is_empty());
    Ok(())
}

#[test]
fn test_reader_options_reach_the_reader() -> anyhow::Result<()> {
    let options = ReaderOptions {
        initial_capacity: 512,
        max_capacity: 2048,
        lookback: 16,
    };
    let settings = ParserSettings::default().with_reader_options(options);
    let data = b"abcdefg".repeat(200);
    let mut parser = parser_over(type_a(), settings, &data);

    assert_eq!(parser.reader().options(), options);
    assert_eq!(collect_records(&mut parser)?.len(), 200);
    Ok(())
}

#[test]
fn test_char_mode_undecodable_byte_invalidates_field() -> anyhow::Result<()> {
    let settings =
        char_settings(DecoderOptions::default()).with_policy(ExceptionPolicy::Lenient);
    let mut parser = parser_over(type_a(), settings, &[b'a', 0xff, b'c', b'd', b'e', b'f', b'g']);

    let record = parser.get_next()?.expect("record");
    assert!(record.fields[0].is_invalid());
    assert_eq!(record.text(1), Some("defg"));
    assert!(matches!(
        parser.errors().errors(),
        [RecordProblem::MalformedField(e)] if e.field == "a1"
    ));
    Ok(())
}

#[test]
fn test_char_mode_skip() -> anyhow::Result<()> {
    let mut parser = parser_over(
        type_a(),
        char_settings(DecoderOptions::default()),
        "äääääääbbbbbbbcc".as_bytes(),
    );
    assert_eq!(parser.skip(1)?, 1);
    let record = parser.get_next()?.expect("second record");
    assert_eq!(record.text(0), Some("bbb"));
    assert_eq!(parser.skip(3)?, 0);
    assert_eq!(parser.record_index(), 2);
    Ok(())
}

#[test]
fn test_byte_mode_ignores_char_options() {
    let options = DecoderOptions {
        skip_empty: true,
        ..DecoderOptions::default()
    };
    let mut decoder = FixLenDecoder::new(DecoderMode::Byte, options, ExceptionPolicy::Strict);
    assert_eq!(decoder.mode(), DecoderMode::Byte);
    assert!(!decoder.is_skip_empty());
    decoder.set_enable_incomplete(true);
    assert!(!decoder.is_enable_incomplete());
}

#[test]
fn test_decoder_without_parser() -> anyhow::Result<()> {
    let mut reader = InputReader::new(encoding_rs::UTF_8);
    reader.set_input_source(source(b"XXabcYYYYY"));
    let pool = two_type_pool();

    let mut decoder = FixLenDecoder::new(
        DecoderMode::Byte,
        DecoderOptions::default(),
        ExceptionPolicy::Strict,
    );
    reader.skip_bytes(2)?;
    let a = decoder.parse_next(&mut reader, 0, &pool[0])?.expect("type A");
    assert_eq!(a.text(0), Some("abc"));
    assert_eq!(a.text(1), Some("YYYY"));
    assert_eq!(decoder.record_index(), 1);

    decoder.set_record_index(10);
    decoder.set_policy(ExceptionPolicy::Lenient);
    let b = decoder.parse_next(&mut reader, 1, &pool[1])?.expect("partial type B");
    assert_eq!(b.type_index, 1);
    assert!(b.fields[0].is_invalid());
    assert_eq!(decoder.record_index(), 11);
    Ok(())
}

#[test]
fn test_counter_across_sources() -> anyhow::Result<()> {
    let mut parser = parser_over(type_a(), ParserSettings::default(), b"abcdefgABCDEFG");
    parser.skip(2)?;
    parser.set_data_source(source(b"hijklmn"))?;
    parser.get_next()?;
    assert_eq!(parser.record_index(), 3);

    let settings = ParserSettings::default().with_reset_counter_on_source_change(true);
    let mut parser = parser_over(type_a(), settings, b"abcdefgABCDEFG");
    parser.skip(2)?;
    parser.set_data_source(source(b"hijklmn"))?;
    parser.get_next()?;
    assert_eq!(parser.record_index(), 1);
    Ok(())
}

#[test]
fn test_resume_at_recorded_position() -> anyhow::Result<()> {
    let mut parser = FixLenParser::new(type_a(), ParserSettings::default())?;
    parser.set_data_source(source(b"abcdefgABCDEFGhijklmn"))?;
    parser.set_position(7)?;
    parser.set_record_index(1);

    let record = parser.get_next()?.expect("second record");
    assert_eq!(record.text(0), Some("ABC"));
    assert_eq!(parser.position(), 14);
    assert_eq!(parser.record_index(), 2);
    assert!(parser.set_position(0).is_err());
    Ok(())
}

#[test]
fn test_invalid_record_type() {
    let no_fields = RecordType::new("empty", vec![]);
    assert!(FixLenParser::new(no_fields, ParserSettings::default()).is_err());

    let zero_length = RecordType::new("zero", vec![FieldDescriptor::text("f", 0)]);
    assert!(FixLenParser::new(zero_length, ParserSettings::default()).is_err());

    let unknown_charset = ParserSettings::default().with_charset("klingon");
    assert!(FixLenParser::new(type_a(), unknown_charset).is_err());
}
