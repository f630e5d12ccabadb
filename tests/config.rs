use flatbeam::config::{ParserConfig, SelectorKind};
use flatbeam::decoder::DecoderMode;
use flatbeam::error::ConfigError;
use flatbeam::parser::DataParser;
use flatbeam::policy::ExceptionPolicy;
use flatbeam::testing::*;
use std::io::Cursor;

const LEDGER_CONFIG: &str = r#"{
    "mode": "char",
    "policy": "lenient",
    "decoder": { "skip_trailing_blanks": true },
    "pool": [
        { "name": "header", "fields": [
            { "name": "tag", "length": 3, "nullable": false },
            { "name": "date", "length": 8 }
        ] },
        { "name": "detail", "fields": [
            { "name": "tag", "length": 3, "nullable": false },
            { "name": "amount", "length": 6 }
        ] }
    ],
    "selector": { "kind": "prefix", "properties": { "HDR": 0, "DTL": 1 } }
}"#;

fn drain(parser: &mut dyn DataParser) -> anyhow::Result<Vec<flatbeam::record::Record>> {
    let mut records = Vec::new();
    while let Some(record) = parser.get_next()? {
        records.push(record);
    }
    Ok(records)
}

#[test]
fn test_settings_from_json() -> anyhow::Result<()> {
    let config = ParserConfig::from_json_str(LEDGER_CONFIG)?;

    assert_eq!(config.settings.mode, DecoderMode::Char);
    assert_eq!(config.settings.policy, ExceptionPolicy::Lenient);
    assert!(config.settings.decoder.skip_trailing_blanks);
    assert!(!config.settings.decoder.skip_leading_blanks);
    // absent settings keep their defaults
    assert_eq!(config.settings.charset, None);
    assert!(config.settings.release_data_source);
    assert_eq!(config.pool.len(), 2);
    assert!(!config.pool[0].fields[0].nullable);
    assert!(config.pool[0].fields[1].nullable);
    assert_eq!(config.selector.as_ref().map(|s| s.kind), Some(SelectorKind::Prefix));
    Ok(())
}

#[test]
fn test_build_dispatches_on_selector_section() -> anyhow::Result<()> {
    let config = ParserConfig::from_json_str(LEDGER_CONFIG)?;
    let mut parser = config.build()?;
    parser.set_data_source(Box::new(Cursor::new(b"HDR20240131DTL42    DTL7     ".to_vec())))?;

    let records = drain(parser.as_mut())?;
    assert_types(&records, &[0, 1, 1]);
    assert_texts(&records, &[&["HDR", "20240131"], &["DTL", "42"], &["DTL", "7"]]);
    Ok(())
}

#[test]
fn test_single_type_configuration() -> anyhow::Result<()> {
    let config = ParserConfig::from_json_str(
        r#"{ "pool": [{ "name": "TypeA", "fields": [
            { "name": "a1", "length": 3 },
            { "name": "a2", "length": 4 }
        ] }] }"#,
    )?;
    let mut parser = config.build_fixlen()?;
    assert_eq!(parser.record_type(), &type_a());

    parser.set_data_source(Box::new(Cursor::new(b"abcdefgABCDEFG".to_vec())))?;
    let records = collect_records(&mut parser)?;
    assert_texts(&records, &[&["abc", "defg"], &["ABC", "DEFG"]]);

    let mut boxed = config.build()?;
    boxed.set_data_source(Box::new(Cursor::new(b"abcdefg".to_vec())))?;
    assert_eq!(drain(boxed.as_mut())?.len(), 1);
    Ok(())
}

#[test]
fn test_single_type_parser_needs_one_type() -> anyhow::Result<()> {
    let mut config = ParserConfig::from_json_str(LEDGER_CONFIG)?;
    assert!(matches!(config.build_fixlen(), Err(ConfigError::InvalidMetadata(_))));

    // without a selector the pool must collapse to one type
    config.selector = None;
    assert!(config.build().is_err());
    Ok(())
}

#[test]
fn test_multi_level_parser_needs_selector() -> anyhow::Result<()> {
    let mut config = ParserConfig::from_json_str(LEDGER_CONFIG)?;
    config.selector = None;
    let err = config.build_multi_level().unwrap_err();
    assert!(err.to_string().contains("selector section"));
    Ok(())
}

#[test]
fn test_position_selector_from_configuration() -> anyhow::Result<()> {
    let config = ParserConfig::from_json_str(
        r#"{
            "pool": [
                { "name": "h", "fields": [{ "name": "seq", "length": 2 }, { "name": "rest", "length": 3 }] },
                { "name": "d", "fields": [{ "name": "seq", "length": 2 }, { "name": "rest", "length": 5 }] }
            ],
            "selector": {
                "kind": "position",
                "properties": { "selector.position": 2, "H": 0, "D": 1 }
            }
        }"#,
    )?;
    let mut parser = config.build_multi_level()?;
    parser.set_data_source(Box::new(Cursor::new(b"01Hxy02Dabcd".to_vec())))?;

    let records = collect_records(&mut parser)?;
    assert_texts(&records, &[&["01", "Hxy"], &["02", "Dabcd"]]);
    Ok(())
}

#[test]
fn test_load_resolves_properties_file() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    dir.write_file("ledger.properties", b"# tags of the ledger extract\nHDR=0\nDTL=1\n")?;
    let path = dir.write_file(
        "ledger.json",
        br#"{
            "pool": [
                { "name": "header", "fields": [{ "name": "tag", "length": 3 }, { "name": "date", "length": 8 }] },
                { "name": "detail", "fields": [{ "name": "tag", "length": 3 }, { "name": "amount", "length": 6 }] }
            ],
            "selector": { "properties_file": "ledger.properties" }
        }"#,
    )?;

    let config = ParserConfig::load(&path)?;
    let section = config.selector.as_ref().expect("selector section");
    let properties = dir.file_path("ledger.properties");
    assert_eq!(section.properties_file.as_deref(), Some(properties.as_path()));
    assert_eq!(section.resolve_properties()?.mapping().count(), 2);

    let mut parser = config.build_multi_level()?;
    parser.set_data_source(Box::new(Cursor::new(b"HDR20240131DTL000042".to_vec())))?;
    assert_types(&collect_records(&mut parser)?, &[0, 1]);
    Ok(())
}

#[test]
fn test_missing_properties_file() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let mut config = ParserConfig::from_json_str(LEDGER_CONFIG)?;
    if let Some(section) = config.selector.as_mut() {
        section.properties_file = Some(dir.file_path("absent.properties"));
    }
    let err = config.build_multi_level().unwrap_err();
    assert!(err.to_string().contains("absent.properties"));
    Ok(())
}

#[test]
fn test_json_round_trip() -> anyhow::Result<()> {
    let config = ParserConfig::from_json_str(LEDGER_CONFIG)?;
    let json = config.to_json()?;
    assert_eq!(ParserConfig::from_json_str(&json)?, config);
    Ok(())
}

#[test]
fn test_invalid_configurations() {
    let unknown_charset = ParserConfig::from_json_str(
        r#"{ "charset": "no-such-charset", "pool": [{ "name": "t", "fields": [{ "name": "f", "length": 1 }] }] }"#,
    );
    let config = unknown_charset.expect("well-formed JSON");
    assert!(matches!(
        config.build_fixlen(),
        Err(ConfigError::UnsupportedCharset(name)) if name == "no-such-charset"
    ));

    assert!(ParserConfig::from_json_str(r#"{ "mode": "nibble", "pool": [] }"#).is_err());
    assert!(ParserConfig::from_json_str("not json").is_err());

    let empty_pool = ParserConfig::from_json_str(r#"{ "pool": [], "selector": {} }"#)
        .expect("well-formed JSON");
    assert!(empty_pool.build_multi_level().is_err());
}
