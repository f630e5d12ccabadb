use flatbeam::io::FileSet;
use flatbeam::io::glob::{expand_glob, expand_glob_required};
use flatbeam::parser::{DataParser, FixLenParser, ParserSettings};
use flatbeam::testing::*;
use std::io::Read;

fn split_extract() -> anyhow::Result<TempDirPath> {
    let dir = TempDirPath::new()?;
    dir.write_file("part-2.dat", b"ghijklmnopqrst")?;
    dir.write_file("part-1.dat", b"abcdefgABCDEFG")?;
    dir.write_file("other.txt", b"not part of the extract")?;
    std::fs::create_dir(dir.file_path("part-3.dat.d"))?;
    Ok(dir)
}

fn pattern(dir: &TempDirPath) -> String {
    dir.path().join("part-*.dat").to_string_lossy().into_owned()
}

#[test]
fn test_glob_expansion_is_sorted() -> anyhow::Result<()> {
    let dir = split_extract()?;
    let files = expand_glob(&pattern(&dir))?;

    let names: Vec<_> = files
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["part-1.dat", "part-2.dat"]);
    Ok(())
}

#[test]
fn test_glob_skips_directories() -> anyhow::Result<()> {
    let dir = split_extract()?;
    let all = dir.path().join("part-*").to_string_lossy().into_owned();
    assert_eq!(expand_glob(&all)?.len(), 2);
    Ok(())
}

#[test]
fn test_no_match() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let missing = dir.path().join("*.dat").to_string_lossy().into_owned();

    assert!(expand_glob(&missing)?.is_empty());
    let err = expand_glob_required(&missing).unwrap_err();
    assert!(err.to_string().contains("no input files match"));
    assert!(FileSet::from_glob(&missing).is_err());
    Ok(())
}

#[test]
fn test_invalid_pattern() {
    assert!(expand_glob("[unclosed").is_err());
}

#[test]
fn test_file_set_parses_parts_as_one_stream() -> anyhow::Result<()> {
    let dir = split_extract()?;
    let mut files = FileSet::from_glob(&pattern(&dir))?;
    assert_eq!(files.files().len(), 2);

    let mut parser = FixLenParser::new(type_a(), ParserSettings::default())?;
    let records = files.read_all(&mut parser)?;

    assert_texts(
        &records,
        &[&["abc", "defg"], &["ABC", "DEFG"], &["ghi", "jklm"], &["nop", "qrst"]],
    );
    // numbering continues across parts
    assert_eq!(parser.record_index(), 4);
    assert!(files.remaining().is_empty());
    Ok(())
}

#[test]
fn test_file_set_with_counter_reset() -> anyhow::Result<()> {
    let dir = split_extract()?;
    let settings = ParserSettings::default().with_reset_counter_on_source_change(true);
    let mut parser = FixLenParser::new(type_a(), settings)?;

    let records = FileSet::from_glob(&pattern(&dir))?.read_all(&mut parser)?;
    assert_eq!(records.len(), 4);
    assert_eq!(parser.record_index(), 2);
    Ok(())
}

#[test]
fn test_file_set_reports_failing_part() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    dir.write_file("part-1.dat", b"abcdefg")?;
    dir.write_file("part-2.dat", b"ABCDE")?;

    let mut parser = FixLenParser::new(type_a(), ParserSettings::default())?;
    let err = FileSet::from_glob(&pattern(&dir))?
        .read_all(&mut parser)
        .unwrap_err();
    assert!(format!("{err:#}").contains("part-2.dat"));
    Ok(())
}

#[test]
fn test_open_next_walks_the_list() -> anyhow::Result<()> {
    let dir = split_extract()?;
    let mut files = FileSet::new(vec![
        dir.file_path("part-1.dat"),
        dir.file_path("other.txt"),
    ]);
    assert_eq!(files.remaining().len(), 2);

    let (path, mut source) = files.open_next()?.expect("first file");
    assert!(path.ends_with("part-1.dat"));
    let mut text = String::new();
    source.read_to_string(&mut text)?;
    assert_eq!(text, "abcdefgABCDEFG");
    assert_eq!(files.remaining().len(), 1);

    assert!(files.open_next()?.is_some());
    assert!(files.open_next()?.is_none());
    Ok(())
}
