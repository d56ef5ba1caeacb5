//! Office Open XML readers: DOCX body text and the first XLSX worksheet.
//!
//! Both formats are ZIP containers of XML parts. Entries are read with a
//! size bound (zip-bomb protection) and streamed through `quick-xml`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use super::ExtractError;
use crate::models::Row;

/// Maximum decompressed bytes to read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum cells to read from the worksheet (avoids unbounded memory).
const XLSX_MAX_CELLS: usize = 100_000;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn has_entry(archive: &Archive<'_>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn xml_error(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

// ============ DOCX ============

/// Extract raw text from `word/document.xml`: runs are concatenated,
/// paragraphs end with a newline, tabs and breaks are kept.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    if !has_entry(&archive, "word/document.xml") {
        return Err(ExtractError::Ooxml(
            "word/document.xml not found".to_string(),
        ));
    }
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;

    let mut out = String::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_text = false;
    // Tab stops inside paragraph properties are layout, not content.
    let mut in_props = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"pPr" => in_props = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                out.push_str(&te.unescape().map_err(xml_error)?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"pPr" => in_props = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if !in_props => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ============ XLSX ============

/// Read the first worksheet as records keyed by the header row.
///
/// The first non-empty row supplies the keys; cells under a blank header
/// are keyed by column letter. Empty cells are omitted and empty rows are
/// skipped.
pub fn extract_first_sheet_rows(bytes: &[u8]) -> Result<Vec<Row>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = if has_entry(&archive, "xl/sharedStrings.xml") {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let sheet = first_sheet_path(&mut archive)?;
    let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)?;
    let rows = read_sheet_cells(&sheet_xml, &shared_strings)?;
    Ok(rows_to_records(rows))
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = current.is_some(),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(xml_error)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Resolve the first sheet through `xl/workbook.xml` and its relationships,
/// falling back to the lowest-numbered `xl/worksheets/sheetN.xml`.
fn first_sheet_path(archive: &mut Archive<'_>) -> Result<String, ExtractError> {
    if let Some(path) = first_sheet_from_workbook(archive)? {
        if has_entry(archive, &path) {
            return Ok(path);
        }
    }
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::Ooxml("workbook has no worksheets".to_string()))
}

fn first_sheet_from_workbook(archive: &mut Archive<'_>) -> Result<Option<String>, ExtractError> {
    if !has_entry(archive, "xl/workbook.xml") || !has_entry(archive, "xl/_rels/workbook.xml.rels")
    {
        return Ok(None);
    }

    let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let Some(rel_id) = first_element_attr(&workbook, b"sheet", b"id")? else {
        return Ok(None);
    };

    let rels = read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)?;
    let mut reader = Reader::from_reader(rels.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attr(&e, b"Id").as_deref() == Some(rel_id.as_str()) {
                    return Ok(attr(&e, b"Target").map(|t| resolve_target(&t)));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(None)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Value of attribute `attr_name` (matched by local name) on the first
/// element named `element`.
fn first_element_attr(
    xml: &[u8],
    element: &[u8],
    attr_name: &[u8],
) -> Result<Option<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == element => {
                return Ok(attr(&e, attr_name));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
}

fn attr(e: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local_name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Shared,
    Inline,
    Bool,
    Str,
    Number,
}

impl CellKind {
    fn from_attr(t: Option<&str>) -> Self {
        match t {
            Some("s") => CellKind::Shared,
            Some("inlineStr") => CellKind::Inline,
            Some("b") => CellKind::Bool,
            Some("str") | Some("e") => CellKind::Str,
            _ => CellKind::Number,
        }
    }
}

type SheetRow = Vec<(usize, Value)>;

fn read_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<Vec<SheetRow>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<SheetRow> = Vec::new();
    let mut current: SheetRow = Vec::new();
    let mut cell: Option<(usize, CellKind)> = None;
    let mut next_col = 0usize;
    let mut in_value = false;
    let mut raw = String::new();
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS {
            tracing::warn!(limit = XLSX_MAX_CELLS, "worksheet cell limit reached");
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current.clear();
                    next_col = 0;
                }
                b"c" => {
                    let col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    let kind = CellKind::from_attr(attr(&e, b"t").as_deref());
                    cell = Some((col, kind));
                    raw.clear();
                }
                b"v" | b"t" if cell.is_some() => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                next_col = attr(&e, b"r")
                    .and_then(|r| column_index(&r))
                    .unwrap_or(next_col)
                    + 1;
            }
            Ok(Event::Text(te)) if in_value => {
                raw.push_str(&te.unescape().map_err(xml_error)?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some((col, kind)) = cell.take() {
                        next_col = col + 1;
                        if let Some(value) = cell_value(kind, &raw, shared_strings) {
                            current.push((col, value));
                            cell_count += 1;
                        }
                    }
                }
                b"row" => {
                    if !current.is_empty() {
                        rows.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn cell_value(kind: CellKind, raw: &str, shared_strings: &[String]) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match kind {
        CellKind::Shared => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i))
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.clone())),
        CellKind::Inline | CellKind::Str => Some(Value::String(raw.to_string())),
        CellKind::Bool => Some(Value::Bool(raw.trim() == "1")),
        CellKind::Number => Some(number_value(raw.trim())),
    }
}

fn number_value(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Value::from(n as i64),
        Ok(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Err(_) => Value::String(raw.to_string()),
    }
}

fn rows_to_records(rows: Vec<SheetRow>) -> Vec<Row> {
    let mut rows = rows.into_iter();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers: BTreeMap<usize, String> = header_row
        .into_iter()
        .map(|(col, value)| {
            let name = match value {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Value::String(_) => column_letter(col),
                other => other.to_string(),
            };
            (col, name)
        })
        .collect();

    rows.map(|row| {
        row.into_iter()
            .map(|(col, value)| {
                let key = headers
                    .get(&col)
                    .cloned()
                    .unwrap_or_else(|| column_letter(col));
                (key, value)
            })
            .collect::<Row>()
    })
    .filter(|record| !record.is_empty())
    .collect()
}

/// Zero-based column index from a cell reference such as `AB12`.
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let index = letters
        .to_ascii_uppercase()
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    Some(index - 1)
}

fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
