use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{HydroError, Result};
use crate::models::{BidStatus, ImportedBid};
use crate::settings::Session;
use crate::store::{Filter, Row, Store};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses currency-formatted text: `"$12,345.67"` -> `12345.67`. Blank or unparsable -> `None`.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Strict integer parse after trimming: `"12 days"` -> `None`.
pub fn parse_days(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// `"  Estimated   Value "` -> `"estimated_value"`.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Field aliases
// ---------------------------------------------------------------------------

/// Candidate source names per canonical field, tried in order; first non-empty wins.
struct FieldAliases {
    bid_number: &'static [&'static str],
    project_name: &'static [&'static str],
    client_name: &'static [&'static str],
    client_contact: &'static [&'static str],
    client_email: &'static [&'static str],
    client_phone: &'static [&'static str],
    location: &'static [&'static str],
    description: &'static [&'static str],
    estimated_value: &'static [&'static str],
    estimated_duration_days: &'static [&'static str],
}

/// Matched against normalized headers.
const CSV_FIELDS: FieldAliases = FieldAliases {
    bid_number: &["bid_number", "bid_no", "number", "id"],
    project_name: &["project_name", "project", "name"],
    client_name: &["client_name", "client", "owner"],
    client_contact: &["client_contact", "contact"],
    client_email: &["client_email", "email"],
    client_phone: &["client_phone", "phone"],
    location: &["location", "address"],
    description: &["description", "scope"],
    estimated_value: &["estimated_value"],
    estimated_duration_days: &["estimated_duration_days", "duration"],
};

/// Matched against child tag names verbatim. Duration is not read from XML exports.
const XML_FIELDS: FieldAliases = FieldAliases {
    bid_number: &["bid_number", "BidNumber", "number", "Number", "id", "ID"],
    project_name: &["project_name", "ProjectName", "project", "Project", "name", "Name"],
    client_name: &["client_name", "ClientName", "client", "Client", "owner", "Owner"],
    client_contact: &["client_contact", "ClientContact", "contact", "Contact"],
    client_email: &["client_email", "ClientEmail", "email", "Email"],
    client_phone: &["client_phone", "ClientPhone", "phone", "Phone"],
    location: &["location", "Location", "address", "Address"],
    description: &["description", "Description", "scope", "Scope"],
    estimated_value: &[
        "estimated_value",
        "EstimatedValue",
        "value",
        "Value",
        "amount",
        "Amount",
    ],
    estimated_duration_days: &[],
};

const XML_BID_TAGS: &[&str] = &["bid", "estimate", "item", "Bid", "Estimate", "Item"];

/// Builds a record from a lookup over source fields. `None` when a required field is missing.
fn map_record<F>(aliases: &FieldAliases, lookup: F) -> Option<ImportedBid>
where
    F: Fn(&[&str]) -> Option<String>,
{
    let bid_number = lookup(aliases.bid_number)?;
    let project_name = lookup(aliases.project_name)?;
    Some(ImportedBid {
        bid_number,
        project_name,
        client_name: lookup(aliases.client_name).unwrap_or_default(),
        client_contact: lookup(aliases.client_contact),
        client_email: lookup(aliases.client_email),
        client_phone: lookup(aliases.client_phone),
        location: lookup(aliases.location),
        description: lookup(aliases.description),
        estimated_value: lookup(aliases.estimated_value).and_then(|v| parse_currency(&v)),
        estimated_duration_days: lookup(aliases.estimated_duration_days)
            .and_then(|v| parse_days(&v)),
        status: BidStatus::Draft,
    })
}

/// Output of a parse: the records that survived mapping plus how many were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBids {
    pub records: Vec<ImportedBid>,
    pub skipped: usize,
}

impl ParsedBids {
    fn push(&mut self, record: Option<ImportedBid>) {
        match record {
            Some(r) => self.records.push(r),
            None => self.skipped += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Import formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Xml,
}

const ALL_FORMATS: &[ImportFormat] = &[ImportFormat::Csv, ImportFormat::Xml];

impl ImportFormat {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xml => "xml",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "Delimited text (CSV)",
            Self::Xml => "Estimating export (XML)",
        }
    }

    fn extensions(&self) -> &[&str] {
        match self {
            Self::Csv => &["csv", "txt"],
            Self::Xml => &["xml"],
        }
    }

    pub fn parse(&self, text: &str) -> Result<ParsedBids> {
        match self {
            Self::Csv => parse_csv(text),
            Self::Xml => parse_xml(text),
        }
    }
}

pub fn get_by_key(key: &str) -> Option<ImportFormat> {
    let key = key.trim().to_lowercase();
    ALL_FORMATS.iter().find(|f| f.key() == key).copied()
}

/// Picks a format from the file extension, falling back to sniffing the content.
pub fn get_for_file(file_path: &Path, text: &str) -> ImportFormat {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    if let Some(ext) = ext {
        if let Some(format) = ALL_FORMATS.iter().find(|f| f.extensions().contains(&ext.as_str())) {
            return *format;
        }
    }
    if text.trim_start().starts_with('<') {
        ImportFormat::Xml
    } else {
        ImportFormat::Csv
    }
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ImportResult {
    pub format: ImportFormat,
    pub imported: usize,
    pub skipped: usize,
    pub duplicate_file: bool,
}

/// Reads and decodes an import file, dropping a UTF-8 byte-order mark.
pub fn read_import_text(file_path: &Path) -> Result<(Vec<u8>, String)> {
    let data = std::fs::read(file_path)?;
    let text = std::str::from_utf8(&data)
        .map_err(|e| HydroError::Other(format!("{} is not valid UTF-8: {e}", file_path.display())))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text).to_string();
    Ok((data, text))
}

/// Parses a file without touching the store.
pub fn preview_file(file_path: &Path, format_key: Option<&str>) -> Result<(ImportFormat, ParsedBids)> {
    let (_, text) = read_import_text(file_path)?;
    let format = resolve_format(file_path, &text, format_key)?;
    Ok((format, format.parse(&text)?))
}

fn resolve_format(file_path: &Path, text: &str, format_key: Option<&str>) -> Result<ImportFormat> {
    match format_key {
        Some(key) => get_by_key(key).ok_or_else(|| HydroError::UnknownFormat(key.to_string())),
        None => Ok(get_for_file(file_path, text)),
    }
}

pub fn import_file(
    store: &dyn Store,
    file_path: &Path,
    format_key: Option<&str>,
    session: &Session,
) -> Result<ImportResult> {
    let (data, text) = read_import_text(file_path)?;
    let format = resolve_format(file_path, &text, format_key)?;

    let checksum = compute_checksum(&data);
    if !store.select("imports", &Filter::eq("checksum", checksum.as_str()), &[])?.is_empty() {
        info!(file = %file_path.display(), "file already imported");
        return Ok(ImportResult {
            format,
            imported: 0,
            skipped: 0,
            duplicate_file: true,
        });
    }

    // A parse error aborts here, before anything is written.
    let parsed = format.parse(&text)?;

    let rows = parsed
        .records
        .iter()
        .map(ImportedBid::to_row)
        .collect::<Result<Vec<Row>>>()?;
    let inserted = if rows.is_empty() { Vec::new() } else { store.insert("bids", &rows)? };
    let bid_ids: Vec<i64> = inserted
        .iter()
        .filter_map(|r| r.get("id").and_then(|id| id.as_i64()))
        .collect();

    // Written after the bids; its checksum marks the file as imported.
    let batch = store.insert(
        "imports",
        &[crate::models::into_row(&json!({
            "filename": file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            "format": format.key(),
            "record_count": inserted.len(),
            "skipped_count": parsed.skipped,
            "checksum": checksum,
            "imported_by": session.user_name.as_str(),
        }))?],
    );
    let batch = match batch {
        Ok(batch) => batch,
        Err(e) => {
            warn!(file = %file_path.display(), error = %e, "import batch not recorded; removing its bids");
            if !bid_ids.is_empty() {
                store.delete("bids", &Filter::any_of("id", bid_ids.iter().copied()))?;
            }
            return Err(e);
        }
    };

    if let Some(import_id) = batch.first().and_then(|r| r.get("id")).and_then(|id| id.as_i64()) {
        if !bid_ids.is_empty() {
            store.update(
                "bids",
                &crate::models::into_row(&json!({ "import_id": import_id }))?,
                &Filter::any_of("id", bid_ids.iter().copied()),
            )?;
        }
    }

    info!(
        file = %file_path.display(),
        format = format.key(),
        imported = inserted.len(),
        skipped = parsed.skipped,
        "bids imported"
    );
    Ok(ImportResult {
        format,
        imported: inserted.len(),
        skipped: parsed.skipped,
        duplicate_file: false,
    })
}

// ---------------------------------------------------------------------------
// CSV parser
// ---------------------------------------------------------------------------

pub fn parse_csv(text: &str) -> Result<ParsedBids> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();

    let mut parsed = ParsedBids::default();
    for result in rdr.records() {
        // Malformed structure fails the whole file.
        let record = result?;
        let lookup = |aliases: &[&str]| {
            aliases.iter().find_map(|alias| {
                headers
                    .iter()
                    .zip(record.iter())
                    .filter(|(header, _)| header.as_str() == *alias)
                    .find_map(|(_, value)| non_empty(value))
            })
        };
        parsed.push(map_record(&CSV_FIELDS, lookup));
    }

    debug!(records = parsed.records.len(), skipped = parsed.skipped, "parsed CSV");
    if parsed.skipped > 0 {
        warn!(skipped = parsed.skipped, "CSV rows missing bid number or project name were skipped");
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// XML parser
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    content: Vec<XmlContent>,
}

#[derive(Debug)]
enum XmlContent {
    Text(String),
    Element(XmlElement),
}

impl XmlElement {
    fn new(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            content: Vec::new(),
        }
    }

    fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.content.iter().filter_map(|c| match c {
            XmlContent::Element(e) => Some(e),
            XmlContent::Text(_) => None,
        })
    }

    /// Concatenated text of this element and all its descendants, in document order.
    fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for c in &self.content {
            match c {
                XmlContent::Text(t) => out.push_str(t),
                XmlContent::Element(e) => e.collect_text(out),
            }
        }
    }

    /// First descendant (not self) named `name`, in document order.
    fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        for child in self.children() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Self and every descendant whose name is in `names`, in document order.
    fn collect_named<'a>(&'a self, names: &[&str], out: &mut Vec<&'a XmlElement>) {
        if names.contains(&self.name.as_str()) {
            out.push(self);
        }
        for child in self.children() {
            child.collect_named(names, out);
        }
    }
}

fn xml_error(reader: &Reader<&[u8]>, message: impl std::fmt::Display) -> HydroError {
    HydroError::Xml(format!("{message} (at byte {})", reader.buffer_position()))
}

/// Parses a full document into its root element, failing on any structural error.
fn parse_document(text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                if root.is_some() && stack.is_empty() {
                    return Err(xml_error(&reader, "content after the root element"));
                }
                stack.push(XmlElement::new(e.name().as_ref()));
            }
            Event::Empty(e) => {
                let element = XmlElement::new(e.name().as_ref());
                match stack.last_mut() {
                    Some(parent) => parent.content.push(XmlContent::Element(element)),
                    None if root.is_none() => root = Some(element),
                    None => return Err(xml_error(&reader, "content after the root element")),
                }
            }
            Event::End(e) => {
                let Some(element) = stack.pop() else {
                    return Err(xml_error(&reader, "closing tag without an opening tag"));
                };
                if element.name.as_bytes() != e.name().as_ref() {
                    return Err(xml_error(
                        &reader,
                        format!(
                            "expected </{}>, found </{}>",
                            element.name,
                            String::from_utf8_lossy(e.name().as_ref())
                        ),
                    ));
                }
                match stack.last_mut() {
                    Some(parent) => parent.content.push(XmlContent::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| xml_error(&reader, e))?.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.content.push(XmlContent::Text(text)),
                    None if text.trim().is_empty() => {}
                    None => return Err(xml_error(&reader, "text outside the root element")),
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.content.push(XmlContent::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(&reader, format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| HydroError::Xml("document has no root element".to_string()))
}

pub fn parse_xml(text: &str) -> Result<ParsedBids> {
    let root = parse_document(text)?;

    let mut elements = Vec::new();
    root.collect_named(XML_BID_TAGS, &mut elements);
    if elements.is_empty() {
        return Err(HydroError::NoBidElements);
    }

    let mut parsed = ParsedBids::default();
    for element in elements {
        let lookup = |aliases: &[&str]| {
            aliases.iter().find_map(|tag| {
                element
                    .find_descendant(tag)
                    .and_then(|child| non_empty(&child.text_content()))
            })
        };
        parsed.push(map_record(&XML_FIELDS, lookup));
    }

    debug!(records = parsed.records.len(), skipped = parsed.skipped, "parsed XML");
    if parsed.skipped > 0 {
        warn!(skipped = parsed.skipped, "XML elements missing bid number or project name were skipped");
    }
    Ok(parsed)
}
