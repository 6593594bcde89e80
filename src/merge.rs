//! Merging stored records into one document for a single transform pass
//!
//! Each record's prolog is stripped, its id is written onto its root element
//! and the fragments are concatenated inside a synthetic `<MERGED-TEI>` root.
//! The merged text is parsed once; a single malformed record fails the whole
//! merge.

use crate::models::Record;
use crate::{Result, TeiViewerError};
use log::debug;
use regex::Regex;
use roxmltree::{Document, ParsingOptions};
use std::sync::LazyLock;

/// Name of the synthetic root element
pub const MERGED_ROOT: &str = "MERGED-TEI";

static DECLARATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?xml\s.*?\?>").unwrap());

static DOCTYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!DOCTYPE[^\[>]*(\[.*?\])?\s*>").unwrap());

static ID_ATTR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s)id\s*=\s*("[^"]*"|'[^']*')"#).unwrap());

/// A well-formed merged document
#[derive(Debug, Clone)]
pub struct MergedDocument {
    text: String,
    record_ids: Vec<i64>,
}

impl MergedDocument {
    /// Raw merged XML
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Ids of the merged records, in merge order
    pub fn record_ids(&self) -> &[i64] {
        &self.record_ids
    }

    pub fn record_count(&self) -> usize {
        self.record_ids.len()
    }

    /// Parse the merged text
    pub fn parse(&self) -> Result<Document<'_>> {
        Ok(Document::parse(&self.text)?)
    }
}

/// Check that one record can be stored and later merged
///
/// A DOCTYPE naming an external DTD is accepted; it is dropped at merge time.
/// An internal subset is rejected since its entities would be undefined once
/// the DOCTYPE is removed.
pub fn check_document(name: &str, xml: &str) -> Result<()> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Document::parse_with_options(xml, options)
        .map_err(|e| TeiViewerError::Parse(format!("Invalid XML in {}: {}", name, e)))?;

    let subset = DOCTYPE_REGEX
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_start_matches('[').trim_end_matches(']').trim());
    if subset.is_some_and(|s| !s.is_empty()) {
        return Err(TeiViewerError::Validation(format!(
            "{} declares an internal DTD subset, which is not supported",
            name
        )));
    }
    Ok(())
}

/// Remove XML declarations (and any DOCTYPE) so the text can be embedded
pub fn strip_declaration(xml: &str) -> String {
    let without_decl = DECLARATION_REGEX.replace_all(xml, "");
    let without_doctype = DOCTYPE_REGEX.replace_all(&without_decl, "");
    without_doctype
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

/// Set `id="<id>"` on the root element of an XML fragment
///
/// An existing `id` attribute on the root is replaced. Text without a root
/// start tag is returned unchanged.
pub fn inject_id(xml: &str, id: i64) -> String {
    let Some((name_end, tag_end)) = root_start_tag(xml) else {
        return xml.to_string();
    };

    let attrs = &xml[name_end..tag_end];
    let id_attr = format!("id=\"{}\"", id);

    let mut out = String::with_capacity(xml.len() + id_attr.len() + 1);
    out.push_str(&xml[..name_end]);
    if ID_ATTR_REGEX.is_match(attrs) {
        let replaced = ID_ATTR_REGEX.replace(attrs, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], id_attr)
        });
        out.push_str(&replaced);
    } else {
        out.push(' ');
        out.push_str(&id_attr);
        out.push_str(attrs);
    }
    out.push_str(&xml[tag_end..]);
    out
}

/// Merge records into one document under `<MERGED-TEI>`
pub fn merge_documents(records: &[Record]) -> Result<MergedDocument> {
    let mut text = String::new();
    text.push('<');
    text.push_str(MERGED_ROOT);
    text.push('>');

    for record in records {
        let fragment = strip_declaration(&record.xml);
        text.push_str(&inject_id(&fragment, record.id));
    }

    text.push_str("</");
    text.push_str(MERGED_ROOT);
    text.push('>');

    if let Err(e) = Document::parse(&text) {
        return Err(TeiViewerError::Parse(format!(
            "Merged document is not well-formed: {}",
            e
        )));
    }

    debug!("Merged {} records ({} bytes)", records.len(), text.len());
    Ok(MergedDocument {
        text,
        record_ids: records.iter().map(|r| r.id).collect(),
    })
}

/// Locate the root start tag: (end of the element name, index of `>` or `/>`)
fn root_start_tag(xml: &str) -> Option<(usize, usize)> {
    let bytes = xml.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_whitespace() => i += 1,
            b'<' if xml[i..].starts_with("<?") => i += xml[i..].find("?>")? + 2,
            b'<' if xml[i..].starts_with("<!--") => i += xml[i..].find("-->")? + 3,
            b'<' if xml[i..].starts_with("<!") => i += xml[i..].find('>')? + 1,
            b'<' => {
                let name_start = i + 1;
                let name_len = xml[name_start..]
                    .find(|c: char| c.is_whitespace() || c == '/' || c == '>')?;
                let name_end = name_start + name_len;
                return find_tag_end(xml, name_end).map(|tag_end| (name_end, tag_end));
            }
            _ => return None,
        }
    }
    None
}

/// Index of the `>` (or the `/` of `/>`) closing a start tag, skipping quoted values
fn find_tag_end(xml: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in xml[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '/') if xml[from + offset..].starts_with("/>") => return Some(from + offset),
            (None, '>') => return Some(from + offset),
            _ => {}
        }
    }
    None
}
