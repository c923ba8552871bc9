//! BibTeX importer
//!
//! Parses entries, `@string` definitions and `@comment{jabref-meta: ...}` blocks.
//! Unquoted macro names in values are stored as `#name#` references; they are
//! resolved later against the collection's strings. Text between entries is
//! ignored. Parsing stops at the first malformed entry and reports its line.

use super::{decode, Importer, ParseResult};
use crate::error::ImportError;
use bibflow_common::model::LinkedFile;
use bibflow_common::{Field, Record, RecordCollection};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static ENTRY_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*@[A-Za-z]+\s*[{(]").expect("entry pattern is valid"));
static ENCODING_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^%\s*Encoding:\s*(\S+)").expect("encoding pattern is valid"));

const META_PREFIX: &str = "jabref-meta:";
const GROUPS_TREE_KEY: &str = "groupstree:";

/// Result of parsing BibTeX text
#[derive(Debug, Default)]
pub struct BibtexParse {
    pub collection: RecordCollection,
    pub warnings: Vec<String>,
    /// Line and message of the failure that stopped parsing
    pub error: Option<(usize, String)>,
}

/// Parse BibTeX text into a collection
pub fn parse_bibtex(text: &str) -> BibtexParse {
    let mut parse = BibtexParse::default();
    if let Some(caps) = ENCODING_HEADER.captures(text) {
        parse.collection.metadata.encoding = Some(caps[1].to_string());
    }

    let mut cursor = Cursor::new(text);
    let mut keys = HashSet::new();

    while cursor.skip_to_entry() {
        let start_line = cursor.line;
        if let Err(message) = parse_block(&mut cursor, &mut parse, &mut keys) {
            parse.error = Some((cursor.line.max(start_line), message));
            break;
        }
    }
    parse
}

fn parse_block(
    cursor: &mut Cursor,
    parse: &mut BibtexParse,
    keys: &mut HashSet<String>,
) -> Result<(), String> {
    let entry_type = cursor.identifier();
    if entry_type.is_empty() {
        return Err("expected entry type after '@'".to_string());
    }
    cursor.skip_ws();
    let close = match cursor.bump() {
        Some('{') => '}',
        Some('(') => ')',
        Some(c) => return Err(format!("expected '{{' or '(' after @{}, found '{}'", entry_type, c)),
        None => return Err("unexpected end of input".to_string()),
    };

    match entry_type.to_lowercase().as_str() {
        "comment" => {
            let body = cursor.balanced(close)?;
            parse_meta(&body, &mut parse.collection);
        }
        "preamble" => {
            cursor.balanced(close)?;
        }
        "string" => {
            cursor.skip_ws();
            let name = cursor.identifier();
            if name.is_empty() {
                return Err("expected string name".to_string());
            }
            cursor.skip_ws();
            cursor.eat('=')?;
            let value = parse_value(cursor, close)?;
            cursor.skip_ws();
            cursor.eat(close)?;
            parse.collection.add_string(name, value);
        }
        _ => {
            let record = parse_entry(cursor, &entry_type, close, &mut parse.warnings)?;
            if let Some(key) = &record.citation_key {
                if !keys.insert(key.clone()) {
                    parse.warnings.push(format!("Duplicate citation key '{}'", key));
                }
            }
            parse.collection.push(record);
        }
    }
    Ok(())
}

fn parse_entry(
    cursor: &mut Cursor,
    entry_type: &str,
    close: char,
    warnings: &mut Vec<String>,
) -> Result<Record, String> {
    let mut record = Record::new(entry_type);

    cursor.skip_ws();
    let key = cursor.take_while(|c| c != ',' && c != close && c != '}' && !c.is_whitespace());
    if !key.is_empty() {
        record.citation_key = Some(key);
    }
    cursor.skip_ws();
    if cursor.peek() == Some(close) {
        cursor.bump();
        return Ok(record);
    }
    cursor.eat(',')?;

    loop {
        cursor.skip_ws();
        if cursor.peek() == Some(close) {
            cursor.bump();
            break;
        }
        let name = cursor.identifier();
        if name.is_empty() {
            return Err(match cursor.peek() {
                Some(c) => format!("expected field name, found '{}'", c),
                None => "unexpected end of input".to_string(),
            });
        }
        cursor.skip_ws();
        cursor.eat('=')?;
        let value = parse_value(cursor, close)?;
        let field = Field::from_name(&name);
        if record.set_field(field.clone(), value).is_some() {
            warnings.push(format!(
                "Field '{}' repeated in entry {}",
                field,
                record.citation_key.as_deref().unwrap_or("<no key>")
            ));
        }

        cursor.skip_ws();
        match cursor.peek() {
            Some(',') => {
                cursor.bump();
            }
            Some(c) if c == close => {
                cursor.bump();
                break;
            }
            Some(c) => return Err(format!("expected ',' or '{}', found '{}'", close, c)),
            None => return Err("unexpected end of input".to_string()),
        }
    }

    if let Some(files) = record.clear_field(&Field::File) {
        record.files = LinkedFile::parse_list(&files);
    }
    Ok(record)
}

/// `part (# part)*` where a part is `{...}`, `"..."`, a number or a macro name
fn parse_value(cursor: &mut Cursor, close: char) -> Result<String, String> {
    let mut value = String::new();
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            Some('{') => {
                cursor.bump();
                value.push_str(&cursor.balanced('}')?);
            }
            Some('"') => {
                cursor.bump();
                value.push_str(&cursor.quoted()?);
            }
            Some(c) if c.is_ascii_digit() => {
                value.push_str(&cursor.take_while(|c| c.is_ascii_digit()));
            }
            Some(c) if c.is_alphabetic() => {
                let name = cursor.identifier();
                value.push('#');
                value.push_str(&name);
                value.push('#');
            }
            Some(c) if c == close || c == ',' => {
                return Err("expected value".to_string());
            }
            Some(c) => return Err(format!("unexpected '{}' in value", c)),
            None => return Err("unexpected end of input".to_string()),
        }
        cursor.skip_ws();
        if cursor.peek() == Some('#') {
            cursor.bump();
        } else {
            return Ok(value);
        }
    }
}

/// Handle `jabref-meta:` comments; other comments are dropped
fn parse_meta(body: &str, collection: &mut RecordCollection) {
    let Some(meta) = body.trim().strip_prefix(META_PREFIX) else {
        return;
    };
    if let Some(tree) = meta.trim_start().strip_prefix(GROUPS_TREE_KEY) {
        collection.metadata.legacy_group_lines.extend(
            tree.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Advance past the next '@' that opens an entry; false at end of input
    ///
    /// An '@' only counts when a type name and then '{' or '(' follow, so
    /// addresses in free text between entries are skipped.
    fn skip_to_entry(&mut self) -> bool {
        while let Some(c) = self.bump() {
            if c == '@' && self.opens_entry() {
                return true;
            }
        }
        false
    }

    fn opens_entry(&self) -> bool {
        let rest = &self.chars[self.pos..];
        let name_len = rest.iter().take_while(|c| c.is_ascii_alphabetic()).count();
        if name_len == 0 {
            return false;
        }
        rest[name_len..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| matches!(c, '{' | '('))
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> Result<(), String> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{}', found '{}'", expected, c)),
            None => Err(format!("expected '{}', found end of input", expected)),
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| keep(*c)) {
            out.push(c);
            self.bump();
        }
        out
    }

    fn identifier(&mut self) -> String {
        self.take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '+' | '/'))
    }

    /// Content up to the `close` matching an already consumed opener
    fn balanced(&mut self, close: char) -> Result<String, String> {
        let mut depth = 0usize;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                c if c == close && depth == 0 => return Ok(out),
                _ => {}
            }
            out.push(c);
        }
        Err(format!("unbalanced braces, missing '{}'", close))
    }

    /// Content up to the closing quote outside braces
    fn quoted(&mut self) -> Result<String, String> {
        let mut depth = 0usize;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' if depth == 0 => return Ok(out),
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            out.push(c);
        }
        Err("unterminated quoted value".to_string())
    }
}

/// BibTeX import format
#[derive(Debug, Default, Clone, Copy)]
pub struct BibtexImporter;

impl Importer for BibtexImporter {
    fn id(&self) -> &'static str {
        "bibtex"
    }

    fn name(&self) -> &'static str {
        "BibTeX"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["bib"]
    }

    fn is_recognized(&self, input: &[u8]) -> bool {
        let (text, _) = decode(input);
        ENTRY_START.is_match(&text)
    }

    fn import(&self, input: &[u8], source_name: &str) -> ParseResult {
        let (text, lossy) = decode(input);
        let parse = parse_bibtex(&text);

        let mut result = ParseResult::new(parse.collection);
        result.format = Some(self.id());
        result.warnings = parse.warnings;
        if lossy {
            result.add_warning(format!("{}: invalid UTF-8 replaced", source_name));
        }
        if let Some((line, message)) = parse.error {
            result.fatal_error = Some(ImportError::Parse {
                source_name: source_name.to_string(),
                line: Some(line),
                message,
            });
        }
        result
    }
}
