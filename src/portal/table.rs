use html_escape::decode_html_entities;
use log::debug;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use unicode_normalization::UnicodeNormalization;

/// One row of the portal's files table, cell text accumulated verbatim.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileRow {
    pub doc_type: String,
    pub period: String,
    pub publish_date: String,
    pub file_url: String,
}

/// State machine over tag open/close/text events.
///
/// A single flag tracks the target table, so a nested `<table>` inside it
/// ends extraction at the inner close tag. The portal does not nest tables
/// there today; revisit if it ever does.
#[derive(Default)]
struct TableState {
    in_files_table: bool,
    in_row: bool,
    cell_index: i32,
    in_file_cell: bool,
    current: FileRow,
    rows: Vec<FileRow>,
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref().eq_ignore_ascii_case(name))
        .map(|a| decode_html_entities(&String::from_utf8_lossy(&a.value)).into_owned())
}

fn clean_fragment(raw: &str) -> String {
    decode_html_entities(raw)
        .nfkc()
        .collect::<String>()
        .trim()
        .to_string()
}

fn append_fragment(cell: &mut String, text: &str) {
    if !cell.is_empty() {
        cell.push(' ');
    }
    cell.push_str(text);
}

impl TableState {
    fn handle_start(&mut self, tag: &[u8], e: &BytesStart) {
        if tag == b"table" {
            let class = attr_value(e, b"class").unwrap_or_default();
            if class.contains("files-table") {
                self.in_files_table = true;
            }
        } else if tag == b"tr" && self.in_files_table {
            self.in_row = true;
            self.cell_index = -1;
            self.in_file_cell = false;
            self.current = FileRow::default();
        } else if tag == b"td" && self.in_row {
            self.cell_index += 1;
            if self.cell_index == 5 {
                self.in_file_cell = true;
            }
        } else if tag == b"a" && self.in_row && self.in_file_cell {
            let class = attr_value(e, b"class").unwrap_or_default();
            if class.contains("file-link") {
                if let Some(href) = attr_value(e, b"href").filter(|h| !h.is_empty()) {
                    self.current.file_url = href;
                }
            }
        }
    }

    fn handle_end(&mut self, tag: &[u8]) {
        if tag == b"tr" && self.in_row {
            self.in_row = false;
            self.in_file_cell = false;
            if !self.current.file_url.is_empty() {
                self.rows.push(std::mem::take(&mut self.current));
            }
        } else if tag == b"table" && self.in_files_table {
            self.in_files_table = false;
        }
    }

    fn handle_text(&mut self, raw: &str) {
        if !self.in_row {
            return;
        }
        let text = clean_fragment(raw);
        if text.is_empty() {
            return;
        }
        match self.cell_index {
            // Columns: 1 = document type, 2 = reporting period, 4 = publish date.
            1 => append_fragment(&mut self.current.doc_type, &text),
            2 => append_fragment(&mut self.current.period, &text),
            4 => append_fragment(&mut self.current.publish_date, &text),
            _ => {}
        }
    }
}

/// Pull file rows out of a files.aspx page.
///
/// The markup is real-world HTML, not XML, so the reader runs with checks
/// off and parse errors skip forward instead of aborting.
pub fn extract_file_rows(html: &str) -> Vec<FileRow> {
    let mut reader = Reader::from_reader(html.as_bytes());
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.expand_empty_elements = true;

    let mut state = TableState::default();
    let mut buf = Vec::new();
    let mut last_error_pos = u64::MAX;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                state.handle_start(&name, e);
            }
            Ok(Event::End(ref e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                state.handle_end(&name);
            }
            Ok(Event::Text(ref e)) => {
                // Raw bytes, not unescape(): pages carry HTML entities
                // like &nbsp; that the XML unescaper rejects.
                state.handle_text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                let pos = reader.buffer_position();
                debug!("tolerating malformed markup at byte {}: {}", pos, e);
                if pos == last_error_pos {
                    // Reader is stuck on the same byte, stop here.
                    break;
                }
                last_error_pos = pos;
            }
        }
        buf.clear();
    }

    state.rows
}
