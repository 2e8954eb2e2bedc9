// src/storage/enex.rs

//! ENEX archive assembly and splitting.
//!
//! ## Layout
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE en-export SYSTEM "http://xml.evernote.com/pub/evernote-export3.dtd">
//! <en-export export-date="20240101T000000Z" application="Evernote" version="10.0">
//!   <note>
//!     <title>…</title>
//!     <content><![CDATA[<en-note>…</en-note>]]></content>
//!     <created>…</created> <updated>…</updated>
//!     <tag>…</tag>
//!     <note-attributes><source-url>…</source-url><author>…</author></note-attributes>
//!   </note>
//! </en-export>
//! ```

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{AppError, Result};
use crate::models::OutputNote;

const EXPORT_DOCTYPE: &str =
    r#"en-export SYSTEM "http://xml.evernote.com/pub/evernote-export3.dtd""#;
const ENML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\
<!DOCTYPE en-note SYSTEM \"http://xml.evernote.com/pub/enml2.dtd\">";
const EXPORT_VERSION: &str = "10.0";

/// Timestamp format used throughout ENEX.
pub fn enex_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Document-level metadata.
#[derive(Debug, Clone)]
pub struct ArchiveMeta {
    pub application: String,
    pub export_date: DateTime<Utc>,
}

impl ArchiveMeta {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            export_date: Utc::now(),
        }
    }
}

fn emit<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(AppError::archive)
}

fn text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Wrap a note body in a complete ENML document.
pub fn enml_document(content: &str) -> String {
    // CDATA cannot contain its own terminator
    let content = content.replace("]]>", "]]&gt;");
    format!("{ENML_HEADER}<en-note>{content}</en-note>")
}

fn write_note<W: std::io::Write>(writer: &mut Writer<W>, note: &OutputNote) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new("note")))?;
    text_element(writer, "title", &note.title)?;

    emit(writer, Event::Start(BytesStart::new("content")))?;
    let enml = enml_document(&note.content);
    emit(writer, Event::CData(BytesCData::new(enml.as_str())))?;
    emit(writer, Event::End(BytesEnd::new("content")))?;

    text_element(writer, "created", &enex_timestamp(&note.created))?;
    text_element(writer, "updated", &enex_timestamp(&note.updated))?;
    for tag in &note.tags {
        text_element(writer, "tag", tag)?;
    }

    emit(writer, Event::Start(BytesStart::new("note-attributes")))?;
    text_element(writer, "source-url", &note.source_url)?;
    text_element(writer, "author", &note.author)?;
    emit(writer, Event::End(BytesEnd::new("note-attributes")))?;

    emit(writer, Event::End(BytesEnd::new("note")))
}

/// Render a full ENEX document for the notes, in the given order.
pub fn render_archive(notes: &[OutputNote], meta: &ArchiveMeta) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    emit(
        &mut writer,
        Event::DocType(BytesText::from_escaped(EXPORT_DOCTYPE)),
    )?;

    let export_date = enex_timestamp(&meta.export_date);
    let mut root = BytesStart::new("en-export");
    root.push_attribute(("export-date", export_date.as_str()));
    root.push_attribute(("application", meta.application.as_str()));
    root.push_attribute(("version", EXPORT_VERSION));
    emit(&mut writer, Event::Start(root))?;

    for note in notes {
        write_note(&mut writer, note)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("en-export")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Raw pieces of an existing archive.
#[derive(Debug)]
pub struct RawArchive<'a> {
    /// The `<en-export …>` start tag as written
    pub root_tag: &'a str,
    /// Each `<note>…</note>` element as written
    pub notes: Vec<&'a str>,
}

/// Locate the root tag and every top-level note without re-encoding them.
pub fn parse_raw_notes(xml: &str) -> Result<RawArchive<'_>> {
    let mut reader = Reader::from_str(xml);
    let mut root_tag = None;
    let mut notes = Vec::new();
    let mut note_start = 0;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().map_err(AppError::archive)? {
            Event::Start(e) if e.name().as_ref() == b"en-export" => {
                root_tag = Some(&xml[before..reader.buffer_position() as usize]);
            }
            Event::Start(e) if e.name().as_ref() == b"note" => {
                if depth == 0 {
                    note_start = before;
                }
                depth += 1;
            }
            Event::End(e) if e.name().as_ref() == b"note" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    notes.push(&xml[note_start..reader.buffer_position() as usize]);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let root_tag = root_tag.ok_or_else(|| AppError::archive("missing <en-export> element"))?;
    Ok(RawArchive { root_tag, notes })
}

/// Assemble an ENEX document from raw note elements.
pub fn render_raw(root_tag: &str, notes: &[&str]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<!DOCTYPE {EXPORT_DOCTYPE}>\n"));
    out.push_str(root_tag);
    out.push('\n');
    for note in notes {
        out.push_str("  ");
        out.push_str(note);
        out.push('\n');
    }
    out.push_str("</en-export>\n");
    out
}

/// Split an archive into documents of at most `per_file` notes each.
pub fn split_archive(xml: &str, per_file: usize) -> Result<Vec<String>> {
    if per_file == 0 {
        return Err(AppError::validation("notes per file must be > 0"));
    }
    let raw = parse_raw_notes(xml)?;
    Ok(raw
        .notes
        .chunks(per_file)
        .map(|chunk| render_raw(raw.root_tag, chunk))
        .collect())
}
