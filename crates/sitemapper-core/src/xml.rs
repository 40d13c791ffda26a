//! Sitemap XML encoding and decoding.
//!
//! [`SitemapWriter`] streams `<url>` entries to any [`Write`] target so a full
//! rebuild never holds more than one record in memory. [`read_sitemap`] decodes a
//! whole existing sitemap for the incremental merge path.
//!
//! ```
//! use sitemapper_core::xml::{SitemapWriter, read_sitemap};
//! use sitemapper_core::UrlRecord;
//!
//! let mut writer = SitemapWriter::start(Vec::new())?;
//! writer.write_record(&UrlRecord::new("https://www.example.com/a", Some("2014-12-10".into())))?;
//! let bytes = writer.finish()?;
//!
//! let document = read_sitemap(bytes.as_slice())?;
//! assert_eq!(document.records[0].loc, "https://www.example.com/a");
//! # Ok::<(), sitemapper_core::Error>(())
//! ```

use crate::{AlternateLink, Error, Result, SITEMAP_NAMESPACE, SitemapDocument, UrlRecord, XHTML_NAMESPACE};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::path::Path;
use tempfile::NamedTempFile;

fn encode_err(e: impl Display) -> Error {
    Error::Encode(e.to_string())
}

fn decode_err(e: impl Display) -> Error {
    Error::Decode(e.to_string())
}

/// Create a temp file for sitemap output, in `dir` or the system temp dir.
pub(crate) fn sitemap_temp_file(dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("sitemap-").suffix(".xml");
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    Ok(file)
}

/// Streaming sitemap encoder.
///
/// Created with the XML declaration and the opening `<urlset>` already written;
/// [`SitemapWriter::finish`] closes the root element.
pub struct SitemapWriter<W: Write> {
    writer: Writer<W>,
    records: usize,
}

impl<W: Write> SitemapWriter<W> {
    /// Write the declaration and root element header to `inner`.
    pub fn start(inner: W) -> Result<Self> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(encode_err)?;
        let root = BytesStart::new("urlset")
            .with_attributes([("xmlns", SITEMAP_NAMESPACE), ("xmlns:xhtml", XHTML_NAMESPACE)]);
        writer.write_event(Event::Start(root)).map_err(encode_err)?;
        Ok(Self { writer, records: 0 })
    }

    /// Append one `<url>` entry.
    pub fn write_record(&mut self, record: &UrlRecord) -> Result<()> {
        let w = &mut self.writer;
        w.write_event(Event::Start(BytesStart::new("url")))
            .map_err(encode_err)?;
        write_text_element(w, "loc", &record.loc)?;
        if let Some(lastmod) = &record.lastmod {
            write_text_element(w, "lastmod", lastmod)?;
        }
        if let Some(alternate) = &record.alternate {
            let link = BytesStart::new("xhtml:link").with_attributes([
                ("rel", "alternate"),
                ("hreflang", alternate.lang.as_str()),
                ("href", alternate.href.as_str()),
            ]);
            w.write_event(Event::Empty(link)).map_err(encode_err)?;
        }
        w.write_event(Event::End(BytesEnd::new("url")))
            .map_err(encode_err)?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub const fn records(&self) -> usize {
        self.records
    }

    /// Close the root element and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer
            .write_event(Event::End(BytesEnd::new("urlset")))
            .map_err(encode_err)?;
        let mut inner = self.writer.into_inner();
        inner.write_all(b"\n")?;
        Ok(inner)
    }
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(encode_err)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(encode_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(encode_err)?;
    Ok(())
}

/// Encode a whole document.
pub fn write_document<W: Write>(inner: W, document: &SitemapDocument) -> Result<W> {
    let mut writer = SitemapWriter::start(inner)?;
    for record in &document.records {
        writer.write_record(record)?;
    }
    writer.finish()
}

/// Which text-bearing child of `<url>` is open.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    Lastmod,
}

/// Decode a sitemap.
///
/// Input without any root element (an empty file) decodes to an empty document.
/// Entries without `<loc>` are skipped. A root other than `<urlset>`, malformed
/// XML, or a truncated document is an [`Error::Decode`].
pub fn read_sitemap<R: BufRead>(input: R) -> Result<SitemapDocument> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut document = SitemapDocument::default();
    let mut buf = Vec::new();

    let mut root_open = false;
    let mut root_seen = false;
    let mut in_url = false;
    let mut field: Option<Field> = None;
    let mut loc: Option<String> = None;
    let mut lastmod: Option<String> = None;
    let mut alternate: Option<AlternateLink> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if !root_seen {
                    if name != "urlset" {
                        return Err(Error::Decode(format!(
                            "expected <urlset> root element, found <{name}>"
                        )));
                    }
                    root_seen = true;
                    root_open = true;
                } else {
                    match name.as_str() {
                        "url" if root_open => {
                            in_url = true;
                            loc = None;
                            lastmod = None;
                            alternate = None;
                        },
                        "loc" if in_url => field = Some(Field::Loc),
                        "lastmod" if in_url => field = Some(Field::Lastmod),
                        "link" if in_url => alternate = alternate.or(read_link(&e)?),
                        _ => {},
                    }
                }
            },
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if !root_seen {
                    if name != "urlset" {
                        return Err(Error::Decode(format!(
                            "expected <urlset> root element, found <{name}>"
                        )));
                    }
                    root_seen = true;
                } else if name == "link" && in_url {
                    alternate = alternate.or(read_link(&e)?);
                }
            },
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" if in_url => {
                        if let Some(loc) = loc.take() {
                            document.records.push(UrlRecord {
                                loc,
                                lastmod: lastmod.take(),
                                alternate: alternate.take(),
                            });
                        }
                        in_url = false;
                    },
                    "urlset" if !in_url => root_open = false,
                    _ => {},
                }
                field = None;
            },
            Ok(Event::Text(e)) => {
                if let Some(current) = field {
                    let text = e.unescape().map_err(decode_err)?;
                    let text = text.trim().to_string();
                    match current {
                        Field::Loc => loc = Some(text),
                        Field::Lastmod => lastmod = Some(text),
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Decode(format!("XML parse error: {e}"))),
            _ => {},
        }
        buf.clear();
    }

    if root_open {
        return Err(Error::Decode("unexpected end of document".into()));
    }

    Ok(document)
}

fn read_link(e: &BytesStart<'_>) -> Result<Option<AlternateLink>> {
    let mut rel = None;
    let mut lang = None;
    let mut href = None;

    for attr in e.attributes() {
        let attr = attr.map_err(decode_err)?;
        let value = attr.unescape_value().map_err(decode_err)?.to_string();
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(value),
            b"hreflang" => lang = Some(value),
            b"href" => href = Some(value),
            _ => {},
        }
    }

    match (rel.as_deref(), lang, href) {
        (Some("alternate"), Some(lang), Some(href)) => Ok(Some(AlternateLink { lang, href })),
        _ => Ok(None),
    }
}
