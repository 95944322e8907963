/*!
 * EPUB container access.
 *
 * The pipeline sees a book through the `Archive` trait: an ordered list of
 * chapters that can be read, replaced and finally serialized back into a
 * single blob. `EpubArchive` implements it over a zip container held in
 * memory, resolving the reading order through
 * `META-INF/container.xml` → package document → manifest → spine.
 */

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::ArchiveError;

/// Location of the container document inside every EPUB
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Entry that must come first, uncompressed
const MIMETYPE_PATH: &str = "mimetype";

/// Entry extensions treated as chapters
const CHAPTER_EXTENSIONS: [&str; 4] = [".html", ".xhtml", ".htm", ".xml"];

/// One chapter in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Full entry path inside the archive; the chapter's stable identity
    pub path: String,
    /// Manifest href, relative to the package document
    pub href: String,
    /// Position in the spine-derived reading order
    pub order: usize,
}

/// Book container as seen by the pipeline
pub trait Archive: Send {
    /// Chapters in reading order
    fn list_chapters(&self) -> Vec<Chapter>;

    /// Current markup of a chapter
    fn read_chapter(&self, path: &str) -> Result<String, ArchiveError>;

    /// Replace the markup of a chapter
    fn write_chapter(&mut self, path: &str, markup: String) -> Result<(), ArchiveError>;

    /// Serialize the whole container with all replacements applied
    fn finalize(&self) -> Result<Vec<u8>, ArchiveError>;
}

#[derive(Debug, Clone)]
struct ZipEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    stored: bool,
}

/// EPUB held in memory
#[derive(Debug, Clone)]
pub struct EpubArchive {
    /// Entries in their original order
    entries: Vec<ZipEntry>,
    /// Entry name → position in `entries`
    index: HashMap<String, usize>,
    /// Chapters in reading order
    chapters: Vec<Chapter>,
    /// Chapter markup written back so far
    replacements: HashMap<String, String>,
}

impl EpubArchive {
    /// Open an EPUB file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }

    /// Parse an EPUB from its bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());
        let mut index = HashMap::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            let name = file.name().to_string();
            index.insert(name.clone(), entries.len());
            entries.push(ZipEntry {
                is_dir: file.is_dir(),
                stored: file.compression() == CompressionMethod::Stored,
                name,
                data,
            });
        }

        let mut archive = Self {
            entries,
            index,
            chapters: Vec::new(),
            replacements: HashMap::new(),
        };
        archive.chapters = archive.resolve_chapters()?;
        debug!("Resolved {} chapters from spine", archive.chapters.len());
        Ok(archive)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Package document path named by the container
    pub fn package_path(&self) -> Result<String, ArchiveError> {
        let container = self.entry_text(CONTAINER_PATH).map_err(|_| ArchiveError::MissingContainer)?;
        xml_elements(CONTAINER_PATH, &container)?
            .into_iter()
            .filter(|element| element.name == "rootfile")
            .filter_map(|mut element| element.attributes.remove("full-path"))
            .find(|path| !path.trim().is_empty())
            .map(|path| path.trim().to_string())
            .ok_or(ArchiveError::MissingContainer)
    }

    fn resolve_chapters(&self) -> Result<Vec<Chapter>, ArchiveError> {
        let package_path = self.package_path()?;
        let package = self
            .entry_text(&package_path)
            .map_err(|_| ArchiveError::MissingPackage(package_path.clone()))?;
        let base_dir = package_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

        let elements = xml_elements(&package_path, &package)?;
        let manifest: HashMap<&str, &str> = elements
            .iter()
            .filter(|element| element.name == "item")
            .filter_map(|element| Some((element.attribute("id")?, element.attribute("href")?)))
            .collect();

        let mut chapters = Vec::new();
        for itemref in elements.iter().filter(|element| element.name == "itemref") {
            let Some(idref) = itemref.attribute("idref") else {
                continue;
            };
            let Some(&href) = manifest.get(idref) else {
                warn!("Spine references unknown manifest id '{}'", idref);
                continue;
            };
            if !is_chapter_href(href) {
                continue;
            }
            chapters.push(Chapter {
                path: resolve_href(base_dir, href),
                href: href.to_string(),
                order: chapters.len(),
            });
        }

        Ok(chapters)
    }

    /// Raw bytes of an entry as originally stored
    fn entry_bytes(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|&i| self.entries[i].data.as_slice())
    }

    fn entry_text(&self, name: &str) -> Result<String, ArchiveError> {
        let bytes = self
            .entry_bytes(name)
            .ok_or_else(|| ArchiveError::MissingEntry(name.to_string()))?;
        decode_text(name, bytes)
    }
}

impl Archive for EpubArchive {
    fn list_chapters(&self) -> Vec<Chapter> {
        self.chapters.clone()
    }

    fn read_chapter(&self, path: &str) -> Result<String, ArchiveError> {
        if let Some(markup) = self.replacements.get(path) {
            return Ok(markup.clone());
        }
        self.entry_text(path)
    }

    fn write_chapter(&mut self, path: &str, markup: String) -> Result<(), ArchiveError> {
        if !self.index.contains_key(path) {
            return Err(ArchiveError::MissingEntry(path.to_string()));
        }
        self.replacements.insert(path.to_string(), markup);
        Ok(())
    }

    fn finalize(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Some(mimetype) = self.entry_bytes(MIMETYPE_PATH) {
            writer.start_file(MIMETYPE_PATH, stored)?;
            writer.write_all(mimetype)?;
        }

        for entry in self.entries.iter().filter(|e| e.name != MIMETYPE_PATH) {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), stored)?;
                continue;
            }

            let options = if entry.stored { stored } else { deflated };
            writer.start_file(entry.name.as_str(), options)?;
            match self.replacements.get(&entry.name) {
                Some(markup) => writer.write_all(markup.as_bytes())?,
                None => writer.write_all(&entry.data)?,
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Start or empty element of an XML document, attributes unescaped
#[derive(Debug)]
struct XmlElement {
    /// Local name, namespace prefix dropped
    name: String,
    /// Attribute local name → value
    attributes: HashMap<String, String>,
}

impl XmlElement {
    fn from_tag(entry: &str, tag: &BytesStart<'_>) -> Result<Self, ArchiveError> {
        let mut attributes = HashMap::new();
        for attribute in tag.attributes() {
            let attribute = attribute.map_err(|e| malformed(entry, e))?;
            let value = attribute.unescape_value().map_err(|e| malformed(entry, e))?;
            attributes.insert(
                String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned(),
                value.into_owned(),
            );
        }

        Ok(Self {
            name: String::from_utf8_lossy(tag.local_name().as_ref()).into_owned(),
            attributes,
        })
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Elements of `xml` in document order; comments and CDATA are skipped
fn xml_elements(entry: &str, xml: &str) -> Result<Vec<XmlElement>, ArchiveError> {
    let mut reader = Reader::from_str(xml);
    let mut elements = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => elements.push(XmlElement::from_tag(entry, &tag)?),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(malformed(
                    entry,
                    format!("{} (near byte {})", e, reader.buffer_position()),
                ));
            }
        }
    }

    Ok(elements)
}

fn malformed(entry: &str, error: impl Display) -> ArchiveError {
    ArchiveError::Malformed {
        entry: entry.to_string(),
        message: error.to_string(),
    }
}

fn is_chapter_href(href: &str) -> bool {
    let path = href.split('#').next().unwrap_or(href).to_lowercase();
    CHAPTER_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Join a manifest href onto the package directory, resolving `.` and `..`
fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();

    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// Decode entry bytes as UTF-8, dropping a byte-order mark
fn decode_text(name: &str, bytes: &[u8]) -> Result<String, ArchiveError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|_| ArchiveError::InvalidEncoding(name.to_string()))
}

/// Output file name for a translated book: `<stem>_<TARGET>.epub`
pub fn translated_file_name(source_name: &str, target_language: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_name.to_string());
    format!("{}_{}.epub", stem, target_language.trim().to_uppercase())
}
