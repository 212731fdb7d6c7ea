//! Structured-markup archive ingestion (EPUB-style zip).
//!
//! The package document named by `META-INF/container.xml` lists the book
//! documents: its spine gives their order, its manifest their paths. Inside
//! each book document:
//!
//! - Verse boundaries are elements whose `id` is `<BOOKCODE><chapter>_<verse>`.
//!   Text between two boundaries belongs to the earlier verse. A verse part
//!   such as `21-22` keeps only its first number.
//! - Footnotes live in a separate notes region. `fr` carries the
//!   `chapter:verse` key, `ft` a note that replaces a `*` in that verse, and
//!   `fv` the full text of the following verse, emitted as an extra record.

use crate::loader::{IngestionError, LoadError};
use crate::markup::{find_in, parse_document, Element, Node};
use crate::models::{VerseLocation, VerseRecord};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Classes whose text is never verse text.
const HEADING_CLASSES: &[&str] = &["s", "s1", "s2", "s3", "ms", "mt", "mt1", "mt2", "r", "c", "cl"];

const NON_TEXT_ELEMENTS: &[&str] = &[
    "head", "title", "style", "script", "h1", "h2", "h3", "h4", "h5", "h6",
];

const FOOTNOTE_MARK: char = '*';

/// Parse every book document of an archive into verse records, in index order.
pub fn parse_archive<R: Read + Seek>(
    reader: R,
    show_progress: bool,
) -> Result<Vec<VerseRecord>, LoadError> {
    let mut zip = ZipArchive::new(reader)?;
    let package_path = locate_package(&mut zip)?;
    let package = read_entry(&mut zip, &package_path)?;
    let document_paths = spine_documents(&package, &package_path)?;

    let mut documents = Vec::with_capacity(document_paths.len());
    for path in document_paths {
        match read_entry_bytes(&mut zip, &path) {
            Ok(bytes) => documents.push((path, bytes)),
            Err(error) => tracing::warn!(%path, %error, "skipping unreadable book document"),
        }
    }

    let pb = if show_progress {
        let pb = ProgressBar::new(documents.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let per_document: Vec<Vec<VerseRecord>> = documents
        .par_iter()
        .map(|(path, bytes)| {
            let parsed = std::str::from_utf8(bytes)
                .map_err(|e| IngestionError::Encoding(e.to_string()))
                .and_then(parse_book_document);
            let records = match parsed {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(%path, %error, "skipping book document");
                    Vec::new()
                }
            };
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
            records
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    Ok(per_document.into_iter().flatten().collect())
}

fn read_entry_bytes<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>, LoadError> {
    let mut entry = zip.by_name(path).map_err(|e| match e {
        ZipError::FileNotFound => LoadError::MissingDocument(path.to_string()),
        other => LoadError::Archive(other),
    })?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> Result<String, LoadError> {
    let bytes = read_entry_bytes(zip, path)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

/// Path of the package (index) document inside the archive.
fn locate_package<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<String, LoadError> {
    if let Ok(container) = read_entry(zip, CONTAINER_PATH) {
        let nodes = parse_document(&container)?;
        if let Some(path) = find_in(&nodes, &|e| e.name == "rootfile").and_then(|e| e.attr("full-path")) {
            return Ok(path.to_string());
        }
    }
    zip.file_names()
        .find(|name| name.ends_with(".opf"))
        .map(str::to_string)
        .ok_or(LoadError::MissingIndex)
}

/// Book document paths in spine order, resolved against the package location.
pub fn spine_documents(package: &str, package_path: &str) -> Result<Vec<String>, LoadError> {
    let nodes = parse_document(package)?;
    let root = find_in(&nodes, &|e| e.name == "package").ok_or(LoadError::MissingIndex)?;

    let manifest: HashMap<&str, &str> = root
        .find_all(&|e| e.name == "item")
        .into_iter()
        .filter_map(|item| Some((item.attr("id")?, item.attr("href")?)))
        .collect();

    let base = package_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let paths = root
        .find_all(&|e| e.name == "itemref")
        .into_iter()
        .filter_map(|itemref| {
            let idref = itemref.attr("idref")?;
            let href = manifest.get(idref);
            if href.is_none() {
                tracing::warn!(idref, "spine entry missing from manifest");
            }
            href.map(|href| resolve_href(base, href))
        })
        .collect();

    Ok(paths)
}

/// Join a relative href onto a directory inside the archive.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Parse `<BOOKCODE><chapter>_<verse>` into a location.
pub fn parse_verse_id(id: &str) -> Option<VerseLocation> {
    let (head, verse) = id.rsplit_once('_')?;
    let verse: u32 = verse.split('-').next()?.parse().ok()?;
    let code = head.trim_end_matches(|c: char| c.is_ascii_digit());
    if !code.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let chapter: u32 = head[code.len()..].parse().ok()?;
    VerseLocation::checked(chapter, verse)
}

/// First two digit runs of a footnote reference such as `17:20`.
fn parse_note_ref(text: &str) -> Option<VerseLocation> {
    let mut numbers = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<u32>().ok());
    VerseLocation::checked(numbers.next()?, numbers.next()?)
}

fn is_notes_region(el: &Element) -> bool {
    el.name == "aside"
        || el.has_class("f")
        || el.classes().any(|c| c.contains("footnote") || c.contains("notes"))
}

fn is_non_text(el: &Element) -> bool {
    NON_TEXT_ELEMENTS.contains(&el.name.as_str()) || HEADING_CLASSES.iter().any(|c| el.has_class(c))
}

fn book_name(nodes: &[Node]) -> Option<String> {
    find_in(nodes, &|e| e.has_class("mt") || e.has_class("mt1"))
        .or_else(|| find_in(nodes, &|e| e.name == "title"))
        .map(|e| e.text().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Drop line breaks and their indentation left by pretty-printed markup.
///
/// Lines are joined with no separator: the sources are CJK, where a line
/// break inside a sentence is never a word boundary. Latin-script notes
/// would have their words glued together.
fn clean_text(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }
    text.lines().map(str::trim).collect()
}

#[derive(Debug, Default)]
struct Footnote {
    notes: Vec<String>,
    alternate: Option<String>,
}

#[derive(Debug, Default)]
struct BookWalker {
    verses: Vec<(VerseLocation, String)>,
    footnotes: HashMap<VerseLocation, Footnote>,
    open_note: Option<VerseLocation>,
}

impl BookWalker {
    fn visit(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(text) => self.push_text(text),
                Node::Tag(el) if is_notes_region(el) => self.visit_notes(&el.children),
                Node::Tag(el) => {
                    if let Some(loc) = el.id().and_then(parse_verse_id) {
                        // The marker's own text is the printed verse number.
                        self.verses.push((loc, String::new()));
                    } else if !is_non_text(el) {
                        self.visit(&el.children);
                    }
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        // Whitespace-only nodes are indentation between tags in CJK text.
        if text.trim().is_empty() {
            return;
        }
        if let Some((_, buf)) = self.verses.last_mut() {
            buf.push_str(&clean_text(text));
        }
    }

    fn visit_notes(&mut self, nodes: &[Node]) {
        for node in nodes {
            let Node::Tag(el) = node else {
                continue;
            };
            if el.has_class("fr") {
                self.open_note = parse_note_ref(&el.text());
                if let Some(key) = self.open_note {
                    self.footnotes.entry(key).or_default();
                }
            } else if el.has_class("ft") {
                let note = el.text_excluding(&|e| e.has_class("fv"));
                if let Some(footnote) = self.open_footnote() {
                    footnote.notes.push(clean_text(note.trim()));
                }
                // `fv` may be nested inside `ft`.
                self.visit_notes(&el.children);
            } else if el.has_class("fv") {
                let alternate = clean_text(el.text().trim());
                if let Some(footnote) = self.open_footnote() {
                    footnote.alternate = Some(alternate);
                }
            } else {
                self.visit_notes(&el.children);
            }
        }
    }

    fn open_footnote(&mut self) -> Option<&mut Footnote> {
        let key = self.open_note?;
        self.footnotes.get_mut(&key)
    }

    fn finish(self, book: &str) -> Vec<VerseRecord> {
        let present: HashSet<VerseLocation> = self
            .verses
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(loc, _)| *loc)
            .collect();

        let mut records = Vec::with_capacity(self.verses.len());
        for (loc, raw) in &self.verses {
            let footnote = self.footnotes.get(loc);
            let text = splice_notes(raw.trim(), footnote.map(|f| f.notes.as_slice()).unwrap_or(&[]));
            records.push(VerseRecord::new(book, loc.chapter, loc.verse, text));

            if let Some(alternate) = footnote.and_then(|f| f.alternate.as_ref()) {
                let next = loc.next();
                if present.contains(&next) {
                    tracing::debug!(book, location = %next, "alternate verse already present");
                } else {
                    records.push(VerseRecord::new(
                        book,
                        next.chapter,
                        next.verse,
                        format!("（{}）", alternate),
                    ));
                }
            }
        }
        records
    }
}

/// Replace each `*` with the next footnote note, wrapped in full-width
/// parentheses; surplus markers are removed.
pub fn splice_notes(text: &str, notes: &[String]) -> String {
    let mut notes = notes.iter();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == FOOTNOTE_MARK {
            if let Some(note) = notes.next() {
                out.push('（');
                out.push_str(note);
                out.push('）');
            }
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Parse one book document into verse records.
pub fn parse_book_document(content: &str) -> Result<Vec<VerseRecord>, IngestionError> {
    let nodes = parse_document(content).map_err(|e| IngestionError::Markup(e.to_string()))?;

    let mut walker = BookWalker::default();
    walker.visit(&nodes);
    if walker.verses.is_empty() {
        return Ok(Vec::new());
    }

    let book = book_name(&nodes).ok_or(IngestionError::MissingBookName)?;
    Ok(walker.finish(&book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const MATTHEW: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>馬太福音</title></head>
<body>
<div class="mt">馬太福音</div>
<div class="c">17</div>
<div class="s">治好被鬼附的孩子</div>
<p><span class="v" id="MT17_19">19</span>門徒暗暗地到耶穌跟前，說：
   我們為甚麼不能趕出那鬼呢？
<span class="v" id="MT17_20">20</span>耶穌說：是因你們的信心小。*</p>
<p><span class="v" id="MT17_22-23">22-23</span>他們還住在加利利的時候，上帝*說。</p>
<div class="footnotes">
  <p><span class="fr">17:20 </span><span class="ft">有古卷加<span class="fv">至於這一類的鬼，若不禱告禁食，他就不出來</span></span></p>
  <p><span class="fr">17:22</span><span class="ft">或譯：神</span></p>
</div>
</body>
</html>"#;

    #[test]
    fn test_parse_verse_id() {
        assert_eq!(parse_verse_id("GN1_1"), Some(VerseLocation::new(1, 1)));
        assert_eq!(parse_verse_id("1CO13_4"), Some(VerseLocation::new(13, 4)));
        assert_eq!(parse_verse_id("MT17_22-23"), Some(VerseLocation::new(17, 22)));
        assert_eq!(parse_verse_id("fn_1"), None);
        assert_eq!(parse_verse_id("GN1"), None);
        assert_eq!(parse_verse_id("12_3"), None);
        assert_eq!(parse_verse_id("JN5000000_1"), None);
        assert_eq!(parse_verse_id("JN1_1000"), None);
    }

    #[test]
    fn test_book_document_verses_and_footnotes() {
        let records = parse_book_document(MATTHEW).unwrap();
        let summary: Vec<(u32, u32, &str)> = records
            .iter()
            .map(|r| (r.chapter, r.verse, r.text.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (17, 19, "門徒暗暗地到耶穌跟前，說：我們為甚麼不能趕出那鬼呢？"),
                (17, 20, "耶穌說：是因你們的信心小。（有古卷加）"),
                (17, 21, "（至於這一類的鬼，若不禱告禁食，他就不出來）"),
                (17, 22, "他們還住在加利利的時候，上帝（或譯：神）說。"),
            ]
        );
        assert!(records.iter().all(|r| r.book == "馬太福音"));
    }

    #[test]
    fn test_unmatched_marker_is_removed() {
        assert_eq!(splice_notes("a*b*", &["n".to_string()]), "a（n）b");
        assert_eq!(splice_notes("a*", &[]), "a");
    }

    #[test]
    fn test_alternate_does_not_replace_body_verse() {
        let doc = r#"<html><head><title>書</title></head><body>
<p><span id="AB1_1">1</span>一*<span id="AB1_2">2</span>二</p>
<aside><span class="fr">1:1</span><span class="fv">另</span></aside>
</body></html>"#;
        let records = parse_book_document(doc).unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["一", "二"]);
    }

    #[test]
    fn test_document_without_verses_is_empty() {
        let doc = "<html><head><title>封面</title></head><body><p>目錄</p></body></html>";
        assert!(parse_book_document(doc).unwrap().is_empty());
    }

    #[test]
    fn test_document_with_verses_needs_book_name() {
        let doc = r#"<html><body><p><span id="AB1_1">1</span>一</p></body></html>"#;
        assert_eq!(
            parse_book_document(doc),
            Err(IngestionError::MissingBookName)
        );
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "text/MAT.xhtml"), "OEBPS/text/MAT.xhtml");
        assert_eq!(resolve_href("OEBPS/pkg", "../MAT.xhtml#top"), "OEBPS/MAT.xhtml");
        assert_eq!(resolve_href("", "MAT.xhtml"), "MAT.xhtml");
    }

    fn build_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_archive_in_spine_order() {
        let container = r#"<?xml version="1.0"?>
<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container" version="1.0">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
        let package = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <manifest>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="gen" href="GEN.xhtml" media-type="application/xhtml+xml"/>
    <item id="mat" href="MAT.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="cover"/><itemref idref="mat"/><itemref idref="gen"/></spine>
</package>"#;
        let genesis = r#"<html><head><title>創世記</title></head><body>
<p><span id="GN1_1">1</span>起初，上帝創造天地。</p></body></html>"#;
        let cover = "<html><head><title>封面</title></head><body/></html>";

        let bytes = build_archive(&[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", container),
            ("OEBPS/content.opf", package),
            ("OEBPS/cover.xhtml", cover),
            ("OEBPS/GEN.xhtml", genesis),
            ("OEBPS/MAT.xhtml", MATTHEW),
        ]);

        let records = parse_archive(Cursor::new(bytes), false).unwrap();
        let books: Vec<&str> = records.iter().map(|r| r.book.as_str()).collect();
        assert_eq!(books.first(), Some(&"馬太福音"));
        assert_eq!(books.last(), Some(&"創世記"));
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_non_utf8_document_is_skipped() {
        let package = r#"<package><manifest>
<item id="a" href="A.xhtml"/><item id="b" href="B.xhtml"/>
</manifest><spine><itemref idref="a"/><itemref idref="b"/></spine></package>"#;
        let good = r#"<html><head><title>創世記</title></head><body>
<p><span id="GN1_1">1</span>起初。</p></body></html>"#;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in [
            ("book.opf", package.as_bytes()),
            ("A.xhtml", &[0x3c, 0x70, 0x3e, 0xff, 0xfe, 0x3c, 0x2f, 0x70, 0x3e][..]),
            ("B.xhtml", good.as_bytes()),
        ] {
            writer.start_file(name, FileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let records = parse_archive(Cursor::new(bytes), false).unwrap();
        assert_eq!(records, vec![VerseRecord::new("創世記", 1, 1, "起初。")]);
    }

    #[test]
    fn test_archive_without_index_fails() {
        let bytes = build_archive(&[("readme.txt", "nothing here")]);
        assert!(matches!(
            parse_archive(Cursor::new(bytes), false),
            Err(LoadError::MissingIndex)
        ));
    }
}
