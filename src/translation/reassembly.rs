/*!
 * Chapter skeleton and reassembly.
 *
 * A chapter with a `<body>` element is split into an immutable `Skeleton`
 * (everything before the body content and everything after it) and the body
 * content itself. Reassembly is a pure transform: the translated body is put
 * back between the skeleton halves and the root element's locale attributes
 * are rewritten. Markup outside the body is preserved byte for byte, apart
 * from the `lang`, `xml:lang` and `dir` attributes of `<html>`.
 */

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::language_utils::{self, TextDirection};

/// Attributes replaced on the root element
const LOCALE_ATTRIBUTES: [&str; 3] = ["lang", "xml:lang", "dir"];

/// Target-locale metadata stamped on reassembled chapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleAttributes {
    /// Value for `lang` and `xml:lang`
    pub lang: String,
    /// Value for `dir`
    pub direction: TextDirection,
}

impl LocaleAttributes {
    /// Attributes for a target language code, e.g. `ar` → `lang="ar" dir="rtl"`
    pub fn for_language(code: &str) -> Self {
        let lang = language_utils::normalize_to_part1_or_part2t(code).unwrap_or_else(|_| code.trim().to_lowercase());
        Self {
            direction: language_utils::text_direction(&lang),
            lang,
        }
    }
}

/// Document shell around the body content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    /// Everything up to and including the opening `<body ...>` tag
    head: String,
    /// Everything from the closing `</body>` tag on
    tail: String,
    /// The `<html>` start tag found in `head`, if any
    root: Option<RootTag>,
}

/// Position and attributes of the root start tag
#[derive(Debug, Clone, PartialEq, Eq)]
struct RootTag {
    /// Byte range of the whole tag inside `head`
    start: usize,
    end: usize,
    /// Element name as written, prefix included
    name: String,
    /// Attributes other than the locale ones, raw values kept
    attributes: Vec<(String, String)>,
}

impl RootTag {
    fn from_tag(tag: &BytesStart<'_>, start: usize, end: usize) -> Self {
        let attributes = tag
            .html_attributes()
            .filter_map(Result::ok)
            .map(|a| {
                (
                    String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                    String::from_utf8_lossy(&a.value).into_owned(),
                )
            })
            .filter(|(key, _)| !LOCALE_ATTRIBUTES.iter().any(|l| key.eq_ignore_ascii_case(l)))
            .collect();

        Self {
            start,
            end,
            name: String::from_utf8_lossy(tag.name().as_ref()).into_owned(),
            attributes,
        }
    }

    fn render(&self, locale: &LocaleAttributes) -> String {
        let mut tag = format!("<{}", self.name);
        for (key, value) in &self.attributes {
            let quote = if value.contains('"') { '\'' } else { '"' };
            tag.push_str(&format!(" {}={}{}{}", key, quote, value, quote));
        }
        tag.push_str(&format!(
            r#" lang="{}" xml:lang="{}" dir="{}">"#,
            locale.lang,
            locale.lang,
            locale.direction.as_attr()
        ));
        tag
    }
}

fn is_named(tag: &BytesStart<'_>, name: &str) -> bool {
    tag.local_name().as_ref().eq_ignore_ascii_case(name.as_bytes())
}

/// Byte offset of the `<` opening the tag that ends at `end`
fn tag_start(markup: &str, end: usize) -> usize {
    markup[..end].rfind('<').unwrap_or(0)
}

impl Skeleton {
    /// Split markup into its skeleton and body content
    ///
    /// The markup is read as a stream of XML events, so tags inside comments,
    /// CDATA sections or processing instructions are never taken for the body.
    /// Returns `None` when no body element is found.
    pub fn parse(markup: &str) -> Option<(Skeleton, &str)> {
        let mut reader = Reader::from_str(markup);
        reader.check_end_names(false);

        let mut root = None;
        let mut body_open = None;
        let mut body_close = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(_) => break,
            };
            let end = reader.buffer_position();
            match event {
                Event::Start(tag) if body_open.is_none() && root.is_none() && is_named(&tag, "html") => {
                    root = Some(RootTag::from_tag(&tag, tag_start(markup, end), end));
                }
                Event::Start(tag) if body_open.is_none() && is_named(&tag, "body") => {
                    body_open = Some(end);
                }
                Event::Empty(tag) if body_open.is_none() && is_named(&tag, "body") => {
                    return Some(Self::empty_body(markup, tag_start(markup, end), end, root));
                }
                Event::End(tag)
                    if body_open.is_some() && tag.local_name().as_ref().eq_ignore_ascii_case(b"body") =>
                {
                    body_close = markup[..end].rfind("</");
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let open = body_open?;
        // A parse error after the body start still leaves a usable closing tag
        let close = body_close.or_else(|| last_body_close(markup, open))?;

        let skeleton = Skeleton {
            head: markup[..open].to_string(),
            tail: markup[close..].to_string(),
            root,
        };
        Some((skeleton, &markup[open..close]))
    }

    /// `<body/>`: a skeleton with an explicit empty body
    fn empty_body(markup: &str, start: usize, end: usize, root: Option<RootTag>) -> (Skeleton, &str) {
        let open_tag = markup[start..end].trim_end_matches('>').trim_end_matches('/').trim_end();
        let skeleton = Skeleton {
            head: format!("{}{}>", &markup[..start], open_tag),
            tail: format!("</body>{}", &markup[end..]),
            root,
        };
        (skeleton, "")
    }

    /// Serialize the skeleton around `body`, with locale attributes applied
    pub fn render(&self, body: &str, locale: &LocaleAttributes) -> String {
        let mut out = String::with_capacity(self.head.len() + body.len() + self.tail.len() + 48);
        match &self.root {
            Some(root) => {
                out.push_str(&self.head[..root.start]);
                out.push_str(&root.render(locale));
                out.push_str(&self.head[root.end..]);
            }
            None => out.push_str(&self.head),
        }
        out.push_str(body);
        out.push_str(&self.tail);
        out
    }
}

/// Last textual `</body` after `from`, for markup the event reader gave up on
fn last_body_close(markup: &str, from: usize) -> Option<usize> {
    markup[from..]
        .to_ascii_lowercase()
        .rfind("</body")
        .map(|offset| from + offset)
}

/// Join translated chunks and put them back into the chapter
///
/// Without a skeleton the joined text replaces the whole file content.
pub fn reassemble(skeleton: Option<&Skeleton>, translated_chunks: &[String], locale: &LocaleAttributes) -> String {
    let joined = translated_chunks.join(" ");
    match skeleton {
        Some(skeleton) => skeleton.render(&joined, locale),
        None => joined,
    }
}
