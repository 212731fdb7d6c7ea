//! Citation string parsing.
//!
//! Turns free-form citation strings such as `哥林多前書 6:12-13;10:23-24、31`
//! into structured [`ParsedCitations`]. Groups are separated by `;` or `；`.
//! A group without a leading book name inherits the most recent one, and a
//! verse without a chapter inherits the most recently resolved chapter. Both
//! carry across group boundaries through an explicit [`ParserState`].

use crate::models::{BookCitations, Citation, ParsedCitations, VerseLocation};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no book name to inherit for citation group '{0}'")]
    MissingBook(String),
    #[error("no verses cited in '{0}'")]
    MissingVerses(String),
    #[error("no chapter to inherit for verse '{0}'")]
    MissingChapter(String),
    #[error("invalid chapter or verse number in '{0}'")]
    InvalidNumber(String),
    #[error("malformed range '{0}'")]
    MalformedRange(String),
    #[error("range '{0}' ends before it starts")]
    ReversedRange(String),
}

/// Inheritance state threaded through every citation group of one parse call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    pub current_book: Option<String>,
    pub current_chapter: Option<u32>,
}

/// Parse a citation string into an ordered map keyed by normalized citation.
///
/// A repeated normalized key overwrites the earlier entry in place.
pub fn parse_citations(citations: &str) -> Result<ParsedCitations, ParseError> {
    let mut result = ParsedCitations::new();
    let mut state = ParserState::default();

    for group in citations.split([';', '；']) {
        let normalized = normalize(group);
        if normalized.is_empty() {
            continue;
        }
        let (key, book_citations, next) = parse_group(&normalized, state)?;
        state = next;
        result.insert(key, book_citations);
    }

    Ok(result)
}

/// Map full-width punctuation variants to ASCII and strip all whitespace.
pub fn normalize(group: &str) -> String {
    group
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '～' | '－' | '_' => '-',
            '，' | '、' => ',',
            '：' => ':',
            other => other,
        })
        .collect()
}

/// Parse one normalized group, returning its key, citations and the next state.
pub fn parse_group(
    group: &str,
    state: ParserState,
) -> Result<(String, BookCitations, ParserState), ParseError> {
    let split = group
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(group.len());
    let (prefix, remainder) = group.split_at(split);

    let book = if prefix.is_empty() {
        state
            .current_book
            .clone()
            .ok_or_else(|| ParseError::MissingBook(group.to_string()))?
    } else {
        prefix.to_string()
    };

    if remainder.is_empty() {
        return Err(ParseError::MissingVerses(group.to_string()));
    }

    let mut chapter = state.current_chapter;
    let mut citations = Vec::new();
    for token in remainder.split(',') {
        let citation = parse_token(token, chapter)?;
        chapter = Some(citation.end.chapter);
        citations.push(citation);
    }

    let key = format!("{}{}", book, remainder);
    let next = ParserState {
        current_book: Some(book.clone()),
        current_chapter: chapter,
    };

    Ok((key, BookCitations { book, citations }, next))
}

/// Parse `verse`, `chapter:verse`, or a `-` separated range of those.
fn parse_token(token: &str, current_chapter: Option<u32>) -> Result<Citation, ParseError> {
    let parts: Vec<&str> = token.split('-').collect();
    match parts.as_slice() {
        [single] => {
            let loc = parse_location(single, current_chapter, token)?;
            Ok(Citation::single(loc))
        }
        [start, end] => {
            let start = parse_location(start, current_chapter, token)?;
            // An end without a chapter belongs to the start's chapter.
            let end = parse_location(end, Some(start.chapter), token)?;
            if end < start {
                return Err(ParseError::ReversedRange(token.to_string()));
            }
            Ok(Citation::new(start, end))
        }
        _ => Err(ParseError::MalformedRange(token.to_string())),
    }
}

fn parse_location(
    part: &str,
    inherited_chapter: Option<u32>,
    token: &str,
) -> Result<VerseLocation, ParseError> {
    let (chapter, verse) = match part.split_once(':') {
        Some((chapter, verse)) => (parse_number(chapter, token)?, parse_number(verse, token)?),
        None => {
            let verse = parse_number(part, token)?;
            let chapter =
                inherited_chapter.ok_or_else(|| ParseError::MissingChapter(token.to_string()))?;
            (chapter, verse)
        }
    };
    // Anything outside the composite key's range would alias another verse.
    VerseLocation::checked(chapter, verse)
        .ok_or_else(|| ParseError::InvalidNumber(token.to_string()))
}

fn parse_number(digits: &str, token: &str) -> Result<u32, ParseError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber(token.to_string()));
    }
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::InvalidNumber(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cite(c1: u32, v1: u32, c2: u32, v2: u32) -> Citation {
        Citation::new(VerseLocation::new(c1, v1), VerseLocation::new(c2, v2))
    }

    #[test]
    fn test_single_range() {
        let r = parse_citations("撒母耳記上 17:31-49").unwrap();
        assert_eq!(r.len(), 1);
        let bc = r.get("撒母耳記上17:31-49").unwrap();
        assert_eq!(bc.book, "撒母耳記上");
        assert_eq!(bc.citations, vec![cite(17, 31, 17, 49)]);
    }

    #[test]
    fn test_book_inherited_across_groups() {
        let r = parse_citations("哥林多前書 6:12-13;10:23-24、31").unwrap();
        assert_eq!(
            r.keys().collect::<Vec<_>>(),
            vec!["哥林多前書6:12-13", "哥林多前書10:23-24,31"]
        );
        assert_eq!(
            r.get("哥林多前書6:12-13").unwrap().citations,
            vec![cite(6, 12, 6, 13)]
        );
        let second = r.get("哥林多前書10:23-24,31").unwrap();
        assert_eq!(second.book, "哥林多前書");
        assert_eq!(
            second.citations,
            vec![cite(10, 23, 10, 24), cite(10, 31, 10, 31)]
        );
    }

    #[test]
    fn test_chapter_inherited_within_group() {
        let r = parse_citations("約翰壹書 2:20, 24-27").unwrap();
        let bc = r.get("約翰壹書2:20,24-27").unwrap();
        assert_eq!(bc.citations, vec![cite(2, 20, 2, 20), cite(2, 24, 2, 27)]);
    }

    #[test]
    fn test_cross_chapter_range() {
        let r = parse_citations("使徒行傳 4:32-5:12").unwrap();
        let bc = r.get("使徒行傳4:32-5:12").unwrap();
        assert_eq!(bc.citations, vec![cite(4, 32, 5, 12)]);
    }

    #[test]
    fn test_chapter_after_cross_chapter_range_is_end_chapter() {
        let r = parse_citations("使徒行傳 4:32-5:12,14").unwrap();
        let bc = r.get("使徒行傳4:32-5:12,14").unwrap();
        assert_eq!(bc.citations, vec![cite(4, 32, 5, 12), cite(5, 14, 5, 14)]);
    }

    #[test]
    fn test_full_width_punctuation() {
        let r = parse_citations("馬太福音 25：14－30").unwrap();
        assert_eq!(
            r.get("馬太福音25:14-30").unwrap().citations,
            vec![cite(25, 14, 25, 30)]
        );
        let r = parse_citations("利未記　23:10～11，15_17").unwrap();
        assert_eq!(
            r.get("利未記23:10-11,15-17").unwrap().citations,
            vec![cite(23, 10, 23, 11), cite(23, 15, 23, 17)]
        );
    }

    #[test]
    fn test_chapter_carries_across_groups() {
        let r = parse_citations("約翰福音 3:16；18").unwrap();
        assert_eq!(
            r.get("約翰福音18").unwrap().citations,
            vec![cite(3, 18, 3, 18)]
        );
    }

    #[test]
    fn test_new_book_in_later_group() {
        let r = parse_citations("創世記 1:1-3; 約翰福音 1:1").unwrap();
        let keys: Vec<_> = r.keys().collect();
        assert_eq!(keys, vec!["創世記1:1-3", "約翰福音1:1"]);
        assert_eq!(r.get("約翰福音1:1").unwrap().book, "約翰福音");
    }

    #[test]
    fn test_repeated_key_overwrites() {
        let r = parse_citations("詩篇 23:1; 詩篇 23:1").unwrap();
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_trailing_separator_ignored() {
        let r = parse_citations("詩篇 23:1-6;").unwrap();
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_missing_book_is_error() {
        assert_eq!(
            parse_citations("3:16"),
            Err(ParseError::MissingBook("3:16".to_string()))
        );
    }

    #[test]
    fn test_missing_chapter_is_error() {
        assert_eq!(
            parse_citations("約翰福音 16"),
            Err(ParseError::MissingChapter("16".to_string()))
        );
    }

    #[test]
    fn test_numbers_outside_key_range() {
        assert!(parse_citations("約翰福音 1:999").is_ok());
        assert_eq!(
            parse_citations("約翰福音 1:1000"),
            Err(ParseError::InvalidNumber("1:1000".to_string()))
        );
        assert_eq!(
            parse_citations("約翰福音 1:1500"),
            Err(ParseError::InvalidNumber("1:1500".to_string()))
        );
        assert_eq!(
            parse_citations("約翰福音 1:1-1000"),
            Err(ParseError::InvalidNumber("1:1-1000".to_string()))
        );
        assert_eq!(
            parse_citations("約翰福音 5000000:1"),
            Err(ParseError::InvalidNumber("5000000:1".to_string()))
        );
        assert!(matches!(
            parse_citations("約翰福音 99999999999:1"),
            Err(ParseError::InvalidNumber(_))
        ));

        let edge = format!("約翰福音 {}:999", crate::models::MAX_CHAPTER);
        assert!(parse_citations(&edge).is_ok());
        let past = format!("約翰福音 {}:1", crate::models::MAX_CHAPTER + 1);
        assert!(matches!(
            parse_citations(&past),
            Err(ParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            parse_citations("約翰福音 3:x"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_citations("約翰福音 3:1-2-3"),
            Err(ParseError::MalformedRange(_))
        ));
        assert!(matches!(
            parse_citations("約翰福音 3:0"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_citations("約翰福音"),
            Err(ParseError::MissingVerses(_))
        ));
        assert_eq!(
            parse_citations("約翰福音 3:16-2"),
            Err(ParseError::ReversedRange("3:16-2".to_string()))
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let input = "哥林多前書 6:12-13;10:23-24、31";
        assert_eq!(parse_citations(input), parse_citations(input));
    }

    #[test]
    fn test_parse_group_threads_state() {
        let state = ParserState {
            current_book: Some("詩篇".to_string()),
            current_chapter: Some(23),
        };
        let (key, bc, next) = parse_group("4-6", state).unwrap();
        assert_eq!(key, "詩篇4-6");
        assert_eq!(bc.citations, vec![cite(23, 4, 23, 6)]);
        assert_eq!(next.current_chapter, Some(23));
    }
}
