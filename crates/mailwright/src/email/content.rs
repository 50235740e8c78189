//! Message content and content-type resolution.

use crate::error::{Error, Result};
use mailwright_mime::{ContentType, Multipart};

/// Body of an [`Email`](crate::Email).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Content {
    /// No content was set.
    #[default]
    Absent,
    /// A single-part body with the MIME type it was set with.
    Plain {
        /// Raw body.
        body: Vec<u8>,
        /// MIME type string, e.g. `text/html; charset=utf-8`.
        mime_type: String,
    },
    /// A structured body.
    Multipart(Multipart),
}

impl Content {
    /// Returns true if no content was set.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Resolves the content type for `content`. An explicit type always wins;
/// otherwise the type comes from the content itself (`text/plain` when
/// absent, the stored type for a plain body, `multipart/<subtype>` for a
/// structured body).
///
/// # Errors
///
/// Returns [`Error::InvalidContent`] if the type does not parse, if a
/// single-part body is given a `multipart/*` type, or if a structured body
/// is given a non-multipart type.
pub fn resolve_content_type(content: &Content, explicit: Option<&str>) -> Result<ContentType> {
    match content {
        Content::Absent => single_part(explicit.unwrap_or("text/plain")),
        Content::Plain { mime_type, .. } => single_part(explicit.unwrap_or(mime_type)),
        Content::Multipart(multipart) => match explicit {
            None => Ok(multipart.content_type()),
            Some(text) => {
                let content_type = ContentType::parse(text)?;
                if content_type.is_multipart() {
                    Ok(content_type)
                } else {
                    Err(Error::InvalidContent(format!(
                        "{} cannot describe a multipart body",
                        content_type.essence()
                    )))
                }
            }
        },
    }
}

fn single_part(text: &str) -> Result<ContentType> {
    let content_type = ContentType::parse(text)?;
    if content_type.is_multipart() {
        return Err(Error::InvalidContent(format!(
            "{} requires a multipart body",
            content_type.essence()
        )));
    }
    Ok(content_type)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use mailwright_mime::Part;

    fn plain(mime_type: &str) -> Content {
        Content::Plain {
            body: b"hello".to_vec(),
            mime_type: mime_type.to_string(),
        }
    }

    #[test]
    fn test_absent_defaults_to_text_plain() {
        let ct = resolve_content_type(&Content::Absent, None).unwrap();
        assert_eq!(ct.essence(), "text/plain");

        let ct = resolve_content_type(&Content::Absent, Some("text/html")).unwrap();
        assert_eq!(ct.essence(), "text/html");
    }

    #[test]
    fn test_plain_uses_stored_type() {
        let ct = resolve_content_type(&plain("text/html; charset=utf-8"), None).unwrap();
        assert_eq!(ct.essence(), "text/html");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_explicit_type_wins() {
        let ct = resolve_content_type(&plain("text/plain"), Some("application/json")).unwrap();
        assert_eq!(ct.essence(), "application/json");
    }

    #[test]
    fn test_plain_rejects_multipart_type() {
        let err = resolve_content_type(&plain("multipart/mixed"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[test]
    fn test_unparseable_type() {
        let err = resolve_content_type(&plain("not a type"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[test]
    fn test_multipart_implied_type() {
        let multipart = Multipart::alternative().with_part(Part::text("hi"));
        let ct = resolve_content_type(&Content::Multipart(multipart.clone()), None).unwrap();
        assert_eq!(ct.essence(), "multipart/alternative");
        assert_eq!(ct.boundary(), Some(multipart.boundary()));
    }

    #[test]
    fn test_multipart_override() {
        let content = Content::Multipart(Multipart::mixed());
        let ct = resolve_content_type(&content, Some("multipart/related")).unwrap();
        assert_eq!(ct.essence(), "multipart/related");

        let err = resolve_content_type(&content, Some("text/plain")).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }
}
