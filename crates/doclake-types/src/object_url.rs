use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path::DataLakePath;

/// An `@entity/path` address of a declared domain object.
///
/// Grammar: `@<entityId>/<path-segments>[?query][#presentationId]`. The
/// path part reuses the [`DataLakePath`] segment grammar; the optional query
/// is a `&`-separated list of `key=value` pairs and the optional fragment
/// names a presentation of the object.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectUrl {
    entity: String,
    path: DataLakePath,
    query: Vec<(String, String)>,
    presentation: Option<String>,
}

impl ObjectUrl {
    /// Parse and validate an object URL string.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let fail = |reason: &str| TypeError::UrlFormat {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let rest = input
            .strip_prefix('@')
            .ok_or_else(|| fail("object URL must start with '@'"))?;

        // Fragment first so '?' inside the fragment is not misparsed.
        let (rest, presentation) = match rest.split_once('#') {
            Some((_, frag)) if frag.is_empty() => {
                return Err(fail("presentation id must not be empty"));
            }
            Some((head, frag)) => (head, Some(frag.to_string())),
            None => (rest, None),
        };
        let (rest, raw_query) = match rest.split_once('?') {
            Some((head, q)) => (head, Some(q)),
            None => (rest, None),
        };

        let slash = rest
            .find('/')
            .ok_or_else(|| fail("object URL must contain a path part"))?;
        let entity = &rest[..slash];
        if entity.is_empty() {
            return Err(fail("entity id must not be empty"));
        }
        let path = DataLakePath::parse(&rest[slash..]).map_err(|e| match e {
            TypeError::PathFormat { reason, .. } => TypeError::UrlFormat {
                input: input.to_string(),
                reason,
            },
            other => other,
        })?;

        let mut query = Vec::new();
        if let Some(raw) = raw_query {
            for pair in raw.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| fail("query parameters must be key=value pairs"))?;
                if key.is_empty() {
                    return Err(fail("query parameter key must not be empty"));
                }
                query.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            entity: entity.to_string(),
            path,
            query,
            presentation,
        })
    }

    /// The declared entity identifier.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The object path within the entity.
    pub fn path(&self) -> &DataLakePath {
        &self.path
    }

    /// Query parameters in declaration order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The named presentation, if any.
    pub fn presentation(&self) -> Option<&str> {
        self.presentation.as_deref()
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}{}", self.entity, self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            write!(f, "{}{key}={value}", if i == 0 { '?' } else { '&' })?;
        }
        if let Some(presentation) = &self.presentation {
            write!(f, "#{presentation}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectUrl({self})")
    }
}

impl FromStr for ObjectUrl {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectUrl {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectUrl> for String {
    fn from(url: ObjectUrl) -> Self {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_form() {
        let url = ObjectUrl::parse("@components/app/backend?detail=full&view=tree#context").unwrap();
        assert_eq!(url.entity(), "components");
        assert_eq!(url.path().to_string(), "/app/backend");
        assert_eq!(
            url.query(),
            &[
                ("detail".to_string(), "full".to_string()),
                ("view".to_string(), "tree".to_string())
            ]
        );
        assert_eq!(url.presentation(), Some("context"));
    }

    #[test]
    fn parses_minimal_form() {
        let url = ObjectUrl::parse("@docs/welcome").unwrap();
        assert_eq!(url.entity(), "docs");
        assert!(url.query().is_empty());
        assert!(url.presentation().is_none());
    }

    #[test]
    fn display_round_trips() {
        for input in [
            "@docs/welcome",
            "@components/app/backend?detail=full#context",
            "@aspects/security/auth?x=1&y=2",
        ] {
            let url = ObjectUrl::parse(input).unwrap();
            assert_eq!(url.to_string(), input);
        }
    }

    #[test]
    fn rejects_malformed_urls() {
        for input in [
            "",
            "docs/welcome",
            "@",
            "@docs",
            "@/welcome",
            "@docs/wel come",
            "@docs/welcome?novalue",
            "@docs/welcome?=x",
            "@docs/welcome#",
        ] {
            let err = ObjectUrl::parse(input).unwrap_err();
            assert!(
                matches!(err, TypeError::UrlFormat { .. }),
                "expected url format error for {input:?}, got {err:?}"
            );
        }
    }
}
