//! Path templates.
//!
//! # Grammar
//! Templates are absolute paths split on `/`. Each segment is one of:
//! - a literal, compared case-sensitively
//! - `{name}`: exactly one non-empty segment, captured by name
//! - `*`: exactly one non-empty segment, captured by position
//! - `**` or `{*name}`: zero or more trailing segments (last segment only)
//!
//! # Specificity
//! Compared field by field, highest wins:
//! 1. literal segments before the first wildcard
//! 2. literal segments in total
//! 3. fewer wildcard segments (catch-alls included)
//! 4. bounded templates before catch-alls

use std::cmp::Reverse;
use std::collections::HashSet;

use thiserror::Error;

/// Errors raised while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{0}' must start with '/'")]
    NotAbsolute(String),

    #[error("catch-all must be the last segment of '{0}'")]
    CatchAllNotLast(String),

    #[error("empty placeholder name in '{0}'")]
    EmptyName(String),

    #[error("placeholder '{name}' appears twice in '{template}'")]
    Duplicate { template: String, name: String },

    #[error("'{downstream}' uses {what} that '{upstream}' does not capture")]
    Unsatisfied {
        downstream: String,
        upstream: String,
        what: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
    CatchAll(Option<String>),
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Values captured while matching a path against a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    named: Vec<(String, String)>,
    positional: Vec<String>,
    rest: Option<String>,
}

impl Captures {
    /// Value of a `{name}` placeholder.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the n-th `*` wildcard.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Trailing segments matched by the catch-all, joined with `/`.
    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }
}

/// Ordering key: greater is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literal_prefix: usize,
    literals: usize,
    wildcards: Reverse<usize>,
    bounded: bool,
}

impl PathTemplate {
    /// Parse a template.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let body = raw
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::NotAbsolute(raw.to_string()))?;

        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        let mut names = HashSet::new();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = parse_segment(raw, part)?;
            if let Segment::CatchAll(_) = segment {
                if i + 1 != parts.len() {
                    return Err(TemplateError::CatchAllNotLast(raw.to_string()));
                }
            }
            let name = match &segment {
                Segment::Param(name) | Segment::CatchAll(Some(name)) => Some(name),
                _ => None,
            };
            if let Some(name) = name {
                if !names.insert(name.clone()) {
                    return Err(TemplateError::Duplicate {
                        template: raw.to_string(),
                        name: name.clone(),
                    });
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning the captures on success.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let parts = split_path(path);
        let mut captures = Captures::default();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(_) => {
                    let rest = parts.get(i..).map(|r| r.join("/")).unwrap_or_default();
                    captures.rest = Some(rest);
                    return Some(captures);
                }
                Segment::Literal(literal) => {
                    if literal != *parts.get(i)? {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = *parts.get(i)?;
                    if part.is_empty() {
                        return None;
                    }
                    captures.named.push((name.clone(), part.to_string()));
                }
                Segment::Wildcard => {
                    let part = *parts.get(i)?;
                    if part.is_empty() {
                        return None;
                    }
                    captures.positional.push(part.to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(captures)
    }

    /// Specificity used to order overlapping routes.
    pub fn specificity(&self) -> Specificity {
        let literal_prefix = self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count();
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let wildcards = self
            .segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count();
        let bounded = !self
            .segments
            .iter()
            .any(|s| matches!(s, Segment::CatchAll(_)));

        Specificity {
            literal_prefix,
            literals,
            wildcards: Reverse(wildcards),
            bounded,
        }
    }

    /// Fill this template with values captured by another one.
    ///
    /// An empty catch-all drops its segment, so `/a/**` with nothing captured
    /// expands to `/a`.
    pub fn expand(&self, captures: &Captures) -> String {
        let mut out = String::with_capacity(self.raw.len());
        let mut wildcard = 0;

        for segment in &self.segments {
            let value = match segment {
                Segment::Literal(literal) => literal.as_str(),
                Segment::Param(name) => captures.get(name).unwrap_or_default(),
                Segment::Wildcard => {
                    let value = captures.positional(wildcard).unwrap_or_default();
                    wildcard += 1;
                    value
                }
                Segment::CatchAll(_) => {
                    let rest = captures.rest().unwrap_or_default();
                    if rest.is_empty() {
                        continue;
                    }
                    rest
                }
            };
            out.push('/');
            out.push_str(value);
        }

        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Check that every placeholder of `self` is captured by `upstream`.
    pub fn is_satisfied_by(&self, upstream: &PathTemplate) -> Result<(), TemplateError> {
        let unsatisfied = |what: String| TemplateError::Unsatisfied {
            downstream: self.raw.clone(),
            upstream: upstream.raw.clone(),
            what,
        };

        for segment in &self.segments {
            if let Segment::Param(name) = segment {
                let captured = upstream
                    .segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(n) if n == name));
                if !captured {
                    return Err(unsatisfied(format!("placeholder '{{{}}}'", name)));
                }
            }
        }

        let count = |t: &PathTemplate| {
            t.segments
                .iter()
                .filter(|s| matches!(s, Segment::Wildcard))
                .count()
        };
        if count(self) > count(upstream) {
            return Err(unsatisfied("more '*' wildcards".to_string()));
        }

        let has_catch_all =
            |t: &PathTemplate| t.segments.iter().any(|s| matches!(s, Segment::CatchAll(_)));
        if has_catch_all(self) && !has_catch_all(upstream) {
            return Err(unsatisfied("a catch-all".to_string()));
        }

        Ok(())
    }
}

fn parse_segment(raw: &str, part: &str) -> Result<Segment, TemplateError> {
    match part {
        "**" => return Ok(Segment::CatchAll(None)),
        "*" => return Ok(Segment::Wildcard),
        _ => {}
    }

    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        let (catch_all, name) = match inner.strip_prefix('*') {
            Some(name) => (true, name),
            None => (false, inner),
        };
        if name.is_empty() {
            return Err(TemplateError::EmptyName(raw.to_string()));
        }
        return Ok(if catch_all {
            Segment::CatchAll(Some(name.to_string()))
        } else {
            Segment::Param(name.to_string())
        });
    }

    Ok(Segment::Literal(part.to_string()))
}

fn split_path(path: &str) -> Vec<&str> {
    let body = path.strip_prefix('/').unwrap_or(path);
    if body.is_empty() {
        Vec::new()
    } else {
        body.split('/').collect()
    }
}
