//! Topic patterns with topic-exchange wildcard matching.

use std::fmt;
use std::str::FromStr;

use crate::api::{Result, RuntimeError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    One,
    /// `#`: zero or more segments.
    Many,
}

/// A dot-separated routing pattern such as `Status.*` or `Result.#`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason| RuntimeError::InvalidTopicPattern {
            pattern: pattern.to_owned(),
            reason,
        };
        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let segments = pattern
            .split('.')
            .map(|segment| match segment {
                "" => Err(invalid("empty segment")),
                "*" => Ok(Segment::One),
                "#" => Ok(Segment::Many),
                literal => Ok(Segment::Literal(literal.to_owned())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: pattern.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the routing key `topic` matches this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        let words: Vec<&str> = topic.split('.').collect();
        match_segments(&self.segments, &words)
    }
}

fn match_segments(pattern: &[Segment], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((Segment::Many, rest)) => {
            (0..=words.len()).any(|skip| match_segments(rest, &words[skip..]))
        }
        Some((Segment::One, rest)) => !words.is_empty() && match_segments(rest, &words[1..]),
        Some((Segment::Literal(literal), rest)) => words
            .split_first()
            .is_some_and(|(word, tail)| *word == literal.as_str() && match_segments(rest, tail)),
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TopicPattern {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
