//! Model response parser
//!
//! Turns free-form model output into suggestion text plus optional
//! `TYPE`/`PRIORITY` tags. Fallback chain:
//! 1. `Analysis` + `Suggestion` labelled sections, joined
//! 2. a lone `Suggestion:` section
//! 3. the whole cleaned response
//!
//! Works line by line; the regex crate has no lookahead, so section ends
//! are found structurally rather than with a single pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use sales_coach_core::{Priority, SuggestionType};

/// `Analysis: text`, `**Suggestion:** text`, `## Analysis: text`
static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(analysis|suggestion)\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(.*)$",
    )
    .expect("valid section header regex")
});

/// `## Analysis` or `**Suggestion**` alone on a line
static SECTION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(analysis|suggestion)\s*(?:\*\*|__)?\s*$")
        .expect("valid section heading regex")
});

static TYPE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\btype\s*(?:\*\*|__)?\s*[:=]\s*(?:\*\*|__)?\s*([a-z][a-z_\-]*)(?:[ \t]+([a-z]+))?")
        .expect("valid type tag regex")
});

static PRIORITY_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bpriority\s*(?:\*\*|__)?\s*[:=]\s*(?:\*\*|__)?\s*([a-z]+)")
        .expect("valid priority tag regex")
});

/// A run of `TYPE: x` / `PRIORITY: y` tags that ends the line, each value
/// one or two words. `Top priority: get the CFO on the call.` is not a tag.
static TAG_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)((?:(?:\*\*|__)?\s*(?:type|priority)\s*(?:\*\*|__)?\s*[:=]\s*(?:\*\*|__)?\s*[a-z][a-z_\-]*(?:[ \t]+[a-z][a-z_\-]*)?\s*(?:\*\*|__)?[\s,;|]*)+)$",
    )
    .expect("valid tag tail regex")
});

/// Which rung of the fallback chain produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFormat {
    Structured,
    SuggestionOnly,
    Raw,
}

/// Parsed model output
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub text: String,
    pub suggestion_type: Option<SuggestionType>,
    pub priority: Option<Priority>,
    pub format: ParseFormat,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Analysis,
    Suggestion,
}

impl Section {
    fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("analysis") {
            Section::Analysis
        } else {
            Section::Suggestion
        }
    }
}

/// Stateless parser for suggestion responses
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw response. Returns `None` when nothing usable remains.
    pub fn parse(&self, raw: &str) -> Option<ParsedResponse> {
        let mut tags: Vec<&str> = Vec::new();
        let mut analysis: Vec<String> = Vec::new();
        let mut suggestion: Vec<String> = Vec::new();
        let mut body: Vec<String> = Vec::new();
        let mut current: Option<Section> = None;

        for line in raw.lines() {
            let (content, tag_run) = split_tags(line);
            tags.extend(tag_run);
            let Some(line) = content else {
                continue;
            };
            body.push(line.to_string());

            if let Some(caps) = SECTION_HEADER.captures(line) {
                let section = Section::from_label(&caps[1]);
                current = Some(section);
                let content = caps.get(2).map_or("", |m| m.as_str()).trim();
                if !content.is_empty() {
                    section_lines(section, &mut analysis, &mut suggestion).push(content.to_string());
                }
                continue;
            }
            if let Some(caps) = SECTION_HEADING.captures(line) {
                current = Some(Section::from_label(&caps[1]));
                continue;
            }
            if let Some(section) = current {
                section_lines(section, &mut analysis, &mut suggestion).push(line.to_string());
            }
        }

        let analysis = clean_text(&analysis.join("\n"));
        let suggestion = clean_text(&suggestion.join("\n"));

        let (text, format) = if !analysis.is_empty() && !suggestion.is_empty() {
            (format!("{} {}", analysis, suggestion), ParseFormat::Structured)
        } else if !suggestion.is_empty() {
            (suggestion, ParseFormat::SuggestionOnly)
        } else {
            (clean_text(&body.join("\n")), ParseFormat::Raw)
        };

        if text.is_empty() {
            return None;
        }

        let tags = tags.join("\n");
        Some(ParsedResponse {
            text,
            suggestion_type: parse_type_tag(&tags),
            priority: parse_priority_tag(&tags),
            format,
        })
    }
}

fn section_lines<'a>(
    section: Section,
    analysis: &'a mut Vec<String>,
    suggestion: &'a mut Vec<String>,
) -> &'a mut Vec<String> {
    match section {
        Section::Analysis => analysis,
        Section::Suggestion => suggestion,
    }
}

/// Split a line into its content and a trailing tag run
///
/// Content is `None` for a tag-only line.
fn split_tags(line: &str) -> (Option<&str>, Option<&str>) {
    let Some(tags) = TAG_TAIL.captures(line).and_then(|caps| caps.get(1)) else {
        return (Some(line), None);
    };
    let prefix = &line[..tags.start()];
    let content = if prefix.chars().all(|c| c.is_whitespace() || "*_#-".contains(c)) {
        None
    } else {
        Some(prefix.trim_end())
    };
    (content, Some(tags.as_str()))
}

/// Last valid `TYPE` tag wins
fn parse_type_tag(tags: &str) -> Option<SuggestionType> {
    TYPE_TAG
        .captures_iter(tags)
        .filter_map(|caps| {
            let first = caps.get(1)?.as_str();
            caps.get(2)
                .and_then(|second| {
                    SuggestionType::parse_tag(&format!("{} {}", first, second.as_str()))
                })
                .or_else(|| SuggestionType::parse_tag(first))
        })
        .last()
}

/// Last valid `PRIORITY` tag wins
fn parse_priority_tag(tags: &str) -> Option<Priority> {
    PRIORITY_TAG
        .captures_iter(tags)
        .filter_map(|caps| Priority::parse_tag(caps.get(1)?.as_str()))
        .last()
}

/// Strip markdown emphasis and heading markers, normalise bullets to
/// `- `, collapse runs of blank lines.
pub fn clean_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;

    for line in text.lines() {
        let line = line.replace("**", "").replace("__", "");
        let line = line.trim().trim_start_matches('#').trim();

        if line.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
            continue;
        }

        let normalized = if let Some(rest) = line
            .strip_prefix("* ")
            .or_else(|| line.strip_prefix("- "))
            .or_else(|| line.strip_prefix('•'))
        {
            format!("- {}", rest.trim())
        } else {
            line.to_string()
        };
        lines.push(normalized);
        previous_blank = false;
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
