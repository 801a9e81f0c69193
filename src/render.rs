// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Rendering seam.
//!
//! Drawing happens in the viewer; the producer side only needs a yes/no answer with a useful
//! explanation before it persists and broadcasts a diagram. [`DiagramRenderer`] is that answer,
//! and [`MermaidSourceValidator`] is the built-in implementation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

static HEADER_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*(?:-[A-Za-z0-9]+)*)").expect("valid header regex")
});

static BACKGROUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#[0-9A-Fa-f]{3,8}|[A-Za-z]+|(?:rgb|rgba|hsl|hsla)\([0-9.,%\s]+\))$")
        .expect("valid background regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    Er,
    Journey,
    Gantt,
    Pie,
    Git,
    Mindmap,
    Timeline,
    Quadrant,
    Requirement,
    C4,
    Sankey,
    XyChart,
    Block,
    Packet,
    Architecture,
    Kanban,
}

impl DiagramKind {
    /// Maps a Mermaid header keyword to its diagram kind.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let kind = match keyword {
            "flowchart" | "graph" => Self::Flowchart,
            "sequenceDiagram" => Self::Sequence,
            "classDiagram" | "classDiagram-v2" => Self::Class,
            "stateDiagram" | "stateDiagram-v2" => Self::State,
            "erDiagram" => Self::Er,
            "journey" => Self::Journey,
            "gantt" => Self::Gantt,
            "pie" => Self::Pie,
            "gitGraph" => Self::Git,
            "mindmap" => Self::Mindmap,
            "timeline" => Self::Timeline,
            "quadrantChart" => Self::Quadrant,
            "requirementDiagram" => Self::Requirement,
            "C4Context" | "C4Container" | "C4Component" | "C4Dynamic" | "C4Deployment" => Self::C4,
            "sankey-beta" => Self::Sankey,
            "xychart-beta" => Self::XyChart,
            "block-beta" => Self::Block,
            "packet-beta" => Self::Packet,
            "architecture-beta" => Self::Architecture,
            "kanban" => Self::Kanban,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::State => "state",
            Self::Er => "er",
            Self::Journey => "journey",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Git => "git",
            Self::Mindmap => "mindmap",
            Self::Timeline => "timeline",
            Self::Quadrant => "quadrant",
            Self::Requirement => "requirement",
            Self::C4 => "c4",
            Self::Sankey => "sankey",
            Self::XyChart => "xy_chart",
            Self::Block => "block",
            Self::Packet => "packet",
            Self::Architecture => "architecture",
            Self::Kanban => "kanban",
        }
    }

    /// Kinds whose brackets are structural. Elsewhere brackets show up in free text or, for ER
    /// diagrams, in cardinality markers like `||--o{`.
    fn has_structural_brackets(self) -> bool {
        matches!(self, Self::Flowchart | Self::Class | Self::State | Self::Block)
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// CSS color the viewer paints behind the diagram.
    pub background: Option<String>,
}

/// Outcome of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub kind: DiagramKind,
    pub source: String,
    pub background: Option<String>,
}

/// Why a diagram was rejected. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("diagram source is empty")]
    Empty,
    #[error("line {line}: front-matter block opened with `---` is never closed")]
    UnterminatedFrontMatter { line: usize },
    #[error(
        "line {line}: unknown diagram type `{keyword}` (expected a Mermaid header such as `flowchart TD` or `sequenceDiagram`)"
    )]
    UnknownDiagramType { line: usize, keyword: String },
    #[error("line {line}: `{keyword}` diagram has no statements after its header")]
    NoStatements { line: usize, keyword: String },
    #[error("line {line}: `{found}` has no matching opening bracket")]
    UnexpectedBracket { line: usize, found: char },
    #[error("line {line}: `{found}` does not close `{open}` opened on line {open_line}")]
    MismatchedBracket {
        line: usize,
        found: char,
        open: char,
        open_line: usize,
    },
    #[error("line {line}: `{open}` is never closed")]
    UnclosedBracket { line: usize, open: char },
    #[error("invalid background color `{value}`")]
    InvalidBackground { value: String },
    #[error("renderer failed: {message}")]
    Backend { message: String },
}

impl RenderError {
    /// Stable machine-readable name for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::UnterminatedFrontMatter { .. } => "unterminated_front_matter",
            Self::UnknownDiagramType { .. } => "unknown_diagram_type",
            Self::NoStatements { .. } => "no_statements",
            Self::UnexpectedBracket { .. } => "unexpected_bracket",
            Self::MismatchedBracket { .. } => "mismatched_bracket",
            Self::UnclosedBracket { .. } => "unclosed_bracket",
            Self::InvalidBackground { .. } => "invalid_background",
            Self::Backend { .. } => "backend",
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Self::UnterminatedFrontMatter { line }
            | Self::UnknownDiagramType { line, .. }
            | Self::NoStatements { line, .. }
            | Self::UnexpectedBracket { line, .. }
            | Self::MismatchedBracket { line, .. }
            | Self::UnclosedBracket { line, .. } => Some(*line),
            Self::Empty | Self::InvalidBackground { .. } | Self::Backend { .. } => None,
        }
    }
}

/// Turns diagram source into a displayable artifact or a structured rejection.
pub trait DiagramRenderer: Send + Sync + 'static {
    fn render(&self, source: &str, options: &RenderOptions)
        -> Result<RenderedArtifact, RenderError>;
}

/// Structural checks for Mermaid source.
#[derive(Debug, Clone, Copy, Default)]
pub struct MermaidSourceValidator;

impl DiagramRenderer for MermaidSourceValidator {
    fn render(
        &self,
        source: &str,
        options: &RenderOptions,
    ) -> Result<RenderedArtifact, RenderError> {
        let background = match options.background.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) if BACKGROUND.is_match(value) => Some(value.to_owned()),
            Some(value) => {
                return Err(RenderError::InvalidBackground {
                    value: value.to_owned(),
                })
            }
        };

        if source.trim().is_empty() {
            return Err(RenderError::Empty);
        }

        let lines = content_lines(source)?;
        let Some(&(header_line, header)) = lines.first() else {
            return Err(RenderError::Empty);
        };

        let keyword = HEADER_KEYWORD
            .captures(header)
            .and_then(|caps| caps.get(1))
            .map_or(header, |m| m.as_str());
        let kind = DiagramKind::from_keyword(keyword).ok_or_else(|| {
            RenderError::UnknownDiagramType {
                line: header_line,
                keyword: keyword.to_owned(),
            }
        })?;

        // `graph TD;A-->B` carries statements on the header line itself.
        let inline = header
            .split(';')
            .skip(1)
            .filter(|part| !part.trim().is_empty())
            .count();
        if inline + lines.len() == 1 {
            return Err(RenderError::NoStatements {
                line: header_line,
                keyword: keyword.to_owned(),
            });
        }

        if kind.has_structural_brackets() {
            check_brackets(kind, &lines)?;
        }

        Ok(RenderedArtifact {
            kind,
            source: source.to_owned(),
            background,
        })
    }
}

/// Non-blank, non-comment lines with their 1-based line numbers, front matter removed.
fn content_lines(source: &str) -> Result<Vec<(usize, &str)>, RenderError> {
    let mut lines = Vec::new();
    let mut front_matter_opened_at: Option<usize> = None;
    let mut seen_content = false;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();

        if front_matter_opened_at.is_some() {
            if trimmed == "---" {
                front_matter_opened_at = None;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("%%") {
            continue;
        }
        if !seen_content && trimmed == "---" {
            front_matter_opened_at = Some(line_no);
            seen_content = true;
            continue;
        }

        seen_content = true;
        lines.push((line_no, trimmed));
    }

    match front_matter_opened_at {
        Some(line) => Err(RenderError::UnterminatedFrontMatter { line }),
        None => Ok(lines),
    }
}

/// Bracket balance over node shapes and blocks.
///
/// Free text is skipped: quoted strings, flowchart edge labels (`-->|text|`), and for state and
/// class diagrams the label after a `:` as well as multi-line state notes.
fn check_brackets(kind: DiagramKind, lines: &[(usize, &str)]) -> Result<(), RenderError> {
    let labels_after_colon = matches!(kind, DiagramKind::State | DiagramKind::Class);
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut in_note = false;

    for &(line, text) in lines {
        if kind == DiagramKind::State {
            if in_note {
                in_note = text != "end note";
                continue;
            }
            if text.starts_with("note ") && !text.contains(':') {
                in_note = true;
                continue;
            }
        }

        let mut in_quote = false;
        let mut in_edge_label = false;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            let before = prev.replace(ch);
            if ch == '"' {
                in_quote = !in_quote;
                continue;
            }
            if in_quote {
                continue;
            }
            // Nothing opened on this line is still pending, so we are outside any node shape.
            let outside_shape = stack.last().map_or(true, |&(_, opened)| opened != line);
            if kind == DiagramKind::Flowchart && ch == '|' && (in_edge_label || outside_shape) {
                in_edge_label = !in_edge_label;
                continue;
            }
            if in_edge_label {
                continue;
            }
            if labels_after_colon && ch == ':' && outside_shape {
                break;
            }
            match ch {
                '(' | '[' | '{' => stack.push((ch, line)),
                // `A>flag]` is the asymmetric node shape.
                '>' if kind == DiagramKind::Flowchart
                    && before.is_some_and(|c| c.is_alphanumeric() || c == '_') =>
                {
                    stack.push((ch, line));
                }
                ')' | ']' | '}' => {
                    let Some((open, open_line)) = stack.pop() else {
                        return Err(RenderError::UnexpectedBracket { line, found: ch });
                    };
                    if closer_for(open) != ch {
                        return Err(RenderError::MismatchedBracket {
                            line,
                            found: ch,
                            open,
                            open_line,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    match stack.pop() {
        Some((open, line)) => Err(RenderError::UnclosedBracket { line, open }),
        None => Ok(()),
    }
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' | '>' => ']',
        _ => '}',
    }
}
