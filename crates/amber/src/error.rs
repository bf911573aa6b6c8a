//! Error types for the instrumentation passes.
//!
//! Errors raised while walking the AST carry only a message and the source
//! position of the offending node; the driver augments them with the filename
//! before they reach the caller. This split keeps the visitors free of
//! per-file context and mirrors how the final message is assembled exactly
//! once, at the instrumentation boundary.

use std::{borrow::Cow, fmt};

use serde_json::Value;

/// A line/column position extracted from a Babel `loc.start` record.
///
/// Lines are 1-indexed and columns 0-indexed, matching the parser's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    /// Reads the starting position from a node's `loc` field.
    ///
    /// Synthetic nodes have no `loc`; callers fall back to the nearest
    /// ancestor that has one (the deepest node on the current trail).
    pub(crate) fn from_node(node: &Value) -> Option<Self> {
        let start = node.get("loc")?.get("start")?;
        Some(Self {
            line: u32::try_from(start.get("line")?.as_u64()?).ok()?,
            column: u32::try_from(start.get("column")?.as_u64()?).ok()?,
        })
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An error raised during pass 1 or pass 2, before filename augmentation.
///
/// All variants are fatal; the passes never recover. The variants classify
/// the failure for tests and tooling, not for control flow.
#[derive(Debug, Clone)]
pub(crate) enum AnalysisError {
    /// Illegal source construct (e.g. a program-level `const` shadowing a
    /// CommonJS variable).
    Syntax {
        msg: Cow<'static, str>,
        loc: Option<CodeLoc>,
    },
    /// A node kind the visitor does not expect at this position.
    /// This is an internal-consistency failure of the input AST.
    UnexpectedNode {
        kind: String,
        loc: Option<CodeLoc>,
    },
    /// A construct the engine knows about but deliberately does not
    /// instrument (e.g. `for await`).
    Unsupported {
        msg: Cow<'static, str>,
        loc: Option<CodeLoc>,
    },
}

impl AnalysisError {
    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, loc: Option<CodeLoc>) -> Self {
        Self::Syntax { msg: msg.into(), loc }
    }

    pub(crate) fn unexpected_node(kind: impl Into<String>, loc: Option<CodeLoc>) -> Self {
        Self::UnexpectedNode {
            kind: kind.into(),
            loc,
        }
    }

    pub(crate) fn unsupported(msg: impl Into<Cow<'static, str>>, loc: Option<CodeLoc>) -> Self {
        Self::Unsupported { msg: msg.into(), loc }
    }

    pub(crate) fn loc(&self) -> Option<CodeLoc> {
        match self {
            Self::Syntax { loc, .. } | Self::UnexpectedNode { loc, .. } | Self::Unsupported { loc, .. } => *loc,
        }
    }

    /// Fills in a fallback position (typically the deepest located node on
    /// the trail at the time of the error) when the error has none.
    pub(crate) fn or_loc(mut self, fallback: Option<CodeLoc>) -> Self {
        let slot = match &mut self {
            Self::Syntax { loc, .. } | Self::UnexpectedNode { loc, .. } | Self::Unsupported { loc, .. } => loc,
        };
        if slot.is_none() {
            *slot = fallback;
        }
        self
    }

    fn message(&self) -> String {
        match self {
            Self::Syntax { msg, .. } | Self::Unsupported { msg, .. } => msg.clone().into_owned(),
            Self::UnexpectedNode { kind, .. } => format!("unexpected node type {kind}"),
        }
    }

    /// Attaches the filename, producing the public error type.
    pub(crate) fn into_instrument_error(self, filename: &str) -> InstrumentError {
        InstrumentError {
            filename: filename.to_owned(),
            loc: self.loc(),
            message: self.message(),
        }
    }
}

/// The public error type returned by [`crate::instrument`].
///
/// Displays as:
///
/// ```text
/// Error instrumenting: <file>:<line>:<col>
/// <message>
/// ```
#[derive(Debug, Clone)]
pub struct InstrumentError {
    filename: String,
    loc: Option<CodeLoc>,
    message: String,
}

impl InstrumentError {
    /// The file that was being instrumented.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Source position of the offending node, when one was available.
    #[must_use]
    pub fn loc(&self) -> Option<CodeLoc> {
        self.loc
    }

    /// The underlying message, without the location preamble.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loc {
            Some(loc) => write!(f, "Error instrumenting: {}:{loc}\n{}", self.filename, self.message),
            None => write!(f, "Error instrumenting: {}\n{}", self.filename, self.message),
        }
    }
}

impl std::error::Error for InstrumentError {}
