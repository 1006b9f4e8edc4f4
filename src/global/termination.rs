//! The termination channel: every diagnostic the core raises flows through
//! here. In `Throw` mode the offending call returns the error to the host; in
//! `Exit` mode the accumulated stream is printed with a caret report over the
//! registered script source and the process exits with failure.

use core::fmt::Write as _;
use core::ops::Range;
use std::cell::RefCell;
use std::process;
use std::rc::Rc;

use ariadne::{Label, Report, ReportKind, Source};
use thiserror::Error;

pub type EidosResult<T> = Result<T, EidosError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    UndefinedIdentifier,
    ConstantRedefinition,
    Type,
    LengthMismatch,
    IndexOutOfRange,
    InvalidAssignmentTarget,
    Internal,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::UndefinedIdentifier => "undefined identifier",
            ErrorKind::ConstantRedefinition => "redefinition of constant",
            ErrorKind::Type => "type error",
            ErrorKind::LengthMismatch => "length mismatch",
            ErrorKind::IndexOutOfRange => "index out of range",
            ErrorKind::InvalidAssignmentTarget => "invalid assignment target",
            ErrorKind::Internal => "internal invariant violated",
        }
    }
}

/// A token's extent in the original script, in both encodings (§ byte offsets
/// for string-based highlighters, UTF-16 offsets for embedding UIs). Both are
/// recorded at lex time and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceSpan {
    pub bytes: Range<usize>,
    pub utf16: Range<usize>,
}

impl SourceSpan {
    pub fn new(bytes: Range<usize>, utf16: Range<usize>) -> Self {
        SourceSpan { bytes, utf16 }
    }

    /// Smallest span covering both operands.
    pub fn join(&self, other: &SourceSpan) -> SourceSpan {
        SourceSpan {
            bytes: self.bytes.start.min(other.bytes.start)..self.bytes.end.max(other.bytes.end),
            utf16: self.utf16.start.min(other.utf16.start)..self.utf16.end.max(other.utf16.end),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("ERROR ({site}): {message}")]
pub struct EidosError {
    pub kind: ErrorKind,
    pub site: &'static str,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl EidosError {
    pub fn new(kind: ErrorKind, site: &'static str, message: impl Into<String>) -> Self {
        EidosError {
            kind,
            site,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn lex(site: &'static str, message: impl Into<String>) -> Self {
        EidosError::new(ErrorKind::Lex, site, message)
    }

    pub fn parse(site: &'static str, message: impl Into<String>) -> Self {
        EidosError::new(ErrorKind::Parse, site, message)
    }

    pub fn undefined_identifier(site: &'static str, name: impl core::fmt::Display) -> Self {
        EidosError::new(
            ErrorKind::UndefinedIdentifier,
            site,
            format!("undefined identifier \"{name}\""),
        )
    }

    pub fn constant_redefinition(site: &'static str, name: impl core::fmt::Display) -> Self {
        EidosError::new(
            ErrorKind::ConstantRedefinition,
            site,
            format!("identifier \"{name}\" is a constant and cannot be redefined or removed"),
        )
    }

    pub fn type_error(site: &'static str, message: impl Into<String>) -> Self {
        EidosError::new(ErrorKind::Type, site, message)
    }

    pub fn length_mismatch(site: &'static str, message: impl Into<String>) -> Self {
        EidosError::new(ErrorKind::LengthMismatch, site, message)
    }

    pub fn index_out_of_range(site: &'static str, message: impl Into<String>) -> Self {
        EidosError::new(ErrorKind::IndexOutOfRange, site, message)
    }

    pub fn invalid_assignment_target(site: &'static str) -> Self {
        EidosError::new(
            ErrorKind::InvalidAssignmentTarget,
            site,
            "assignment target must be an identifier, a subscript of an identifier, \
             or a member of an object",
        )
    }

    pub fn internal(site: &'static str, message: impl Into<String>) -> Self {
        EidosError::new(ErrorKind::Internal, site, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationMode {
    /// Errors are returned to the host as `Err(EidosError)`.
    #[default]
    Throw,
    /// Errors print the accumulated stream plus a caret report and exit
    /// with a nonzero status.
    Exit,
}

#[derive(Default)]
struct TerminationState {
    mode: TerminationMode,
    stream: String,
    positions: Vec<SourceSpan>,
    script_name: String,
    script_source: Option<Rc<str>>,
}

thread_local! {
    static STATE: RefCell<TerminationState> = RefCell::new(TerminationState {
        script_name: "<script>".to_string(),
        ..TerminationState::default()
    });
}

pub fn set_termination_mode(mode: TerminationMode) {
    STATE.with(|s| s.borrow_mut().mode = mode);
}

pub fn termination_mode() -> TerminationMode {
    STATE.with(|s| s.borrow().mode)
}

/// Registers the script text that caret reports are rendered against.
/// Called by the script object before tokenizing and by the interpreter
/// before evaluation.
pub fn register_script_source(name: &str, source: &str) {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.script_name = name.to_string();
        s.script_source = Some(Rc::from(source));
    });
}

pub fn push_error_position(span: SourceSpan) {
    STATE.with(|s| s.borrow_mut().positions.push(span));
}

pub fn pop_error_position() {
    STATE.with(|s| {
        s.borrow_mut().positions.pop();
    });
}

pub fn current_error_position() -> Option<SourceSpan> {
    STATE.with(|s| s.borrow().positions.last().cloned())
}

/// Drains the accumulated diagnostic stream, leaving it empty.
pub fn capture_termination_stream() -> String {
    STATE.with(|s| core::mem::take(&mut s.borrow_mut().stream))
}

/// Routes a diagnostic through the termination channel. In `Throw` mode the
/// (possibly position-annotated) error is handed back for `?` propagation; in
/// `Exit` mode this never returns.
pub fn terminate(mut error: EidosError) -> EidosError {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        let position = s.positions.pop();
        if error.span.is_none() {
            error.span = position;
        }
        let _ = writeln!(s.stream, "{error}");
        if s.mode == TerminationMode::Exit {
            eprint!("{}", s.stream);
            print_caret_report(&s, &error);
            process::exit(1);
        }
    });
    error
}

fn print_caret_report(state: &TerminationState, error: &EidosError) {
    let (Some(source), Some(span)) = (&state.script_source, &error.span) else {
        return;
    };
    let name = state.script_name.clone();
    let report = Report::build(ReportKind::Error, (name.clone(), span.bytes.clone()))
        .with_message(error.message.clone())
        .with_label(
            Label::new((name.clone(), span.bytes.clone())).with_message(error.kind.label()),
        )
        .finish();
    let _ = report.eprint((name, Source::from(source.as_ref())));
}
