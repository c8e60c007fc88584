use crate::files::StrictnessLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// Sable diagnostic codes.
/// Format: SBE[XXXXX] for errors, SBW[XXXXX] for warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Parser (SBE01000-SBE01999)
    SBE01001, // Syntax error

    // Definitions and resolution (SBE02000-SBE02999)
    SBE02001, // Unresolved constant
    SBE02002, // Method redefined with a different arity
    SBE02003, // Signature does not match the method parameter list
    SBE02004, // Circular superclass chain
    SBE02005, // Wrong number of type arguments
    SBE02006, // Method is missing a signature (strict files)

    // CFG (SBE03000-SBE03999)
    SBE03001, // Use of undeclared variable
    SBW03002, // Unreachable code
    SBW03003, // Returned value in a void method is ignored

    // Inference (SBE04000-SBE04999)
    SBE04001, // Method does not exist
    SBE04002, // Wrong number of arguments
    SBE04003, // Argument type mismatch
    SBE04004, // Return type mismatch
    SBE04005, // Cast type mismatch
    SBE04006, // Control flow reached T.absurd
    SBE04007, // Private method call
    SBE04008, // Missing required keyword argument
    SBE04009, // Unknown keyword argument
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::SBE01001 => "SBE01001",
            DiagnosticCode::SBE02001 => "SBE02001",
            DiagnosticCode::SBE02002 => "SBE02002",
            DiagnosticCode::SBE02003 => "SBE02003",
            DiagnosticCode::SBE02004 => "SBE02004",
            DiagnosticCode::SBE02005 => "SBE02005",
            DiagnosticCode::SBE02006 => "SBE02006",
            DiagnosticCode::SBE03001 => "SBE03001",
            DiagnosticCode::SBW03002 => "SBW03002",
            DiagnosticCode::SBW03003 => "SBW03003",
            DiagnosticCode::SBE04001 => "SBE04001",
            DiagnosticCode::SBE04002 => "SBE04002",
            DiagnosticCode::SBE04003 => "SBE04003",
            DiagnosticCode::SBE04004 => "SBE04004",
            DiagnosticCode::SBE04005 => "SBE04005",
            DiagnosticCode::SBE04006 => "SBE04006",
            DiagnosticCode::SBE04007 => "SBE04007",
            DiagnosticCode::SBE04008 => "SBE04008",
            DiagnosticCode::SBE04009 => "SBE04009",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::SBW03002 | DiagnosticCode::SBW03003 => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Minimum file strictness at which this code is emitted. Parser and
    /// definition errors fire from `typed: false` up; flow and inference
    /// errors require `typed: true`; the missing-sig nudge only fires at
    /// `typed: strict` and above.
    pub fn min_strictness(&self) -> StrictnessLevel {
        match self {
            DiagnosticCode::SBE01001
            | DiagnosticCode::SBE02001
            | DiagnosticCode::SBE02002
            | DiagnosticCode::SBE02003
            | DiagnosticCode::SBE02004
            | DiagnosticCode::SBE02005 => StrictnessLevel::False,
            DiagnosticCode::SBE02006 => StrictnessLevel::Strict,
            _ => StrictnessLevel::True,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            DiagnosticCode::SBE01001 => "syntax error",
            DiagnosticCode::SBE02001 => "unable to resolve constant",
            DiagnosticCode::SBE02002 => "method redefined with a different arity",
            DiagnosticCode::SBE02003 => "signature does not match the method parameter list",
            DiagnosticCode::SBE02004 => "circular superclass chain",
            DiagnosticCode::SBE02005 => "wrong number of type arguments",
            DiagnosticCode::SBE02006 => "method is missing a signature",
            DiagnosticCode::SBE03001 => "use of undeclared variable",
            DiagnosticCode::SBW03002 => "unreachable code",
            DiagnosticCode::SBW03003 => "returned value in a void method is ignored",
            DiagnosticCode::SBE04001 => "method does not exist",
            DiagnosticCode::SBE04002 => "wrong number of arguments",
            DiagnosticCode::SBE04003 => "argument type mismatch",
            DiagnosticCode::SBE04004 => "return type mismatch",
            DiagnosticCode::SBE04005 => "cast type mismatch",
            DiagnosticCode::SBE04006 => "control flow reached T.absurd",
            DiagnosticCode::SBE04007 => "non-private call to private method",
            DiagnosticCode::SBE04008 => "missing required keyword argument",
            DiagnosticCode::SBE04009 => "unknown keyword argument",
        }
    }
}
