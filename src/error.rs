//! Crate-level error type.

use crate::model_check::ModelCheckError;
use crate::module::ModuleError;
use crate::parse::ParseError;
use crate::signature::SignatureError;
use crate::strategy::StrategyError;
use crate::unify::UnifyError;
use std::fmt;

/// Any error an operation of this crate reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Signature(SignatureError),
    Module(ModuleError),
    Parse(ParseError),
    Unify(UnifyError),
    Strategy(StrategyError),
    ModelCheck(ModelCheckError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Signature(e) => write!(f, "signature: {}", e),
            Error::Module(e) => write!(f, "module: {}", e),
            Error::Parse(e) => write!(f, "{}", e),
            Error::Unify(e) => write!(f, "{}", e),
            Error::Strategy(e) => write!(f, "{}", e),
            Error::ModelCheck(e) => write!(f, "model checking: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Signature(e) => Some(e),
            Error::Module(e) => Some(e),
            Error::Parse(e) => Some(e),
            Error::Unify(e) => Some(e),
            Error::Strategy(e) => Some(e),
            Error::ModelCheck(e) => Some(e),
        }
    }
}

impl From<SignatureError> for Error {
    fn from(e: SignatureError) -> Self {
        Error::Signature(e)
    }
}

impl From<ModuleError> for Error {
    fn from(e: ModuleError) -> Self {
        Error::Module(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<UnifyError> for Error {
    fn from(e: UnifyError) -> Self {
        Error::Unify(e)
    }
}

impl From<StrategyError> for Error {
    fn from(e: StrategyError) -> Self {
        Error::Strategy(e)
    }
}

impl From<ModelCheckError> for Error {
    fn from(e: ModelCheckError) -> Self {
        Error::ModelCheck(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
