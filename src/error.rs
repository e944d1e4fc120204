use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("numerical instability between atoms {i} and {j}")]
    NumericalInstability { i: usize, j: usize },

    #[error("non-finite {quantity} from the force kernel (atom {atom:?})")]
    NonFinite { quantity: &'static str, atom: Option<usize> },

    #[error("config file error: {0}")]
    Config(#[from] confy::ConfyError),
}

pub type Result<T> = std::result::Result<T, SimError>;

// shorthand for precondition failures
pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(SimError::InvalidConfiguration(msg.into()))
}
