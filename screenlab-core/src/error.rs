//! Engine error taxonomy.
//!
//! None of these abort a run. `DataInsufficient` and `Computation` are caught per
//! ticker and turn into a skip; `UniverseEmpty` is the terminal "nothing to rank"
//! state of the technical stage.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreenError {
    #[error("insufficient data: need {required}, have {available}")]
    DataInsufficient { required: usize, available: usize },

    #[error("computation error: {0}")]
    Computation(String),

    #[error("no ticker in the universe produced an RS score")]
    UniverseEmpty,
}

impl ScreenError {
    pub fn computation(detail: impl Into<String>) -> Self {
        ScreenError::Computation(detail.into())
    }

    pub fn insufficient(required: usize, available: usize) -> Self {
        ScreenError::DataInsufficient {
            required,
            available,
        }
    }
}
