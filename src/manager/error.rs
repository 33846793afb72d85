use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Reducer rejected action: {0}")]
    Reducer(#[from] crate::reducer::ReducerError),

    #[error("Payload size mismatch for {name}: record declares {declared} bytes, payload holds {actual}")]
    PayloadSizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },
}

pub type ManagerResult<T> = Result<T, ManagerError>;
