use crate::device_dict::DeviceDictError;
use crate::tuxmake::TuxMakeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("template rendering failed: {0}")]
    Template(#[from] minijinja::Error),
}

impl JobError {
    pub fn invalid(message: impl Into<String>) -> Self {
        JobError::InvalidArgument(message.into())
    }
}

impl From<DeviceDictError> for JobError {
    fn from(error: DeviceDictError) -> Self {
        JobError::InvalidArgument(error.to_string())
    }
}

impl From<TuxMakeError> for JobError {
    fn from(error: TuxMakeError) -> Self {
        JobError::InvalidArgument(error.to_string())
    }
}
