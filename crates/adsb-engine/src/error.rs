use adsb_core::CoreError;
use thiserror::Error;

use crate::source::PollError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine has been stopped")]
    Stopped,
}
