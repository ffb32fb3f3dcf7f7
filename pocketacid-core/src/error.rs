//! Ambient error type for non-realtime operations (scene load/save, config).
//!
//! Nothing on the audio hot path returns `Result`: per spec, a realtime
//! operation either succeeds and has effect or fails cleanly with a
//! caller-visible `bool`/flag, never an exception or an allocation-bearing
//! error value. `EngineError` is reserved for caller-thread operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scene JSON parse failed")]
    SceneParse,
    #[error("scene not found: {0}")]
    SceneNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
