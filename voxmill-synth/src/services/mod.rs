//! Request-level services: engine call, post-processing, WAV output

pub mod tts_service;
pub mod vc_service;

pub use tts_service::{SynthesisOutput, TtsService};
pub use vc_service::{ConversionOutput, VcRequest, VcService};

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures::FutureExt;

use crate::audio::{io::write_wav, AudioBuffer};
use crate::engine::EngineError;
use crate::error::{Result, SynthError};

/// URL prefix under which the output directory is served
pub const OUTPUTS_ROUTE: &str = "/outputs";

/// Public URL of a generated file
pub fn output_url(file_name: &str) -> String {
    format!("{}/{}", OUTPUTS_ROUTE, file_name)
}

/// Write `buffer` as `<dir>/<file_name>`; returns the path and file size
///
/// Blocking; call from `spawn_blocking`.
pub(crate) fn persist_wav(dir: &Path, file_name: &str, buffer: &AudioBuffer) -> Result<(PathBuf, u64)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    write_wav(&path, buffer)?;
    let size = std::fs::metadata(&path)?.len();
    Ok((path, size))
}

/// Await an engine call; a panic inside the engine becomes `ProcessingFailure`
pub(crate) async fn guarded_engine_call<T, F>(engine: &str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, EngineError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => Ok(result?),
        Err(payload) => Err(SynthError::ProcessingFailure(format!(
            "{} engine panicked: {}",
            engine,
            panic_message(payload.as_ref())
        ))),
    }
}

/// Text of a panic payload, when it carries one
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
