//! Image source loaders
//!
//! A loader turns a source locator into a progress channel. It publishes zero
//! or more progress ticks, then either a final tick carrying the payload or a
//! failure.

use crate::channel::{Progress, ProgressChannel};
use crate::error::LoadError;

pub trait Loader<P> {
    /// Start fetching `source` and return the channel that reports on it
    fn open(&self, source: &str) -> ProgressChannel<P>;
}

/// Reads sources as local file paths. The whole file is read at once, so the
/// channel carries a single terminal tick.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct FileLoader;

#[cfg(not(target_arch = "wasm32"))]
impl Loader<Vec<u8>> for FileLoader {
    fn open(&self, source: &str) -> ProgressChannel<Vec<u8>> {
        let channel = ProgressChannel::new();
        match std::fs::read(source) {
            Ok(bytes) => {
                log::debug!("read {} bytes from {}", bytes.len(), source);
                channel.publish(Progress::complete(bytes.len() as u64, bytes));
            }
            Err(e) => {
                log::warn!("failed to read {}: {}", source, e);
                channel.fail(LoadError::Io(format!("{}: {}", source, e)));
            }
        }
        channel
    }
}

/// Upper bound on the buffer reserved up front from a `Content-Length` header
#[cfg(any(target_arch = "wasm32", test))]
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Initial buffer capacity for a body the server claims is `content_length`
/// bytes long. The header is untrusted; larger bodies grow as chunks arrive.
#[cfg(any(target_arch = "wasm32", test))]
fn preallocation(content_length: u64) -> usize {
    usize::try_from(content_length)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATION)
}

/// Fetches sources over HTTP with `window.fetch`, streaming the body so every
/// received chunk produces a progress tick.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchLoader;

#[cfg(target_arch = "wasm32")]
impl Loader<Vec<u8>> for FetchLoader {
    fn open(&self, source: &str) -> ProgressChannel<Vec<u8>> {
        let channel = ProgressChannel::new();
        let sink = channel.clone();
        let source = source.to_owned();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(error) = fetch::fetch_with_progress(&source, &sink).await {
                log::warn!("failed to load {}: {}", source, error);
                sink.fail(error);
            }
        });
        channel
    }
}

#[cfg(target_arch = "wasm32")]
mod fetch {
    use js_sys::{Reflect, Uint8Array};
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{ReadableStreamDefaultReader, Response};

    use super::{preallocation, LoadError, Progress, ProgressChannel};

    pub(super) async fn fetch_with_progress(
        source: &str,
        sink: &ProgressChannel<Vec<u8>>,
    ) -> Result<(), LoadError> {
        let window = web_sys::window().ok_or_else(|| LoadError::Network("no global window".to_string()))?;
        let response: Response = JsFuture::from(window.fetch_with_str(source))
            .await
            .map_err(js_error)?
            .dyn_into()
            .map_err(js_error)?;

        if !response.ok() {
            return Err(LoadError::Http {
                status: response.status(),
                status_text: response.status_text(),
            });
        }

        let body = response
            .body()
            .ok_or_else(|| LoadError::Network("ReadableStream not yet supported in this browser.".to_string()))?;

        let total = response
            .headers()
            .get("content-length")
            .map_err(js_error)?
            .ok_or_else(|| LoadError::Network("Content-Length response header unavailable".to_string()))?
            .parse::<u64>()
            .map_err(|e| LoadError::Network(format!("bad Content-Length: {}", e)))?;

        let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
        let mut bytes = Vec::new();
        bytes.try_reserve(preallocation(total)).map_err(too_large)?;
        loop {
            let chunk = JsFuture::from(reader.read()).await.map_err(js_error)?;
            let done = Reflect::get(&chunk, &JsValue::from_str("done"))
                .map_err(js_error)?
                .as_bool()
                .unwrap_or(true);
            if done {
                break;
            }
            let value: Uint8Array = Reflect::get(&chunk, &JsValue::from_str("value"))
                .map_err(js_error)?
                .dyn_into()
                .map_err(js_error)?;
            bytes.try_reserve(value.length() as usize).map_err(too_large)?;
            bytes.extend_from_slice(&value.to_vec());
            sink.publish(Progress::tick(bytes.len() as u64, total));
        }

        let size = bytes.len() as u64;
        sink.publish(Progress::complete(size, bytes));
        Ok(())
    }

    fn too_large(e: std::collections::TryReserveError) -> LoadError {
        LoadError::Network(format!("response body too large: {}", e))
    }

    fn js_error(value: JsValue) -> LoadError {
        let message = value
            .as_string()
            .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
            .unwrap_or_else(|| format!("{:?}", value));
        LoadError::Network(message)
    }
}
