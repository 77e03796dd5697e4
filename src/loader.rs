//! Reading the CLI's inputs.
//!
//! A schema declaration and the documents checked against it are both plain
//! JSON. They arrive as a path on disk, an inline string, or, with the
//! `remote` feature, an `http(s)://` address.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// How long a remote source may take before the load gives up.
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Read a declaration or document stored on disk.
///
/// # Errors
///
/// `LoadError::FileNotFound` for a missing path, `LoadError::ReadError` when
/// the file cannot be read and `LoadError::InvalidJson` when its content does
/// not parse.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Parse a declaration or document given inline.
///
/// # Errors
///
/// `LoadError::InvalidJson` when the text does not parse.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Fetch a declaration or document served over HTTP. A non-success status is
/// a failure, whatever the body holds.
///
/// # Errors
///
/// `LoadError::NetworkError` for a failed request, an error status or a body
/// that does not parse.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network_error = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(network_error)?
        .json()
        .map_err(network_error)
}

/// Whether a CLI source names a remote document rather than a path.
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a CLI source, remote or on disk. Without the `remote` feature an
/// address is treated as a path that does not exist.
///
/// # Errors
///
/// The errors of `load_json_url` or [`load_json`], depending on the source.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}
