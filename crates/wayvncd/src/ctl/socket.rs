//! Binding and removing the control socket node.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};

use camino::Utf8Path;
use tracing::{debug, warn};

use super::CTL_TARGET;
use super::errors::ServerError;

/// Longest socket path the platform accepts, excluding the terminating NUL.
pub fn max_socket_path_len() -> usize {
    // SAFETY: `sockaddr_un` is plain old data for which all-zero bytes are a
    // valid value.
    let address: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    address.sun_path.len() - 1
}

/// Binds a listening socket at `path`.
///
/// An existing socket node that nobody answers on is treated as stale and
/// replaced. A live socket or a non-socket node at `path` aborts the bind.
pub(crate) fn bind_unix(path: &Utf8Path) -> Result<UnixListener, ServerError> {
    let max = max_socket_path_len();
    let len = path.as_str().len();
    if len > max {
        return Err(ServerError::NameTooLong {
            path: path.to_owned(),
            len,
            max,
        });
    }

    if let Some(metadata) = existing_node(path)? {
        if !metadata.file_type().is_socket() {
            return Err(ServerError::NotSocket {
                path: path.to_owned(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ServerError::InUse {
                    path: path.to_owned(),
                });
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                debug!(target: CTL_TARGET, %path, "removing stale control socket");
                fs::remove_file(path).map_err(|source| ServerError::Cleanup {
                    path: path.to_owned(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ServerError::Connect {
                    path: path.to_owned(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ServerError::Bind {
        path: path.to_owned(),
        source,
    })
}

fn existing_node(path: &Utf8Path) -> Result<Option<fs::Metadata>, ServerError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ServerError::Metadata {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Removes the socket node, ignoring a node that is already gone.
pub(crate) fn remove_socket(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: CTL_TARGET,
            error = %error,
            path = %path,
            "failed to remove control socket"
        );
    }
}
