//! Synchronous whole-file fetch for `file://` playlist sources.

use std::fs::File;
use std::io::{ErrorKind, Read};

use crate::error::FetchError;

/// Reads an entire playlist file into memory.
///
/// The size is taken from the file's metadata up front; zero-size files
/// are rejected there. Reads retry on interrupted and would-block
/// conditions; any other failure, including an early end of file, fails
/// the fetch cycle.
pub(crate) fn read_playlist_file(path: &str) -> Result<Vec<u8>, FetchError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len() as usize;
    if size == 0 {
        return Err(FetchError::EmptyFile {
            path: path.to_string(),
        });
    }

    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|_| FetchError::Allocation {
            size,
            path: path.to_string(),
        })?;
    data.resize(size, 0);

    let mut off = 0;
    while off < size {
        match file.read(&mut data[off..]) {
            Ok(0) => {
                return Err(FetchError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "playlist file truncated during read",
                )));
            }
            Ok(n) => off += n,
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(data)
}
