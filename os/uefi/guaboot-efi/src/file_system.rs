//! # Reading Files from the Boot Volume

use alloc::vec;
use guaboot_core::firmware::FirmwareError;
use log::debug;
use uefi::proto::media::file::{File, FileAttribute, FileMode, RegularFile};
use uefi::{CString16, Status, boot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FileError {
    #[error("The path cannot be expressed in UCS-2")]
    InvalidPath,
    #[error("The boot device has no simple file system ({0:?})")]
    NoFileSystem(Status),
    #[error("The file does not exist")]
    NotFound,
    #[error("The path names a directory")]
    NotAFile,
    #[error("The file could not be read ({0:?})")]
    Io(Status),
    #[error("Read {read} of {expected} bytes")]
    ShortRead { read: usize, expected: usize },
}

impl From<FileError> for Status {
    fn from(value: FileError) -> Self {
        match value {
            FileError::InvalidPath => Self::INVALID_PARAMETER,
            FileError::NoFileSystem(status) | FileError::Io(status) => status,
            FileError::NotFound | FileError::NotAFile => Self::NOT_FOUND,
            FileError::ShortRead { .. } => Self::END_OF_FILE,
        }
    }
}

impl From<FileError> for FirmwareError {
    fn from(value: FileError) -> Self {
        match value {
            FileError::NotFound | FileError::NotAFile | FileError::InvalidPath => {
                Self::KernelNotFound
            }
            FileError::NoFileSystem(_) | FileError::Io(_) | FileError::ShortRead { .. } => {
                Self::ReadFailed
            }
        }
    }
}

/// Read a whole file from the volume the loader was started from.
///
/// The buffer is `LOADER_DATA` pool memory and is never freed, so it is
/// still intact when the kernel runs.
///
/// # Errors
/// See [`FileError`].
pub fn load_file(path: &str) -> Result<&'static [u8], FileError> {
    let wide = CString16::try_from(path).map_err(|_| FileError::InvalidPath)?;

    let mut sfs = boot::get_image_file_system(boot::image_handle())
        .map_err(|e| FileError::NoFileSystem(e.status()))?;
    let mut volume = sfs
        .open_volume()
        .map_err(|e| FileError::NoFileSystem(e.status()))?;

    let handle = volume
        .open(&wide, FileMode::Read, FileAttribute::empty())
        .map_err(|e| {
            if e.status() == Status::NOT_FOUND {
                FileError::NotFound
            } else {
                FileError::Io(e.status())
            }
        })?;
    let mut file = handle.into_regular_file().ok_or(FileError::NotAFile)?;

    // Get file size
    file.set_position(RegularFile::END_OF_FILE)
        .map_err(|e| FileError::Io(e.status()))?;
    let size = file.get_position().map_err(|e| FileError::Io(e.status()))?;
    file.set_position(0).map_err(|e| FileError::Io(e.status()))?;
    let size = usize::try_from(size).map_err(|_| FileError::Io(Status::BAD_BUFFER_SIZE))?;

    let mut buf = vec![0u8; size];
    let read = file
        .read(&mut buf)
        .map_err(|e| FileError::Io(e.status()))?;
    if read != size {
        return Err(FileError::ShortRead {
            read,
            expected: size,
        });
    }

    debug!("Read {path} ({size} bytes)");
    Ok(buf.leak())
}
