//! Backing storage for packets and frames.

use crate::{Result, VrtError};

/// Bytes behind a packet or frame: exclusively owned, or a borrowed read-only view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage<'a> {
    /// Owned, mutable buffer.
    Owned(Vec<u8>),
    /// Caller-supplied memory; never mutated.
    View(&'a [u8]),
}

impl<'a> Storage<'a> {
    /// The stored bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(bytes) => bytes,
            Storage::View(bytes) => bytes,
        }
    }

    /// Number of stored bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether no bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Whether this storage refuses mutation.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Storage::View(_))
    }

    /// Mutable access to an owned buffer; views fail with [`VrtError::ReadOnly`].
    pub fn writable(&mut self, operation: &str) -> Result<&mut Vec<u8>> {
        match self {
            Storage::Owned(bytes) => Ok(bytes),
            Storage::View(_) => Err(VrtError::read_only(operation)),
        }
    }

    /// Copy a view into owned storage (owned storage is moved).
    pub fn into_owned(self) -> Storage<'static> {
        match self {
            Storage::Owned(bytes) => Storage::Owned(bytes),
            Storage::View(bytes) => Storage::Owned(bytes.to_vec()),
        }
    }

    /// Extract the bytes, copying only when borrowed.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Storage::Owned(bytes) => bytes,
            Storage::View(bytes) => bytes.to_vec(),
        }
    }
}
