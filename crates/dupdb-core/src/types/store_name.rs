use crate::error::{DupDbError, Result};
use std::borrow::Cow;

/// Anything that can name an object store.
///
/// Store handles may be given as text or as UTF-8 bytes; both resolve to the
/// same store.
pub trait StoreName {
    fn store_name(&self) -> Result<Cow<'_, str>>;
}

impl StoreName for str {
    fn store_name(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self))
    }
}

impl StoreName for String {
    fn store_name(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self.as_str()))
    }
}

impl StoreName for [u8] {
    fn store_name(&self) -> Result<Cow<'_, str>> {
        std::str::from_utf8(self)
            .map(Cow::Borrowed)
            .map_err(|e| DupDbError::Config(format!("store handle is not UTF-8: {}", e)))
    }
}

impl StoreName for Vec<u8> {
    fn store_name(&self) -> Result<Cow<'_, str>> {
        self.as_slice().store_name()
    }
}

impl<const N: usize> StoreName for [u8; N] {
    fn store_name(&self) -> Result<Cow<'_, str>> {
        self.as_slice().store_name()
    }
}

impl<T: StoreName + ?Sized> StoreName for &T {
    fn store_name(&self) -> Result<Cow<'_, str>> {
        (**self).store_name()
    }
}
