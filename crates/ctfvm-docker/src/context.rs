use std::{io, path::Path};

/// Pack `dir` into an in-memory tar archive rooted at `.`.
pub(crate) fn pack_dir(dir: &Path) -> io::Result<Vec<u8>> {
    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(false);
    ar.append_dir_all(".", dir)?;
    ar.into_inner()
}
