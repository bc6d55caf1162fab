use crate::{
    error::{Error, Result},
    pod::Pod,
};
use memmap2::{Mmap, MmapMut};
use std::{fs::File, marker::PhantomData, mem::size_of, path::Path};

/// A persistent, memory-mapped, fixed-length array of POD elements.
///
/// Build once via [`MappedArray::create`], then either keep using that
/// instance or [`MappedArray::open`] the same file from a later process.
/// Once constructed, a `MappedArray` is read-only: all pages are mapped
/// `PROT_READ` and the type has no mutating methods, so it is `Send + Sync`
/// and safe to share across threads without synchronization.
pub struct MappedArray<T: Pod> {
    mmap: Option<Mmap>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> MappedArray<T> {
    /// Creates a new file at `path` containing a copy of `source`, mapped
    /// shared read-write during the copy and then downgraded to a
    /// read-only mapping for the lifetime of the returned instance.
    ///
    /// The parent directory is created if missing. The file is
    /// created/truncated, preallocated to the exact byte size needed, and
    /// `fsync`'d after the copy completes. If any step fails, no partial
    /// `MappedArray` is returned (the on-disk file may still exist and will
    /// be truncated again by a subsequent `create` call).
    pub fn create(path: &Path, source: &[T]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::io(e, format!("create_dir_all {}", parent.display())))?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(e, format!("open (create) {}", path.display())))?;

        let byte_len = source.len() * size_of::<T>();

        file.set_len(byte_len as u64)
            .map_err(|e| Error::io(e, format!("set_len({byte_len}) {}", path.display())))?;

        if byte_len == 0 {
            return Ok(Self {
                mmap: None,
                len: 0,
                _marker: PhantomData,
            });
        }

        #[expect(
            unsafe_code,
            reason = "memmap2 requires unsafe to map a file; the file was just created by us"
        )]
        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| Error::io(e, format!("mmap (rw) {}", path.display())))?;

        for (i, item) in source.iter().enumerate() {
            let offset = i * size_of::<T>();

            #[expect(
                unsafe_code,
                reason = "T: Pod guarantees a stable byte representation"
            )]
            let bytes = unsafe {
                std::slice::from_raw_parts((item as *const T).cast::<u8>(), size_of::<T>())
            };

            mmap.get_mut(offset..offset + size_of::<T>())
                .expect("offset within preallocated mapping")
                .copy_from_slice(bytes);
        }

        mmap.flush()
            .map_err(|e| Error::io(e, format!("flush {}", path.display())))?;

        let mmap = mmap
            .make_read_only()
            .map_err(|e| Error::io(e, format!("make_read_only {}", path.display())))?;

        Ok(Self {
            mmap: Some(mmap),
            len: source.len(),
            _marker: PhantomData,
        })
    }

    /// Opens an existing file at `path` read-only, trusting `len` (sourced
    /// from the index's metadata) as the element count. Fails with
    /// [`Error::Format`] if the file is smaller than `len * size_of::<T>()`.
    pub fn open(path: &Path, len: usize) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| Error::io(e, format!("open {}", path.display())))?;

        let file_size = file
            .metadata()
            .map_err(|e| Error::io(e, format!("fstat {}", path.display())))?
            .len();

        let needed = (len * size_of::<T>()) as u64;

        if file_size < needed {
            return Err(Error::Format(format!(
                "{} is {file_size} bytes, expected at least {needed} for {len} elements",
                path.display()
            )));
        }

        if needed == 0 {
            return Ok(Self {
                mmap: None,
                len: 0,
                _marker: PhantomData,
            });
        }

        #[expect(unsafe_code, reason = "memmap2 requires unsafe to map a file")]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::io(e, format!("mmap (ro) {}", path.display())))?;

        Ok(Self {
            mmap: Some(mmap),
            len,
            _marker: PhantomData,
        })
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the element at `idx`. Panics if out of bounds.
    #[must_use]
    pub fn index(&self, idx: usize) -> T {
        assert!(idx < self.len, "index {idx} out of bounds ({})", self.len);

        let mmap = self.mmap.as_ref().expect("non-empty array has a mapping");
        let offset = idx * size_of::<T>();
        let bytes = &mmap[offset..offset + size_of::<T>()];

        #[expect(
            unsafe_code,
            reason = "T: Pod guarantees a stable byte representation; pointer is in-bounds and properly sized"
        )]
        unsafe {
            std::ptr::read_unaligned(bytes.as_ptr().cast::<T>())
        }
    }

    /// Returns the first element.
    #[must_use]
    pub fn front(&self) -> T {
        self.index(0)
    }

    /// Returns the last element.
    #[must_use]
    pub fn back(&self) -> T {
        self.index(self.len - 1)
    }

    /// Returns a forward iterator over the elements.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            array: self,
            next: 0,
        }
    }
}

/// Forward-only iterator over a [`MappedArray`].
pub struct Iter<'a, T: Pod> {
    array: &'a MappedArray<T>,
    next: usize,
}

impl<T: Pod> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.next >= self.array.len() {
            return None;
        }

        let item = self.array.index(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.array.len() - self.next;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn create_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("array");

        let source: Vec<u64> = (0..100).collect();
        let array = MappedArray::<u64>::create(&path, &source).unwrap();

        assert_eq!(100, array.len());
        assert_eq!(0, array.front());
        assert_eq!(99, array.back());

        for i in 0..100 {
            assert_eq!(i as u64, array.index(i));
        }

        let collected: Vec<u64> = array.iter().collect();
        assert_eq!(source, collected);
    }

    #[test]
    fn open_after_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("array");

        let source: Vec<u32> = vec![10, 20, 30, 40];
        MappedArray::<u32>::create(&path, &source).unwrap();

        let opened = MappedArray::<u32>::open(&path, 4).unwrap();
        assert_eq!(source, opened.iter().collect::<Vec<_>>());
    }

    #[test]
    fn open_truncated_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("array");

        let source: Vec<u32> = vec![1, 2, 3];
        MappedArray::<u32>::create(&path, &source).unwrap();

        let err = MappedArray::<u32>::open(&path, 100).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn empty_array_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("array");

        let source: Vec<u32> = vec![];
        let array = MappedArray::<u32>::create(&path, &source).unwrap();
        assert!(array.is_empty());

        let opened = MappedArray::<u32>::open(&path, 0).unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn double_drop_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("array");

        let array = MappedArray::<u32>::create(&path, &[1, 2, 3]).unwrap();
        drop(array);

        let reopened = MappedArray::<u32>::open(&path, 3).unwrap();
        drop(reopened);
    }
}
