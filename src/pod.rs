/// Marker for types that may be copied byte-for-byte into a memory-mapped
/// file: no padding-sensitive invariants, no pointers, no `Drop`.
///
/// # Safety
///
/// Implementors must have a stable, fully-initialized byte representation
/// for every valid value. Only [`crate::mapped_array`] uses this guarantee
/// to move bytes in and out of a mapping; that module is the crate's sole
/// `unsafe` boundary.
#[expect(unsafe_code, reason = "marker trait for the mapped_array byte-copy boundary")]
pub unsafe trait Pod: Copy + 'static {}

#[expect(unsafe_code, reason = "u8 has a stable one-byte representation")]
unsafe impl Pod for u8 {}
#[expect(unsafe_code, reason = "u32 has a stable four-byte representation")]
unsafe impl Pod for u32 {}
#[expect(unsafe_code, reason = "u64 has a stable eight-byte representation")]
unsafe impl Pod for u64 {}
