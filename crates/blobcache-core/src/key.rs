//! Compile-time type identity for the typed API.
//!
//! The cache contract stores a "type name" alongside every entry so typed
//! reads can be filtered and listed per type (the type index). Rather than
//! asking callers to stringify a runtime type check by hand, every
//! `'static` type gets a stable tag derived at compile time.

/// A compile-time tag identifying `Self` for type-indexed storage.
///
/// The blanket implementation below derives the tag from
/// [`std::any::type_name`]. That name is not guaranteed stable across
/// compiler versions or crate layouts, but it is stable for the lifetime of
/// a single build, which is all the type index needs: it only has to agree
/// with itself within one running process and one on-disk database created
/// by that process's schema.
pub trait TypeTag {
    fn type_tag() -> &'static str;
}

impl<T: 'static> TypeTag for T {
    fn type_tag() -> &'static str {
        std::any::type_name::<T>()
    }
}

/// The synthetic key format used by legacy single-key-space callers:
/// `"{type_name}___{key}"`. The typed API accepts entries stored under
/// either this legacy layout or a bare key, but always writes bare keys.
pub fn legacy_key(type_name: &str, key: &str) -> String {
    format!("{type_name}___{key}")
}
