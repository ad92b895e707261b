pub mod digest;

pub use digest::DigestGenerator;

use snip_core::ShortCode;

/// Trait for deriving short codes from content.
///
/// Implementations are pure functions of their input: they hold no mutable
/// state and never interact with storage, so concurrent callers submitting
/// the same content compute the same code without coordination.
///
/// Collisions between different inputs are not detected here; the
/// repository rejects a code that is already held by another URL.
pub trait Generator: Send + Sync + 'static {
    /// Derives the short code for `content`.
    fn generate(&self, content: &str) -> ShortCode;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self, content: &str) -> ShortCode {
        (**self).generate(content)
    }
}
