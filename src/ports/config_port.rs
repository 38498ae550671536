//! Configuration access port trait.

/// Raw keyed string lookup; typed parsing and defaulting happen in the
/// domain so invalid values surface as configuration errors there.
pub trait ConfigPort {
    fn get(&self, section: &str, key: &str) -> Option<String>;
}
