//! A seed value that zeroes its backing buffer on drop and never formats as text.
//!
//! Grounded on the teacher's `LockedVec` (decrypted-buffer hygiene): here the scope is
//! narrower (one string, no mlock) because seeds are short-lived and returned to the
//! caller exactly once (spec §3/§9), not held across long operations.

use std::fmt;

pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        // `self` is about to be dropped by the caller; extract without triggering our
        // own zeroing drop twice.
        let s = self.0.clone();
        s
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        // SAFETY: `as_mut_vec` on an owned String we're dropping; no other aliasing since
        // we're in `drop`. Overwritten before deallocation.
        unsafe {
            let bytes = self.0.as_mut_vec();
            for b in bytes.iter_mut() {
                std::ptr::write_volatile(b, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_value() {
        let s = Secret::new("SAABCDEF".to_string());
        let rendered = format!("{:?}", s);
        assert!(!rendered.contains("SAABCDEF"));
    }
}
