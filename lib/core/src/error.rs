//! Error handling foundation for tokenbridge.
//!
//! Only the `Result` alias lives here. Each crate owns its domain error
//! enum and wraps it in a rootcause `Report` as it propagates.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_wraps_ok_values() {
        let ok: Result<u16> = Ok(200);
        assert!(matches!(ok, Ok(200)));
    }
}
