/// Result text reported for a write that could not be evaluated.
pub const ERROR_RESULT: &str = "ERROR";

/// Format a result with six fractional digits.
///
/// This is both the form returned to callers and the form substituted into
/// dependent formulas.
pub fn format_result(n: f64) -> String {
    format!("{:.6}", n)
}

#[cfg(test)]
mod tests {
    use super::format_result;

    #[test]
    fn test_format_result_six_digits() {
        assert_eq!(format_result(1.0), "1.000000");
        assert_eq!(format_result(-2.5), "-2.500000");
        assert_eq!(format_result(1.0 / 3.0), "0.333333");
        assert_eq!(format_result(1_000_001_000_000.0), "1000001000000.000000");
    }
}
