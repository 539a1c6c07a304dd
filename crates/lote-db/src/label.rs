//! Batch label generation: `MP-<5 random digits>/<year>`.
//!
//! Labels are not checked for uniqueness here; the `numero_lote` UNIQUE
//! constraint rejects collisions at insert time.

use chrono::{Datelike, Local};
use rand::Rng;

pub const LABEL_PREFIX: &str = "MP";

const SEQUENCE_MAX: u32 = 99_999;

pub fn generate() -> String {
    let sequence = rand::rng().random_range(0..=SEQUENCE_MAX);
    format_label(sequence, Local::now().year())
}

pub fn format_label(sequence: u32, year: i32) -> String {
    format!("{LABEL_PREFIX}-{sequence:05}/{year:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_label_shape(label: &str, year: i32) {
        let rest = label
            .strip_prefix("MP-")
            .unwrap_or_else(|| panic!("missing prefix in {label}"));
        let (digits, suffix) = rest
            .split_once('/')
            .unwrap_or_else(|| panic!("missing year separator in {label}"));

        assert_eq!(digits.len(), 5, "sequence not 5 digits in {label}");
        assert!(digits.chars().all(|c| c.is_ascii_digit()), "{label}");
        assert_eq!(suffix, year.to_string(), "wrong year in {label}");
    }

    #[test]
    fn format_zero_pads_sequence() {
        assert_eq!(format_label(0, 2025), "MP-00000/2025");
        assert_eq!(format_label(42, 2025), "MP-00042/2025");
        assert_eq!(format_label(99_999, 2031), "MP-99999/2031");
    }

    #[test]
    fn generated_labels_carry_current_year() {
        let year = Local::now().year();

        for _ in 0..200 {
            assert_label_shape(&generate(), year);
        }
    }
}
