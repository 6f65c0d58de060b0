//! Barcode normalization.
//!
//! Retail codes arrive in every shape: with spaces, dashes, a missing
//! leading zero, or as a full EAN-13. Lookups are tried against each
//! plausible spelling in a fixed order, so the variant order matters.

use thiserror::Error;

/// Length of an EAN-13 code.
pub const EAN13_LEN: usize = 13;

/// Length of a UPC-A code.
pub const UPC12_LEN: usize = 12;

/// Upper bound on the spellings one barcode expands to.
pub const MAX_VARIANTS: u32 = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarcodeError {
    #[error("barcode contains no digits")]
    Empty,

    #[error("barcode has {0} digits, at most 13 are allowed")]
    TooLong(usize),
}

/// Ordered, de-duplicated spellings of one barcode: raw → EAN-13 → UPC-12.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeVariantSet {
    variants: Vec<String>,
    ean13: String,
}

impl CodeVariantSet {
    /// The digits exactly as supplied, separators removed.
    pub fn raw(&self) -> &str {
        &self.variants[0]
    }

    /// Canonical zero-padded EAN-13 form, used as the storage key.
    pub fn ean13(&self) -> &str {
        &self.ean13
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.variants
    }
}

/// Produce the lookup variants for a raw barcode string.
///
/// Non-digits are stripped. The UPC-12 form is only derived when the
/// EAN-13 form starts with a padding zero.
pub fn variants(raw: &str) -> Result<CodeVariantSet, BarcodeError> {
    let cleaned: String = raw.chars().filter(char::is_ascii_digit).collect();

    if cleaned.is_empty() {
        return Err(BarcodeError::Empty);
    }
    if cleaned.len() > EAN13_LEN {
        return Err(BarcodeError::TooLong(cleaned.len()));
    }

    let ean13 = format!("{cleaned:0>width$}", width = EAN13_LEN);
    let upc12 = ean13.strip_prefix('0').map(str::to_string);

    let mut variants = Vec::with_capacity(3);
    for candidate in [Some(cleaned), Some(ean13.clone()), upc12].into_iter().flatten() {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }

    Ok(CodeVariantSet { variants, ean13 })
}
