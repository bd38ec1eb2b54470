//! Recipient record source and per-record validation
//!
//! Records come from a CSV file with `recipient,quantity` columns. Opening
//! the file is a fatal setup step; individual malformed rows surface as
//! per-record errors and the batch continues past them.

use crate::error::{MinterError, MinterResult};

use csv::{ReaderBuilder, Trim};
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// One raw CSV row, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub recipient: String,
    pub quantity: String,
}

/// Lazy reader over the recipient CSV file
#[derive(Debug)]
pub struct RecordSource {
    reader: csv::Reader<File>,
}

impl RecordSource {
    /// Open the CSV file; an unreadable file aborts the whole run
    pub fn open(path: &Path) -> MinterResult<Self> {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .map_err(|e| MinterError::RecordSource(format!("{:?}: {}", path, e)))?;

        Ok(Self { reader })
    }

    /// Iterate rows in file order; a row that fails to deserialize yields
    /// an `Err` item routed into the per-record failure path
    pub fn records(self) -> impl Iterator<Item = MinterResult<RawRecord>> {
        self.reader
            .into_deserialize::<RawRecord>()
            .map(|row| row.map_err(|e| MinterError::InvalidRecord(e.to_string())))
    }
}

/// A validated mint request: checksummed recipient and a non-negative
/// integer amount in the token's human unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub recipient: Address,
    pub amount: u128,
}

impl MintRequest {
    /// Validate one raw record
    pub fn parse(record: &RawRecord) -> MinterResult<Self> {
        let recipient = parse_checksummed(&record.recipient)?;
        let amount = parse_amount(&record.quantity)?;
        Ok(Self { recipient, amount })
    }

    /// Amount in the token's smallest unit: amount x 10^decimals, exact
    pub fn scaled(&self, decimals: u32) -> MinterResult<U256> {
        let scale = U256::from(10u64)
            .checked_pow(U256::from(decimals))
            .ok_or_else(|| {
                MinterError::Build(format!("Decimal scale 10^{} overflows", decimals))
            })?;

        U256::from(self.amount).checked_mul(scale).ok_or_else(|| {
            MinterError::Build(format!(
                "Scaled amount {} x 10^{} overflows",
                self.amount, decimals
            ))
        })
    }

    /// Checksummed display form of the recipient
    pub fn recipient_display(&self) -> String {
        to_checksum(&self.recipient, None)
    }
}

/// Parse an address, enforcing EIP-55: all-lowercase and all-uppercase hex
/// are accepted as checksum-free; mixed case must match the checksummed
/// encoding exactly
pub fn parse_checksummed(raw: &str) -> MinterResult<Address> {
    let trimmed = raw.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MinterError::InvalidRecipient(format!(
            "{:?} is not a 20-byte hex address",
            raw
        )));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|e| MinterError::InvalidRecipient(format!("{:?}: {}", raw, e)))?;
    let address = Address::from_slice(&bytes);

    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        let checksummed = to_checksum(&address, None);
        if checksummed.trim_start_matches("0x") != hex_part {
            return Err(MinterError::InvalidRecipient(format!(
                "{:?} fails checksum validation",
                raw
            )));
        }
    }

    Ok(address)
}

/// Parse a non-negative integer amount in the token's human unit
fn parse_amount(raw: &str) -> MinterResult<u128> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(MinterError::InvalidAmount("empty quantity".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(MinterError::InvalidAmount(format!(
            "negative quantity {:?}",
            raw
        )));
    }

    trimmed.parse::<u128>().map_err(|_| {
        MinterError::InvalidAmount(format!("{:?} is not a non-negative integer", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // EIP-55 test vector
    const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn record(recipient: &str, quantity: &str) -> RawRecord {
        RawRecord {
            recipient: recipient.to_string(),
            quantity: quantity.to_string(),
        }
    }

    #[test]
    fn accepts_correct_checksum() {
        assert!(parse_checksummed(CHECKSUMMED).is_ok());
    }

    #[test]
    fn accepts_checksum_free_casings() {
        let lower = CHECKSUMMED.to_lowercase();
        let upper = format!("0x{}", CHECKSUMMED[2..].to_uppercase());
        assert_eq!(
            parse_checksummed(&lower).unwrap(),
            parse_checksummed(&upper).unwrap()
        );
    }

    #[test]
    fn rejects_wrong_checksum() {
        // Same hex digits, one letter's case flipped
        let tampered = CHECKSUMMED.replacen("aA", "aa", 1);
        assert!(matches!(
            parse_checksummed(&tampered),
            Err(MinterError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(parse_checksummed("0x1234").is_err());
        assert!(parse_checksummed("not-an-address").is_err());
        assert!(parse_checksummed("").is_err());
    }

    #[test]
    fn rejects_bad_amounts() {
        assert!(MintRequest::parse(&record(CHECKSUMMED, "-5")).is_err());
        assert!(MintRequest::parse(&record(CHECKSUMMED, "1.5")).is_err());
        assert!(MintRequest::parse(&record(CHECKSUMMED, "lots")).is_err());
        assert!(MintRequest::parse(&record(CHECKSUMMED, "")).is_err());
    }

    #[test]
    fn accepts_zero_amount() {
        let request = MintRequest::parse(&record(CHECKSUMMED, "0")).unwrap();
        assert_eq!(request.amount, 0);
    }

    #[test]
    fn scales_exactly_with_integer_arithmetic() {
        let request = MintRequest::parse(&record(CHECKSUMMED, "100")).unwrap();
        let scaled = request.scaled(18).unwrap();
        assert_eq!(
            scaled,
            U256::from_dec_str("100000000000000000000").unwrap()
        );
    }

    #[test]
    fn scaling_overflow_is_an_error_not_a_panic() {
        let request = MintRequest {
            recipient: Address::zero(),
            amount: u128::MAX,
        };
        assert!(matches!(
            request.scaled(77),
            Err(MinterError::Build(_))
        ));
    }

    #[test]
    fn reads_rows_and_isolates_malformed_ones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "recipient,quantity").unwrap();
        writeln!(file, "{} , 100", CHECKSUMMED).unwrap();
        writeln!(file, "only-one-field").unwrap();
        writeln!(file, "{},7", CHECKSUMMED).unwrap();
        file.flush().unwrap();

        let rows: Vec<_> = RecordSource::open(file.path()).unwrap().records().collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().quantity, "100");
        assert!(rows[1].is_err());
        assert_eq!(rows[2].as_ref().unwrap().quantity, "7");
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = RecordSource::open(Path::new("/nonexistent/recipients.csv")).unwrap_err();
        assert!(err.is_fatal());
    }
}
