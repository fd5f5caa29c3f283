//! Initial-credential derivation, generation and hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

/// Date of birth as supplied by enrollment collaborators: either an already
/// parsed date or one of the text forms seen in imported rosters.
#[derive(Debug, Clone)]
pub enum DateOfBirth {
    Date(NaiveDate),
    Text(String),
}

impl From<NaiveDate> for DateOfBirth {
    fn from(date: NaiveDate) -> Self {
        DateOfBirth::Date(date)
    }
}

impl From<&str> for DateOfBirth {
    fn from(text: &str) -> Self {
        DateOfBirth::Text(text.to_string())
    }
}

impl From<String> for DateOfBirth {
    fn from(text: String) -> Self {
        DateOfBirth::Text(text)
    }
}

impl DateOfBirth {
    /// Accepted text forms: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY and the
    /// 8-digit DDMMYYYY often produced by roster exports.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DateOfBirth::Date(date) => Some(*date),
            DateOfBirth::Text(text) => {
                let text = text.trim();
                for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
                    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                        return Some(date);
                    }
                }
                if text.len() == 8 && text.chars().all(|c| c.is_ascii_digit()) {
                    if let Ok(date) = NaiveDate::parse_from_str(text, "%d%m%Y") {
                        return Some(date);
                    }
                }
                None
            }
        }
    }
}

/// The 8-character DDMMYYYY credential handed to students enrolled with a
/// date of birth.
pub fn credential_from_date(date: NaiveDate) -> String {
    date.format("%d%m%Y").to_string()
}

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Random credential guaranteed to contain at least one uppercase letter,
/// one lowercase letter and one digit; the remainder is drawn uniformly
/// from the combined alphabet and the whole string shuffled.
pub fn generate_credential(length: usize) -> String {
    let length = length.max(3);
    let mut rng = rand::thread_rng();

    let mut chars = vec![
        UPPERCASE[rng.gen_range(0..UPPERCASE.len())],
        LOWERCASE[rng.gen_range(0..LOWERCASE.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
    ];

    let combined: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS].concat();
    for _ in chars.len()..length {
        chars.push(combined[rng.gen_range(0..combined.len())]);
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

/// Hash a credential to an Argon2id PHC string for persistence.
pub fn hash_credential(plaintext: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)?
        .to_string())
}

/// Verify a plaintext credential against a stored PHC hash.
///
/// `Ok(false)` on mismatch; `Err` only for a malformed stored hash.
pub fn verify_credential(
    plaintext: &str,
    hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
