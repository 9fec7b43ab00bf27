//! PIX key validation: CPF (11 digits) and CNPJ (14 digits) checksums.
//!
//! Punctuation (`.`, `-`, `/`, spaces) is stripped before checking, so
//! `529.982.247-25` and `52998224725` are the same key. Sequences of one
//! repeated digit pass the arithmetic but are rejected as known-invalid.

use std::fmt;
use vouch_types::VerificationError;

const CNPJ_WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixKeyKind {
    /// Individual taxpayer number.
    Cpf,
    /// Company taxpayer number.
    Cnpj,
}

/// A checksum-valid CPF or CNPJ, stored as bare digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PixKey {
    digits: String,
    kind: PixKeyKind,
}

impl PixKey {
    pub fn parse(raw: &str) -> Result<Self, VerificationError> {
        let digits = normalize(raw).ok_or_else(|| {
            VerificationError::InvalidKey("use only digits, dots, dashes and slashes".into())
        })?;
        let kind = match digits.len() {
            11 => PixKeyKind::Cpf,
            14 => PixKeyKind::Cnpj,
            n => {
                return Err(VerificationError::InvalidKey(format!(
                    "expected 11 (CPF) or 14 (CNPJ) digits, got {n}"
                )))
            }
        };
        let valid = match kind {
            PixKeyKind::Cpf => is_valid_cpf(&digits),
            PixKeyKind::Cnpj => is_valid_cnpj(&digits),
        };
        if !valid {
            let label = match kind {
                PixKeyKind::Cpf => "CPF",
                PixKeyKind::Cnpj => "CNPJ",
            };
            return Err(VerificationError::InvalidKey(format!(
                "{label} check digits do not match"
            )));
        }
        Ok(Self { digits, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn kind(&self) -> PixKeyKind {
        self.kind
    }

    /// `529.982.247-25` / `11.222.333/0001-81`.
    pub fn formatted(&self) -> String {
        let d = &self.digits;
        match self.kind {
            PixKeyKind::Cpf => format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11]),
            PixKeyKind::Cnpj => format!(
                "{}.{}.{}/{}-{}",
                &d[0..2],
                &d[2..5],
                &d[5..8],
                &d[8..12],
                &d[12..14]
            ),
        }
    }
}

impl fmt::Display for PixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

/// Strip formatting characters; `None` if anything else is present.
pub fn normalize(raw: &str) -> Option<String> {
    let mut digits = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            '.' | '-' | '/' | ' ' => {}
            _ => return None,
        }
    }
    Some(digits)
}

pub fn is_valid_cpf(digits: &str) -> bool {
    let Some(d) = to_digits::<11>(digits) else {
        return false;
    };
    if all_same(&d) {
        return false;
    }
    let first = cpf_check_digit(&d[..9]);
    let second = cpf_check_digit(&d[..10]);
    d[9] == first && d[10] == second
}

pub fn is_valid_cnpj(digits: &str) -> bool {
    let Some(d) = to_digits::<14>(digits) else {
        return false;
    };
    if all_same(&d) {
        return false;
    }
    let first = cnpj_check_digit(&d[..12], &CNPJ_WEIGHTS_FIRST);
    let second = cnpj_check_digit(&d[..13], &CNPJ_WEIGHTS_SECOND);
    d[12] == first && d[13] == second
}

/// Append both check digits to a 9-digit CPF base.
pub fn complete_cpf(base: &[u32; 9]) -> String {
    let mut d: Vec<u32> = base.iter().map(|x| x % 10).collect();
    d.push(cpf_check_digit(&d));
    d.push(cpf_check_digit(&d));
    d.iter().map(|x| char::from(b'0' + *x as u8)).collect()
}

/// Append both check digits to a 12-digit CNPJ base.
pub fn complete_cnpj(base: &[u32; 12]) -> String {
    let mut d: Vec<u32> = base.iter().map(|x| x % 10).collect();
    d.push(cnpj_check_digit(&d, &CNPJ_WEIGHTS_FIRST));
    d.push(cnpj_check_digit(&d, &CNPJ_WEIGHTS_SECOND));
    d.iter().map(|x| char::from(b'0' + *x as u8)).collect()
}

// Weights run from len+1 down to 2.
fn cpf_check_digit(d: &[u32]) -> u32 {
    let top = d.len() as u32 + 1;
    let sum: u32 = d.iter().zip((2..=top).rev()).map(|(x, w)| x * w).sum();
    match (sum * 10) % 11 {
        10 => 0,
        r => r,
    }
}

fn cnpj_check_digit(d: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = d.iter().zip(weights).map(|(x, w)| x * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

fn to_digits<const N: usize>(s: &str) -> Option<[u32; N]> {
    if s.len() != N {
        return None;
    }
    let mut out = [0u32; N];
    for (slot, ch) in out.iter_mut().zip(s.chars()) {
        *slot = ch.to_digit(10)?;
    }
    Some(out)
}

fn all_same(d: &[u32]) -> bool {
    d.windows(2).all(|w| w[0] == w[1])
}
