#![no_main]

use libfuzzer_sys::fuzz_target;
use vouch_verification::pix_key::{is_valid_cnpj, is_valid_cpf, normalize};
use vouch_verification::{PixKey, PixKeyKind};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Must never panic, whatever the punctuation or length.
    let parsed = PixKey::parse(raw);
    let _ = is_valid_cpf(raw);
    let _ = is_valid_cnpj(raw);

    if let Ok(key) = parsed {
        let digits = normalize(raw).expect("parsed key must normalize");
        assert_eq!(key.as_str(), digits);
        match key.kind() {
            PixKeyKind::Cpf => {
                assert_eq!(digits.len(), 11);
                assert!(is_valid_cpf(&digits));
                assert_eq!(key.formatted().len(), 14);
            }
            PixKeyKind::Cnpj => {
                assert_eq!(digits.len(), 14);
                assert!(is_valid_cnpj(&digits));
                assert_eq!(key.formatted().len(), 18);
            }
        }
        // Formatting then reparsing lands on the same key.
        assert_eq!(PixKey::parse(&key.formatted()).ok(), Some(key));
    }
});
