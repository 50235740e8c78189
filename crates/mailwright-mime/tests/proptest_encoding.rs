//! Property-based tests for address parsing and body encoding.

use mailwright_mime::encoding::{
    MAX_LINE_LENGTH, encode_base64_wrapped, encode_quoted_printable, encode_rfc2047,
};
use mailwright_mime::{Address, Mailbox};
use proptest::prelude::*;

/// Strategy to generate valid dot-atom addresses.
fn address_strategy() -> impl Strategy<Value = String> {
    let atom = prop::string::string_regex("[a-z0-9+_-]{1,10}").unwrap();
    let local = prop::collection::vec(atom, 1..=3).prop_map(|atoms| atoms.join("."));
    let domain = prop::string::string_regex("[a-z]{3,10}\\.[a-z]{2,5}").unwrap();
    (local, domain).prop_map(|(local, domain)| format!("{local}@{domain}"))
}

proptest! {
    #[test]
    fn valid_addresses_parse(addr in address_strategy()) {
        let parsed = Address::new(addr.clone()).unwrap();
        prop_assert_eq!(parsed.as_str(), addr.as_str());
    }

    #[test]
    fn address_parser_never_panics(text in "\\PC{0,80}") {
        let _ = Address::new(text.clone());
        let _ = Mailbox::parse(&text);
    }

    #[test]
    fn mailbox_header_value_reparses(addr in address_strategy(), name in "[A-Za-z ,.]{0,20}") {
        let mailbox = Mailbox::with_name(name, addr).unwrap();
        let reparsed = Mailbox::parse(&mailbox.to_header_value()).unwrap();
        prop_assert_eq!(reparsed.address, mailbox.address);
    }

    #[test]
    fn quoted_printable_lines_fit(data in prop::collection::vec(any::<u8>(), 0..600)) {
        let encoded = encode_quoted_printable(&data);
        for line in encoded.split("\r\n") {
            prop_assert!(line.len() <= MAX_LINE_LENGTH);
            prop_assert!(line.is_ascii());
        }
    }

    #[test]
    fn base64_lines_fit(data in prop::collection::vec(any::<u8>(), 0..600)) {
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.split("\r\n") {
            prop_assert!(line.len() <= MAX_LINE_LENGTH);
        }
    }

    #[test]
    fn rfc2047_output_is_ascii(text in "\\PC{0,120}") {
        prop_assert!(encode_rfc2047(&text, "utf-8").is_ascii());
    }
}
