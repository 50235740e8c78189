//! Integration tests for message serialization.

use chrono::{TimeZone, Utc};
use mailwright_mime::{
    ContentType, Mailbox, MimeMessage, Multipart, Part, RecipientType, generate_message_id,
};

fn header_block(text: &str) -> &str {
    text.split_once("\r\n\r\n").map_or(text, |(headers, _)| headers)
}

fn base_message() -> MimeMessage {
    let mut message = MimeMessage::new();
    message.set_from(Mailbox::parse("\"Doe, Jane\" <jane@Example.com>").unwrap());
    message.add_recipients(
        RecipientType::To,
        [
            Mailbox::new("one@example.com").unwrap(),
            Mailbox::with_name("Two", "two@example.com").unwrap(),
        ],
    );
    message.add_recipients(RecipientType::Cc, [Mailbox::new("cc@example.com").unwrap()]);
    message.add_recipients(RecipientType::Bcc, [Mailbox::new("bcc@example.com").unwrap()]);
    message.set_reply_to(vec![Mailbox::new("replies@example.com").unwrap()]);
    message.set_subject("Quarterly report");
    message.set_sent_date(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    message.set_message_id(generate_message_id("example.com"));
    message
}

#[test]
fn test_header_order() {
    let mut message = base_message();
    message.set_header("X-Priority", "1");
    message.set_body("Body", ContentType::text_plain());

    let text = message.to_string();
    let names: Vec<&str> = header_block(&text)
        .split("\r\n")
        .filter_map(|line| line.split_once(':').map(|(name, _)| name))
        .collect();

    assert_eq!(
        names,
        vec![
            "Date",
            "From",
            "Reply-To",
            "To",
            "Cc",
            "Subject",
            "Message-ID",
            "MIME-Version",
            "X-Priority",
            "Content-Type",
            "Content-Transfer-Encoding",
        ]
    );
}

#[test]
fn test_address_headers() {
    let message = base_message();
    let text = message.to_string();

    assert!(text.contains("From: \"Doe, Jane\" <jane@example.com>\r\n"));
    assert!(text.contains("To: one@example.com, Two <two@example.com>\r\n"));
    assert!(text.contains("Cc: cc@example.com\r\n"));
    assert!(!text.contains("bcc@example.com"));
    assert_eq!(message.all_recipients().len(), 4);
}

#[test]
fn test_message_without_body_has_empty_body() {
    let message = base_message();
    let text = message.to_string();
    assert!(text.ends_with("MIME-Version: 1.0\r\n\r\n"));
}

#[test]
fn test_crlf_everywhere() {
    let mut message = base_message();
    message.set_body("line one\nline two\n", ContentType::text_plain());

    let bytes = message.to_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        if *byte == b'\n' {
            assert_eq!(bytes[index - 1], b'\r', "bare LF at offset {index}");
        }
    }
}

#[test]
fn test_binary_attachment_is_base64() {
    let body = Multipart::mixed()
        .with_part(Part::text("See attached"))
        .with_part(Part::attachment(
            "report.pdf",
            ContentType::new("application", "pdf"),
            vec![0x25_u8, 0x50, 0x44, 0x46, 0xFF, 0x00],
        ));
    let mut message = base_message();
    let content_type = body.content_type();
    message.set_multipart(body, content_type);

    let text = message.to_string();
    assert!(text.contains("Content-Type: application/pdf\r\n"));
    assert!(text.contains("Content-Transfer-Encoding: base64\r\n"));
    assert!(text.contains("filename=\"report.pdf\""));
}

#[test]
fn test_long_subject_is_folded() {
    let mut message = base_message();
    message.set_subject("word ".repeat(30).trim_end());

    let text = message.to_string();
    for line in header_block(&text).split("\r\n") {
        assert!(line.len() <= 78, "line too long: {line}");
    }
}
