//! Компактный кодек для ручного обмена дескрипторами.
//!
//! `encode`: текст → gzip (максимальное сжатие) → base64url без паддинга.
//! `decode`: обратный путь с проверками на мусор, zip-bomb и бинарные данные.

use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};

/// Максимальный размер дескриптора (до сжатия и после распаковки), 4 MiB.
pub const MAX_SDP_SIZE: usize = 4 * 1024 * 1024;

/// Всё, что короче, точно не настоящий токен.
pub const MIN_ENCODED_LENGTH: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("input cannot be empty")]
    EmptyInput,

    #[error("input too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("encoded string too short: {len} characters (min {min})")]
    TooShort { len: usize, min: usize },

    #[error("invalid base64url characters in encoded string")]
    InvalidAlphabet,

    #[error("failed to decode base64url: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("failed to decompress data: {0}")]
    CorruptPayload(#[source] std::io::Error),

    #[error("decompressed payload larger than {max} bytes")]
    OversizedPayload { max: usize },

    #[error("result contains non-printable characters")]
    NonPrintable,
}

/// Сжимает текст и кодирует его в короткий токен для копирования.
pub fn encode(text: &str) -> Result<String, SignalingError> {
    if text.is_empty() {
        return Err(SignalingError::EmptyInput);
    }
    if text.len() > MAX_SDP_SIZE {
        return Err(SignalingError::TooLarge {
            size: text.len(),
            max: MAX_SDP_SIZE,
        });
    }

    let compressed = compress(text.as_bytes()).map_err(SignalingError::CorruptPayload)?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(compressed))
}

/// Восстанавливает исходный текст из токена.
pub fn decode(token: &str) -> Result<String, SignalingError> {
    if token.is_empty() {
        return Err(SignalingError::EmptyInput);
    }
    if token.len() < MIN_ENCODED_LENGTH {
        return Err(SignalingError::TooShort {
            len: token.len(),
            min: MIN_ENCODED_LENGTH,
        });
    }
    if !is_valid_base64url(token) {
        return Err(SignalingError::InvalidAlphabet);
    }

    let padded = add_base64_padding(token);
    let compressed = general_purpose::URL_SAFE.decode(padded.as_bytes())?;

    // gunzip с ограничением размера для защиты от zip-bomb
    let gz = GzDecoder::new(&compressed[..]);
    let mut raw = Vec::new();
    gz.take(MAX_SDP_SIZE as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(SignalingError::CorruptPayload)?;
    if raw.len() > MAX_SDP_SIZE {
        return Err(SignalingError::OversizedPayload { max: MAX_SDP_SIZE });
    }

    let text = String::from_utf8(raw).map_err(|_| SignalingError::NonPrintable)?;
    if !is_printable_text(&text) {
        return Err(SignalingError::NonPrintable);
    }
    Ok(text)
}

/// Грубая оценка: токен ≈ 75% исходного текста.
pub fn estimate_compression_ratio() -> f64 {
    0.75
}

pub fn estimate_encoded_size(text_len: usize) -> usize {
    (text_len as f64 * estimate_compression_ratio()) as usize
}

fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::best());
    gz.write_all(data)?;
    gz.finish()
}

/// Алфавит base64url: A-Z, a-z, 0-9, '-', '_'.
fn is_valid_base64url(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Длина base64 должна быть кратна 4.
fn add_base64_padding(s: &str) -> String {
    match s.len() % 4 {
        2 => format!("{s}=="),
        3 => format!("{s}="),
        _ => s.to_string(),
    }
}

/// Печатный ASCII, обычные пробельные символы и всё, что выше 0x7F.
fn is_printable_text(s: &str) -> bool {
    s.chars().all(|c| {
        matches!(c, ' '..='~' | '\t' | '\n' | '\r') || (c as u32) >= 0x80
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SDP: &str = "v=0\r\n\
        o=- 4215775240449105457 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        a=group:BUNDLE 0\r\n\
        m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=ice-ufrag:abcd\r\n\
        a=ice-pwd:abcdefghijklmnopqrstuvwx\r\n\
        a=candidate:1 1 udp 2130706431 192.168.1.10 54321 typ host\r\n\
        a=candidate:2 1 udp 1694498815 203.0.113.7 54321 typ srflx raddr 192.168.1.10 rport 54321\r\n\
        a=sctp-port:5000\r\n";

    #[test]
    fn roundtrip_preserves_text() {
        let json = format!(
            "{{\"type\":\"offer\",\"sdp\":{}}}",
            serde_json::to_string(SAMPLE_SDP).unwrap()
        );
        let cases = [
            SAMPLE_SDP.to_string(),
            json,
            "line one\r\nline two\r\n".to_string(),
            "привет, мир — 你好 🌍".to_string(),
            "x".to_string(),
            "tab\tseparated\tvalues".to_string(),
        ];
        for text in cases {
            let token = encode(&text).unwrap();
            assert_eq!(decode(&token).unwrap(), text);
        }
    }

    #[test]
    fn token_is_url_safe_and_unpadded() {
        let token = encode(SAMPLE_SDP).unwrap();
        assert!(is_valid_base64url(&token));
        assert!(!token.contains('='));
    }

    #[test]
    fn compresses_large_repetitive_input() {
        let text = SAMPLE_SDP.repeat(50);
        let token = encode(&text).unwrap();
        assert!(token.len() < text.len() / 4);
    }

    #[test]
    fn encode_rejects_empty_and_oversized() {
        assert!(matches!(encode(""), Err(SignalingError::EmptyInput)));

        let big = "a".repeat(MAX_SDP_SIZE + 1);
        assert!(matches!(
            encode(&big),
            Err(SignalingError::TooLarge { size, max }) if size == MAX_SDP_SIZE + 1 && max == MAX_SDP_SIZE
        ));

        let exact = "a".repeat(MAX_SDP_SIZE);
        assert_eq!(decode(&encode(&exact).unwrap()).unwrap().len(), MAX_SDP_SIZE);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode(""), Err(SignalingError::EmptyInput)));
        assert!(matches!(decode("abc"), Err(SignalingError::TooShort { len: 3, .. })));
        assert!(matches!(
            decode("abcdefghij+klmnop"),
            Err(SignalingError::InvalidAlphabet)
        ));
        assert!(matches!(
            decode("abcdefghij/klmnop"),
            Err(SignalingError::InvalidAlphabet)
        ));
        assert!(matches!(
            decode("abcdefghij klmnop"),
            Err(SignalingError::InvalidAlphabet)
        ));
        assert!(matches!(
            decode("abcdefghijklmnop"),
            Err(SignalingError::CorruptPayload(_))
        ));
    }

    #[test]
    fn decode_rejects_truncated_token() {
        let token = encode(SAMPLE_SDP).unwrap();
        let truncated = &token[..token.len() / 2];
        let restored = decode(truncated);
        assert!(restored.map(|t| t != SAMPLE_SDP).unwrap_or(true));
    }

    #[test]
    fn decode_rejects_oversized_payload() {
        let raw = vec![b'a'; MAX_SDP_SIZE + 10];
        let token = general_purpose::URL_SAFE_NO_PAD.encode(compress(&raw).unwrap());
        assert!(matches!(
            decode(&token),
            Err(SignalingError::OversizedPayload { .. })
        ));
    }

    #[test]
    fn decode_rejects_binary_payload() {
        let raw = b"looks fine until \x01\x02\x03 here";
        let token = general_purpose::URL_SAFE_NO_PAD.encode(compress(raw).unwrap());
        assert!(matches!(decode(&token), Err(SignalingError::NonPrintable)));

        let invalid_utf8 = [0xff, 0xfe, 0xfd, 0x41, 0x42, 0x43];
        let token = general_purpose::URL_SAFE_NO_PAD.encode(compress(&invalid_utf8).unwrap());
        assert!(matches!(decode(&token), Err(SignalingError::NonPrintable)));
    }

    #[test]
    fn padding_follows_length_mod_four() {
        assert_eq!(add_base64_padding("abcd"), "abcd");
        assert_eq!(add_base64_padding("abcdef"), "abcdef==");
        assert_eq!(add_base64_padding("abcdefg"), "abcdefg=");
        assert_eq!(add_base64_padding("abcde"), "abcde");
    }

    #[test]
    fn estimates() {
        assert_eq!(estimate_encoded_size(1000), 750);
        assert_eq!(estimate_encoded_size(0), 0);
    }

    #[test]
    fn concurrent_roundtrips() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    let text = format!("{SAMPLE_SDP}a=mid:{i}\r\n");
                    for _ in 0..20 {
                        assert_eq!(decode(&encode(&text).unwrap()).unwrap(), text);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
