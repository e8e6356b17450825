//! Built-in [`Authenticator`] for the MD5 based SASL mechanisms.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::Rng;

use crate::authenticator::{Authenticator, Exchange, Mechanism};
use crate::error::{AuthError, Result};
use crate::utils::iter_join;

type HmacMd5 = Hmac<Md5>;

const DIGEST_NC: &str = "00000001";
const DIGEST_QOP: &str = "auth";

/// Answers CRAM-MD5 and DIGEST-MD5 challenges. This is what a [`Client`](crate::client::Client)
/// uses unless told otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Authenticator;

impl Authenticator for Md5Authenticator {
    fn process(&self, exchange: &Exchange<'_>) -> Result<Vec<u8>> {
        match exchange.mechanism {
            Mechanism::CramMd5 => {
                cram_md5(exchange.username, exchange.password, exchange.challenge)
            }
            Mechanism::DigestMd5 => {
                let cnonce = hex(&rand::thread_rng().gen::<[u8; 16]>());
                digest_md5(exchange, &cnonce)
            }
            other => Err(AuthError::Sasl(format!("{} has no challenge to answer", other)).into()),
        }
    }
}

/// `username SP hex(HMAC-MD5(password, challenge))`
fn cram_md5(username: &str, password: &str, challenge: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|e| AuthError::Sasl(e.to_string()))?;
    mac.update(challenge);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{} {}", username, hex(&digest)).into_bytes())
}

fn digest_md5(exchange: &Exchange<'_>, cnonce: &str) -> Result<Vec<u8>> {
    let challenge = String::from_utf8_lossy(exchange.challenge);
    let directives = parse_directives(&challenge);
    let lookup = |key: &str| {
        directives
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    };

    let nonce = lookup("nonce")
        .ok_or_else(|| AuthError::Sasl("DIGEST-MD5 challenge without nonce".to_string()))?;
    if let Some(qop) = lookup("qop") {
        if !qop.split(',').any(|q| q.trim().eq_ignore_ascii_case(DIGEST_QOP)) {
            return Err(AuthError::Sasl(format!("unsupported qop options: {}", qop)).into());
        }
    }
    let realm = lookup("realm").unwrap_or("");
    let utf8 = lookup("charset")
        .map(|c| c.eq_ignore_ascii_case("utf-8"))
        .unwrap_or(false);
    let digest_uri = format!("{}/{}", exchange.service, exchange.host);

    let mut a1 = Md5::digest(format!("{}:{}:{}", exchange.username, realm, exchange.password))
        .to_vec();
    a1.extend_from_slice(format!(":{}:{}", nonce, cnonce).as_bytes());
    let a2 = format!("AUTHENTICATE:{}", digest_uri);
    let response = hex(&Md5::digest(format!(
        "{}:{}:{}:{}:{}:{}",
        hex(&Md5::digest(&a1)),
        nonce,
        DIGEST_NC,
        cnonce,
        DIGEST_QOP,
        hex(&Md5::digest(a2))
    )));

    let mut fields = Vec::new();
    if utf8 {
        fields.push("charset=utf-8".to_string());
    }
    fields.push(format!("username=\"{}\"", exchange.username));
    if !realm.is_empty() {
        fields.push(format!("realm=\"{}\"", realm));
    }
    fields.push(format!("nonce=\"{}\"", nonce));
    fields.push(format!("nc={}", DIGEST_NC));
    fields.push(format!("cnonce=\"{}\"", cnonce));
    fields.push(format!("digest-uri=\"{}\"", digest_uri));
    fields.push(format!("response={}", response));
    fields.push(format!("qop={}", DIGEST_QOP));
    Ok(iter_join(fields, ",").into_bytes())
}

/// Split a DIGEST-MD5 challenge into `key=value` pairs, honouring quoted values.
fn parse_directives(challenge: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = challenge.trim();
    while !rest.is_empty() {
        let (key, after) = match rest.split_once('=') {
            Some(kv) => kv,
            None => break,
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();
        let after = after.trim_start();

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            let mut value = String::new();
            let mut end = quoted.len();
            let mut escaped = false;
            for (i, c) in quoted.char_indices() {
                match c {
                    _ if escaped => {
                        value.push(c);
                        escaped = false;
                    }
                    '\\' => escaped = true,
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            (value, &quoted[end.min(quoted.len())..])
        } else {
            match after.split_once(',') {
                Some((v, r)) => (v.trim().to_string(), r),
                None => (after.trim().to_string(), ""),
            }
        };

        out.push((key, value));
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }
    out
}

fn hex(bytes: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 15) as usize] as char);
    }
    s
}
