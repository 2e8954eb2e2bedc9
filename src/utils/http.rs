// src/utils/http.rs

//! HTTP client utilities.

use std::borrow::Cow;

use encoding_rs::{BIG5, Encoding, GBK, UTF_8};

use crate::error::Result;
use crate::models::ScraperConfig;

/// How far into a body to look for a `<meta charset>` declaration.
const SNIFF_BYTES: usize = 2048;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ScraperConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}

/// Pick the encoding declared in the header or the first bytes of the body.
///
/// Only the GBK family and Big5 are recognized; anything else is UTF-8.
pub fn sniff_encoding(content_type: Option<&str>, bytes: &[u8]) -> &'static Encoding {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    let mut declared = String::from_utf8_lossy(head).to_ascii_lowercase();
    if let Some(ct) = content_type {
        declared.insert_str(0, &ct.to_ascii_lowercase());
    }

    let declared = declared.replace(['"', '\'', ' '], "");
    if ["charset=gbk", "charset=gb2312", "charset=gb18030"]
        .iter()
        .any(|token| declared.contains(token))
    {
        GBK
    } else if declared.contains("charset=big5") {
        BIG5
    } else {
        UTF_8
    }
}

/// Decode a response body with the sniffed encoding.
pub fn decode_body<'a>(content_type: Option<&str>, bytes: &'a [u8]) -> Cow<'a, str> {
    let encoding = sniff_encoding(content_type, bytes);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("Body had invalid {} sequences", encoding.name());
    }
    text
}
