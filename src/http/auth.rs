//! Basic authentication from URI user-info.
//!
//! HTTP clients send the authority's host only; credentials embedded in a
//! target URL have to travel in an `Authorization` header instead.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{HeaderValue, AUTHORIZATION};
use http::uri::{Authority, Uri};
use http::Request;
use percent_encoding::percent_decode_str;

/// Move the URI's user-info into an `Authorization: Basic` header.
///
/// The user-info is always stripped from the URI. The header is only added
/// when the request does not carry an `Authorization` header already.
pub fn apply_basic_auth<B>(request: &mut Request<B>) -> Result<(), http::Error> {
    let (user_info, host) = match request
        .uri()
        .authority()
        .and_then(|authority| authority.as_str().rsplit_once('@'))
    {
        Some((user_info, host)) => (user_info.to_string(), host.to_string()),
        None => return Ok(()),
    };

    let mut parts = request.uri().clone().into_parts();
    parts.authority = Some(host.parse::<Authority>()?);
    *request.uri_mut() = Uri::from_parts(parts)?;

    if !request.headers().contains_key(AUTHORIZATION) {
        let credentials = basic_credentials(&user_info)?;
        request.headers_mut().insert(AUTHORIZATION, credentials);
    }
    Ok(())
}

/// `Basic base64(user:password)` with both parts percent-decoded.
/// A missing password encodes as empty.
fn basic_credentials(user_info: &str) -> Result<HeaderValue, http::Error> {
    let (user, password) = user_info.split_once(':').unwrap_or((user_info, ""));

    let mut raw: Vec<u8> = percent_decode_str(user).collect();
    raw.push(b':');
    raw.extend(percent_decode_str(password));

    let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(raw)))?;
    value.set_sensitive(true);
    Ok(value)
}
