//! One-shot notices carried in a signed cookie.

use crate::config::MIN_SECRET_LEN;
use crate::error::ConvertError;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::SignedCookieJar;
use tracing::warn;

/// Cookie holding the pending notice.
pub const FLASH_COOKIE: &str = "flash";

/// Signing key for flash cookies.
///
/// A configured secret of at least [`MIN_SECRET_LEN`] bytes is stretched
/// with HKDF; without one a random key is used, so notices do not survive a
/// restart.
///
/// # Errors
/// [`ConvertError::InvalidConfig`] if the secret is too short to derive from.
pub fn signing_key(secret: Option<&str>) -> Result<Key, ConvertError> {
    match secret {
        Some(secret) if secret.len() < MIN_SECRET_LEN => Err(ConvertError::InvalidConfig(
            format!(
                "secret key must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            ),
        )),
        Some(secret) => Ok(Key::derive_from(secret.as_bytes())),
        None => {
            warn!("CONVERT_SECRET_KEY not set, using a random per-process cookie key");
            Ok(Key::generate())
        }
    }
}

/// Queue `message` for the next page view.
pub fn set(jar: SignedCookieJar, message: impl Into<String>) -> SignedCookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, message.into()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Read and clear the pending notice.
pub fn take(jar: SignedCookieJar) -> (SignedCookieJar, Option<String>) {
    let message = jar.get(FLASH_COOKIE).map(|c| c.value().to_string());
    if message.is_none() {
        return (jar, None);
    }
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_secret_gives_stable_key() {
        let secret = "k".repeat(40);
        let a = signing_key(Some(&secret)).unwrap();
        let b = signing_key(Some(&secret)).unwrap();
        assert_eq!(a.master(), b.master());
    }

    #[test]
    fn missing_secret_gives_fresh_keys() {
        let a = signing_key(None).unwrap();
        let b = signing_key(None).unwrap();
        assert_ne!(a.master(), b.master());
    }

    #[test]
    fn short_secret_is_an_error_not_a_panic() {
        let err = signing_key(Some("too-short")).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn take_clears_what_set_stored() {
        let key = Key::generate();
        let jar = set(SignedCookieJar::new(key), "No files uploaded");
        let (jar, message) = take(jar);
        assert_eq!(message.as_deref(), Some("No files uploaded"));
        assert!(jar.get(FLASH_COOKIE).is_none());
    }

    #[test]
    fn take_on_empty_jar_is_none() {
        let (_, message) = take(SignedCookieJar::new(Key::generate()));
        assert!(message.is_none());
    }
}
