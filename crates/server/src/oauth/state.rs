use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Fresh CSRF state for one login attempt: 32 random bytes, base64url.
pub fn generate_state() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
