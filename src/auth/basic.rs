use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};

const PREFIX: &str = "Basic ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedCredential {
    #[error("authorization has no 'Basic ' prefix")]
    MissingPrefix,
    #[error("credential is not valid base64")]
    Base64,
    #[error("credential is not valid utf-8")]
    Utf8,
    #[error("credential has no ':' separator")]
    MissingSeparator,
}

/// Username/password pair that only lives for the duration of a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decodes `Basic base64(username:password)`. Only the first colon splits,
/// so passwords may contain colons.
pub fn decode(header: &str) -> Result<Credential, MalformedCredential> {
    let encoded = header
        .strip_prefix(PREFIX)
        .ok_or(MalformedCredential::MissingPrefix)?;

    // Standard alphabet per RFC 7617; url-safe is accepted for older clients.
    let raw = STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE.decode(encoded))
        .map_err(|_| MalformedCredential::Base64)?;
    let text = String::from_utf8(raw).map_err(|_| MalformedCredential::Utf8)?;

    let (username, password) = text
        .split_once(':')
        .ok_or(MalformedCredential::MissingSeparator)?;

    Ok(Credential {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

#[cfg(test)]
pub(crate) fn encode(username: &str, password: &str) -> String {
    format!("{PREFIX}{}", STANDARD.encode(format!("{username}:{password}")))
}
