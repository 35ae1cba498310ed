//! Credential lookup for the deploy scripts.
//!
//! Secrets (the deployer key, the RPC provider id, the verification key) are
//! fetched through a [`CredentialSource`] injected at startup, so that runs can
//! be driven in tests without real secrets. Values are wrapped in [`Secret`],
//! which never prints its contents.

use std::{
    collections::HashMap,
    env,
    fmt::{self, Debug, Display, Formatter},
};

use tracing::debug;

use crate::errors::DeployError;

/// A credential value that is redacted whenever it is formatted
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of this secret in `text`
    pub fn redact_in(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, "<redacted>")
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted>)")
    }
}

impl Display for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// A source of named credentials
pub trait CredentialSource {
    /// Look up the credential with the given name
    fn lookup(&self, name: &str) -> Option<Secret>;
}

/// Credentials read from the process environment
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Load a `.env` file from the working directory, if one exists, and read
    /// credentials from the environment
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("loaded environment from {}", path.display()),
            Err(e) => debug!("no .env file loaded: {e}"),
        }
        Self
    }
}

impl CredentialSource for EnvCredentials {
    fn lookup(&self, name: &str) -> Option<Secret> {
        env::var(name)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Secret)
    }
}

/// A fixed set of credentials, for tests and embedding
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    /// The credentials by name
    values: HashMap<String, Secret>,
}

impl StaticCredentials {
    /// Add a credential
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), Secret::new(value));
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, name: &str) -> Option<Secret> {
        self.values.get(name).cloned()
    }
}

/// A template with its `{NAME}` placeholders filled in from a credential source
#[derive(Clone, Debug)]
pub struct ResolvedTemplate {
    /// The filled-in value
    pub value: Secret,
    /// The credentials that were substituted into the value
    pub embedded: Vec<Secret>,
}

impl ResolvedTemplate {
    /// Redact the filled-in value and every embedded credential from `text`
    pub fn redact_in(&self, text: &str) -> String {
        let redacted = self.value.redact_in(text);
        self.embedded
            .iter()
            .fold(redacted, |acc, secret| secret.redact_in(&acc))
    }
}

/// Fill the `{NAME}` placeholders of `template` with credentials
pub fn resolve_template(
    template: &str,
    credentials: &impl CredentialSource,
) -> Result<ResolvedTemplate, DeployError> {
    let mut value = String::with_capacity(template.len());
    let mut embedded = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        value.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            DeployError::Configuration(format!("unclosed placeholder in template `{template}`"))
        })?;

        let name = &after[..end];
        if name.is_empty() {
            return Err(DeployError::Configuration(format!(
                "empty placeholder in template `{template}`"
            )));
        }

        let secret = credentials.lookup(name).ok_or_else(|| {
            DeployError::Configuration(format!("missing credential `{name}`"))
        })?;
        value.push_str(secret.expose());
        embedded.push(secret);

        rest = &after[end + 1..];
    }
    value.push_str(rest);

    Ok(ResolvedTemplate {
        value: Secret(value),
        embedded,
    })
}

#[cfg(test)]
mod tests {
    use crate::errors::DeployError;

    use super::{resolve_template, Secret, StaticCredentials};

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("0xdeadbeef");
        assert_eq!(format!("{secret:?}"), "Secret(<redacted>)");
        assert_eq!(format!("{secret}"), "<redacted>");
        assert_eq!(secret.expose(), "0xdeadbeef");
    }

    #[test]
    fn test_resolve_template() {
        let creds = StaticCredentials::default().with("INFURA_ID", "abc123");
        let resolved =
            resolve_template("https://rinkeby.infura.io/v3/{INFURA_ID}", &creds).unwrap();

        assert_eq!(resolved.value.expose(), "https://rinkeby.infura.io/v3/abc123");
        assert_eq!(
            resolved.redact_in("error sending request for url (https://rinkeby.infura.io/v3/abc123/)"),
            "error sending request for url (<redacted>/)"
        );
    }

    #[test]
    fn test_resolve_template_without_placeholders() {
        let resolved =
            resolve_template("http://127.0.0.1:8545", &StaticCredentials::default()).unwrap();
        assert_eq!(resolved.value.expose(), "http://127.0.0.1:8545");
        assert!(resolved.embedded.is_empty());
    }

    #[test]
    fn test_resolve_template_missing_credential() {
        let err = resolve_template(
            "https://mainnet.infura.io/v3/{INFURA_ID}",
            &StaticCredentials::default(),
        )
        .unwrap_err();

        assert!(matches!(err, DeployError::Configuration(_)));
        assert!(err.message().contains("INFURA_ID"));
    }

    #[test]
    fn test_resolve_template_unclosed() {
        let creds = StaticCredentials::default().with("INFURA_ID", "abc123");
        let err = resolve_template("https://host/{INFURA_ID", &creds).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }
}
