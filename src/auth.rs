use std::fmt;

/// Personal access token used to authenticate against the platform API.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_trims_and_redacts() {
        let token = Token::from("  secret-pat \n");
        assert_eq!(token.as_str(), "secret-pat");
        assert_eq!(format!("{token:?}"), "Token(****)");
    }

    #[test]
    fn test_blank_token() {
        assert!(Token::from("   ").is_blank());
        assert!(!Token::from("x").is_blank());
    }
}
