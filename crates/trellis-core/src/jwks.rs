//! JWKS (JSON Web Key Set) models.

use serde::{Deserialize, Serialize};

/// JSON Web Key Set - a collection of JWKs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    /// The array of JWKs.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by its key ID (kid).
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// JSON Web Key - represents a single cryptographic key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA", "EC").
    pub kty: String,

    /// Public key use (e.g., "sig" for signature, "enc" for encryption).
    #[serde(rename = "use")]
    pub use_: Option<String>,

    /// Key ID - unique identifier for the key.
    pub kid: Option<String>,

    /// Algorithm (e.g., "RS256").
    pub alg: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name (e.g., "P-256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// X.509 certificate chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
}

impl Jwk {
    /// Check if this key is an RSA key.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA"
    }

    /// Check if this key is an elliptic-curve key.
    #[must_use]
    pub fn is_ec(&self) -> bool {
        self.kty == "EC"
    }

    /// Check if this key is suitable for signature verification.
    #[must_use]
    pub fn is_signing_key(&self) -> bool {
        self.use_.is_none() || self.use_.as_deref() == Some("sig")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_key(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            use_: Some("sig".to_string()),
            kid: Some(kid.to_string()),
            alg: Some("RS256".to_string()),
            n: Some("modulus".to_string()),
            e: Some("AQAB".to_string()),
            crv: None,
            x: None,
            y: None,
            x5c: None,
        }
    }

    #[test]
    fn test_find_key() {
        let jwks = JwkSet {
            keys: vec![rsa_key("key-1"), rsa_key("key-2")],
        };

        assert_eq!(
            jwks.find_key("key-2").unwrap().kid.as_deref(),
            Some("key-2")
        );
        assert!(jwks.find_key("key-3").is_none());
    }

    #[test]
    fn test_key_type_predicates() {
        let rsa = rsa_key("key-1");
        assert!(rsa.is_rsa());
        assert!(!rsa.is_ec());

        let ec = Jwk {
            kty: "EC".to_string(),
            crv: Some("P-256".to_string()),
            n: None,
            e: None,
            ..rsa_key("key-2")
        };
        assert!(ec.is_ec());
        assert!(!ec.is_rsa());
    }

    #[test]
    fn test_is_signing_key() {
        let mut key = rsa_key("key-1");
        assert!(key.is_signing_key());

        key.use_ = None;
        assert!(key.is_signing_key());

        key.use_ = Some("enc".to_string());
        assert!(!key.is_signing_key());
    }

    #[test]
    fn test_deserialize_use_rename() {
        let jwks: JwkSet = serde_json::from_str(
            r#"{"keys":[{"kty":"RSA","use":"sig","kid":"k1","alg":"RS256","n":"abc","e":"AQAB"}]}"#,
        )
        .unwrap();
        assert_eq!(jwks.keys[0].use_.as_deref(), Some("sig"));
    }
}
