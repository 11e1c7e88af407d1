//! Bearer token verification against the identity provider's JWKS.
//!
//! Keys are fetched as one set and replaced as one set once `ttl` has
//! passed. An unknown `kid` forces a refetch, rate limited so a flood of
//! forged tokens cannot hammer the provider.

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;

const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(5);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const CLOCK_LEEWAY_SECONDS: u64 = 30;

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(rename = "use")]
    key_use: Option<String>,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

struct VerifyingKey {
    key: DecodingKey,
    algorithm: Algorithm,
}

#[derive(Default)]
struct KeySet {
    keys: HashMap<String, Arc<VerifyingKey>>,
    fetched_at: Option<Instant>,
}

/// Keeps only RSA signing keys; anything else in the set is ignored.
fn parse_key_set(set: JwkSet) -> HashMap<String, Arc<VerifyingKey>> {
    let mut keys = HashMap::new();
    for jwk in set.keys {
        if jwk.kty != "RSA" || jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            tracing::debug!(kid = %jwk.kid, kty = %jwk.kty, "Skipping non-signing JWK");
            continue;
        }
        let algorithm = match jwk.alg.as_deref() {
            None | Some("RS256") => Algorithm::RS256,
            Some("RS384") => Algorithm::RS384,
            Some("RS512") => Algorithm::RS512,
            Some(other) => {
                tracing::warn!(kid = %jwk.kid, alg = other, "Unsupported JWK algorithm");
                continue;
            }
        };
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::warn!(kid = %jwk.kid, "RSA JWK without modulus or exponent");
            continue;
        };
        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                keys.insert(jwk.kid, Arc::new(VerifyingKey { key, algorithm }));
            }
            Err(err) => tracing::warn!(kid = %jwk.kid, error = %err, "Unparseable JWK"),
        }
    }
    keys
}

/// Shared, cloneable verifier for provider-issued access tokens.
#[derive(Clone)]
pub struct JwksCache {
    keys: Arc<RwLock<KeySet>>,
    client: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwksCache {
    pub fn new(
        jwks_url: String,
        issuer: String,
        audience: String,
        ttl_seconds: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build JWKS client")?;

        Ok(Self {
            keys: Arc::new(RwLock::new(KeySet::default())),
            client,
            jwks_url,
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_seconds),
        })
    }

    /// Checks signature, issuer, audience and expiry; returns the claims.
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT header has no kid")?;
        let verifying = self.key_for(&kid).await?;

        if header.alg != verifying.algorithm {
            anyhow::bail!(
                "JWT algorithm {:?} does not match key {kid} ({:?})",
                header.alg,
                verifying.algorithm
            );
        }

        let mut validation = Validation::new(verifying.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_LEEWAY_SECONDS;

        let data = decode::<Claims>(token, &verifying.key, &validation)
            .context("JWT validation failed")?;
        Ok(data.claims)
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<VerifyingKey>> {
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }
        self.refresh().await?;
        self.keys
            .read()
            .keys
            .get(kid)
            .cloned()
            .with_context(|| format!("No JWKS key with kid {kid}"))
    }

    fn cached(&self, kid: &str) -> Option<Arc<VerifyingKey>> {
        let set = self.keys.read();
        let fresh = set.fetched_at.is_some_and(|at| at.elapsed() < self.ttl);
        fresh.then(|| set.keys.get(kid).cloned()).flatten()
    }

    async fn refresh(&self) -> Result<()> {
        let recently = self
            .keys
            .read()
            .fetched_at
            .is_some_and(|at| at.elapsed() < MIN_REFETCH_INTERVAL);
        if recently {
            return Ok(());
        }

        let fetched = self.fetch().await?;
        let count = fetched.len();
        {
            let mut set = self.keys.write();
            set.keys = fetched;
            set.fetched_at = Some(Instant::now());
        }
        tracing::info!(keys = count, url = %self.jwks_url, "JWKS refreshed");
        Ok(())
    }

    async fn fetch(&self) -> Result<HashMap<String, Arc<VerifyingKey>>> {
        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .context("JWKS request failed")?
            .error_for_status()
            .context("JWKS endpoint returned an error")?;
        let set: JwkSet = response.json().await.context("Malformed JWKS document")?;
        Ok(parse_key_set(set))
    }

    /// Loads the key set at startup, retrying while the provider comes up.
    pub async fn warm_cache(&self) -> Result<()> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        backoff::future::retry(policy, || async {
            self.refresh().await.map_err(|err| {
                tracing::warn!(error = %err, "JWKS warm-up failed, retrying");
                backoff::Error::transient(err)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MODULUS: &str = "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw";

    fn cache() -> JwksCache {
        JwksCache::new(
            "http://127.0.0.1:9/jwks.json".into(),
            "https://id.example/auth/v1".into(),
            "authenticated".into(),
            60,
        )
        .unwrap()
    }

    #[test]
    fn test_key_set_keeps_rsa_signing_keys() {
        let set: JwkSet = serde_json::from_value(json!({
            "keys": [
                { "kid": "sig-1", "kty": "RSA", "use": "sig", "alg": "RS256", "n": MODULUS, "e": "AQAB" },
                { "kid": "sig-2", "kty": "RSA", "n": MODULUS, "e": "AQAB" },
                { "kid": "enc-1", "kty": "RSA", "use": "enc", "n": MODULUS, "e": "AQAB" },
                { "kid": "ec-1", "kty": "EC", "crv": "P-256", "x": "AA", "y": "AA" },
                { "kid": "hs-1", "kty": "RSA", "alg": "HS256", "n": MODULUS, "e": "AQAB" }
            ]
        }))
        .unwrap();

        let keys = parse_key_set(set);
        let mut kids: Vec<_> = keys.keys().cloned().collect();
        kids.sort();
        assert_eq!(kids, vec!["sig-1", "sig-2"]);
        assert_eq!(keys["sig-2"].algorithm, Algorithm::RS256);
    }

    #[tokio::test]
    async fn test_rejects_malformed_token_before_fetching_keys() {
        let err = cache().verify_token("not-a-jwt").await.unwrap_err();
        assert!(err.to_string().contains("Invalid JWT header"));
    }

    #[tokio::test]
    async fn test_rejects_token_without_kid() {
        // {"alg":"RS256","typ":"JWT"} . {} . sig
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2ln";
        let err = cache().verify_token(token).await.unwrap_err();
        assert!(err.to_string().contains("kid"));
    }
}
