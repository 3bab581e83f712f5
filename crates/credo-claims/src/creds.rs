//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Prefix-typed key pairs and signed claim documents."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use crate::ClaimsError;

const JWT_BEGIN: &str = "-----BEGIN NATS USER JWT-----";
const JWT_END: &str = "------END NATS USER JWT------";
const SEED_BEGIN: &str = "-----BEGIN USER NKEY SEED-----";
const SEED_END: &str = "------END USER NKEY SEED------";

/// Render the credential bundle a messaging client loads by path.
pub fn render_creds(jwt: &str, seed: &str) -> String {
    format!(
        "{JWT_BEGIN}\n{}\n{JWT_END}\n\n{SEED_BEGIN}\n{}\n{SEED_END}\n",
        jwt.trim(),
        seed.trim()
    )
}

/// Extract the claim and seed from a credential bundle.
pub fn parse_creds(bundle: &str) -> Result<(String, String), ClaimsError> {
    let jwt = fenced_section(bundle, JWT_BEGIN, JWT_END)?;
    let seed = fenced_section(bundle, SEED_BEGIN, SEED_END)?;
    Ok((jwt, seed))
}

fn fenced_section(bundle: &str, begin: &str, end: &str) -> Result<String, ClaimsError> {
    let start = bundle
        .find(begin)
        .ok_or(ClaimsError::MalformedCredentials)?
        + begin.len();
    let stop = bundle[start..]
        .find(end)
        .ok_or(ClaimsError::MalformedCredentials)?
        + start;
    let section = bundle[start..stop].trim();
    if section.is_empty() {
        return Err(ClaimsError::MalformedCredentials);
    }
    Ok(section.to_owned())
}
