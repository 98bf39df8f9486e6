//! Short-lived repository credentials.
//!
//! A [`TokenMinter`] obtains tokens from the minting service; the
//! [`CredentialCache`] keeps one per (owner, repository) and decides
//! whether to reuse or refresh it.

mod cache;
mod minter;

pub use cache::{CachedCredential, CredentialCache};
pub use minter::{HttpTokenMinter, MintError, TokenMinter};

#[cfg(test)]
pub use minter::MockTokenMinter;
