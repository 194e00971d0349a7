//! Enumeration and naming of connected accounts.

use crate::error::Result;
use crate::token_store::TokenStore;

const LABEL_PREFIX: &str = "account_";

/// Known accounts, as seen through the token store.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    store: TokenStore,
}

impl AccountRegistry {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Labels of all saved accounts, in the token store's listing order.
    pub async fn labels(&self) -> Result<Vec<String>> {
        self.store.list_labels().await
    }

    /// Label to use for the next account that gets connected.
    ///
    /// This is `account_{N+1}` for N saved accounts, moving further up if that
    /// label is already taken (which happens once accounts are removed out of
    /// order).
    pub async fn next_label(&self) -> Result<String> {
        let count = self.labels().await?.len();
        let mut n = count + 1;
        loop {
            let label = format!("{LABEL_PREFIX}{n}");
            if !self.store.contains(&label).await? {
                return Ok(label);
            }
            tracing::debug!(label, "account label already taken");
            n += 1;
        }
    }
}
