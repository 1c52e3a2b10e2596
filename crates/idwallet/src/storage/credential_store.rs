//! Credential persistence with subject and issuer indexes.
//!
//! Key layout:
//!
//! ```text
//! cred/{id}                       JSON credential
//! idx/subject/{subject}/{id}      empty marker
//! idx/issuer/{issuer}/{id}        empty marker
//! ```

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::credential::W3CCredential;
use crate::error::{Result, WalletError};

use super::kv::KeyValueStore;

const CRED_PREFIX: &str = "cred/";
const SUBJECT_INDEX: &str = "idx/subject/";
const ISSUER_INDEX: &str = "idx/issuer/";

/// Optional ordering for [`CredentialStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSort {
    IssuanceDateAsc,
    IssuanceDateDesc,
    Id,
}

/// Criteria for listing credentials. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CredentialFilter {
    pub subject: Option<String>,
    pub issuer: Option<String>,
    /// Matches `credentialSchema.id`.
    pub schema: Option<String>,
    pub credential_type: Option<String>,
    pub sort: Option<CredentialSort>,
}

impl CredentialFilter {
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn credential_type(mut self, t: impl Into<String>) -> Self {
        self.credential_type = Some(t.into());
        self
    }

    pub fn sorted(mut self, sort: CredentialSort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn matches(&self, c: &W3CCredential) -> bool {
        self.subject
            .as_deref()
            .map_or(true, |s| c.subject_id() == Some(s))
            && self.issuer.as_deref().map_or(true, |i| c.issuer == i)
            && self
                .schema
                .as_deref()
                .map_or(true, |s| c.credential_schema.id == s)
            && self
                .credential_type
                .as_deref()
                .map_or(true, |t| c.has_type(t))
    }
}

/// Credential records over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn record_key(id: &str) -> String {
        format!("{CRED_PREFIX}{id}")
    }

    fn subject_key(subject: &str, id: &str) -> String {
        format!("{SUBJECT_INDEX}{subject}/{id}")
    }

    fn issuer_key(issuer: &str, id: &str) -> String {
        format!("{ISSUER_INDEX}{issuer}/{id}")
    }

    /// Store a credential. Content-addressed ids must match the content.
    ///
    /// The record is written last, so a reader never sees a credential
    /// whose index entries are missing.
    pub async fn put(&self, credential: &W3CCredential) -> Result<()> {
        if credential.id.is_empty() {
            return Err(WalletError::InvalidCredential("credential has no id".into()));
        }
        credential.check_content_id()?;
        let id = &credential.id;
        let mut entries = vec![(Self::issuer_key(&credential.issuer, id), Vec::new())];
        if let Some(subject) = credential.subject_id() {
            entries.push((Self::subject_key(subject, id), Vec::new()));
        }
        entries.push((Self::record_key(id), serde_json::to_vec(credential)?));
        self.kv.put_batch(entries).await?;
        debug!("stored credential {id}");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<W3CCredential> {
        let bytes = self
            .kv
            .get(&Self::record_key(id))
            .await?
            .ok_or_else(|| WalletError::CredentialNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.kv.get(&Self::record_key(id)).await?.is_some())
    }

    /// Remove a credential and its index entries.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let credential = self.get(id).await?;
        self.kv.delete(&Self::record_key(id)).await?;
        self.kv
            .delete(&Self::issuer_key(&credential.issuer, id))
            .await?;
        if let Some(subject) = credential.subject_id() {
            self.kv.delete(&Self::subject_key(subject, id)).await?;
        }
        debug!("removed credential {id}");
        Ok(())
    }

    /// Credentials matching `filter`.
    ///
    /// Subject and issuer filters are answered from the indexes. Order is
    /// unspecified unless `filter.sort` is set.
    pub async fn list(&self, filter: &CredentialFilter) -> Result<Vec<W3CCredential>> {
        let ids: Vec<String> = if let Some(subject) = &filter.subject {
            self.index_ids(&format!("{SUBJECT_INDEX}{subject}/")).await?
        } else if let Some(issuer) = &filter.issuer {
            self.index_ids(&format!("{ISSUER_INDEX}{issuer}/")).await?
        } else {
            self.kv
                .list(CRED_PREFIX)
                .await?
                .into_iter()
                .filter_map(|k| k.strip_prefix(CRED_PREFIX).map(str::to_string))
                .collect()
        };

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await {
                Ok(c) if filter.matches(&c) => out.push(c),
                Ok(_) => {}
                // Index entry without record: removed concurrently.
                Err(WalletError::CredentialNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        match filter.sort {
            Some(CredentialSort::IssuanceDateAsc) => out.sort_by_key(|c| c.issuance_date),
            Some(CredentialSort::IssuanceDateDesc) => {
                out.sort_by(|a, b| b.issuance_date.cmp(&a.issuance_date))
            }
            Some(CredentialSort::Id) => out.sort_by(|a, b| a.id.cmp(&b.id)),
            None => {}
        }
        Ok(out)
    }

    async fn index_ids(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .kv
            .list(prefix)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect())
    }
}
