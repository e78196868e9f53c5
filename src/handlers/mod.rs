pub mod attendance;
pub mod prediction;
pub mod reports;
pub mod scholars;
pub mod users;

use serde::{Deserialize, Deserializer};

use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{normalize_email, Scholar};

/// Trimmed, non-empty value or a 400 carrying `message`.
pub(crate) fn required(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(message))
}

pub(crate) fn required_email(value: Option<String>, message: &str) -> AppResult<String> {
    required(value, message).map(|email| normalize_email(&email))
}

pub(crate) async fn load_scholar(store: &dyn Store, email: &str) -> AppResult<Scholar> {
    store
        .scholar_by_email(email)
        .await?
        .ok_or(AppError::NotFound("Scholar not found"))
}

/// Stamps `updatedAt` and replaces the stored document.
pub(crate) async fn save_scholar(store: &dyn Store, scholar: &mut Scholar) -> AppResult<()> {
    scholar.touch();
    if store.replace_scholar(scholar).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("Scholar not found"))
    }
}

/// Tells an explicit `null` apart from an absent field.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedByQuery {
    pub created_by: Option<String>,
}
