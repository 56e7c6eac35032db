//! Curated collections: user-assembled lists of archive content, checked in
//! to the content repository and published as a pull request.

pub mod gateway;
pub mod image;
pub mod runner;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SubmitterError};

pub use gateway::{collection_pull_request_body, CollectionRepository};
pub use image::{decode_data_uri, ImageData, ImageError, TitleImage};
pub use runner::{CollectionRunner, PendingCollection};

/// A collection as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSubmission {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    /// Title image as a `data:image/...;base64,` URI.
    #[serde(default)]
    pub image: Option<String>,
    /// `YYYY-MM-DD`
    pub created_date: String,
    #[serde(default)]
    pub items: Vec<CollectionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    /// Id of the archived content this item points at.
    pub reference: String,
    #[serde(default)]
    pub title: String,
}

/// The collection record handed to the curator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionManifest {
    pub title: String,
    pub description: String,
    pub author: String,
    pub links: BTreeMap<String, String>,
    pub created_date: NaiveDate,
    pub items: Vec<ManifestItem>,
    /// File name of the title image attached at checkin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub id: String,
    pub title: String,
}

impl CollectionManifest {
    /// Validates `submission` and maps it to a record.
    pub fn from_submission(submission: &CollectionSubmission) -> Result<Self> {
        if submission.title.trim().is_empty() {
            return Err(SubmitterError::InvalidCollection(
                "title must not be empty".to_string(),
            ));
        }

        let created_date = NaiveDate::parse_from_str(submission.created_date.trim(), "%Y-%m-%d")
            .map_err(|e| {
                SubmitterError::InvalidCollection(format!(
                    "created date '{}': {}",
                    submission.created_date, e
                ))
            })?;

        Ok(Self {
            title: submission.title.clone(),
            description: submission.description.clone(),
            author: submission.author.clone(),
            links: submission.links.clone(),
            created_date,
            items: submission
                .items
                .iter()
                .map(|item| ManifestItem {
                    id: item.reference.clone(),
                    title: item.title.clone(),
                })
                .collect(),
            title_image: None,
        })
    }
}
