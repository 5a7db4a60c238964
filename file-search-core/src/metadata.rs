//! Document metadata extracted by the language model and attached to imported documents.

use serde::{Deserialize, Serialize};

use crate::contract::CustomMetadata;

pub const TITLE_KEY: &str = "title";
pub const FILE_NAME_KEY: &str = "file_name";
pub const AUTHOR_KEY: &str = "author";
pub const ABSTRACT_KEY: &str = "abstract";

/// Instruction sent alongside the uploaded file when extracting metadata.
///
/// Length limits live here only; extracted values are not validated locally.
pub const EXTRACTION_PROMPT: &str = "\
Please extract title, author, and short abstract from this document.
Each value should be under 200 characters.

Abstracts should be succinct and NOT include preamble text like `This document describes...`

Example bad abstract:
Now I want to cover a key consideration that can potentially
save you more in future IT spend than any other decision you can make:
embracing open source as a core element of your cloud strategy.

Example good abstract:
How you can significantly reduce IT spend by embracing open source
as a core component of your cloud strategy.

Example bad abstract:
This article discusses how you can design your cloud landing zone.

Example good abstract:
How to design your cloud landing zone according to best practices.
";

/// Title, author and abstract of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl DocumentMetadata {
    /// The four custom metadata entries attached on import, in a fixed order.
    pub fn to_custom_metadata(&self, file_name: &str) -> Vec<CustomMetadata> {
        vec![
            CustomMetadata::string(TITLE_KEY, self.title.clone()),
            CustomMetadata::string(FILE_NAME_KEY, file_name),
            CustomMetadata::string(AUTHOR_KEY, self.author.clone()),
            CustomMetadata::string(ABSTRACT_KEY, self.abstract_text.clone()),
        ]
    }
}
