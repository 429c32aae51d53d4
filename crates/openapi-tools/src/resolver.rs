//! Local `$ref` resolver.
//!
//! The `openapiv3` crate models `$ref`s as `ReferenceOr<T>` without resolving them. The QueryPie
//! documents are single self-contained files, so only document-local JSON pointers (`#/...`) are
//! followed. Anything else is reported as an error and the caller decides whether to skip the
//! affected element.

use crate::error::{OpenApiToolsError, Result};
use openapiv3::{OpenAPI, ReferenceOr};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug)]
pub struct RefResolver {
    root: Value,
}

impl RefResolver {
    /// Snapshot `spec` as JSON so pointers can be followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be converted into JSON.
    pub fn new(spec: &OpenAPI) -> Result<Self> {
        let root =
            serde_json::to_value(spec).map_err(|e| OpenApiToolsError::OpenApi(e.to_string()))?;
        Ok(Self { root })
    }

    /// Follow `$ref` chains until an inline item is reached.
    ///
    /// # Errors
    ///
    /// Returns an error for non-local refs, dangling pointers, cycles, or a target that does not
    /// deserialize as `T`.
    pub fn resolve<T>(&self, r: &ReferenceOr<T>) -> Result<T>
    where
        T: Clone + DeserializeOwned,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut cur: ReferenceOr<T> = r.clone();

        loop {
            match cur {
                ReferenceOr::Item(item) => return Ok(item),
                ReferenceOr::Reference { reference } => {
                    if !seen.insert(reference.clone()) {
                        return Err(OpenApiToolsError::OpenApi(format!(
                            "Cyclic $ref detected while resolving: {reference}",
                        )));
                    }

                    let value = self.lookup(&reference)?;
                    cur = serde_json::from_value(value).map_err(|e| {
                        OpenApiToolsError::OpenApi(format!(
                            "Failed to deserialize referenced value '{reference}' as expected type: {e}",
                        ))
                    })?;
                }
            }
        }
    }

    fn lookup(&self, reference: &str) -> Result<Value> {
        let Some(pointer) = reference.strip_prefix('#') else {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported external $ref '{reference}' (only '#/...' refs are followed)",
            )));
        };
        if !pointer.starts_with('/') {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}",
            )));
        }

        self.root.pointer(pointer).cloned().ok_or_else(|| {
            OpenApiToolsError::OpenApi(format!(
                "Unresolved $ref '{reference}' (missing pointer '{pointer}')",
            ))
        })
    }
}
