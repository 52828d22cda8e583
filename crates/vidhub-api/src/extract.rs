use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// `Json<T>` whose rejection renders as the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `Query<T>` whose rejection renders as the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// Parse a path key, failing with a validation error naming the entity.
pub fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::validation(format!("Invalid {what} id")))
}

/// Trimmed, non-empty text or a validation error.
pub fn required(value: Option<&str>, what: &str) -> ApiResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::validation(format!("{what} is required"))),
    }
}

/// Trimmed text, `None` when absent or blank.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// A fully buffered multipart form: text fields plus file parts.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Remove and return a non-empty file part.
    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name).filter(|f| !f.bytes.is_empty())
    }
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state).await?;
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    form.files.insert(
                        name,
                        Upload {
                            file_name: Some(file_name),
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }
}
