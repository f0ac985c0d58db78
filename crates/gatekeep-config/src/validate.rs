use crate::errors::{invalid, ConfigError};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    async fn validate_boot(&self, tree: &serde_json::Value) -> Result<(), ConfigError>;
}

pub struct BasicValidator;

#[async_trait::async_trait]
impl Validator for BasicValidator {
    async fn validate_boot(&self, _tree: &serde_json::Value) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Rejects trees that do not deserialize into `T`, so bad values fail at boot.
pub struct TypedValidator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedValidator<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T> Validator for TypedValidator<T>
where
    T: DeserializeOwned + 'static,
{
    async fn validate_boot(&self, tree: &serde_json::Value) -> Result<(), ConfigError> {
        serde_json::from_value::<T>(tree.clone())
            .map(|_| ())
            .map_err(|e| invalid("validate", &e.to_string()))
    }
}
