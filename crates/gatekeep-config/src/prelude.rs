pub use crate::{
    errors::ConfigError,
    loader::Loader,
    model::{Checksum, KeyPath, Layer, ProvenanceEntry},
    secrets::{EnvSecretResolver, FileSecretResolver, SecretResolver},
    snapshot::ConfigSnapshot,
    source::{
        cli::CliArgsSource,
        env::{EnvAliasSource, EnvSource},
        file::FileSource,
        Source, SourceSnapshot,
    },
    validate::{BasicValidator, TypedValidator, Validator},
};
