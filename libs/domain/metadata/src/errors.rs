// [libs/domain/metadata/src/errors.rs]
use flowmap_core_addr::AddrError;
use flowmap_infra_store::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error(transparent)]
    Addr(#[from] AddrError),

    #[error(transparent)]
    Store(#[from] DbError),
}
