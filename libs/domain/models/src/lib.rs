//! [libs/domain/models/src/lib.rs]
//!
//! Row-shaped types shared by the store adapter, the pipeline, and the
//! metadata editor. Each type mirrors one relational table and carries no
//! behaviour beyond small accessors — the pipeline crate owns the
//! transformations between them.

mod link;
mod node;
mod syslog;
mod tag;

pub use link::{Link, LinksIn, LinksOut, StagingLink};
pub use node::Node;
pub use syslog::Syslog;
pub use tag::Tag;
