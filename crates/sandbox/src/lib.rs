//! Per-tool content isolation and capability enforcement.
//!
//! Tools load their UI from a private URL scheme (`toolscheme://<id>/<path>`).
//! Every request is confined to the tool's own asset subtree, HTML documents
//! get a freshly composed content-security policy injected, and filesystem
//! access from a tool is limited to paths the user explicitly picked.

pub mod catalog;
pub mod consent;
pub mod content;
pub mod error;
pub mod grants;
pub mod mime;
pub mod paths;
pub mod policy;
pub mod resolver;

pub use {
    catalog::{FsToolCatalog, MANIFEST_FILE},
    consent::JsonConsentStore,
    content::{ContentBody, ContentResponse, VirtualContentServer},
    error::{Error, Result},
    grants::{FileAccessCapabilityStore, FilePicker, PickKind, PickRequest},
    policy::{Policy, PolicyComposer, inject_into_html},
    resolver::ContentAddressResolver,
};
