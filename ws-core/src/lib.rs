//! Foundation types shared by every workspace-launcher crate.
//!
//! Holds the error taxonomy, the pay model record that decides where a
//! user's workspace runs, and the deterministic naming rules that map a
//! `(user, app)` pair onto backend object names.

pub mod error;
pub mod naming;
pub mod paymodel;

pub use error::{Result, WsError};
pub use naming::{escape_label_value, service_name, workspace_id};
pub use paymodel::{BackendKind, PayModel, ACTIVE_STATUS, LISTABLE_STATUSES};
