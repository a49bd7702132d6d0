//! Which pay model a user's workspaces run under.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use ws_core::PayModel;

use crate::error::{OrchestratorError, Result};
use crate::store::PayModelStore;

/// Outcome of looking up a user's current pay model.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentSelection {
    /// Exactly one stored record is flagged current.
    Current(PayModel),
    /// Nothing stored for the user; the configured default applies.
    Default(PayModel),
    /// The user has listable records but none is current.
    Ambiguous,
    /// Neither a stored record nor a default exists.
    Unconfigured,
}

impl CurrentSelection {
    pub fn paymodel(&self) -> Option<&PayModel> {
        match self {
            CurrentSelection::Current(pm) | CurrentSelection::Default(pm) => Some(pm),
            CurrentSelection::Ambiguous | CurrentSelection::Unconfigured => None,
        }
    }

    pub fn into_paymodel(self) -> Option<PayModel> {
        match self {
            CurrentSelection::Current(pm) | CurrentSelection::Default(pm) => Some(pm),
            CurrentSelection::Ambiguous | CurrentSelection::Unconfigured => None,
        }
    }
}

/// Current pay model plus everything the user could switch to.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayModelSummary {
    pub current_paymodel: Option<PayModel>,
    pub all_paymodels: Vec<PayModel>,
}

#[derive(Clone)]
pub struct PayModelResolver {
    store: Option<Arc<dyn PayModelStore>>,
    default: Option<PayModel>,
}

impl PayModelResolver {
    pub fn new(store: Option<Arc<dyn PayModelStore>>, default: Option<PayModel>) -> Self {
        Self { store, default }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn default_paymodel(&self) -> Option<&PayModel> {
        self.default.as_ref()
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn current_selection(&self, user: &str) -> Result<CurrentSelection> {
        let Some(store) = &self.store else {
            return Ok(self.fallback());
        };

        let mut current = store.list_current(user).await?;
        match current.len() {
            0 => {
                let listable = store.list_for_user(user).await?;
                if listable.is_empty() {
                    Ok(self.fallback())
                } else {
                    debug!(count = listable.len(), "Pay models exist but none is current");
                    Ok(CurrentSelection::Ambiguous)
                }
            }
            1 => Ok(CurrentSelection::Current(current.remove(0))),
            count => {
                warn!(user, count, "More than one current pay model");
                Err(OrchestratorError::MultipleCurrentPayModels {
                    user: user.to_string(),
                    count,
                })
            }
        }
    }

    /// The pay model workspaces run under, if any.
    ///
    /// `None` covers both an unconfigured user and one whose stored records
    /// have no current entry; [`Self::current_selection`] tells them apart.
    pub async fn get_current(&self, user: &str) -> Result<Option<PayModel>> {
        Ok(self.current_selection(user).await?.into_paymodel())
    }

    /// `None` when the user has neither a current nor a listable pay model.
    pub async fn get_for_user(&self, user: &str) -> Result<Option<PayModelSummary>> {
        let current = self.get_current(user).await?;
        let mut all = match &self.store {
            Some(store) => store.list_for_user(user).await?,
            None => Vec::new(),
        };
        if all.is_empty() {
            all.extend(current.clone());
        }

        if current.is_none() && all.is_empty() {
            return Ok(None);
        }
        Ok(Some(PayModelSummary {
            current_paymodel: current,
            all_paymodels: all,
        }))
    }

    #[instrument(skip(self))]
    pub async fn set_current(&self, user: &str, id: &str) -> Result<PayModel> {
        if let Some(default) = self.default.as_ref().filter(|d| d.id == id) {
            // The default lives in configuration; selecting it only means no
            // stored record may stay current.
            if let Some(store) = &self.store {
                store.clear_current(user).await?;
            }
            info!("Default pay model selected");
            return Ok(default.clone());
        }

        let store = self
            .store
            .as_ref()
            .ok_or_else(|| OrchestratorError::UnknownPayModel(id.to_string()))?;
        let paymodel = store
            .set_current(user, id)
            .await?
            .ok_or_else(|| OrchestratorError::UnknownPayModel(id.to_string()))?;

        info!(backend = %paymodel.backend(), "Current pay model updated");
        Ok(paymodel)
    }

    #[instrument(skip(self))]
    pub async fn reset_current(&self, user: &str) -> Result<()> {
        if let Some(store) = &self.store {
            let cleared = store.clear_current(user).await?;
            info!(cleared, "Current pay model reset");
        }
        Ok(())
    }

    fn fallback(&self) -> CurrentSelection {
        match &self.default {
            Some(default) => CurrentSelection::Default(default.clone()),
            None => CurrentSelection::Unconfigured,
        }
    }
}
