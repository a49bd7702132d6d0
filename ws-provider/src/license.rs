//! License seats mounted into workspaces that need them.
//!
//! Seat accounting is owned by a separate service; backends only check a
//! seat out while building a pod and hand it back on teardown.

use async_trait::async_trait;
use ws_core::Result;

/// A seat checked out for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseSeat {
    pub product: String,
    pub seat_id: String,
}

#[async_trait]
pub trait LicenseSeats: Send + Sync {
    /// Reserve a seat, or `None` when none is free.
    async fn checkout(&self, user: &str, product: &str) -> Result<Option<LicenseSeat>>;

    /// Return the user's seat. Releasing a seat that is not held succeeds.
    async fn release(&self, user: &str, product: &str) -> Result<()>;
}

/// Seat source for deployments without licensed apps.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLicenses;

#[async_trait]
impl LicenseSeats for NoLicenses {
    async fn checkout(&self, _user: &str, _product: &str) -> Result<Option<LicenseSeat>> {
        Ok(None)
    }

    async fn release(&self, _user: &str, _product: &str) -> Result<()> {
        Ok(())
    }
}
