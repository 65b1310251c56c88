//! Vendor menu management.
//!
//! Menu items live under the owning vendor's record at
//! `vendors/{vendorId}/menuItems/{itemId}`. Mutations are addressed through
//! the session's own vendor path, so a vendor can never reach another
//! vendor's items.

use std::sync::Arc;

use serde_json::{Map, json};
use tracing::info;

use super::port_error_mapping::{map_decode_error, map_store_error};
use super::ports::RemoteStore;
use super::{
    CollectionPath, DocumentPath, Error, IdentityId, MenuItem, MenuItemId, NewMenuItem, Role,
    SessionContext, WriteOptions, profile,
};

/// Create, toggle, delete and list menu items.
pub struct MenuService<S> {
    store: Arc<S>,
}

impl<S> MenuService<S> {
    /// Create the service.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> MenuService<S>
where
    S: RemoteStore,
{
    /// Publish a new, available item on the session vendor's menu.
    pub async fn create_item(
        &self,
        session: &SessionContext,
        input: NewMenuItem,
    ) -> Result<MenuItem, Error> {
        session.require_role(Role::Vendor)?;
        let item = input
            .into_item(MenuItemId::random(), session.identity_id().clone())
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let path = item_path(&item.vendor_id, item.id);
        let data = profile::encode(&item).map_err(|err| map_decode_error(&path, err))?;
        self.store
            .set_document(&path, data, WriteOptions::overwrite().with_expected_revision(0))
            .await
            .map_err(map_store_error)?;
        info!(vendor_id = %item.vendor_id, item_id = %item.id, "menu item created");
        Ok(item)
    }

    /// Mark one of the session vendor's items as available or sold out.
    pub async fn set_availability(
        &self,
        session: &SessionContext,
        item_id: MenuItemId,
        is_available: bool,
    ) -> Result<MenuItem, Error> {
        session.require_role(Role::Vendor)?;
        let path = item_path(session.identity_id(), item_id);
        let (mut item, revision) = self.load(&path).await?;

        let mut changes = Map::new();
        changes.insert("isAvailable".to_owned(), json!(is_available));
        self.store
            .set_document(
                &path,
                changes,
                WriteOptions::merge().with_expected_revision(revision),
            )
            .await
            .map_err(map_store_error)?;
        item.is_available = is_available;
        Ok(item)
    }

    /// Remove one of the session vendor's items.
    pub async fn delete_item(
        &self,
        session: &SessionContext,
        item_id: MenuItemId,
    ) -> Result<(), Error> {
        session.require_role(Role::Vendor)?;
        let path = item_path(session.identity_id(), item_id);
        self.load(&path).await?;
        self.store
            .delete_document(&path)
            .await
            .map_err(map_store_error)?;
        info!(vendor_id = %session.identity_id(), item_id = %item_id, "menu item deleted");
        Ok(())
    }

    /// Fetch a single item of any vendor.
    pub async fn get_item(
        &self,
        vendor_id: &IdentityId,
        item_id: MenuItemId,
    ) -> Result<MenuItem, Error> {
        self.load(&item_path(vendor_id, item_id))
            .await
            .map(|(item, _)| item)
    }

    /// All items on a vendor's menu.
    pub async fn list_items(&self, vendor_id: &IdentityId) -> Result<Vec<MenuItem>, Error> {
        let documents = self
            .store
            .query_documents(&CollectionPath::menu_items(vendor_id), &[], None)
            .await
            .map_err(map_store_error)?;
        documents
            .iter()
            .map(|document| {
                profile::decode::<MenuItem>(document)
                    .map_err(|err| map_decode_error(&document.path, err))
            })
            .collect()
    }

    async fn load(&self, path: &DocumentPath) -> Result<(MenuItem, u64), Error> {
        let document = self
            .store
            .get_document(path)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("menu item {path} does not exist")))?;
        let item = profile::decode::<MenuItem>(&document).map_err(|err| map_decode_error(path, err))?;
        Ok((item, document.revision))
    }
}

fn item_path(vendor_id: &IdentityId, item_id: MenuItemId) -> DocumentPath {
    CollectionPath::menu_items(vendor_id).document(item_id)
}
