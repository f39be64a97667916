//! Parent/child links between core entities.

use std::sync::Arc;

use super::core::EntityKind;
use super::models::{Link, LinkList};
use super::{ClientContext, ClientError};

/// Link operations on the core gateway.
#[derive(Debug, Clone)]
pub struct LinksClient {
    ctx: Arc<ClientContext>,
}

impl LinksClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn link_url(
        &self,
        parent_kind: EntityKind,
        parent: &str,
        child_kind: EntityKind,
        child: &str,
    ) -> String {
        format!(
            "{}/link/{}/{}/{}/{}",
            self.ctx.endpoints().core,
            parent_kind.path(),
            parent,
            child_kind.path(),
            child
        )
    }

    /// List every link.
    pub async fn list(&self) -> Result<Vec<Link>, ClientError> {
        let url = format!("{}/link", self.ctx.endpoints().core);
        let list: LinkList = self.ctx.get(&url, None).await?;
        Ok(list.links)
    }

    /// Link a child entity to a parent entity.
    pub async fn link(
        &self,
        parent_kind: EntityKind,
        parent: &str,
        child_kind: EntityKind,
        child: &str,
    ) -> Result<(), ClientError> {
        let url = self.link_url(parent_kind, parent, child_kind, child);
        self.ctx
            .post::<_, serde::de::IgnoredAny>(&url, &serde_json::json!({}), None)
            .await
            .map(|_| ())
    }

    /// Remove the link between a parent and a child.
    pub async fn unlink(
        &self,
        parent_kind: EntityKind,
        parent: &str,
        child_kind: EntityKind,
        child: &str,
    ) -> Result<(), ClientError> {
        let url = self.link_url(parent_kind, parent, child_kind, child);
        self.ctx.delete::<()>(&url, None, None).await
    }
}
