//! Page hierarchy: the move dialog's navigator and the server-side
//! reparent checks.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::error::DocsError;
use super::types::Page;
use crate::client::ClientError;

pub const ROOT_LABEL: &str = "Root";

/// Walks up from `start` and reports whether `target` is on the path.
/// A broken parent chain ends the walk.
pub fn has_ancestor(parents: &HashMap<Uuid, Option<Uuid>>, start: Uuid, target: Uuid) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = parents.get(&start).copied().flatten();
    while let Some(id) = cursor {
        if id == target {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        cursor = parents.get(&id).copied().flatten();
    }
    false
}

/// Checks a reparent request. `destination` is `None` for the book root.
pub fn validate_move(
    page: &Page,
    destination: Option<&Page>,
    parents: &HashMap<Uuid, Option<Uuid>>,
) -> Result<(), DocsError> {
    let Some(dest) = destination else {
        return Ok(());
    };
    if dest.id == page.id {
        return Err(DocsError::Conflict("a page cannot be moved into itself".to_string()));
    }
    if has_ancestor(parents, dest.id, page.id) {
        return Err(DocsError::Conflict(
            "a page cannot be moved into one of its descendants".to_string(),
        ));
    }
    if !dest.kind().is_container() {
        return Err(DocsError::Validation(format!("'{}' is not a folder", dest.title)));
    }
    if dest.book_id != page.book_id {
        return Err(DocsError::Validation(
            "pages can only be moved within their book".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait PageMover: Send + Sync {
    async fn move_page(&self, page_id: Uuid, version: i32, new_parent: Option<Uuid>) -> Result<Page, ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("page is already in this folder")]
    SameParent,
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: Option<Uuid>,
    pub title: String,
}

/// State of the "move to" dialog for a single page.
pub struct MoveNavigator {
    moving: Page,
    pages: Vec<Page>,
    browsing: Option<Uuid>,
    selected: Option<Uuid>,
    breadcrumbs: Vec<Crumb>,
}

impl MoveNavigator {
    /// `pages` is every page of the moving page's book.
    pub fn new(moving: Page, pages: Vec<Page>) -> Self {
        let mut nav = Self {
            moving,
            pages,
            browsing: None,
            selected: None,
            breadcrumbs: Vec::new(),
        };
        nav.browse(None);
        nav
    }

    pub fn browsing(&self) -> Option<Uuid> {
        self.browsing
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn breadcrumbs(&self) -> &[Crumb] {
        &self.breadcrumbs
    }

    /// Opens a folder (or the root). Clears the selection.
    pub fn browse(&mut self, folder: Option<Uuid>) {
        self.browsing = folder;
        self.selected = None;
        self.breadcrumbs = self.trail(folder);
    }

    /// Selects one of the current candidates; anything else is ignored.
    pub fn select(&mut self, folder: Option<Uuid>) -> bool {
        match folder {
            None => {
                self.selected = None;
                true
            }
            Some(id) if self.candidates().iter().any(|p| p.id == id) => {
                self.selected = Some(id);
                true
            }
            Some(_) => false,
        }
    }

    /// Folders directly inside the browsing folder, minus the moving page
    /// and its subtree.
    pub fn candidates(&self) -> Vec<&Page> {
        let parents = self.parents();
        let mut out: Vec<&Page> = self
            .pages
            .iter()
            .filter(|p| p.parent_id == self.browsing && p.kind().is_container())
            .filter(|p| p.id != self.moving.id && !has_ancestor(&parents, p.id, self.moving.id))
            .collect();
        out.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        out
    }

    pub fn destination(&self) -> Option<Uuid> {
        self.selected.or(self.browsing)
    }

    pub fn is_noop(&self) -> bool {
        self.destination() == self.moving.parent_id
    }

    pub async fn confirm(&self, mover: &dyn PageMover) -> Result<Page, MoveError> {
        if self.is_noop() {
            return Err(MoveError::SameParent);
        }
        let page = mover
            .move_page(self.moving.id, self.moving.version, self.destination())
            .await?;
        Ok(page)
    }

    fn parents(&self) -> HashMap<Uuid, Option<Uuid>> {
        self.pages.iter().map(|p| (p.id, p.parent_id)).collect()
    }

    fn trail(&self, folder: Option<Uuid>) -> Vec<Crumb> {
        let by_id: HashMap<Uuid, &Page> = self.pages.iter().map(|p| (p.id, p)).collect();
        let mut crumbs = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = folder;
        while let Some(id) = cursor {
            let Some(page) = by_id.get(&id) else { break };
            if !seen.insert(id) {
                break;
            }
            crumbs.push(Crumb {
                id: Some(id),
                title: page.title.clone(),
            });
            cursor = page.parent_id;
        }
        crumbs.push(Crumb {
            id: None,
            title: ROOT_LABEL.to_string(),
        });
        crumbs.reverse();
        crumbs
    }
}
