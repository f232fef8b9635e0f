//! Pages, portals between them, and the quick-add search used to insert portals.

use crate::canvas::CanvasDocument;
use crate::shapes::Portal;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for pages.
pub type PageId = Uuid;

/// Title given to pages created without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Linking errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),
    #[error("No page titled {0:?}")]
    TitleNotFound(String),
    #[error("Another page is already titled {0:?}")]
    TitleTaken(String),
    #[error("Page title cannot be empty")]
    EmptyTitle,
    #[error("No rename awaiting confirmation on page {0}")]
    NoPendingRename(PageId),
}

/// Result type for linking operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// A page: a titled document.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    title: String,
    /// Still carrying the generated default title; the first rename needs no confirmation.
    title_is_default: bool,
    pub document: CanvasDocument,
}

impl Page {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_is_default(&self) -> bool {
        self.title_is_default
    }
}

/// A rename held back until the user confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRename {
    pub page: PageId,
    pub from: String,
    pub to: String,
}

impl PendingRename {
    /// Confirmation prompt shown to the user.
    pub fn prompt(&self) -> String {
        format!("Do you really want to change the page name to “{}”?", self.to)
    }
}

/// Outcome of a rename request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The title changed.
    Applied { from: String, to: String },
    /// The title is unchanged until [`PageRegistry::confirm_rename`].
    NeedsConfirmation(PendingRename),
}

fn same_title(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// All pages known to the host, with their documents.
#[derive(Debug, Clone, Default)]
pub struct PageRegistry {
    pages: Vec<Page>,
    pending: Vec<PendingRename>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a page. Without a title it gets the next free "Untitled", "Untitled 2", ...
    pub fn create_page(&mut self, title: Option<&str>) -> LinkResult<PageId> {
        let (title, title_is_default) = match title.map(str::trim) {
            Some("") => return Err(LinkError::EmptyTitle),
            Some(t) => {
                if self.find_by_title(t).is_some() {
                    return Err(LinkError::TitleTaken(t.to_string()));
                }
                (t.to_string(), false)
            }
            None => (self.next_default_title(), true),
        };
        let id = Uuid::new_v4();
        log::info!("created page {title:?}");
        self.pages.push(Page {
            id,
            title,
            title_is_default,
            document: CanvasDocument::new(),
        });
        Ok(id)
    }

    fn next_default_title(&self) -> String {
        if self.find_by_title(DEFAULT_TITLE).is_none() {
            return DEFAULT_TITLE.to_string();
        }
        (2..)
            .map(|n| format!("{DEFAULT_TITLE} {n}"))
            .find(|t| self.find_by_title(t).is_none())
            .unwrap_or_else(|| format!("{DEFAULT_TITLE} {}", Uuid::new_v4()))
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn title(&self, id: PageId) -> Option<&str> {
        self.page(id).map(Page::title)
    }

    /// Page with this title, compared case-insensitively.
    pub fn find_by_title(&self, title: &str) -> Option<PageId> {
        self.pages
            .iter()
            .find(|p| same_title(&p.title, title))
            .map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page titles matching `query`, excluding `current`.
    ///
    /// Exact matches rank first, then prefix matches, then other substring matches;
    /// ties are alphabetical. Matching ignores case.
    pub fn search(&self, query: &str, current: PageId) -> Vec<String> {
        let needle = query.trim().to_lowercase();
        let mut ranked: Vec<(u8, String, &str)> = self
            .pages
            .iter()
            .filter(|p| p.id != current)
            .filter_map(|p| {
                let hay = p.title.to_lowercase();
                let rank = if hay == needle {
                    0
                } else if hay.starts_with(&needle) {
                    1
                } else if hay.contains(&needle) {
                    2
                } else {
                    return None;
                };
                Some((rank, hay, p.title.as_str()))
            })
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, _, title)| title.to_string()).collect()
    }

    /// Build a portal at `at` to the page titled `target_title`.
    pub fn create_portal(&self, target_title: &str, at: Point) -> LinkResult<Portal> {
        let id = self
            .find_by_title(target_title)
            .ok_or_else(|| LinkError::TitleNotFound(target_title.to_string()))?;
        let title = self.title(id).unwrap_or(target_title);
        Ok(Portal::new(at, title))
    }

    /// Page a portal currently shows; `None` when the portal is unlinked.
    pub fn resolve_portal(&self, portal: &Portal) -> Option<PageId> {
        self.find_by_title(&portal.page_title)
    }

    /// Number of portals on other pages that reference `title`.
    pub fn backlink_count(&self, title: &str) -> usize {
        let target = self.find_by_title(title);
        self.pages
            .iter()
            .filter(|p| Some(p.id) != target)
            .map(|p| p.document.portals().filter(|portal| portal.targets(title)).count())
            .sum()
    }

    /// Request a rename.
    ///
    /// The first rename of a page still titled by default applies at once; later ones
    /// wait for [`confirm_rename`](Self::confirm_rename).
    pub fn rename_page(&mut self, id: PageId, new_title: &str) -> LinkResult<RenameOutcome> {
        let new_title = new_title.trim();
        if new_title.is_empty() {
            return Err(LinkError::EmptyTitle);
        }
        let page = self.page(id).ok_or(LinkError::PageNotFound(id))?;
        let from = page.title.clone();
        if from == new_title {
            return Ok(RenameOutcome::Applied {
                from,
                to: new_title.to_string(),
            });
        }
        self.check_title_free(id, new_title)?;

        if page.title_is_default {
            self.apply_rename(id, new_title)?;
            return Ok(RenameOutcome::Applied {
                from,
                to: new_title.to_string(),
            });
        }

        let pending = PendingRename {
            page: id,
            from,
            to: new_title.to_string(),
        };
        self.pending.retain(|p| p.page != id);
        self.pending.push(pending.clone());
        Ok(RenameOutcome::NeedsConfirmation(pending))
    }

    /// The rename awaiting confirmation on a page.
    pub fn pending_rename(&self, id: PageId) -> Option<&PendingRename> {
        self.pending.iter().find(|p| p.page == id)
    }

    /// Apply the pending rename. Returns the new title.
    pub fn confirm_rename(&mut self, id: PageId) -> LinkResult<String> {
        let index = self
            .pending
            .iter()
            .position(|p| p.page == id)
            .ok_or(LinkError::NoPendingRename(id))?;
        let pending = self.pending.remove(index);
        self.check_title_free(id, &pending.to)?;
        self.apply_rename(id, &pending.to)?;
        Ok(pending.to)
    }

    /// Drop the pending rename, keeping the current title.
    pub fn decline_rename(&mut self, id: PageId) -> LinkResult<()> {
        let before = self.pending.len();
        self.pending.retain(|p| p.page != id);
        if self.pending.len() == before {
            return Err(LinkError::NoPendingRename(id));
        }
        Ok(())
    }

    fn check_title_free(&self, id: PageId, title: &str) -> LinkResult<()> {
        match self.find_by_title(title) {
            Some(other) if other != id => Err(LinkError::TitleTaken(title.to_string())),
            _ => Ok(()),
        }
    }

    /// Set the title and re-point every portal that referenced the old one.
    fn apply_rename(&mut self, id: PageId, new_title: &str) -> LinkResult<()> {
        let page = self.page_mut(id).ok_or(LinkError::PageNotFound(id))?;
        let old = std::mem::replace(&mut page.title, new_title.to_string());
        page.title_is_default = false;

        let retitled: usize = self
            .pages
            .iter_mut()
            .map(|p| p.document.retitle_portals(&old, new_title))
            .sum();
        log::info!("renamed page {old:?} to {new_title:?} ({retitled} portal(s) updated)");
        Ok(())
    }

    /// Remove a page. Portals to it elsewhere stay, unlinked.
    pub fn delete_page(&mut self, id: PageId) -> LinkResult<Page> {
        let index = self
            .pages
            .iter()
            .position(|p| p.id == id)
            .ok_or(LinkError::PageNotFound(id))?;
        self.pending.retain(|p| p.page != id);
        let page = self.pages.remove(index);
        log::info!("deleted page {:?}", page.title);
        Ok(page)
    }

    /// Move a page's document out, leaving an empty one in its place.
    pub(crate) fn take_document(&mut self, id: PageId) -> Option<CanvasDocument> {
        self.page_mut(id).map(|p| std::mem::take(&mut p.document))
    }

    /// Put a document taken with [`take_document`](Self::take_document) back.
    pub(crate) fn put_document(&mut self, id: PageId, document: CanvasDocument) {
        if let Some(page) = self.page_mut(id) {
            page.document = document;
        }
    }
}

/// Quick-add search popup: filters page titles and inserts a portal for the chosen one.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickSearch {
    /// Where the portal will be placed (world coordinates).
    pub position: Point,
    pub query: String,
    pub results: Vec<String>,
}

impl QuickSearch {
    /// Open at `position` with an empty query.
    pub fn open(registry: &PageRegistry, current: PageId, position: Point) -> Self {
        Self {
            position,
            query: String::new(),
            results: registry.search("", current),
        }
    }

    /// Replace the query and refresh the results.
    pub fn set_query(&mut self, registry: &PageRegistry, current: PageId, query: &str) {
        self.query = query.to_string();
        self.results = registry.search(query, current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Shape;

    fn registry_with(titles: &[&str]) -> (PageRegistry, Vec<PageId>) {
        let mut registry = PageRegistry::new();
        let ids = titles
            .iter()
            .map(|t| registry.create_page(Some(t)).unwrap())
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_default_titles_are_unique() {
        let mut registry = PageRegistry::new();
        let a = registry.create_page(None).unwrap();
        let b = registry.create_page(None).unwrap();
        assert_eq!(registry.title(a), Some("Untitled"));
        assert_eq!(registry.title(b), Some("Untitled 2"));
        assert!(registry.page(a).unwrap().title_is_default());
    }

    #[test]
    fn test_title_taken() {
        let (mut registry, _) = registry_with(&["Notes"]);
        assert_eq!(
            registry.create_page(Some("notes")),
            Err(LinkError::TitleTaken("notes".to_string()))
        );
    }

    #[test]
    fn test_search_ranking() {
        let (registry, ids) =
            registry_with(&["board", "my-whiteboard", "whiteboard tips", "Whiteboard", "other"]);
        let results = registry.search("whiteboard", ids[4]);
        assert_eq!(results, vec!["Whiteboard", "whiteboard tips", "my-whiteboard"]);
    }

    #[test]
    fn test_search_excludes_current_page() {
        let (registry, ids) = registry_with(&["alpha", "alphabet"]);
        assert_eq!(registry.search("alpha", ids[0]), vec!["alphabet"]);
    }

    #[test]
    fn test_first_rename_of_default_title_applies() {
        let mut registry = PageRegistry::new();
        let id = registry.create_page(None).unwrap();
        let outcome = registry.rename_page(id, "my-whiteboard").unwrap();
        assert!(matches!(outcome, RenameOutcome::Applied { .. }));
        assert_eq!(registry.title(id), Some("my-whiteboard"));
        assert!(!registry.page(id).unwrap().title_is_default());
    }

    #[test]
    fn test_second_rename_needs_confirmation() {
        let mut registry = PageRegistry::new();
        let id = registry.create_page(None).unwrap();
        registry.rename_page(id, "my-whiteboard").unwrap();

        let outcome = registry.rename_page(id, "my-whiteboard-2").unwrap();
        let RenameOutcome::NeedsConfirmation(pending) = outcome else {
            panic!("expected confirmation");
        };
        assert_eq!(
            pending.prompt(),
            "Do you really want to change the page name to “my-whiteboard-2”?"
        );
        assert_eq!(registry.title(id), Some("my-whiteboard"));

        registry.decline_rename(id).unwrap();
        assert_eq!(registry.title(id), Some("my-whiteboard"));
        assert_eq!(registry.decline_rename(id), Err(LinkError::NoPendingRename(id)));

        registry.rename_page(id, "my-whiteboard-2").unwrap();
        assert_eq!(registry.confirm_rename(id).unwrap(), "my-whiteboard-2");
        assert_eq!(registry.title(id), Some("my-whiteboard-2"));
    }

    #[test]
    fn test_rename_retitles_portals_and_keeps_backlinks() {
        let (mut registry, ids) = registry_with(&["target", "host"]);
        let portal = registry.create_portal("TARGET", Point::ZERO).unwrap();
        assert_eq!(portal.page_title, "target");
        registry
            .page_mut(ids[1])
            .unwrap()
            .document
            .add_shape(Shape::Portal(portal));
        assert_eq!(registry.backlink_count("target"), 1);

        registry.rename_page(ids[0], "renamed").unwrap();
        registry.confirm_rename(ids[0]).unwrap();
        assert_eq!(registry.backlink_count("renamed"), 1);
        assert_eq!(registry.backlink_count("target"), 0);
    }

    #[test]
    fn test_delete_page_unlinks_portals() {
        let (mut registry, ids) = registry_with(&["target", "host"]);
        let portal = registry.create_portal("target", Point::ZERO).unwrap();
        assert_eq!(registry.resolve_portal(&portal), Some(ids[0]));

        registry.delete_page(ids[0]).unwrap();
        assert_eq!(registry.resolve_portal(&portal), None);
        assert!(matches!(
            registry.create_portal("target", Point::ZERO),
            Err(LinkError::TitleNotFound(_))
        ));
    }

    #[test]
    fn test_backlinks_ignore_self_portals() {
        let (mut registry, ids) = registry_with(&["self"]);
        let portal = registry.create_portal("self", Point::ZERO).unwrap();
        registry
            .page_mut(ids[0])
            .unwrap()
            .document
            .add_shape(Shape::Portal(portal));
        assert_eq!(registry.backlink_count("self"), 0);
    }
}
