//! In-memory store
//!
//! Implements every storage trait over plain maps behind one `RwLock`.
//! Used by unit tests and, through the `test-utils` feature, by the API
//! integration tests. Semantics mirror the PostgreSQL schema: unique emails,
//! one rating per user and photo, cascading photo deletes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::store::{
    AccountRepository, CommentRepository, OwnershipRepository, PhotoFilterRepository,
    PhotoRepository, RatingRepository, TagRepository, TransformationRepository,
};
use crate::{
    Account, AccountId, AccountQuery, AccountUpdate, Comment, NewAccount, NewComment, NewPhoto,
    NewPhotoFilter, NewPhotoTransformation, Photo, PhotoFilter, PhotoFilterUpdate, PhotoQuery,
    PhotoShareError, PhotoTransformation, RatedPhoto, Rating, RatingSummary, ResourceKind, Result,
    Role, Tag,
};

#[derive(Debug, Clone)]
struct PhotoRow {
    photo: Photo,
    tag_ids: Vec<i64>,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    accounts: BTreeMap<AccountId, Account>,
    photos: BTreeMap<i64, PhotoRow>,
    tags: BTreeMap<i64, Tag>,
    comments: BTreeMap<i64, Comment>,
    ratings: BTreeMap<(i64, AccountId), Rating>,
    filters: BTreeMap<i64, PhotoFilter>,
    transformations: BTreeMap<i64, PhotoTransformation>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn email_taken(&self, email: &str, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|a| a.email == email && Some(a.id) != except)
    }

    fn tag_id_for(&mut self, name: &str) -> i64 {
        if let Some(tag) = self.tags.values().find(|t| t.name == name) {
            return tag.id;
        }
        let id = self.next_id();
        self.tags.insert(
            id,
            Tag {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    fn resolve(&self, row: &PhotoRow) -> Photo {
        let mut photo = row.photo.clone();
        photo.tags = row
            .tag_ids
            .iter()
            .filter_map(|id| self.tags.get(id).cloned())
            .collect();
        photo
    }

    fn ratings_for(&self, photo_id: i64) -> impl Iterator<Item = &Rating> {
        self.ratings
            .range((photo_id, AccountId::MIN)..=(photo_id, AccountId::MAX))
            .map(|(_, rating)| rating)
    }

    fn summary(&self, photo_id: i64) -> RatingSummary {
        let (sum, count) = self
            .ratings_for(photo_id)
            .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r.rate), count + 1));
        RatingSummary {
            photo_id,
            average: (count > 0).then(|| sum as f64 / count as f64),
            count,
        }
    }
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&account.email, None) {
            return Err(PhotoShareError::Conflict(format!(
                "account {} already exists",
                account.email
            )));
        }

        let now = Utc::now();
        let id = tables.next_id();
        let account = Account {
            id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            confirmed: false,
            active: true,
            refresh_token: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|a| {
                query
                    .username
                    .as_ref()
                    .map_or(true, |u| a.username.to_lowercase().contains(&u.to_lowercase()))
            })
            .filter(|a| {
                query
                    .email
                    .as_ref()
                    .map_or(true, |e| a.email.to_lowercase().contains(&e.to_lowercase()))
            })
            .filter(|a| query.role.map_or(true, |r| a.role == r))
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> Result<Option<Account>> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &update.email {
            if tables.email_taken(email, Some(id)) {
                return Err(PhotoShareError::Conflict(format!(
                    "account {email} already exists"
                )));
            }
        }

        let Some(account) = tables.accounts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = update.username {
            account.username = username;
        }
        if let Some(email) = update.email {
            if email != account.email {
                account.email = email;
                account.confirmed = false;
            }
        }
        if let Some(hash) = update.password_hash {
            account.password_hash = hash;
            account.refresh_token = None;
        }
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn set_refresh_token(&self, id: AccountId, token: Option<&str>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(account) = tables.accounts.get_mut(&id) {
            account.refresh_token = token.map(str::to_string);
        }
        Ok(())
    }

    async fn confirm_email(&self, email: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(account) = tables.accounts.values_mut().find(|a| a.email == email) {
            account.confirmed = true;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_avatar(&self, id: AccountId, url: &str) -> Result<Option<Account>> {
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.avatar = Some(url.to_string());
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn set_role(&self, id: AccountId, role: Role) -> Result<Option<Account>> {
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.role = role;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn ban_account(&self, id: AccountId) -> Result<Option<Account>> {
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.active = false;
            account.refresh_token = None;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }
}

#[async_trait]
impl PhotoRepository for MemoryStore {
    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo> {
        let mut tables = self.tables.write().await;
        let tag_ids = photo
            .tags
            .iter()
            .map(|name| tables.tag_id_for(name))
            .collect();

        let now = Utc::now();
        let id = tables.next_id();
        let row = PhotoRow {
            photo: Photo {
                id,
                owner_id: photo.owner_id,
                url: photo.url,
                public_id: photo.public_id,
                description: photo.description,
                tags: Vec::new(),
                created_at: now,
                updated_at: now,
            },
            tag_ids,
        };
        let resolved = tables.resolve(&row);
        tables.photos.insert(id, row);
        Ok(resolved)
    }

    async fn find_photo(&self, id: i64) -> Result<Option<Photo>> {
        let tables = self.tables.read().await;
        Ok(tables.photos.get(&id).map(|row| tables.resolve(row)))
    }

    async fn list_photos(&self, query: &PhotoQuery) -> Result<Vec<RatedPhoto>> {
        let tables = self.tables.read().await;
        let tag_id = match &query.tag {
            Some(name) => match tables.tags.values().find(|t| &t.name == name) {
                Some(tag) => Some(tag.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut rows: Vec<&PhotoRow> = tables
            .photos
            .values()
            .filter(|row| query.owner_id.map_or(true, |o| row.photo.owner_id == o))
            .filter(|row| tag_id.map_or(true, |t| row.tag_ids.contains(&t)))
            .filter(|row| {
                let day = row.photo.created_at.date_naive();
                query.created_from.map_or(true, |from| day >= from)
                    && query.created_to.map_or(true, |to| day <= to)
            })
            .collect();
        rows.sort_by(|a, b| {
            (b.photo.created_at, b.photo.id).cmp(&(a.photo.created_at, a.photo.id))
        });

        Ok(rows
            .into_iter()
            .map(|row| RatedPhoto {
                photo: tables.resolve(row),
                average_rating: tables.summary(row.photo.id).average,
            })
            .filter(|rated| query.matches_rating(rated.average_rating))
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn update_photo(
        &self,
        id: i64,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<Option<Photo>> {
        let mut tables = self.tables.write().await;
        if !tables.photos.contains_key(&id) {
            return Ok(None);
        }

        let tag_ids = tags.map(|names| {
            names
                .iter()
                .map(|name| tables.tag_id_for(name))
                .collect::<Vec<_>>()
        });

        let Some(row) = tables.photos.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(description) = description {
            row.photo.description = Some(description);
        }
        if let Some(tag_ids) = tag_ids {
            row.tag_ids = tag_ids;
        }
        row.photo.updated_at = Utc::now();
        let row = row.clone();
        Ok(Some(tables.resolve(&row)))
    }

    async fn detach_tags(&self, id: i64, tags: &[String]) -> Result<Option<Photo>> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.photos.get(&id) else {
            return Ok(None);
        };

        let mut remaining = row.tag_ids.clone();
        for name in tags {
            let attached = remaining
                .iter()
                .position(|tid| tables.tags.get(tid).is_some_and(|t| &t.name == name));
            match attached {
                Some(index) => {
                    remaining.remove(index);
                }
                None => return Err(PhotoShareError::NotFound(format!("tag {name}"))),
            }
        }

        let Some(row) = tables.photos.get_mut(&id) else {
            return Ok(None);
        };
        row.tag_ids = remaining;
        row.photo.updated_at = Utc::now();
        let row = row.clone();
        Ok(Some(tables.resolve(&row)))
    }

    async fn delete_photo(&self, id: i64) -> Result<Option<Photo>> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.photos.remove(&id) else {
            return Ok(None);
        };
        tables.comments.retain(|_, c| c.photo_id != id);
        tables.ratings.retain(|(photo_id, _), _| *photo_id != id);
        tables.transformations.retain(|_, t| t.photo_id != id);
        Ok(Some(tables.resolve(&row)))
    }

    async fn count_photos_by_owner(&self, owner_id: AccountId) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .photos
            .values()
            .filter(|row| row.photo.owner_id == owner_id)
            .count() as i64)
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tables = self.tables.read().await;
        let mut tags: Vec<Tag> = tables.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn delete_tag(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.tags.remove(&id).is_none() {
            return Ok(false);
        }
        for row in tables.photos.values_mut() {
            row.tag_ids.retain(|tid| *tid != id);
        }
        Ok(true)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.photos.contains_key(&comment.photo_id) {
            return Err(PhotoShareError::NotFound(format!(
                "photo {}",
                comment.photo_id
            )));
        }

        let now = Utc::now();
        let id = tables.next_id();
        let comment = Comment {
            id,
            photo_id: comment.photo_id,
            author_id: comment.author_id,
            text: comment.text,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn list_comments_for_photo(&self, photo_id: i64) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.photo_id == photo_id)
            .cloned()
            .collect())
    }

    async fn update_comment(&self, id: i64, text: &str) -> Result<Option<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.get_mut(&id).map(|comment| {
            comment.text = text.to_string();
            comment.updated_at = Utc::now();
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn find_rating(&self, photo_id: i64, user_id: AccountId) -> Result<Option<Rating>> {
        let tables = self.tables.read().await;
        Ok(tables.ratings.get(&(photo_id, user_id)).cloned())
    }

    async fn create_rating(&self, photo_id: i64, user_id: AccountId, rate: i16) -> Result<Rating> {
        let mut tables = self.tables.write().await;
        if !tables.photos.contains_key(&photo_id) {
            return Err(PhotoShareError::NotFound(format!("photo {photo_id}")));
        }
        if tables.ratings.contains_key(&(photo_id, user_id)) {
            return Err(PhotoShareError::Conflict(format!(
                "photo {photo_id} already rated by {user_id}"
            )));
        }

        let rating = Rating {
            photo_id,
            user_id,
            rate,
            created_at: Utc::now(),
        };
        tables.ratings.insert((photo_id, user_id), rating.clone());
        Ok(rating)
    }

    async fn list_ratings(&self, photo_id: i64) -> Result<Vec<Rating>> {
        let tables = self.tables.read().await;
        Ok(tables.ratings_for(photo_id).cloned().collect())
    }

    async fn rating_summary(&self, photo_id: i64) -> Result<RatingSummary> {
        Ok(self.tables.read().await.summary(photo_id))
    }

    async fn delete_rating(&self, photo_id: i64, user_id: AccountId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.ratings.remove(&(photo_id, user_id)).is_some())
    }
}

#[async_trait]
impl PhotoFilterRepository for MemoryStore {
    async fn create_filter(&self, filter: NewPhotoFilter) -> Result<PhotoFilter> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.next_id();
        let filter = PhotoFilter {
            id,
            owner_id: filter.owner_id,
            name: filter.name,
            description: filter.description,
            preset: filter.preset,
            created_at: now,
            updated_at: now,
        };
        tables.filters.insert(id, filter.clone());
        Ok(filter)
    }

    async fn find_filter(&self, id: i64) -> Result<Option<PhotoFilter>> {
        Ok(self.tables.read().await.filters.get(&id).cloned())
    }

    async fn list_filters_by_owner(&self, owner_id: AccountId) -> Result<Vec<PhotoFilter>> {
        let tables = self.tables.read().await;
        Ok(tables
            .filters
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_filter(
        &self,
        id: i64,
        update: PhotoFilterUpdate,
    ) -> Result<Option<PhotoFilter>> {
        let mut tables = self.tables.write().await;
        Ok(tables.filters.get_mut(&id).map(|filter| {
            if let Some(name) = update.name {
                filter.name = name;
            }
            if let Some(description) = update.description {
                filter.description = Some(description);
            }
            if let Some(preset) = update.preset {
                filter.preset = preset;
            }
            filter.updated_at = Utc::now();
            filter.clone()
        }))
    }

    async fn delete_filter(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.filters.remove(&id).is_some())
    }
}

#[async_trait]
impl TransformationRepository for MemoryStore {
    async fn create_transformation(
        &self,
        transformation: NewPhotoTransformation,
    ) -> Result<PhotoTransformation> {
        let mut tables = self.tables.write().await;
        if !tables.photos.contains_key(&transformation.photo_id) {
            return Err(PhotoShareError::NotFound(format!(
                "photo {}",
                transformation.photo_id
            )));
        }

        let now = Utc::now();
        let id = tables.next_id();
        let transformation = PhotoTransformation {
            id,
            photo_id: transformation.photo_id,
            transformed_url: transformation.transformed_url,
            description: transformation.description,
            created_at: now,
            updated_at: now,
        };
        tables.transformations.insert(id, transformation.clone());
        Ok(transformation)
    }

    async fn find_transformation(&self, id: i64) -> Result<Option<PhotoTransformation>> {
        Ok(self.tables.read().await.transformations.get(&id).cloned())
    }

    async fn list_transformations(&self, photo_id: i64) -> Result<Vec<PhotoTransformation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transformations
            .values()
            .filter(|t| t.photo_id == photo_id)
            .cloned()
            .collect())
    }

    async fn update_transformation_description(
        &self,
        id: i64,
        description: Option<String>,
    ) -> Result<Option<PhotoTransformation>> {
        let mut tables = self.tables.write().await;
        Ok(tables.transformations.get_mut(&id).map(|t| {
            t.description = description;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn delete_transformation(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.transformations.remove(&id).is_some())
    }
}

#[async_trait]
impl OwnershipRepository for MemoryStore {
    async fn owner_of(&self, kind: ResourceKind, id: i64) -> Result<Option<AccountId>> {
        let tables = self.tables.read().await;
        let owner = match kind {
            ResourceKind::Photo => tables.photos.get(&id).map(|row| row.photo.owner_id),
            ResourceKind::Comment => tables.comments.get(&id).map(|c| c.author_id),
            ResourceKind::PhotoFilter => tables.filters.get(&id).map(|f| f.owner_id),
            ResourceKind::PhotoTransformation => tables
                .transformations
                .get(&id)
                .and_then(|t| tables.photos.get(&t.photo_id))
                .map(|row| row.photo.owner_id),
        };
        Ok(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            username: "tester".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    fn new_photo(owner_id: AccountId, tags: &[&str]) -> NewPhoto {
        NewPhoto {
            owner_id,
            url: "https://cdn.example.com/p.jpg".to_string(),
            public_id: "photos/p".to_string(),
            description: Some("a photo".to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_account_defaults_and_duplicate_email() {
        let store = MemoryStore::new();
        let account = store.create_account(new_account("a@b.com")).await.unwrap();
        assert!(!account.confirmed);
        assert!(account.active);
        assert!(account.refresh_token.is_none());

        let err = store.create_account(new_account("a@b.com")).await.unwrap_err();
        assert!(matches!(err, PhotoShareError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_ban_clears_refresh_token() {
        let store = MemoryStore::new();
        let account = store.create_account(new_account("a@b.com")).await.unwrap();
        store
            .set_refresh_token(account.id, Some("refresh"))
            .await
            .unwrap();

        let banned = store.ban_account(account.id).await.unwrap().unwrap();
        assert!(!banned.active);
        assert!(banned.refresh_token.is_none());
        assert!(store.ban_account(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_account_email_conflict() {
        let store = MemoryStore::new();
        let first = store.create_account(new_account("a@b.com")).await.unwrap();
        store.create_account(new_account("c@d.com")).await.unwrap();

        let update = AccountUpdate {
            email: Some("c@d.com".to_string()),
            ..Default::default()
        };
        assert!(store.update_account(first.id, update).await.is_err());

        let update = AccountUpdate {
            email: Some("a@b.com".to_string()),
            username: Some("renamed".to_string()),
            ..Default::default()
        };
        let updated = store.update_account(first.id, update).await.unwrap().unwrap();
        assert_eq!(updated.username, "renamed");
    }

    #[tokio::test]
    async fn test_credential_changes_reset_confirmation_and_refresh() {
        let store = MemoryStore::new();
        let account = store.create_account(new_account("a@b.com")).await.unwrap();
        store.confirm_email("a@b.com").await.unwrap();
        store
            .set_refresh_token(account.id, Some("refresh"))
            .await
            .unwrap();

        let update = AccountUpdate {
            password_hash: Some("new-hash".to_string()),
            ..Default::default()
        };
        let updated = store.update_account(account.id, update).await.unwrap().unwrap();
        assert!(updated.refresh_token.is_none());
        assert!(updated.confirmed);

        let update = AccountUpdate {
            email: Some("e@f.com".to_string()),
            ..Default::default()
        };
        let updated = store.update_account(account.id, update).await.unwrap().unwrap();
        assert_eq!(updated.email, "e@f.com");
        assert!(!updated.confirmed);
    }

    #[tokio::test]
    async fn test_photo_tags_are_shared() {
        let store = MemoryStore::new();
        let a = store.create_photo(new_photo(1, &["#sea", "#sun"])).await.unwrap();
        let b = store.create_photo(new_photo(2, &["#sea"])).await.unwrap();

        assert_eq!(a.tags.len(), 2);
        assert_eq!(a.tags[0].id, b.tags[0].id);
        assert_eq!(store.list_tags().await.unwrap().len(), 2);

        let query = PhotoQuery {
            tag: Some("#sun".to_string()),
            ..Default::default()
        };
        let found = store.list_photos(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].photo.id, a.id);
    }

    #[tokio::test]
    async fn test_detach_unknown_tag_fails() {
        let store = MemoryStore::new();
        let photo = store.create_photo(new_photo(1, &["#sea"])).await.unwrap();

        let err = store
            .detach_tags(photo.id, &["#mountain".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoShareError::NotFound(_)));

        let detached = store
            .detach_tags(photo.id, &["#sea".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert!(detached.tags.is_empty());
    }

    #[tokio::test]
    async fn test_ratings_summary_and_duplicate() {
        let store = MemoryStore::new();
        let photo = store.create_photo(new_photo(1, &[])).await.unwrap();

        store.create_rating(photo.id, 2, 4).await.unwrap();
        store.create_rating(photo.id, 3, 5).await.unwrap();
        let err = store.create_rating(photo.id, 2, 1).await.unwrap_err();
        assert!(matches!(err, PhotoShareError::Conflict(_)));

        let summary = store.rating_summary(photo.id).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.5));

        let high = PhotoQuery {
            rating_min: Some(4.6),
            ..Default::default()
        };
        assert!(store.list_photos(&high).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_photo_cascades() {
        let store = MemoryStore::new();
        let photo = store.create_photo(new_photo(1, &[])).await.unwrap();
        let comment = store
            .create_comment(NewComment {
                photo_id: photo.id,
                author_id: 2,
                text: "nice".to_string(),
            })
            .await
            .unwrap();
        store.create_rating(photo.id, 2, 3).await.unwrap();
        let transformation = store
            .create_transformation(NewPhotoTransformation {
                photo_id: photo.id,
                transformed_url: "https://cdn.example.com/t.jpg".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert!(store.delete_photo(photo.id).await.unwrap().is_some());
        assert!(store.find_comment(comment.id).await.unwrap().is_none());
        assert!(store.find_rating(photo.id, 2).await.unwrap().is_none());
        assert!(store
            .find_transformation(transformation.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_owner_lookup_per_kind() {
        let store = MemoryStore::new();
        let photo = store.create_photo(new_photo(7, &[])).await.unwrap();
        let transformation = store
            .create_transformation(NewPhotoTransformation {
                photo_id: photo.id,
                transformed_url: "u".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let filter = store
            .create_filter(NewPhotoFilter {
                owner_id: 8,
                name: "avatar".to_string(),
                description: None,
                preset: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(
            store.owner_of(ResourceKind::Photo, photo.id).await.unwrap(),
            Some(7)
        );
        assert_eq!(
            store
                .owner_of(ResourceKind::PhotoTransformation, transformation.id)
                .await
                .unwrap(),
            Some(7)
        );
        assert_eq!(
            store
                .owner_of(ResourceKind::PhotoFilter, filter.id)
                .await
                .unwrap(),
            Some(8)
        );
        assert_eq!(store.owner_of(ResourceKind::Comment, 999).await.unwrap(), None);
    }
}
